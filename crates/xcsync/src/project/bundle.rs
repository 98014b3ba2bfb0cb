//! Project Bundle
//!
//! The fixed ancillary files inside an `.xcodeproj` bundle. Pure function of the
//! project name, user name and output root; the caller publishes the returned
//! files through the write pipeline.

use std::path::{Path, PathBuf};

const WORKSPACE_CONTENTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Workspace
   version = "1.0">
   <FileRef
      location = "self:">
   </FileRef>
</Workspace>
"#;

const WORKSPACE_SETTINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>BuildLocationStyle</key>
	<string>UseAppPreferences</string>
	<key>CustomBuildLocationType</key>
	<string>RelativeToDerivedData</string>
	<key>DerivedDataLocationStyle</key>
	<string>Default</string>
	<key>ShowSharedSchemesAutomaticallyEnabled</key>
	<true/>
</dict>
</plist>
"#;

/// The bundle directory for a project
pub fn bundle_dir(output_root: &Path, project_name: &str) -> PathBuf {
    output_root.join(format!("{project_name}.xcodeproj"))
}

/// Workspace membership pointer and per-user workspace settings
pub fn bundle_files(project_name: &str, user_name: &str, output_root: &Path) -> Vec<(PathBuf, String)> {
    let workspace = bundle_dir(output_root, project_name).join("project.xcworkspace");
    vec![
        (
            workspace.join("contents.xcworkspacedata"),
            WORKSPACE_CONTENTS.to_string(),
        ),
        (
            workspace
                .join("xcuserdata")
                .join(format!("{user_name}.xcuserdatad"))
                .join("WorkspaceSettings.xcsettings"),
            WORKSPACE_SETTINGS.to_string(),
        ),
    ]
}
