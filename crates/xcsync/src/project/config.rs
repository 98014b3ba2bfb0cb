//! Sync Configuration
//!
//! The explicit configuration object handed to every component: project roots,
//! target platform tables, watch filters and write policy. Optional settings are
//! read from an `xcsync.toml` file beside the managed project.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the optional configuration file in the managed project root
pub const CONFIG_FILE_NAME: &str = "xcsync.toml";

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unknown target platform: {0}")]
    UnknownPlatform(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Target Platform
// ─────────────────────────────────────────────────────────────────────────────

/// Apple platform the managed project targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TargetPlatform {
    #[value(name = "macos")]
    MacOs,
    #[value(name = "maccatalyst")]
    MacCatalyst,
    #[value(name = "ios")]
    Ios,
    #[value(name = "tvos")]
    TvOs,
}

impl std::str::FromStr for TargetPlatform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "macos" => Ok(TargetPlatform::MacOs),
            "maccatalyst" => Ok(TargetPlatform::MacCatalyst),
            "ios" => Ok(TargetPlatform::Ios),
            "tvos" => Ok(TargetPlatform::TvOs),
            other => Err(ConfigError::UnknownPlatform(other.to_string())),
        }
    }
}

impl std::fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetPlatform::MacOs => write!(f, "macos"),
            TargetPlatform::MacCatalyst => write!(f, "maccatalyst"),
            TargetPlatform::Ios => write!(f, "ios"),
            TargetPlatform::TvOs => write!(f, "tvos"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Platform Table
// ─────────────────────────────────────────────────────────────────────────────

/// A framework type known to the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkType {
    /// Fully qualified managed name (e.g. `AppKit.NSTextField`)
    pub managed: String,
    /// Native class name
    pub native: String,
    /// Fully qualified managed base, `None` only for the root type
    #[serde(default)]
    pub base: Option<String>,
}

impl FrameworkType {
    fn new(managed: &str, native: &str, base: Option<&str>) -> Self {
        Self {
            managed: managed.to_string(),
            native: native.to_string(),
            base: base.map(str::to_string),
        }
    }

    /// The framework (namespace) this type belongs to
    pub fn framework(&self) -> &str {
        self.managed
            .rsplit_once('.')
            .map(|(ns, _)| ns)
            .unwrap_or(&self.managed)
    }
}

/// Static knowledge about one target platform
#[derive(Debug, Clone)]
pub struct PlatformTable {
    pub platform: TargetPlatform,
    /// Common root type every bound class derives from
    pub root_type: String,
    /// Frameworks the native project may link
    pub known_frameworks: BTreeSet<String>,
    /// Frameworks every generated project links
    pub default_frameworks: Vec<String>,
    /// SDK name for the `SDKROOT` build setting
    pub sdk: String,
    /// Build setting holding the deployment target
    pub deployment_target_key: String,
    /// Deployment target used when the project does not specify one
    pub default_os_version: String,
    /// Known framework types by managed name
    types: HashMap<String, FrameworkType>,
}

const FOUNDATION_FRAMEWORKS: &[&str] = &[
    "AVFoundation",
    "CoreAnimation",
    "CoreData",
    "CoreGraphics",
    "CoreImage",
    "CoreLocation",
    "Foundation",
    "MapKit",
    "Metal",
    "MetalKit",
    "QuartzCore",
    "SpriteKit",
    "WebKit",
];

impl PlatformTable {
    /// Build the table for a platform
    pub fn for_platform(platform: TargetPlatform) -> Self {
        let (ui_kit, sdk, key, version) = match platform {
            TargetPlatform::MacOs => ("AppKit", "macosx", "MACOSX_DEPLOYMENT_TARGET", "10.15"),
            TargetPlatform::MacCatalyst => {
                ("UIKit", "iphoneos", "IPHONEOS_DEPLOYMENT_TARGET", "13.1")
            }
            TargetPlatform::Ios => ("UIKit", "iphoneos", "IPHONEOS_DEPLOYMENT_TARGET", "12.2"),
            TargetPlatform::TvOs => ("UIKit", "appletvos", "TVOS_DEPLOYMENT_TARGET", "12.2"),
        };

        let mut known_frameworks: BTreeSet<String> =
            FOUNDATION_FRAMEWORKS.iter().map(|s| s.to_string()).collect();
        known_frameworks.insert(ui_kit.to_string());

        let mut table = Self {
            platform,
            root_type: "Foundation.NSObject".to_string(),
            known_frameworks,
            default_frameworks: vec!["Foundation".to_string(), ui_kit.to_string()],
            sdk: sdk.to_string(),
            deployment_target_key: key.to_string(),
            default_os_version: version.to_string(),
            types: HashMap::new(),
        };

        table.add_type(FrameworkType::new("Foundation.NSObject", "NSObject", None));
        let types: &[(&str, &str, &str)] = if ui_kit == "AppKit" {
            &[
                ("AppKit.NSResponder", "NSResponder", "Foundation.NSObject"),
                ("AppKit.NSView", "NSView", "AppKit.NSResponder"),
                ("AppKit.NSControl", "NSControl", "AppKit.NSView"),
                ("AppKit.NSTextField", "NSTextField", "AppKit.NSControl"),
                ("AppKit.NSButton", "NSButton", "AppKit.NSControl"),
                ("AppKit.NSImageView", "NSImageView", "AppKit.NSControl"),
                ("AppKit.NSSlider", "NSSlider", "AppKit.NSControl"),
                ("AppKit.NSPopUpButton", "NSPopUpButton", "AppKit.NSButton"),
                ("AppKit.NSTableView", "NSTableView", "AppKit.NSControl"),
                ("AppKit.NSOutlineView", "NSOutlineView", "AppKit.NSTableView"),
                ("AppKit.NSScrollView", "NSScrollView", "AppKit.NSView"),
                ("AppKit.NSProgressIndicator", "NSProgressIndicator", "AppKit.NSView"),
                ("AppKit.NSViewController", "NSViewController", "AppKit.NSResponder"),
                ("AppKit.NSWindowController", "NSWindowController", "AppKit.NSResponder"),
                ("AppKit.NSWindow", "NSWindow", "AppKit.NSResponder"),
                ("AppKit.NSMenu", "NSMenu", "Foundation.NSObject"),
                ("AppKit.NSMenuItem", "NSMenuItem", "Foundation.NSObject"),
                ("AppKit.NSApplication", "NSApplication", "AppKit.NSResponder"),
                ("WebKit.WKWebView", "WKWebView", "AppKit.NSView"),
            ]
        } else {
            &[
                ("UIKit.UIResponder", "UIResponder", "Foundation.NSObject"),
                ("UIKit.UIView", "UIView", "UIKit.UIResponder"),
                ("UIKit.UIControl", "UIControl", "UIKit.UIView"),
                ("UIKit.UILabel", "UILabel", "UIKit.UIView"),
                ("UIKit.UIButton", "UIButton", "UIKit.UIControl"),
                ("UIKit.UITextField", "UITextField", "UIKit.UIControl"),
                ("UIKit.UISwitch", "UISwitch", "UIKit.UIControl"),
                ("UIKit.UISlider", "UISlider", "UIKit.UIControl"),
                ("UIKit.UIImageView", "UIImageView", "UIKit.UIView"),
                ("UIKit.UIScrollView", "UIScrollView", "UIKit.UIView"),
                ("UIKit.UITableView", "UITableView", "UIKit.UIScrollView"),
                ("UIKit.UIViewController", "UIViewController", "UIKit.UIResponder"),
                (
                    "UIKit.UITableViewController",
                    "UITableViewController",
                    "UIKit.UIViewController",
                ),
                (
                    "UIKit.UINavigationController",
                    "UINavigationController",
                    "UIKit.UIViewController",
                ),
                ("UIKit.UIWindow", "UIWindow", "UIKit.UIView"),
                ("WebKit.WKWebView", "WKWebView", "UIKit.UIView"),
            ]
        };
        for (managed, native, base) in types {
            table.add_type(FrameworkType::new(managed, native, Some(base)));
        }

        table
    }

    /// Register an additional framework type
    pub fn add_type(&mut self, framework_type: FrameworkType) {
        self.types
            .insert(framework_type.managed.clone(), framework_type);
    }

    /// Look up a framework type by fully qualified managed name
    pub fn framework_type(&self, managed: &str) -> Option<&FrameworkType> {
        self.types.get(managed)
    }

    /// Look up a framework type by native class name
    pub fn framework_type_by_native(&self, native: &str) -> Option<&FrameworkType> {
        self.types.values().find(|t| t.native == native)
    }

    /// Whether a namespace is a linkable framework on this platform
    pub fn is_framework(&self, namespace: &str) -> bool {
        self.known_frameworks.contains(namespace)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config File
// ─────────────────────────────────────────────────────────────────────────────

/// Optional settings read from `xcsync.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub name: Option<String>,
    pub platform: Option<TargetPlatform>,
    pub target: Option<PathBuf>,
    pub poll_interval_ms: Option<u64>,
    pub ignore: Option<Vec<String>>,
    pub sdk_root: Option<PathBuf>,
    pub write_retries: Option<u32>,
    /// Extra framework types (e.g. from third-party bindings)
    pub framework_types: Vec<FrameworkType>,
}

impl ConfigFile {
    /// Load the config file at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `xcsync.toml` from `dir` if present
    pub fn discover(dir: &Path) -> Result<Option<Self>, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            debug!("No {} in {}", CONFIG_FILE_NAME, dir.display());
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sync Config
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration shared by every sync component
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Project name (names the `.xcodeproj` bundle and target)
    pub project_name: String,
    /// Root directory of the managed project
    pub managed_root: PathBuf,
    /// Root directory of the generated native project
    pub native_root: PathBuf,
    /// Platform tables
    pub platform: Arc<PlatformTable>,
    /// Continuous-sync polling tick
    pub poll_interval: Duration,
    /// Glob patterns excluded from watching
    pub ignore: Vec<String>,
    /// Extensions relevant on the managed side
    pub managed_extensions: BTreeSet<String>,
    /// Extensions relevant on the native side
    pub native_extensions: BTreeSet<String>,
    /// User name for per-user workspace data
    pub user_name: String,
    /// SDK root passed to the native front-end
    pub sdk_root: Option<PathBuf>,
    /// Worker-level retries for failed writes
    pub write_retries: u32,
}

fn extension_set(extensions: &[&str]) -> BTreeSet<String> {
    extensions.iter().map(|s| s.to_string()).collect()
}

impl SyncConfig {
    /// Create a configuration with defaults for the given project
    pub fn new(managed_root: impl Into<PathBuf>, platform: TargetPlatform) -> Self {
        let managed_root = managed_root.into();
        let project_name = managed_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Project".to_string());
        let native_root = managed_root.join("obj").join("xcode");

        Self {
            project_name,
            native_root,
            managed_root,
            platform: Arc::new(PlatformTable::for_platform(platform)),
            poll_interval: Duration::from_millis(500),
            ignore: vec!["*/bin/*".into(), "*/obj/*".into(), "*/.*".into()],
            managed_extensions: extension_set(&["cs", "storyboard", "xib", "plist", "xcassets"]),
            native_extensions: extension_set(&["h", "m", "storyboard", "xib", "plist", "xcassets"]),
            user_name: std::env::var("USER").unwrap_or_else(|_| "user".to_string()),
            sdk_root: None,
            write_retries: 1,
        }
    }

    /// Set the native root
    pub fn with_native_root(mut self, native_root: impl Into<PathBuf>) -> Self {
        self.native_root = native_root.into();
        self
    }

    /// Set the project name
    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = name.into();
        self
    }

    /// Set the polling tick
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Apply settings from a config file
    pub fn apply_file(mut self, file: ConfigFile) -> Self {
        if let Some(platform) = file.platform {
            self.platform = Arc::new(PlatformTable::for_platform(platform));
        }
        if !file.framework_types.is_empty() {
            let mut table = (*self.platform).clone();
            for framework_type in file.framework_types {
                table.known_frameworks.insert(framework_type.framework().to_string());
                table.add_type(framework_type);
            }
            self.platform = Arc::new(table);
        }
        if let Some(name) = file.name {
            self.project_name = name;
        }
        if let Some(target) = file.target {
            self.native_root = if target.is_absolute() {
                target
            } else {
                self.managed_root.join(target)
            };
        }
        if let Some(ms) = file.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ignore) = file.ignore {
            self.ignore = ignore;
        }
        if let Some(sdk_root) = file.sdk_root {
            self.sdk_root = Some(sdk_root);
        }
        if let Some(retries) = file.write_retries {
            self.write_retries = retries;
        }
        self
    }

    /// Path of the `.xcodeproj` bundle
    pub fn bundle_path(&self) -> PathBuf {
        self.native_root
            .join(format!("{}.xcodeproj", self.project_name))
    }

    /// Path of the native project file
    pub fn pbxproj_path(&self) -> PathBuf {
        self.bundle_path().join("project.pbxproj")
    }
}
