//! End-to-end sync passes over a temporary managed project.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use xcsync::pbx::NativeProject;
use xcsync::project::{SyncConfig, TargetPlatform};
use xcsync::sync::{SyncOrchestrator, SyncState};
use xcsync::xcsync_types::TypeChange;

const PROJECT: &str = "<Project Sdk=\"Microsoft.NET.Sdk\">
  <PropertyGroup>
    <TargetFramework>net8.0-macos</TargetFramework>
    <SupportedOSPlatformVersion>11.0</SupportedOSPlatformVersion>
  </PropertyGroup>
</Project>
";

const USER_FILE: &str = "using System;
using AppKit;
using Foundation;

namespace Sample
{
    public partial class ViewController : NSViewController
    {
        public ViewController (IntPtr handle) : base (handle)
        {
        }

        partial void UploadButton (NSObject sender)
        {
            FileLabel.StringValue = \"Uploading\";
        }
    }
}
";

const DESIGNER_FILE: &str = "using Foundation;
using System.CodeDom.Compiler;

namespace Sample
{
\t[Register (\"ViewController\")]
\tpartial class ViewController
\t{
\t\t[Outlet]
\t\tAppKit.NSTextField FileLabel { get; set; }

\t\t[Action (\"UploadButton:\")]
\t\tpartial void UploadButton (Foundation.NSObject sender);
\t}
}
";

const APP_DELEGATE: &str = "using AppKit;
using Foundation;

namespace Sample
{
    [Register (\"AppDelegate\")]
    public class AppDelegate : NSObject
    {
    }

    [Register (\"Settings\")]
    [Model]
    public class Settings : NSObject
    {
    }
}
";

const OTHER_FILE: &str = "using Foundation;

namespace Sample
{
    [Register (\"Other\")]
    public class Other : NSObject
    {
    }
}
";

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("App");
        std::fs::create_dir_all(root.join("Assets.xcassets")).unwrap();
        std::fs::write(root.join("App.csproj"), PROJECT).unwrap();
        std::fs::write(root.join("ViewController.cs"), USER_FILE).unwrap();
        std::fs::write(root.join("ViewController.designer.cs"), DESIGNER_FILE).unwrap();
        std::fs::write(root.join("AppDelegate.cs"), APP_DELEGATE).unwrap();
        std::fs::write(root.join("Info.plist"), "<plist version=\"1.0\"><dict/></plist>\n").unwrap();
        std::fs::write(root.join("Main.storyboard"), "<document/>\n").unwrap();
        std::fs::write(root.join("Assets.xcassets").join("Contents.json"), "{}\n").unwrap();
        Self { _dir: dir, root }
    }

    fn config(&self) -> SyncConfig {
        SyncConfig::new(&self.root, TargetPlatform::MacOs)
    }

    fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(self.config(), CancellationToken::new())
    }

    fn native(&self, relative: &str) -> PathBuf {
        self.config().native_root.join(relative)
    }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

/// Poll `check` until it holds, failing after a few seconds
async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// Every file under `dir` with its content
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.insert(path.clone(), std::fs::read(&path).unwrap());
            }
        }
    }
    files
}

#[tokio::test]
async fn test_to_native_generates_project() {
    let fixture = Fixture::new();
    let orchestrator = fixture.orchestrator();

    let report = orchestrator.to_native().await.unwrap();
    // The model type still gets native files, just no designer fragment
    assert_eq!(report.types_generated, 3);
    assert_eq!(report.types_skipped, 0);
    assert_eq!(orchestrator.state(), SyncState::Idle);

    let header = std::fs::read_to_string(fixture.native("ViewController.h")).unwrap();
    assert!(header.contains("@interface ViewController : NSViewController {"));
    assert!(header.contains("@property (nonatomic, retain) IBOutlet NSTextField *FileLabel;"));
    assert!(header.contains("- (IBAction)UploadButton:(id)sender;"));

    let implementation = std::fs::read_to_string(fixture.native("ViewController.m")).unwrap();
    assert!(implementation.contains("@synthesize FileLabel = _FileLabel;"));
    assert!(implementation.contains("- (IBAction)UploadButton:(id)sender {\n}"));

    assert!(fixture.native("Info.plist").exists());
    assert!(fixture.native("Assets.xcassets/Contents.json").exists());
    assert!(
        fixture
            .native("App.xcodeproj/project.xcworkspace/contents.xcworkspacedata")
            .exists()
    );

    let text = std::fs::read_to_string(fixture.config().pbxproj_path()).unwrap();
    let project = NativeProject::from_json(&text).unwrap();
    assert_eq!(project.to_json().unwrap(), text);
    assert!(text.contains("\"MACOSX_DEPLOYMENT_TARGET\": \"11.0\""));
    assert!(text.contains("AppKit.framework"));

    let designer =
        std::fs::read_to_string(fixture.root.join("ViewController.designer.cs")).unwrap();
    assert!(designer.starts_with("// WARNING"));
    assert!(designer.contains("void ReleaseDesignerOutlets ()"));

    let registry = orchestrator.registry();
    assert!(registry.get_native("ViewController").is_some());
    assert!(registry.get_native("NSViewController").is_some());
}

#[tokio::test]
async fn test_to_native_twice_changes_nothing() {
    let fixture = Fixture::new();
    let orchestrator = fixture.orchestrator();

    let first = orchestrator.to_native().await.unwrap();
    let native_before = snapshot(&fixture.config().native_root);
    let designer_before = std::fs::read(fixture.root.join("ViewController.designer.cs")).unwrap();

    let second = orchestrator.to_native().await.unwrap();
    assert_eq!(second.files_written, 0);
    assert_eq!(
        second.files_unchanged,
        first.files_written + first.files_unchanged
    );

    assert_eq!(snapshot(&fixture.config().native_root), native_before);
    assert_eq!(
        std::fs::read(fixture.root.join("ViewController.designer.cs")).unwrap(),
        designer_before
    );

    // A fresh orchestrator derives the same tokens
    fixture.orchestrator().to_native().await.unwrap();
    assert_eq!(snapshot(&fixture.config().native_root), native_before);
}

#[tokio::test]
async fn test_from_native_writes_back_designer() {
    let fixture = Fixture::new();
    fixture.orchestrator().to_native().await.unwrap();

    let header_path = fixture.native("ViewController.h");
    let header = std::fs::read_to_string(&header_path).unwrap().replace(
        "\n@end\n",
        "\n@property (nonatomic, retain) IBOutlet NSButton *SendButton;\n\n- (IBAction)refresh:(id)sender;\n\n@end\n",
    );
    std::fs::write(&header_path, header).unwrap();
    std::fs::write(
        fixture.native("Other.h"),
        "@interface Other : NSObject\n@end\n",
    )
    .unwrap();
    std::fs::write(fixture.native("Broken.h"), "@interface Broken : NSObject\n").unwrap();

    // A fresh orchestrator reads the managed project before folding
    let orchestrator = fixture.orchestrator();
    let report = orchestrator.from_native(None).await.unwrap();
    assert_eq!(report.types_generated, 1);
    assert_eq!(report.files_written, 1);

    let designer =
        std::fs::read_to_string(fixture.root.join("ViewController.designer.cs")).unwrap();
    assert!(designer.contains("AppKit.NSTextField FileLabel { get; set; }"));
    assert!(designer.contains("AppKit.NSButton SendButton { get; set; }"));
    assert!(designer.contains("[Action (\"refresh:\")]"));
    assert!(designer.contains("partial void refresh (Foundation.NSObject sender);"));

    let mapping = orchestrator.registry().get_native("ViewController").unwrap();
    assert_eq!(mapping.outlets.len(), 2);
    assert_eq!(mapping.actions.len(), 2);
    assert!(orchestrator.registry().get_native("Other").is_none());

    // Folding the same header again writes nothing
    let again = orchestrator
        .from_native(Some(vec![header_path]))
        .await
        .unwrap();
    assert_eq!(again.files_written, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watch_resyncs_both_sides() {
    let fixture = Fixture::new();
    let config = fixture.config().with_poll_interval(Duration::from_millis(50));
    let native_root = config.native_root.clone();
    let orchestrator = SyncOrchestrator::new(config, CancellationToken::new());

    let designer_path = fixture.root.join("ViewController.designer.cs");
    let header_path = fixture.native("ViewController.h");

    let driver = async {
        eventually("watch mode", || orchestrator.state() == SyncState::Watching).await;
        let mut changes = orchestrator.registry().subscribe();

        // Rapid edits to one header settle on the last content
        let header = read(&header_path);
        let with_outlet = |name: &str| {
            header.replace(
                "\n@end\n",
                &format!("\n@property (nonatomic, retain) IBOutlet NSButton *{name};\n\n@end\n"),
            )
        };
        std::fs::write(&header_path, with_outlet("DraftButton")).unwrap();
        std::fs::write(&header_path, with_outlet("SendButton")).unwrap();
        eventually("designer write-back", || read(&designer_path).contains("SendButton")).await;
        assert!(!read(&designer_path).contains("DraftButton"));
        assert!(read(&designer_path).contains("AppKit.NSTextField FileLabel { get; set; }"));

        // Native resource edits are copied back to the managed project
        std::fs::write(fixture.native("Main.storyboard"), "<document edited=\"yes\"/>\n").unwrap();
        eventually("resource copy-back", || {
            read(&fixture.root.join("Main.storyboard")).contains("edited")
        })
        .await;

        // The designer and storyboard writes above are our own and must not
        // trigger a managed re-read, which would clear the registry
        tokio::time::sleep(Duration::from_millis(400)).await;
        let mut updates = 0;
        while let Ok(change) = changes.try_recv() {
            assert!(matches!(change, TypeChange::Updated(_)), "unexpected {change:?}");
            updates += 1;
        }
        assert!(updates >= 1);

        // A managed edit regenerates the native side
        std::fs::write(fixture.root.join("Other.cs"), OTHER_FILE).unwrap();
        eventually("native regeneration", || {
            read(&fixture.native("Other.h")).contains("@interface Other : NSObject")
        })
        .await;
        let header = read(&header_path);
        assert!(header.contains("*SendButton;"));

        // Once settled, nothing keeps rewriting files
        eventually("watch mode", || orchestrator.state() == SyncState::Watching).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        let settled = (snapshot(&native_root), read(&designer_path));
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!((snapshot(&native_root), read(&designer_path)), settled);
        assert!(orchestrator.registry().get_native("Other").is_some());

        orchestrator.cancel_token().cancel();
    };

    let (watched, ()) = tokio::join!(orchestrator.watch(), driver);
    watched.unwrap();
    assert_eq!(orchestrator.state(), SyncState::Cancelled);
}
