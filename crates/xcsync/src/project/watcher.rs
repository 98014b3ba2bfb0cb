//! Project File Watcher
//!
//! Watches a project tree for changes and forwards the relevant ones to the
//! continuous sync loop.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use wildmatch::WildMatch;

/// Which project tree a notification came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectSide {
    Managed,
    Native,
}

impl std::fmt::Display for ProjectSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectSide::Managed => write!(f, "managed"),
            ProjectSide::Native => write!(f, "native"),
        }
    }
}

/// What happened to a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// Created, modified or removed
    Changed,
    /// Renamed from another path
    Renamed { from: PathBuf },
    /// The watcher reported an error
    Error(String),
}

/// A filtered file-system notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub side: ProjectSide,
    pub kind: ChangeKind,
    pub path: PathBuf,
}

// ─────────────────────────────────────────────────────────────────────────────
// Change Filter
// ─────────────────────────────────────────────────────────────────────────────

/// Extension and ignore-pattern filter for one project tree
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    extensions: BTreeSet<String>,
    ignore: Vec<WildMatch>,
}

impl ChangeFilter {
    /// Create a filter from relevant extensions and ignore globs
    pub fn new(extensions: &BTreeSet<String>, ignore: &[String]) -> Self {
        Self {
            extensions: extensions.clone(),
            ignore: ignore.iter().map(|p| WildMatch::new(p)).collect(),
        }
    }

    /// Whether a path under `root` is relevant
    ///
    /// Ignore patterns are matched against the path relative to the root,
    /// prefixed with `/` so that `*/obj/*` also matches top-level `obj/`.
    pub fn accepts(&self, root: &Path, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return false;
        };
        let rel = format!("/{}", relative.to_string_lossy().replace('\\', "/"));
        if self.ignore.iter().any(|pattern| pattern.matches(&rel)) {
            return false;
        }
        // Files inside a bundle directory (e.g. `.xcassets`) count by the
        // bundle's extension.
        relative.components().any(|component| {
            Path::new(component.as_os_str())
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| self.extensions.contains(ext))
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Change Monitor
// ─────────────────────────────────────────────────────────────────────────────

/// File-system monitor for one project root
pub struct ChangeMonitor {
    /// Watched root
    root: PathBuf,
    /// Which side this monitor covers
    side: ProjectSide,
    /// The underlying watcher (kept alive)
    _watcher: RecommendedWatcher,
}

impl ChangeMonitor {
    /// Start watching `root`, forwarding accepted notifications to `tx`
    ///
    /// Once `cancel` trips, events are no longer forwarded.
    pub fn start(
        root: impl AsRef<Path>,
        side: ProjectSide,
        filter: ChangeFilter,
        tx: mpsc::UnboundedSender<ChangeNotification>,
        cancel: CancellationToken,
    ) -> Result<Self, notify::Error> {
        // Canonicalize the path to get absolute path for reliable comparison
        let root = root
            .as_ref()
            .canonicalize()
            .unwrap_or_else(|_| root.as_ref().to_path_buf());
        let root_clone = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if cancel.is_cancelled() {
                return;
            }
            match res {
                Ok(event) => {
                    for notification in Self::event_to_notifications(&root_clone, side, &filter, &event)
                    {
                        let _ = tx.send(notification);
                    }
                }
                Err(e) => {
                    error!("File watcher error on {} side: {}", side, e);
                    let _ = tx.send(ChangeNotification {
                        side,
                        kind: ChangeKind::Error(e.to_string()),
                        path: root_clone.clone(),
                    });
                }
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        info!("Watching {} project: {}", side, root.display());

        Ok(Self {
            root,
            side,
            _watcher: watcher,
        })
    }

    /// The watched root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The side this monitor covers
    pub fn side(&self) -> ProjectSide {
        self.side
    }

    /// Convert a notify event to filtered notifications
    pub fn event_to_notifications(
        root: &Path,
        side: ProjectSide,
        filter: &ChangeFilter,
        event: &Event,
    ) -> Vec<ChangeNotification> {
        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
                let (from, to) = (&event.paths[0], &event.paths[1]);
                if filter.accepts(root, to) || filter.accepts(root, from) {
                    vec![ChangeNotification {
                        side,
                        kind: ChangeKind::Renamed { from: from.clone() },
                        path: to.clone(),
                    }]
                } else {
                    Vec::new()
                }
            }
            EventKind::Modify(ModifyKind::Metadata(_)) | EventKind::Access(_) => Vec::new(),
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => event
                .paths
                .iter()
                .filter(|path| filter.accepts(root, path))
                .map(|path| ChangeNotification {
                    side,
                    kind: ChangeKind::Changed,
                    path: path.clone(),
                })
                .collect(),
            _ => {
                debug!("Ignoring event kind: {:?}", event.kind);
                Vec::new()
            }
        }
    }
}
