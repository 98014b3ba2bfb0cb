//! Sync Orchestrator
//!
//! Drives one-shot ToNative/FromNative passes and the continuous watch loop.
//! Passes are serialized; every file they produce goes through the
//! [`FileWriter`] pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use indexmap::IndexMap;
use tokio::sync::{Mutex, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use xcsync_types::TypeRegistry;

use super::from_native::FromNativePass;
use super::state::{StateCell, SyncDirection, SyncState};
use super::to_native::ToNativePass;
use super::writer::{FileWriter, PendingWrite, WriteError, WriteLedger, WriteOutcome};
use crate::managed::{CompilerFrontEnd, ReaderError, SourceScanner};
use crate::native::{NativeDeclarationParser, ParseOptions};
use crate::pbx::ProjectError;
use crate::project::{
    ChangeFilter, ChangeKind, ChangeMonitor, ChangeNotification, LoadError, ProjectSide,
    SyncConfig,
};

/// Error type for a sync pass
///
/// Any of these aborts the pass it occurred in, never the process.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("Failed to start file monitor: {0}")]
    Watch(#[from] notify::Error),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Pass Report
// ─────────────────────────────────────────────────────────────────────────────

/// Summary of one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub direction: SyncDirection,
    /// Types whose files were generated or written back
    pub types_generated: usize,
    /// Types skipped after a recoverable failure or identity conflict
    pub types_skipped: usize,
    pub files_written: usize,
    pub files_unchanged: usize,
    pub files_abandoned: usize,
    /// The pass did not run because cancellation was requested
    pub cancelled: bool,
}

impl PassReport {
    pub fn new(direction: SyncDirection) -> Self {
        Self {
            direction,
            types_generated: 0,
            types_skipped: 0,
            files_written: 0,
            files_unchanged: 0,
            files_abandoned: 0,
            cancelled: false,
        }
    }

    fn cancelled(direction: SyncDirection) -> Self {
        Self {
            cancelled: true,
            ..Self::new(direction)
        }
    }

    /// Wait for published writes and tally their outcomes
    ///
    /// Every write is awaited; the first failure is returned afterwards.
    pub(crate) async fn settle(&mut self, pending: Vec<PendingWrite>) -> Result<(), WriteError> {
        let mut failure = None;
        for result in join_all(pending.into_iter().map(PendingWrite::wait)).await {
            match result {
                Ok(WriteOutcome::Written) => self.files_written += 1,
                Ok(WriteOutcome::Unchanged) => self.files_unchanged += 1,
                Ok(WriteOutcome::Abandoned) => self.files_abandoned += 1,
                Err(e) => {
                    error!("{}", e);
                    failure.get_or_insert(e);
                }
            }
        }
        failure.map_or(Ok(()), Err)
    }
}

impl std::fmt::Display for PassReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cancelled {
            return write!(f, "{}: cancelled", self.direction);
        }
        write!(
            f,
            "{}: {} type(s) synced, {} skipped; {} file(s) written, {} unchanged",
            self.direction,
            self.types_generated,
            self.types_skipped,
            self.files_written,
            self.files_unchanged
        )?;
        if self.files_abandoned > 0 {
            write!(f, ", {} abandoned", self.files_abandoned)?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Coordinates sync passes between a managed and a native project
pub struct SyncOrchestrator {
    config: Arc<SyncConfig>,
    registry: Arc<TypeRegistry>,
    front_end: Arc<dyn CompilerFrontEnd>,
    parser: NativeDeclarationParser,
    writer: FileWriter,
    state: StateCell,
    cancel: CancellationToken,
    /// Held for the duration of a pass
    pass_lock: Mutex<()>,
}

impl SyncOrchestrator {
    /// Create an orchestrator using the built-in C# front-end
    pub fn new(config: SyncConfig, cancel: CancellationToken) -> Self {
        let parser = NativeDeclarationParser::new(ParseOptions::for_platform(
            config.platform.platform,
            config.sdk_root.clone(),
        ));
        Self {
            registry: TypeRegistry::new_shared(config.platform.root_type.clone()),
            front_end: Arc::new(SourceScanner),
            parser,
            writer: FileWriter::new(config.write_retries, cancel.clone()),
            state: StateCell::default(),
            config: Arc::new(config),
            cancel,
            pass_lock: Mutex::new(()),
        }
    }

    /// Use a different managed compiler front-end
    pub fn with_front_end(mut self, front_end: Arc<dyn CompilerFrontEnd>) -> Self {
        self.front_end = front_end;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn state(&self) -> SyncState {
        self.state.get()
    }

    pub fn ledger(&self) -> Arc<WriteLedger> {
        self.writer.ledger()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run one pass in the given direction
    pub async fn sync(&self, direction: SyncDirection) -> Result<PassReport, SyncError> {
        match direction {
            SyncDirection::ToNative => self.to_native().await,
            SyncDirection::FromNative => self.from_native(None).await,
        }
    }

    /// Regenerate the native project from the managed project
    pub async fn to_native(&self) -> Result<PassReport, SyncError> {
        let _pass = self.pass_lock.lock().await;
        if self.cancel.is_cancelled() {
            self.state.set(SyncState::Cancelled);
            return Ok(PassReport::cancelled(SyncDirection::ToNative));
        }

        let restore = self.state.enter(SyncDirection::ToNative);
        let result = ToNativePass {
            config: &self.config,
            registry: &self.registry,
            front_end: self.front_end.as_ref(),
            writer: &self.writer,
        }
        .run()
        .await;
        self.leave_pass(restore);

        Self::log_result(&result);
        result
    }

    /// Fold native header changes back into the managed designer files
    ///
    /// `headers` limits the pass to specific files; `None` parses every header
    /// under the native root. The registry is populated from the managed
    /// project first when it is empty.
    pub async fn from_native(&self, headers: Option<Vec<PathBuf>>) -> Result<PassReport, SyncError> {
        let _pass = self.pass_lock.lock().await;
        if self.cancel.is_cancelled() {
            self.state.set(SyncState::Cancelled);
            return Ok(PassReport::cancelled(SyncDirection::FromNative));
        }

        let restore = self.state.enter(SyncDirection::FromNative);
        let result = async {
            let mut skipped = PassReport::new(SyncDirection::FromNative);
            if self.registry.is_empty() {
                super::to_native::populate_registry(
                    &self.config,
                    &self.registry,
                    self.front_end.as_ref(),
                    &mut skipped,
                )
                .await?;
            }
            let mut report = FromNativePass {
                config: &self.config,
                registry: &self.registry,
                parser: &self.parser,
                writer: &self.writer,
            }
            .run(headers)
            .await?;
            report.types_skipped += skipped.types_skipped;
            Ok(report)
        }
        .await;
        self.leave_pass(restore);

        Self::log_result(&result);
        result
    }

    /// Leave a pass, moving to `Cancelled` if the token tripped meanwhile
    fn leave_pass(&self, restore: SyncState) {
        if self.cancel.is_cancelled() {
            self.state.set(SyncState::Cancelled);
        } else {
            self.state.leave(restore);
        }
    }

    fn log_result(result: &Result<PassReport, SyncError>) {
        match result {
            Ok(report) => info!("{}", report),
            Err(e) => error!("Sync pass aborted: {}", e),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Continuous Mode
    // ─────────────────────────────────────────────────────────────────────────

    /// Run a full ToNative pass, then re-sync on file changes until cancelled
    pub async fn watch(&self) -> Result<(), SyncError> {
        self.to_native().await?;
        if self.cancel.is_cancelled() {
            info!("Cancellation requested; remaining jobs completing");
            return Ok(());
        }

        let config = &self.config;
        tokio::fs::create_dir_all(&config.native_root)
            .await
            .map_err(|source| SyncError::Io {
                path: config.native_root.clone(),
                source,
            })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let managed = ChangeMonitor::start(
            &config.managed_root,
            ProjectSide::Managed,
            ChangeFilter::new(&config.managed_extensions, &config.ignore),
            tx.clone(),
            self.cancel.clone(),
        )?;
        let native = ChangeMonitor::start(
            &config.native_root,
            ProjectSide::Native,
            ChangeFilter::new(&config.native_extensions, &config.ignore),
            tx,
            self.cancel.clone(),
        )?;
        let roots = WatchRoots {
            managed: managed.root().to_path_buf(),
            native: native.root().to_path_buf(),
        };

        self.state.set(SyncState::Watching);
        let mut tick = tokio::time::interval(config.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut batch: IndexMap<PathBuf, ChangeNotification> = IndexMap::new();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                notification = rx.recv() => match notification {
                    Some(ChangeNotification { kind: ChangeKind::Error(message), side, .. }) => {
                        warn!("{} monitor error: {}", side, message);
                    }
                    Some(notification) => {
                        batch.insert(notification.path.clone(), notification);
                    }
                    None => break,
                },
                _ = tick.tick() => {
                    if !batch.is_empty() {
                        self.process_batch(&roots, std::mem::take(&mut batch)).await;
                    }
                }
            }
        }

        self.state.set(SyncState::Cancelled);
        info!("Cancellation requested; remaining jobs completing");
        Ok(())
    }

    /// Re-sync after a batch of changes, one notification per path
    async fn process_batch(&self, roots: &WatchRoots, batch: IndexMap<PathBuf, ChangeNotification>) {
        let ledger = self.writer.ledger();
        let mut managed_changed = false;
        let mut headers = Vec::new();
        let mut resources = Vec::new();

        for (path, notification) in batch {
            if ledger.is_echo_on_disk(&path).await {
                debug!("Ignoring our own write to {}", path.display());
                continue;
            }
            if let ChangeKind::Renamed { from } = &notification.kind {
                debug!("{} renamed to {}", from.display(), path.display());
            }
            match notification.side {
                ProjectSide::Managed => managed_changed = true,
                ProjectSide::Native => match path.extension().and_then(|e| e.to_str()) {
                    Some("h") => {
                        if path.exists() {
                            headers.push(path);
                        }
                    }
                    Some("m") => debug!("Ignoring implementation change {}", path.display()),
                    _ => resources.push(path),
                },
            }
        }

        if !headers.is_empty() {
            let _ = self.from_native(Some(headers)).await;
        }
        for path in resources {
            if let Err(e) = self.copy_back(roots, &path).await {
                error!("{}", e);
            }
        }
        if managed_changed {
            let _ = self.to_native().await;
        }
    }

    /// Copy a native-side resource change to its managed counterpart
    async fn copy_back(&self, roots: &WatchRoots, path: &Path) -> Result<(), SyncError> {
        let Ok(relative) = path.strip_prefix(&roots.native) else {
            return Ok(());
        };
        if relative
            .components()
            .any(|c| c.as_os_str().to_string_lossy().ends_with(".xcodeproj"))
        {
            return Ok(());
        }
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(SyncError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let target = roots.managed.join(relative);
        info!("Copying {} back to {}", relative.display(), target.display());
        self.writer.publish_bytes(target, bytes).wait().await?;
        Ok(())
    }
}

/// Canonical roots reported by the change monitors
struct WatchRoots {
    managed: PathBuf,
    native: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::TargetPlatform;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_report_display() {
        let mut report = PassReport::new(SyncDirection::ToNative);
        report.types_generated = 2;
        report.files_written = 5;
        report.files_unchanged = 1;
        assert_eq!(
            report.to_string(),
            "to-native: 2 type(s) synced, 0 skipped; 5 file(s) written, 1 unchanged"
        );
        report.files_abandoned = 1;
        assert!(report.to_string().ends_with(", 1 abandoned"));
        assert_eq!(
            PassReport::cancelled(SyncDirection::FromNative).to_string(),
            "from-native: cancelled"
        );
    }

    #[tokio::test]
    async fn test_missing_project_file_aborts_pass() {
        let dir = TempDir::new().unwrap();
        let orchestrator = SyncOrchestrator::new(
            SyncConfig::new(dir.path(), TargetPlatform::MacOs),
            CancellationToken::new(),
        );
        let result = orchestrator.to_native().await;
        assert!(matches!(result, Err(SyncError::Load(LoadError::ProjectFileNotFound(_)))));
        assert_eq!(orchestrator.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_cancelled_before_pass() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let orchestrator =
            SyncOrchestrator::new(SyncConfig::new(dir.path(), TargetPlatform::MacOs), cancel.clone());
        assert_eq!(orchestrator.state(), SyncState::Idle);
        cancel.cancel();

        let report = orchestrator.to_native().await.unwrap();
        assert!(report.cancelled);
        assert_eq!(orchestrator.state(), SyncState::Cancelled);

        let report = orchestrator.from_native(None).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.files_written, 0);
        assert_eq!(orchestrator.state(), SyncState::Cancelled);
    }

    #[tokio::test]
    async fn test_watch_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("App.csproj"), "<Project/>").unwrap();
        let cancel = CancellationToken::new();
        let config = SyncConfig::new(dir.path(), TargetPlatform::MacOs)
            .with_poll_interval(Duration::from_millis(20));
        let orchestrator = Arc::new(SyncOrchestrator::new(config, cancel.clone()));

        let handle = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.watch().await }
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(orchestrator.state(), SyncState::Cancelled);
    }
}
