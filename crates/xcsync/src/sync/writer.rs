//! File Writer
//!
//! Every file write is published as a job to a per-path worker task. Jobs for
//! the same path run one after another; different paths are written
//! concurrently and in no particular order. Each write replaces the whole
//! file through a temporary sibling and a rename.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::encoding::TextEncoding;

/// Error type for file writes
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Failed to write {path} after {attempts} attempt(s): {source}")]
    Io {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}

/// What happened to a published write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// New content was written
    Written,
    /// The file already held exactly these bytes
    Unchanged,
    /// The worker stopped before handling the job
    Abandoned,
}

enum WriteContent {
    /// Text re-encoded in the existing file's encoding
    Text(String),
    /// Raw bytes copied as-is
    Bytes(Vec<u8>),
}

struct WriteJob {
    path: PathBuf,
    content: WriteContent,
    reply: oneshot::Sender<Result<WriteOutcome, WriteError>>,
}

/// A write that has been handed to its worker
pub struct PendingWrite {
    path: PathBuf,
    reply: oneshot::Receiver<Result<WriteOutcome, WriteError>>,
}

impl PendingWrite {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the worker to finish the job
    pub async fn wait(self) -> Result<WriteOutcome, WriteError> {
        self.reply.await.unwrap_or(Ok(WriteOutcome::Abandoned))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Write Ledger
// ─────────────────────────────────────────────────────────────────────────────

/// Digests of the last content written to each path
///
/// Lets the change monitor recognise notifications caused by our own writes.
#[derive(Debug, Default)]
pub struct WriteLedger {
    digests: DashMap<PathBuf, String>,
}

impl WriteLedger {
    pub fn digest(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    pub fn record(&self, path: &Path, bytes: &[u8]) {
        self.digests.insert(path.to_path_buf(), Self::digest(bytes));
    }

    /// Whether `bytes` are what we last wrote to `path`
    pub fn is_echo(&self, path: &Path, bytes: &[u8]) -> bool {
        self.digests
            .get(path)
            .is_some_and(|digest| *digest == Self::digest(bytes))
    }

    /// Whether the file on disk still holds what we last wrote
    pub async fn is_echo_on_disk(&self, path: &Path) -> bool {
        if !self.digests.contains_key(path) {
            return false;
        }
        match fs::read(path).await {
            Ok(bytes) => self.is_echo(path, &bytes),
            Err(_) => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Writer
// ─────────────────────────────────────────────────────────────────────────────

struct WriterInner {
    topics: DashMap<PathBuf, mpsc::UnboundedSender<WriteJob>>,
    ledger: Arc<WriteLedger>,
    retries: u32,
    cancel: CancellationToken,
}

/// Cloneable handle publishing writes to per-path workers
#[derive(Clone)]
pub struct FileWriter {
    inner: Arc<WriterInner>,
}

impl FileWriter {
    /// Create a writer; failed writes are retried `retries` times
    pub fn new(retries: u32, cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(WriterInner {
                topics: DashMap::new(),
                ledger: Arc::new(WriteLedger::default()),
                retries,
                cancel,
            }),
        }
    }

    pub fn ledger(&self) -> Arc<WriteLedger> {
        Arc::clone(&self.inner.ledger)
    }

    /// Publish text, keeping the encoding of an existing file
    pub fn publish_text(&self, path: impl Into<PathBuf>, text: impl Into<String>) -> PendingWrite {
        self.publish(path.into(), WriteContent::Text(text.into()))
    }

    /// Publish raw bytes
    pub fn publish_bytes(&self, path: impl Into<PathBuf>, bytes: Vec<u8>) -> PendingWrite {
        self.publish(path.into(), WriteContent::Bytes(bytes))
    }

    fn publish(&self, path: PathBuf, content: WriteContent) -> PendingWrite {
        let (reply, reply_rx) = oneshot::channel();
        let job = WriteJob {
            path: path.clone(),
            content,
            reply,
        };

        let sender = self
            .inner
            .topics
            .entry(path.clone())
            .or_insert_with(|| self.spawn_worker(path.clone()))
            .clone();
        if sender.send(job).is_err() {
            debug!("Writer for {} has stopped; write abandoned", path.display());
        }

        PendingWrite {
            path,
            reply: reply_rx,
        }
    }

    fn spawn_worker(&self, path: PathBuf) -> mpsc::UnboundedSender<WriteJob> {
        let (tx, rx) = mpsc::unbounded_channel();
        let ledger = Arc::clone(&self.inner.ledger);
        let retries = self.inner.retries;
        let cancel = self.inner.cancel.clone();
        tokio::spawn(run_worker(path, rx, ledger, retries, cancel));
        tx
    }
}

async fn run_worker(
    path: PathBuf,
    mut rx: mpsc::UnboundedReceiver<WriteJob>,
    ledger: Arc<WriteLedger>,
    retries: u32,
    cancel: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        let result = write_with_retries(&job.path, &job.content, &ledger, retries).await;
        let _ = job.reply.send(result);
    }
    debug!("Writer for {} stopped", path.display());
}

async fn write_with_retries(
    path: &Path,
    content: &WriteContent,
    ledger: &WriteLedger,
    retries: u32,
) -> Result<WriteOutcome, WriteError> {
    let attempts = retries + 1;
    let mut attempt = 1;
    loop {
        match write_once(path, content, ledger).await {
            Ok(outcome) => return Ok(outcome),
            Err(source) if attempt >= attempts => {
                error!("Giving up on {} after {} attempt(s): {}", path.display(), attempt, source);
                return Err(WriteError::Io {
                    path: path.to_path_buf(),
                    attempts: attempt,
                    source,
                });
            }
            Err(e) => {
                warn!("Write to {} failed (attempt {}): {}", path.display(), attempt, e);
                attempt += 1;
            }
        }
    }
}

async fn write_once(
    path: &Path,
    content: &WriteContent,
    ledger: &WriteLedger,
) -> std::io::Result<WriteOutcome> {
    let existing = match fs::read(path).await {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    let bytes = match content {
        WriteContent::Text(text) => existing
            .as_deref()
            .map(TextEncoding::detect)
            .unwrap_or_default()
            .encode(text),
        WriteContent::Bytes(bytes) => bytes.clone(),
    };

    if existing.as_deref() == Some(bytes.as_slice()) {
        ledger.record(path, &bytes);
        return Ok(WriteOutcome::Unchanged);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.xcsync-tmp"));
    fs::write(&temp, &bytes).await?;
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e);
    }
    ledger.record(path, &bytes);

    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(WriteOutcome::Written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("View.h");
        let writer = FileWriter::new(1, CancellationToken::new());

        let first = writer.publish_text(&path, "@interface View\n@end\n").wait().await;
        assert_eq!(first.unwrap(), WriteOutcome::Written);
        let second = writer.publish_text(&path, "@interface View\n@end\n").wait().await;
        assert_eq!(second.unwrap(), WriteOutcome::Unchanged);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "@interface View\n@end\n");
        assert!(writer.ledger().is_echo_on_disk(&path).await);
    }

    #[tokio::test]
    async fn test_same_path_writes_are_serialized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Counter.txt");
        let writer = FileWriter::new(0, CancellationToken::new());

        let pending: Vec<_> = (0..20)
            .map(|i| writer.publish_text(&path, format!("{i}")))
            .collect();
        for result in join_all(pending.into_iter().map(PendingWrite::wait)).await {
            assert!(result.is_ok());
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "19");
    }

    #[tokio::test]
    async fn test_preserves_existing_encoding() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("View.designer.cs");
        std::fs::write(&path, TextEncoding::Utf16Le.encode("old")).unwrap();

        let writer = FileWriter::new(0, CancellationToken::new());
        writer.publish_text(&path, "new").wait().await.unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(TextEncoding::decode(&bytes), (TextEncoding::Utf16Le, "new".to_string()));
    }

    #[tokio::test]
    async fn test_persistent_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("child.h");

        let writer = FileWriter::new(1, CancellationToken::new());
        match writer.publish_text(&path, "x").wait().await {
            Err(WriteError::Io { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected write error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_write_is_not_recorded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("View.h");
        // The temp file cannot be created over a directory
        std::fs::create_dir(dir.path().join(".View.h.xcsync-tmp")).unwrap();

        let writer = FileWriter::new(0, CancellationToken::new());
        assert!(writer.publish_text(&path, "x").wait().await.is_err());
        assert!(!writer.ledger().is_echo(&path, b"x"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_cancelled_writer_abandons_jobs() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let writer = FileWriter::new(0, cancel.clone());
        cancel.cancel();

        let outcome = writer
            .publish_text(dir.path().join("late.h"), "x")
            .wait()
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Abandoned);
        assert!(!dir.path().join("late.h").exists());
    }

    #[test]
    fn test_ledger_echo() {
        let ledger = WriteLedger::default();
        let path = Path::new("/tmp/a.h");
        assert!(!ledger.is_echo(path, b"one"));
        ledger.record(path, b"one");
        assert!(ledger.is_echo(path, b"one"));
        assert!(!ledger.is_echo(path, b"two"));
    }
}
