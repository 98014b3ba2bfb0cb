//! Synchronization
//!
//! The orchestrator, its two pass directions, the sync state machine and the
//! file-write pipeline.

mod encoding;
mod from_native;
mod orchestrator;
mod state;
mod to_native;
mod writer;

pub use encoding::TextEncoding;
pub use orchestrator::{PassReport, SyncError, SyncOrchestrator};
pub use state::{StateCell, SyncDirection, SyncState};
pub use to_native::NativeProjectBuilder;
pub use writer::{FileWriter, PendingWrite, WriteError, WriteLedger, WriteOutcome};
