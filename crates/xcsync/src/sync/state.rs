//! Sync State
//!
//! The orchestrator's state machine, stored in an atomic so any clone of the
//! orchestrator can read it without locking.

use std::sync::atomic::{AtomicU8, Ordering};

/// Direction of a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Managed project to native project
    ToNative,
    /// Native project back to the managed project
    FromNative,
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncDirection::ToNative => write!(f, "to-native"),
            SyncDirection::FromNative => write!(f, "from-native"),
        }
    }
}

/// Current state of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SyncState {
    /// No pass running
    Idle = 0,
    /// A ToNative pass is running
    SyncingToNative = 1,
    /// A FromNative pass is running
    SyncingFromNative = 2,
    /// Continuous mode, waiting for changes
    Watching = 3,
    /// Cancellation was requested
    Cancelled = 4,
}

impl SyncState {
    /// Convert from u8
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::SyncingToNative,
            2 => Self::SyncingFromNative,
            3 => Self::Watching,
            _ => Self::Cancelled,
        }
    }

    /// The syncing state for a direction
    pub fn syncing(direction: SyncDirection) -> Self {
        match direction {
            SyncDirection::ToNative => Self::SyncingToNative,
            SyncDirection::FromNative => Self::SyncingFromNative,
        }
    }

    pub fn is_syncing(&self) -> bool {
        matches!(self, Self::SyncingToNative | Self::SyncingFromNative)
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::SyncingToNative => write!(f, "syncing to native"),
            SyncState::SyncingFromNative => write!(f, "syncing from native"),
            SyncState::Watching => write!(f, "watching"),
            SyncState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Atomic cell holding a [`SyncState`]
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl Default for StateCell {
    fn default() -> Self {
        Self(AtomicU8::new(SyncState::Idle as u8))
    }
}

impl StateCell {
    pub fn get(&self) -> SyncState {
        SyncState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: SyncState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Enter a pass, returning the state to restore afterwards
    ///
    /// Passes started from `Watching` return to `Watching`; everything else
    /// returns to `Idle`. A cancelled orchestrator stays cancelled.
    pub fn enter(&self, direction: SyncDirection) -> SyncState {
        let previous = self.get();
        if previous != SyncState::Cancelled {
            self.set(SyncState::syncing(direction));
        }
        match previous {
            SyncState::Watching => SyncState::Watching,
            SyncState::Cancelled => SyncState::Cancelled,
            _ => SyncState::Idle,
        }
    }

    /// Leave a pass, unless cancellation happened meanwhile
    pub fn leave(&self, restore: SyncState) {
        if self.get() != SyncState::Cancelled {
            self.set(restore);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        for state in [
            SyncState::Idle,
            SyncState::SyncingToNative,
            SyncState::SyncingFromNative,
            SyncState::Watching,
            SyncState::Cancelled,
        ] {
            assert_eq!(SyncState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn test_enter_and_leave() {
        let cell = StateCell::default();
        let restore = cell.enter(SyncDirection::ToNative);
        assert_eq!(cell.get(), SyncState::SyncingToNative);
        cell.leave(restore);
        assert_eq!(cell.get(), SyncState::Idle);

        cell.set(SyncState::Watching);
        let restore = cell.enter(SyncDirection::FromNative);
        assert!(cell.get().is_syncing());
        cell.leave(restore);
        assert_eq!(cell.get(), SyncState::Watching);
    }

    #[test]
    fn test_cancel_during_pass_sticks() {
        let cell = StateCell::default();
        let restore = cell.enter(SyncDirection::ToNative);
        cell.set(SyncState::Cancelled);
        cell.leave(restore);
        assert_eq!(cell.get(), SyncState::Cancelled);
    }
}
