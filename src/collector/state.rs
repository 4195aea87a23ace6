//! Collector state machine states and cooperative cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared interrupt flag. The hotkey thread sets it; the collector checks it
/// before each atomic step and stops at the next boundary.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Collector state machine states.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectorState {
    /// Nothing started yet
    Idle,
    /// Navigating to the current node's entry screen
    LocateEntry,
    /// Back on the list/bracket screen between nodes
    AtGroupList,
    /// Inside a group (or match) detail screen
    AtGroupDetail,
    /// A round tab of a lineup is open
    AtRoundDetail,
    /// Character slots of a round are being captured
    AtCharacterOverlay,
    /// Current node finalized and handed to the sink
    Recorded,
    /// Closing overlays after an ambiguous screen before retrying
    Recovering,
    /// Every node processed
    Done,
    /// Operator interrupt
    Interrupted,
    /// Structural failure ended the run
    Aborted(String),
}

impl CollectorState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CollectorState::Done | CollectorState::Interrupted | CollectorState::Aborted(_)
        )
    }
}

impl fmt::Display for CollectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorState::Idle => write!(f, "Idle"),
            CollectorState::LocateEntry => write!(f, "Locating entry"),
            CollectorState::AtGroupList => write!(f, "At group list"),
            CollectorState::AtGroupDetail => write!(f, "At group detail"),
            CollectorState::AtRoundDetail => write!(f, "At round detail"),
            CollectorState::AtCharacterOverlay => write!(f, "At character overlay"),
            CollectorState::Recorded => write!(f, "Recorded"),
            CollectorState::Recovering => write!(f, "Recovering"),
            CollectorState::Done => write!(f, "Done"),
            CollectorState::Interrupted => write!(f, "Interrupted"),
            CollectorState::Aborted(reason) => write!(f, "Aborted: {}", reason),
        }
    }
}
