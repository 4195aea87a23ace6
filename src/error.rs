//! Error types shared by capture, detection, input and collection.

use thiserror::Error;

use crate::capture::{Region, WindowRect};

/// Errors raised by the collector and the primitives it drives.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("no window found for process '{0}'. Is the game running?")]
    WindowNotFound(String),

    #[error("game window was closed or became invalid")]
    WindowLost,

    #[error("region {region} lies outside the {rect} window")]
    RegionOutOfBounds { region: Region, rect: WindowRect },

    #[error("detection failed: {0}")]
    Detection(String),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("stage incomplete: {0}")]
    StageIncomplete(String),

    #[error("group number {number} is outside 1..={max}")]
    InvalidGroupNumber { number: u32, max: u32 },

    #[error("stage {0} is not collected by this format")]
    InvalidStage(String),

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("recording backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("recording backend error: {0}")]
    Recording(String),

    #[error("unknown template key '{0}'")]
    UnknownTemplate(String),

    #[error("clipboard error: {0}")]
    Clipboard(String),

    #[error("platform call failed: {0}")]
    Platform(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl CollectorError {
    /// Structural errors end the whole run instead of skipping a node.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            CollectorError::WindowNotFound(_)
                | CollectorError::WindowLost
                | CollectorError::InvalidGroupNumber { .. }
                | CollectorError::InvalidStage(_)
        )
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for CollectorError {
    fn from(e: windows::core::Error) -> Self {
        CollectorError::Platform(e.to_string())
    }
}

pub type Result<T, E = CollectorError> = std::result::Result<T, E>;
