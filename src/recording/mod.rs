//! Screen recording of a collection run.
//!
//! A `RecordingSession` owns one backend connection and tracks whether a
//! recording is in progress. Recording is evidence only; callers log
//! failures and keep collecting.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{CollectorError, Result};

pub mod ffmpeg;
pub mod obs;

pub use ffmpeg::FfmpegBackend;
pub use obs::ObsBackend;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording(PathBuf),
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "Idle"),
            RecordingState::Recording(path) => write!(f, "Recording to {}", path.display()),
        }
    }
}

/// An external recorder the session drives.
pub trait RecordingBackend {
    fn name(&self) -> &'static str;

    /// Establishes the connection. Failures map to `BackendUnavailable`.
    fn connect(&mut self) -> Result<()>;

    /// Starts recording into `output_dir/filename`.
    ///
    /// Returns the target path, or `None` when the backend refused to start.
    fn start(&mut self, output_dir: &Path, filename: &str) -> Result<Option<PathBuf>>;

    /// Stops recording and returns the finished file when the backend knows it.
    fn stop(&mut self) -> Result<Option<PathBuf>>;
}

pub struct RecordingSession<B: RecordingBackend> {
    backend: B,
    connected: bool,
    state: RecordingState,
}

impl<B: RecordingBackend> RecordingSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            connected: false,
            state: RecordingState::Idle,
        }
    }

    pub fn state(&self) -> &RecordingState {
        &self.state
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecordingState::Recording(_))
    }

    pub fn output_path(&self) -> Option<&Path> {
        match &self.state {
            RecordingState::Recording(path) => Some(path),
            RecordingState::Idle => None,
        }
    }

    /// Starts a recording. Connects on first use; a failed connection is
    /// reported and not retried until the next `start`.
    pub fn start(&mut self, output_dir: &Path, filename: &str) -> Result<bool> {
        if self.is_recording() {
            return Err(CollectorError::AlreadyRecording);
        }

        if !self.connected {
            self.backend.connect().map_err(|e| match e {
                CollectorError::BackendUnavailable(_) => e,
                other => CollectorError::BackendUnavailable(other.to_string()),
            })?;
            self.connected = true;
            info!("Connected to {} recording backend", self.backend.name());
        }

        match self.backend.start(output_dir, filename) {
            Ok(Some(path)) => {
                info!("Recording started: {}", path.display());
                self.state = RecordingState::Recording(path);
                Ok(true)
            }
            Ok(None) => {
                warn!("{} refused to start recording", self.backend.name());
                Ok(false)
            }
            Err(e) => {
                // Force a reconnect next time
                self.connected = false;
                Err(e)
            }
        }
    }

    /// Stops the current recording. Does nothing when idle.
    pub fn stop(&mut self) {
        let RecordingState::Recording(target) = std::mem::replace(&mut self.state, RecordingState::Idle)
        else {
            return;
        };

        match self.backend.stop() {
            Ok(Some(path)) => info!("Recording saved: {}", path.display()),
            Ok(None) => info!("Recording stopped: {}", target.display()),
            Err(e) => {
                warn!("Failed to stop {} recording: {}", self.backend.name(), e);
                self.connected = false;
            }
        }
    }
}

impl<B: RecordingBackend> Drop for RecordingSession<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Either configured backend behind one type, so the binary can pick at runtime.
pub enum AnyBackend {
    Obs(ObsBackend),
    Ffmpeg(FfmpegBackend),
}

impl RecordingBackend for AnyBackend {
    fn name(&self) -> &'static str {
        match self {
            AnyBackend::Obs(b) => b.name(),
            AnyBackend::Ffmpeg(b) => b.name(),
        }
    }

    fn connect(&mut self) -> Result<()> {
        match self {
            AnyBackend::Obs(b) => b.connect(),
            AnyBackend::Ffmpeg(b) => b.connect(),
        }
    }

    fn start(&mut self, output_dir: &Path, filename: &str) -> Result<Option<PathBuf>> {
        match self {
            AnyBackend::Obs(b) => b.start(output_dir, filename),
            AnyBackend::Ffmpeg(b) => b.start(output_dir, filename),
        }
    }

    fn stop(&mut self) -> Result<Option<PathBuf>> {
        match self {
            AnyBackend::Obs(b) => b.stop(),
            AnyBackend::Ffmpeg(b) => b.stop(),
        }
    }
}
