//! Configuration for the collector.
//!
//! Loads settings from config.json next to the executable (or an explicit
//! path). Every field has a default, so partial files are fine and a missing
//! or broken file falls back to defaults with a log line.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Settle and retry timing for navigation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after every click before the next step (milliseconds)
    pub click_delay_ms: u64,
    /// Random extra wait added to each click delay, 0..=jitter (milliseconds)
    pub click_jitter_ms: u64,
    /// Wait before capturing evidence images after a transition (milliseconds)
    pub settle_delay_ms: u64,
    /// Pause between re-detections while waiting for a screen (milliseconds)
    pub retry_delay_ms: u64,
    /// Detections attempted before a wait gives up
    pub detect_attempts: u32,
    /// Hard cap on any single wait (milliseconds)
    pub max_transition_wait_ms: u64,
    /// Longest a replayed battle may run before its statistics screen shows (milliseconds)
    pub replay_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            click_delay_ms: 1500,
            click_jitter_ms: 1000,
            settle_delay_ms: 300,
            retry_delay_ms: 500,
            detect_attempts: 6,
            max_transition_wait_ms: 10_000,
            replay_timeout_ms: 100_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Retries of a node after an ambiguous screen before it is skipped
    pub attempts: u32,
    /// Best scores at or above this (but under threshold) count as ambiguous
    pub noise_floor: f32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            attempts: 2,
            noise_floor: 0.5,
        }
    }
}

/// Spacing used when lineup images are combined side by side.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineConfig {
    pub horizontal_gap: u32,
    pub boundary_gap: u32,
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            horizontal_gap: 60,
            boundary_gap: 80,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingBackendKind {
    #[default]
    Obs,
    Ffmpeg,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ObsConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub timeout_ms: u64,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4455,
            password: String::new(),
            timeout_ms: 5000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub path: String,
    pub framerate: u32,
    pub preset: String,
    pub bitrate: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            path: "ffmpeg".to_string(),
            framerate: 30,
            preset: "veryfast".to_string(),
            bitrate: "4000k".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Record every run without passing --record
    pub enabled: bool,
    pub backend: RecordingBackendKind,
    pub obs: ObsConfig,
    pub ffmpeg: FfmpegConfig,
}

/// Complete collector configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Executable name of the game client
    #[serde(default = "default_process_name")]
    pub process_name: String,
    /// Resolution the layout coordinates and templates were taken at
    #[serde(default = "default_reference_width")]
    pub reference_width: u32,
    #[serde(default = "default_reference_height")]
    pub reference_height: u32,
    /// Client width the window is resized to with --resize
    #[serde(default = "default_standard_width")]
    pub standard_width: u32,
    #[serde(default)]
    pub resize_on_start: bool,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    /// Rounds collected per lineup
    #[serde(default = "default_rounds")]
    pub rounds: Vec<u8>,
    #[serde(default)]
    pub combine: CombineConfig,
    /// Template manifest, relative to the executable directory
    #[serde(default = "default_template_manifest")]
    pub template_manifest: String,
    /// Output root; `<exe_dir>/output` when unset
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub recording: RecordingConfig,
}

fn default_process_name() -> String {
    "nikke.exe".to_string()
}

fn default_reference_width() -> u32 {
    3580
}

fn default_reference_height() -> u32 {
    2014
}

fn default_standard_width() -> u32 {
    1790
}

fn default_rounds() -> Vec<u8> {
    vec![1, 2, 3, 4, 5]
}

fn default_template_manifest() -> String {
    "resources/templates/manifest.json".to_string()
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            process_name: default_process_name(),
            reference_width: default_reference_width(),
            reference_height: default_reference_height(),
            standard_width: default_standard_width(),
            resize_on_start: false,
            timing: TimingConfig::default(),
            recovery: RecoveryConfig::default(),
            rounds: default_rounds(),
            combine: CombineConfig::default(),
            template_manifest: default_template_manifest(),
            output_dir: None,
            recording: RecordingConfig::default(),
        }
    }
}

impl CollectorConfig {
    pub fn template_manifest_path(&self) -> PathBuf {
        crate::paths::resolve(&self.template_manifest)
    }

    pub fn output_root(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => crate::paths::resolve(dir),
            None => crate::paths::get_output_dir(),
        }
    }
}

/// Loads configuration from `path`, or config.json next to the executable.
pub fn load_config(path: Option<&Path>) -> CollectorConfig {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| crate::paths::get_exe_dir().join("config.json"));

    info!("Looking for config at: {}", config_path.display());

    if !config_path.exists() {
        info!("{} not found. Using default config.", config_path.display());
        return CollectorConfig::default();
    }

    match fs::read_to_string(&config_path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                info!("Config loaded from {}", config_path.display());
                config
            }
            Err(e) => {
                warn!("Failed to parse {}: {}. Using defaults.", config_path.display(), e);
                CollectorConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}. Using defaults.", config_path.display(), e);
            CollectorConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config: CollectorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.process_name, "nikke.exe");
        assert_eq!((config.reference_width, config.reference_height), (3580, 2014));
        assert_eq!(config.rounds, vec![1, 2, 3, 4, 5]);
        assert_eq!(config.recording.obs.port, 4455);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: CollectorConfig = serde_json::from_str(
            r#"{ "timing": { "click_delay_ms": 10 }, "recording": { "backend": "ffmpeg" } }"#,
        )
        .unwrap();
        assert_eq!(config.timing.click_delay_ms, 10);
        assert_eq!(config.timing.detect_attempts, 6);
        assert_eq!(config.timing.replay_timeout_ms, 100_000);
        assert_eq!(config.recording.backend, RecordingBackendKind::Ffmpeg);
        assert_eq!(config.recording.ffmpeg.framerate, 30);
    }

    #[test]
    fn test_load_config_falls_back_on_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let config = load_config(Some(&path));
        assert_eq!(config.process_name, "nikke.exe");

        fs::write(&path, r#"{ "process_name": "game.exe" }"#).unwrap();
        assert_eq!(load_config(Some(&path)).process_name, "game.exe");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.json")));
        assert_eq!(config.standard_width, 1790);
    }
}
