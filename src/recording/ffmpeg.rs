//! Recording through an FFmpeg `gdigrab` subprocess.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::RecordingBackend;
use crate::capture::WindowRect;
use crate::config::FfmpegConfig;
use crate::error::{CollectorError, Result};

/// How long FFmpeg gets to finalize the file after `q`.
const STOP_GRACE: Duration = Duration::from_secs(10);

pub struct FfmpegBackend {
    config: FfmpegConfig,
    /// Screen area to grab; the whole desktop when unset.
    area: Option<WindowRect>,
    child: Option<(Child, PathBuf)>,
}

impl FfmpegBackend {
    pub fn new(config: FfmpegConfig) -> Self {
        Self {
            config,
            area: None,
            child: None,
        }
    }

    /// Restricts the capture to the game window's screen rectangle.
    pub fn with_area(mut self, area: WindowRect) -> Self {
        self.area = Some(area);
        self
    }
}

/// Command-line arguments for one recording.
pub fn capture_args(config: &FfmpegConfig, area: Option<WindowRect>, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-f".into(),
        "gdigrab".into(),
        "-framerate".into(),
        config.framerate.to_string(),
    ];
    if let Some(area) = area {
        // yuv420p needs even dimensions
        let width = (area.width & !1).max(2);
        let height = (area.height & !1).max(2);
        args.extend([
            "-offset_x".into(),
            area.left.to_string(),
            "-offset_y".into(),
            area.top.to_string(),
            "-video_size".into(),
            format!("{}x{}", width, height),
        ]);
    }
    args.extend([
        "-i".into(),
        "desktop".into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        config.preset.clone(),
        "-b:v".into(),
        config.bitrate.clone(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        output.to_string_lossy().to_string(),
    ]);
    args
}

impl RecordingBackend for FfmpegBackend {
    fn name(&self) -> &'static str {
        "FFmpeg"
    }

    fn connect(&mut self) -> Result<()> {
        let status = Command::new(&self.config.path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                CollectorError::BackendUnavailable(format!("{}: {}", self.config.path, e))
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(CollectorError::BackendUnavailable(format!(
                "{} -version exited with {}",
                self.config.path, status
            )))
        }
    }

    fn start(&mut self, output_dir: &Path, filename: &str) -> Result<Option<PathBuf>> {
        std::fs::create_dir_all(output_dir)?;
        let output = output_dir.join(filename);
        let args = capture_args(&self.config, self.area, &output);
        debug!("Spawning {} {}", self.config.path, args.join(" "));

        let child = Command::new(&self.config.path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CollectorError::Recording(format!("failed to spawn ffmpeg: {}", e)))?;
        self.child = Some((child, output.clone()));
        Ok(Some(output))
    }

    fn stop(&mut self) -> Result<Option<PathBuf>> {
        let Some((mut child, output)) = self.child.take() else {
            return Ok(None);
        };

        if let Some(stdin) = child.stdin.as_mut() {
            let _ = stdin.write_all(b"q");
            let _ = stdin.flush();
        }

        let start = Instant::now();
        loop {
            if child.try_wait()?.is_some() {
                return Ok(Some(output));
            }
            if start.elapsed() > STOP_GRACE {
                warn!("ffmpeg did not exit after {:?}, killing it", STOP_GRACE);
                let _ = child.kill();
                let _ = child.wait();
                return Ok(Some(output));
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_args_use_even_window_area() {
        let args = capture_args(
            &FfmpegConfig::default(),
            Some(WindowRect::new(10, 20, 1281, 721)),
            Path::new("out/run.mp4"),
        );
        let joined = args.join(" ");
        assert!(joined.contains("-f gdigrab"));
        assert!(joined.contains("-offset_x 10 -offset_y 20"));
        assert!(joined.contains("-video_size 1280x720"));
        assert!(joined.ends_with("run.mp4"));
    }

    #[test]
    fn test_missing_binary_is_backend_unavailable() {
        let mut backend = FfmpegBackend::new(FfmpegConfig {
            path: "definitely-not-an-ffmpeg-binary".into(),
            ..FfmpegConfig::default()
        });
        assert!(matches!(
            backend.connect(),
            Err(CollectorError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn test_stop_without_child() {
        let mut backend = FfmpegBackend::new(FfmpegConfig::default());
        assert_eq!(backend.stop().unwrap(), None);
    }
}
