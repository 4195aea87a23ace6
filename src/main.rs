//! NIKKE Arena Collector
//!
//! Command-line front end: attaches to the game window, optionally starts a
//! screen recording, runs one collector format and writes its output tree.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use arena_collector::collector::TournamentStage;
use arena_collector::config::{load_config, CollectorConfig};
use arena_collector::{logging, paths};

#[derive(Parser)]
#[command(name = "arena-collector", version, about = "Collects NIKKE arena tournament data")]
struct Cli {
    /// Config file (defaults to config.json next to the executable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Record the run with the configured backend
    #[arg(long, global = true)]
    record: bool,

    /// Resize the game window to the standard width first
    #[arg(long, global = true)]
    resize: bool,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Group batch lineups (groups 1-64, all when none given)
    Groups { groups: Vec<u32> },
    /// 64-player tournament lineups (groups 1-8)
    Players { groups: Vec<u32> },
    /// Championship bracket battles (8-4, 4-2, 2-1)
    Championship { stages: Vec<TournamentStage> },
    /// Promotion bracket battles (64-32, 32-16, 16-8) per group
    Promotion {
        #[arg(long = "stage")]
        stages: Vec<TournamentStage>,
        #[arg(long = "group")]
        groups: Vec<u32>,
    },
    /// Replays bracket matches and records every round to its own video
    Replays {
        #[arg(long = "stage")]
        stages: Vec<TournamentStage>,
        #[arg(long = "group")]
        groups: Vec<u32>,
    },
    /// Runs one detection of a catalog template and logs the score
    Detect { key: String },
    /// Resizes the game window and exits
    Resize { width: Option<u32> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    paths::ensure_directories().context("Failed to create log directory")?;
    logging::init_logging(cli.verbose)?;
    logging::install_panic_hook();

    let config = load_config(cli.config.as_deref());
    info!("NIKKE Arena Collector {}", env!("CARGO_PKG_VERSION"));

    run(cli, config)
}

#[cfg(not(windows))]
fn run(_cli: Cli, _config: CollectorConfig) -> Result<()> {
    anyhow::bail!("arena-collector drives the Windows game client and only runs on Windows")
}

#[cfg(windows)]
fn run(cli: Cli, config: CollectorConfig) -> Result<()> {
    app::run(cli, config)
}

#[cfg(windows)]
mod app {
    use std::path::Path;
    use std::sync::Arc;

    use anyhow::{bail, Context, Result};
    use tracing::{info, warn};
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        RegisterHotKey, UnregisterHotKey, MOD_CONTROL, MOD_NOREPEAT, MOD_SHIFT,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetMessageW, MSG, WM_HOTKEY};

    use super::{Cli, Command};
    use arena_collector::capture::{GraphicsCapturer, Win32Locator};
    use arena_collector::collector::clipboard::SystemClipboard;
    use arena_collector::collector::{
        CancelToken, ChampionshipFormat, CollectionRunner, GroupBatchFormat, Navigator,
        OutputLayout, OutputWriter, Platform, PromotionFormat, ReplayFormat, ReplayNode,
        RunOutcome, RunReport, Tournament64Format,
    };
    use arena_collector::config::{CollectorConfig, RecordingBackendKind};
    use arena_collector::input::SendInputInjector;
    use arena_collector::paths;
    use arena_collector::recording::{AnyBackend, FfmpegBackend, ObsBackend, RecordingSession};
    use arena_collector::vision::TemplateCatalog;

    const HOTKEY_ABORT: i32 = 7;

    pub fn run(cli: Cli, config: CollectorConfig) -> Result<()> {
        unsafe {
            windows::Win32::System::WinRT::RoInitialize(
                windows::Win32::System::WinRT::RO_INIT_MULTITHREADED,
            )?
        };

        let catalog = Arc::new(TemplateCatalog::load(&config.template_manifest_path())?);
        let platform = Platform {
            locator: Box::new(Win32Locator::new(
                config.reference_width,
                config.reference_height,
            )),
            capturer: Box::new(GraphicsCapturer::new().context("Failed to set up screen capture")?),
            injector: Box::new(SendInputInjector::new()),
            clipboard: Box::new(SystemClipboard::new()),
        };

        let cancel = CancelToken::new();
        spawn_abort_hotkey(cancel.clone());
        let mut nav = Navigator::attach(platform, catalog, &config, cancel)?;

        match &cli.command {
            Command::Resize { width } => {
                nav.resize_window(width.unwrap_or(config.standard_width))?;
                return Ok(());
            }
            Command::Detect { key } => {
                let result = nav.detect(key)?;
                info!(
                    "{}: found={} confidence={:.3} location={:?}",
                    key, result.found, result.confidence, result.location
                );
                return Ok(());
            }
            _ => {}
        }

        if cli.resize || config.resize_on_start {
            nav.resize_window(config.standard_width)?;
        }

        let session_dir = paths::create_session_dir(&config.output_root())
            .context("Failed to create session directory")?;
        info!("Session folder: {}", session_dir.display());

        // Replays drive the recorder per round themselves
        let replays = matches!(cli.command, Command::Replays { .. });
        let mut recording = if (cli.record || config.recording.enabled) && !replays {
            start_recording(&config, &nav, &session_dir)
        } else {
            None
        };

        let result = collect(&cli.command, &config, &mut nav, &session_dir);

        if let Some(session) = recording.as_mut() {
            session.stop();
        }

        let report = result?;
        for (node, reason) in &report.skipped {
            warn!("Skipped {}: {}", node, reason);
        }
        info!("{}", report.summary());
        if let RunOutcome::Aborted { reason } = &report.outcome {
            bail!("Run aborted: {}", reason);
        }
        Ok(())
    }

    fn collect(
        command: &Command,
        config: &CollectorConfig,
        nav: &mut Navigator,
        session_dir: &Path,
    ) -> Result<RunReport> {
        let runner = CollectionRunner::new(&config.recovery);
        let report = match command {
            Command::Groups { groups } => {
                let mut writer = OutputWriter::new(session_dir, OutputLayout::GroupBatch)?;
                let mut format = GroupBatchFormat::new(config);
                runner.run(&mut format, nav, &mut writer, groups)?.report
            }
            Command::Players { groups } => {
                let mut writer = OutputWriter::new(session_dir, OutputLayout::Tournament64)?;
                let mut format = Tournament64Format::new(config);
                runner.run(&mut format, nav, &mut writer, groups)?.report
            }
            Command::Championship { stages } => {
                let mut writer = OutputWriter::new(session_dir, OutputLayout::Championship)?;
                runner
                    .run(&mut ChampionshipFormat, nav, &mut writer, stages)?
                    .report
            }
            Command::Promotion { stages, groups } => {
                let mut writer = OutputWriter::new(session_dir, OutputLayout::Promotion)?;
                let nodes = PromotionFormat::nodes(stages, groups);
                runner.run(&mut PromotionFormat, nav, &mut writer, &nodes)?.report
            }
            Command::Replays { stages, groups } => {
                let mut writer = OutputWriter::new(session_dir, OutputLayout::Replays)?;
                let session = RecordingSession::new(build_backend(config, nav));
                let mut format = ReplayFormat::new(session, writer.base(), config);
                let nodes = ReplayNode::nodes(stages, groups);
                runner.run(&mut format, nav, &mut writer, &nodes)?.report
            }
            Command::Detect { .. } | Command::Resize { .. } => bail!("not a collection command"),
        };
        Ok(report)
    }

    fn build_backend(config: &CollectorConfig, nav: &Navigator) -> AnyBackend {
        match config.recording.backend {
            RecordingBackendKind::Obs => {
                AnyBackend::Obs(ObsBackend::new(config.recording.obs.clone()))
            }
            RecordingBackendKind::Ffmpeg => {
                let mut ffmpeg = FfmpegBackend::new(config.recording.ffmpeg.clone());
                if let Ok(rect) = nav.window_rect() {
                    ffmpeg = ffmpeg.with_area(rect);
                }
                AnyBackend::Ffmpeg(ffmpeg)
            }
        }
    }

    /// Recording failures are logged and never block collection.
    fn start_recording(
        config: &CollectorConfig,
        nav: &Navigator,
        session_dir: &Path,
    ) -> Option<RecordingSession<AnyBackend>> {
        let mut session = RecordingSession::new(build_backend(config, nav));
        let filename = session_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording".to_string());
        match session.start(session_dir, &filename) {
            Ok(true) => Some(session),
            Ok(false) => {
                warn!("Recording backend refused to start; continuing without recording");
                None
            }
            Err(e) => {
                warn!("Recording unavailable: {}", e);
                None
            }
        }
    }

    /// Ctrl+Shift+Q sets the cancel token; the collector stops at its next step.
    fn spawn_abort_hotkey(cancel: CancelToken) {
        std::thread::spawn(move || unsafe {
            if let Err(e) = RegisterHotKey(
                HWND::default(),
                HOTKEY_ABORT,
                MOD_CONTROL | MOD_SHIFT | MOD_NOREPEAT,
                0x51, // 'Q' key
            ) {
                warn!("Failed to register abort hotkey Ctrl+Shift+Q: {}", e);
                return;
            }
            info!("Hotkey: Ctrl+Shift+Q (abort collection)");

            let mut msg = MSG::default();
            while GetMessageW(&mut msg, HWND::default(), 0, 0).as_bool() {
                if msg.message == WM_HOTKEY && msg.wParam.0 as i32 == HOTKEY_ABORT {
                    info!("Abort hotkey pressed - stopping at the next step");
                    cancel.cancel();
                }
            }
            let _ = UnregisterHotKey(HWND::default(), HOTKEY_ABORT);
        });
    }
}
