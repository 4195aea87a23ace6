//! Test doubles for the platform seams.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::capture::{
    check_region, crop, Point, Region, ScreenCapturer, WindowHandle, WindowLocator, WindowRect,
};
use crate::collector::clipboard::ClipboardReader;
use crate::collector::navigator::{Navigator, Platform};
use crate::collector::state::CancelToken;
use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};
use crate::input::InputInjector;
use crate::recording::RecordingBackend;
use crate::vision::TemplateCatalog;

pub const FAKE_PROCESS: &str = "nikke.exe";

/// Seeded RGB noise, opaque.
pub fn noise_image(width: u32, height: u32, seed: u64) -> RgbaImage {
    let mut rng = StdRng::seed_from_u64(seed);
    RgbaImage::from_fn(width, height, |_, _| {
        Rgba([rng.random(), rng.random(), rng.random(), 255])
    })
}

/// Config with every delay zeroed so tests run at full speed.
pub fn test_config() -> CollectorConfig {
    let mut config = CollectorConfig::default();
    config.timing.click_delay_ms = 0;
    config.timing.click_jitter_ms = 0;
    config.timing.settle_delay_ms = 0;
    config.timing.retry_delay_ms = 0;
    config.timing.detect_attempts = 2;
    config.timing.max_transition_wait_ms = 1000;
    config
}

struct FakeState {
    rect: WindowRect,
    screen: RgbaImage,
    alive: bool,
    clicks: Vec<Point>,
    captures: usize,
    clipboard_reads: u32,
    close_after_clicks: Option<usize>,
}

/// A stub game window: static screen contents, recorded input, scripted loss.
#[derive(Clone)]
pub struct FakeWindow {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                rect: WindowRect::new(0, 0, width, height),
                screen: noise_image(width, height, 1),
                alive: true,
                clicks: Vec::new(),
                captures: 0,
                clipboard_reads: 0,
                close_after_clicks: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap()
    }

    pub fn paint(&self, image: &RgbaImage, x: u32, y: u32) {
        image::imageops::overlay(&mut self.state().screen, image, x as i64, y as i64);
    }

    pub fn clicks(&self) -> Vec<Point> {
        self.state().clicks.clone()
    }

    pub fn captures(&self) -> usize {
        self.state().captures
    }

    pub fn close(&self) {
        self.state().alive = false;
    }

    /// The process "exits" right after the n-th click.
    pub fn close_after_clicks(&self, clicks: usize) {
        self.state().close_after_clicks = Some(clicks);
    }

    pub fn platform(&self) -> Platform {
        Platform {
            locator: Box::new(self.clone()),
            capturer: Box::new(self.clone()),
            injector: Box::new(self.clone()),
            clipboard: Box::new(self.clone()),
        }
    }
}

/// Pastes `image` resized by `scale` at a reference position scaled the same way.
pub fn paste_scaled(window: &FakeWindow, image: &RgbaImage, ref_x: u32, ref_y: u32, scale: f64) {
    let width = (image.width() as f64 * scale).round() as u32;
    let height = (image.height() as f64 * scale).round() as u32;
    let resized =
        image::imageops::resize(image, width, height, image::imageops::FilterType::Lanczos3);
    window.paint(
        &resized,
        (ref_x as f64 * scale).round() as u32,
        (ref_y as f64 * scale).round() as u32,
    );
}

/// Navigator over a fake window with a fresh cancel token.
pub fn attach(window: &FakeWindow, catalog: TemplateCatalog, config: &CollectorConfig) -> Navigator {
    Navigator::attach(
        window.platform(),
        Arc::new(catalog),
        config,
        CancelToken::new(),
    )
    .unwrap()
}

impl WindowLocator for FakeWindow {
    fn locate(&self, process_name: &str) -> Result<WindowHandle> {
        if self.state().alive && process_name.eq_ignore_ascii_case(FAKE_PROCESS) {
            Ok(WindowHandle {
                raw: 1,
                process_name: FAKE_PROCESS.to_string(),
            })
        } else {
            Err(CollectorError::WindowNotFound(process_name.to_string()))
        }
    }

    fn rectangle(&self, _handle: &WindowHandle) -> Result<WindowRect> {
        let state = self.state();
        if state.alive {
            Ok(state.rect)
        } else {
            Err(CollectorError::WindowLost)
        }
    }

    fn resize_to_standard(&self, _handle: &WindowHandle, width: u32) -> Result<()> {
        let mut state = self.state();
        if !state.alive {
            return Err(CollectorError::WindowLost);
        }
        let height = (width as u64 * 2014 / 3580) as u32;
        state.rect = WindowRect::new(state.rect.left, state.rect.top, width, height);
        state.screen = noise_image(width, height, 1);
        Ok(())
    }

    fn is_valid(&self, _handle: &WindowHandle) -> bool {
        self.state().alive
    }
}

impl ScreenCapturer for FakeWindow {
    fn capture(&self, _handle: &WindowHandle, region: Option<Region>) -> Result<RgbaImage> {
        let mut state = self.state();
        if !state.alive {
            return Err(CollectorError::WindowLost);
        }
        state.captures += 1;
        match region {
            Some(region) => {
                check_region(region, state.rect)?;
                Ok(crop(&state.screen, region))
            }
            None => Ok(state.screen.clone()),
        }
    }
}

impl InputInjector for FakeWindow {
    fn move_to(&self, _handle: &WindowHandle, _point: Point) -> Result<()> {
        if self.state().alive {
            Ok(())
        } else {
            Err(CollectorError::WindowLost)
        }
    }

    fn click(&self, _handle: &WindowHandle, point: Point) -> Result<()> {
        let mut state = self.state();
        if !state.alive {
            return Err(CollectorError::WindowLost);
        }
        state.clicks.push(point);
        if state.close_after_clicks.is_some_and(|n| state.clicks.len() >= n) {
            state.alive = false;
        }
        Ok(())
    }
}

impl ClipboardReader for FakeWindow {
    fn read_text(&mut self) -> Result<String> {
        let mut state = self.state();
        state.clipboard_reads += 1;
        Ok(format!("user-{:03}", state.clipboard_reads))
    }
}

/// Recording backend that logs its calls. Starts for the listed file names fail.
#[derive(Clone, Default)]
pub struct FakeRecorder {
    log: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<Vec<String>>>,
}

impl FakeRecorder {
    pub fn fail_on(&self, filename: &str) {
        self.failing.lock().unwrap().push(filename.to_string());
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Log entries starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.log().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

impl RecordingBackend for FakeRecorder {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn start(&mut self, output_dir: &Path, filename: &str) -> Result<Option<PathBuf>> {
        if self.failing.lock().unwrap().iter().any(|f| f == filename) {
            self.log.lock().unwrap().push(format!("fail {}", filename));
            return Err(CollectorError::Recording("encoder busy".into()));
        }
        self.log.lock().unwrap().push(format!("start {}", filename));
        Ok(Some(output_dir.join(filename)))
    }

    fn stop(&mut self) -> Result<Option<PathBuf>> {
        self.log.lock().unwrap().push("stop".to_string());
        Ok(None)
    }
}
