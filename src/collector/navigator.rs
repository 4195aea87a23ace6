//! Navigation primitives shared by every collector format.
//!
//! A `Navigator` owns the platform seams (window, capture, input, clipboard)
//! and the template catalog. Each public operation is one atomic step: it
//! checks the cancel token first, re-queries the window geometry, and maps
//! reference-resolution coordinates onto the live window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};

use super::clipboard::ClipboardReader;
use super::state::{CancelToken, CollectorState};
use crate::capture::{Point, Region, ScreenCapturer, WindowHandle, WindowLocator, WindowRect};
use crate::config::{CollectorConfig, TimingConfig};
use crate::error::CollectorError;
use crate::input::InputInjector;
use crate::vision::{DetectionResult, Template, TemplateCatalog, TemplateDetector};

/// The platform implementations a navigator drives.
pub struct Platform {
    pub locator: Box<dyn WindowLocator>,
    pub capturer: Box<dyn ScreenCapturer>,
    pub injector: Box<dyn InputInjector>,
    pub clipboard: Box<dyn ClipboardReader>,
}

/// Why a navigation step did not complete.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("interrupted by operator")]
    Cancelled,

    #[error("'{key}' not found (best score {confidence:.3})")]
    NotFound { key: String, confidence: f32 },

    /// Something matched weakly: above the noise floor, under threshold.
    #[error("'{key}' is ambiguous (best score {confidence:.3})")]
    Ambiguous { key: String, confidence: f32 },

    #[error(transparent)]
    Failed(#[from] CollectorError),
}

pub type StepResult<T> = std::result::Result<T, StepError>;

pub struct Navigator {
    platform: Platform,
    handle: WindowHandle,
    catalog: Arc<TemplateCatalog>,
    detector: TemplateDetector,
    reference: (u32, u32),
    timing: TimingConfig,
    noise_floor: f32,
    cancel: CancelToken,
    state: CollectorState,
    /// Character icons scaled for the window size they were built for.
    icon_cache: Option<((u32, u32), Vec<Template>)>,
}

impl Navigator {
    /// Locates the game window and prepares a navigator for it.
    pub fn attach(
        platform: Platform,
        catalog: Arc<TemplateCatalog>,
        config: &CollectorConfig,
        cancel: CancelToken,
    ) -> Result<Self, CollectorError> {
        let handle = platform.locator.locate(&config.process_name)?;
        let rect = platform.locator.rectangle(&handle)?;
        info!("Attached to {} ({})", handle.process_name, rect);

        Ok(Self {
            platform,
            handle,
            catalog,
            detector: TemplateDetector::new(),
            reference: (config.reference_width.max(1), config.reference_height.max(1)),
            timing: config.timing.clone(),
            noise_floor: config.recovery.noise_floor,
            cancel,
            state: CollectorState::Idle,
            icon_cache: None,
        })
    }

    pub fn handle(&self) -> &WindowHandle {
        &self.handle
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn state(&self) -> &CollectorState {
        &self.state
    }

    pub fn enter(&mut self, state: CollectorState) {
        if self.state != state {
            debug!("State: {} -> {}", self.state, state);
            self.state = state;
        }
    }

    /// Fails with `Cancelled` once the operator asked to stop.
    pub fn checkpoint(&self) -> StepResult<()> {
        if self.cancel.is_cancelled() {
            Err(StepError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn window_rect(&self) -> StepResult<WindowRect> {
        Ok(self.platform.locator.rectangle(&self.handle)?)
    }

    /// Resizes the game window to `width` at the reference aspect ratio.
    pub fn resize_window(&mut self, width: u32) -> StepResult<WindowRect> {
        self.checkpoint()?;
        self.platform.locator.resize_to_standard(&self.handle, width)?;
        self.icon_cache = None;
        let rect = self.window_rect()?;
        info!("Window resized to {}", rect);
        Ok(rect)
    }

    /// Reference-to-window factors for the current rectangle.
    fn scale(&self, rect: WindowRect) -> (f64, f64) {
        (
            rect.width as f64 / self.reference.0 as f64,
            rect.height as f64 / self.reference.1 as f64,
        )
    }

    /// Sleeps in short slices so an interrupt is noticed promptly.
    fn pause(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while !self.cancel.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(50)));
        }
    }

    /// Waits for the UI to settle before an evidence capture.
    pub fn settle(&self) {
        self.pause(Duration::from_millis(self.timing.settle_delay_ms));
    }

    /// Clicks a reference-resolution point, then waits the click delay.
    pub fn click(&mut self, point: Point) -> StepResult<()> {
        self.checkpoint()?;
        let rect = self.window_rect()?;
        let (sx, sy) = self.scale(rect);
        let target = point.scaled(sx, sy);
        debug!("Click {} -> window {}", point, target);
        self.platform.injector.click(&self.handle, target)?;

        let jitter = match self.timing.click_jitter_ms {
            0 => 0,
            max => rand::rng().random_range(0..=max),
        };
        self.pause(Duration::from_millis(self.timing.click_delay_ms + jitter));
        Ok(())
    }

    /// Captures a reference-resolution region, or the whole window.
    pub fn capture(&mut self, region: Option<Region>) -> StepResult<RgbaImage> {
        self.checkpoint()?;
        let rect = self.window_rect()?;
        let (sx, sy) = self.scale(rect);
        let scaled = region.map(|r| r.scaled(sx, sy));
        Ok(self.platform.capturer.capture(&self.handle, scaled)?)
    }

    pub fn read_clipboard(&mut self) -> StepResult<String> {
        self.checkpoint()?;
        Ok(self.platform.clipboard.read_text()?)
    }

    /// One detection of `key` in its catalog search region.
    ///
    /// The returned location is in window pixels.
    pub fn detect(&mut self, key: &str) -> StepResult<DetectionResult> {
        let catalog = self.catalog.clone();
        let template = catalog.get(key)?;
        self.detect_template(template, template.region)
    }

    /// One detection of `key` inside `region` instead of its catalog region.
    pub fn detect_in(&mut self, key: &str, region: Region) -> StepResult<DetectionResult> {
        let catalog = self.catalog.clone();
        let template = catalog.get(key)?;
        self.detect_template(template, Some(region))
    }

    fn detect_template(
        &mut self,
        template: &Template,
        region: Option<Region>,
    ) -> StepResult<DetectionResult> {
        self.checkpoint()?;
        let rect = self.window_rect()?;
        let (sx, sy) = self.scale(rect);
        let search = region.map(|r| r.scaled(sx, sy));
        let frame = self.platform.capturer.capture(&self.handle, search)?;

        let scaled = if (sx - 1.0).abs() < 0.01 && (sy - 1.0).abs() < 0.01 {
            None
        } else {
            Some(template.scaled(sx, sy))
        };
        let template = scaled.as_ref().unwrap_or(template);

        let mut result = self.detector.detect(&frame, template, None)?;
        if let (Some(location), Some(search)) = (result.location, search) {
            result.location = Some(location.offset(search.start_x, search.start_y));
        }
        debug!(
            "Detect {}: found={} confidence={:.3}",
            template.key, result.found, result.confidence
        );
        Ok(result)
    }

    /// Single-shot presence check.
    pub fn is_present(&mut self, key: &str) -> StepResult<bool> {
        Ok(self.detect(key)?.found)
    }

    pub fn is_present_in(&mut self, key: &str, region: Region) -> StepResult<bool> {
        Ok(self.detect_in(key, region)?.found)
    }

    /// Re-detects `key` until it appears, up to `detect_attempts` times and
    /// never longer than `max_transition_wait_ms`.
    ///
    /// A miss is `Ambiguous` when the best score reached the noise floor,
    /// `NotFound` otherwise.
    pub fn wait_for(&mut self, key: &str) -> StepResult<Region> {
        let max_wait = Duration::from_millis(self.timing.max_transition_wait_ms);
        self.poll(key, self.timing.detect_attempts.max(1), max_wait)
    }

    /// Re-detects `key` every `retry_delay_ms` until it appears or `timeout`
    /// passes. For screens that follow long animations, such as a replayed
    /// battle.
    pub fn wait_until(&mut self, key: &str, timeout: Duration) -> StepResult<Region> {
        self.poll(key, u32::MAX, timeout)
    }

    fn poll(&mut self, key: &str, attempts: u32, max_wait: Duration) -> StepResult<Region> {
        let started = Instant::now();
        let mut best = f32::NEG_INFINITY;

        for attempt in 1..=attempts {
            let result = self.detect(key)?;
            if let (true, Some(location)) = (result.found, result.location) {
                debug!("{} found on attempt {}", key, attempt);
                return Ok(location);
            }
            best = best.max(result.confidence);

            if attempt == attempts || started.elapsed() >= max_wait {
                break;
            }
            self.pause(Duration::from_millis(self.timing.retry_delay_ms));
        }

        let confidence = best.max(0.0);
        if confidence >= self.noise_floor {
            Err(StepError::Ambiguous {
                key: key.to_string(),
                confidence,
            })
        } else {
            Err(StepError::NotFound {
                key: key.to_string(),
                confidence,
            })
        }
    }

    /// Waits for a screen marker when the catalog defines one.
    pub fn confirm(&mut self, key: &str) -> StepResult<()> {
        if !self.catalog.contains(key) {
            debug!("No template for marker {}, skipping confirmation", key);
            return self.checkpoint();
        }
        self.wait_for(key).map(|_| ())
    }

    /// Names the character in a captured slot, if any icon matches.
    pub fn identify_character(&mut self, slot: &RgbaImage) -> StepResult<Option<String>> {
        if self.catalog.characters().is_empty() {
            return Ok(None);
        }
        let rect = self.window_rect()?;
        let size = (rect.width, rect.height);
        if self.icon_cache.as_ref().map(|(s, _)| *s) != Some(size) {
            let (sx, sy) = self.scale(rect);
            let icons = self
                .catalog
                .characters()
                .iter()
                .map(|icon| icon.scaled(sx, sy))
                .collect();
            self.icon_cache = Some((size, icons));
        }
        let Some((_, icons)) = &self.icon_cache else {
            return Ok(None);
        };

        let gray = image::imageops::grayscale(slot);
        let mut best: Option<(&str, f32)> = None;
        for icon in icons {
            if icon.width() > gray.width() || icon.height() > gray.height() {
                continue;
            }
            let result = self.detector.detect_gray(&gray, &icon.gray, icon.threshold)?;
            if result.found && best.is_none_or(|(_, score)| result.confidence > score) {
                best = Some((&icon.key, result.confidence));
            }
        }
        Ok(best.map(|(name, _)| name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{attach, noise_image, paste_scaled, test_config, FakeWindow};

    #[test]
    fn test_click_scales_to_window() {
        let window = FakeWindow::new(1790, 1007);
        let mut nav = attach(&window, TemplateCatalog::default(), &test_config());

        nav.click(Point::new(1790, 583)).unwrap();

        assert_eq!(window.clicks(), vec![Point::new(895, 292)]);
    }

    #[test]
    fn test_resize_window_updates_scaling() {
        let window = FakeWindow::new(1280, 720);
        let mut nav = attach(&window, TemplateCatalog::default(), &test_config());

        let rect = nav.resize_window(1790).unwrap();
        nav.click(Point::new(3580, 2014)).unwrap();

        assert_eq!((rect.width, rect.height), (1790, 1007));
        assert_eq!(window.clicks(), vec![Point::new(1790, 1007)]);
    }

    #[test]
    fn test_capture_region_has_requested_size() {
        let window = FakeWindow::new(1280, 720);
        let mut config = test_config();
        config.reference_width = 1280;
        config.reference_height = 720;
        let mut nav = attach(&window, TemplateCatalog::default(), &config);

        let image = nav.capture(Some(Region::new(100, 200, 300, 40))).unwrap();

        assert_eq!(image.dimensions(), (300, 40));
    }

    #[test]
    fn test_capture_outside_window_fails() {
        let window = FakeWindow::new(1280, 720);
        let mut config = test_config();
        config.reference_width = 1280;
        config.reference_height = 720;
        let mut nav = attach(&window, TemplateCatalog::default(), &config);

        let result = nav.capture(Some(Region::new(1200, 700, 100, 100)));

        assert!(matches!(
            result,
            Err(StepError::Failed(CollectorError::RegionOutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_detect_image_on_stub_window() {
        let window = FakeWindow::new(1280, 720);
        let cheer = noise_image(20, 20, 42);
        window.paint(&cheer, 100, 200);
        let catalog = TemplateCatalog::new(
            vec![Template::new(
                "CHEER_IMAGE",
                cheer,
                0.8,
                Some(Region::new(50, 150, 200, 150)),
            )],
            vec![],
        );
        let mut config = test_config();
        config.reference_width = 1280;
        config.reference_height = 720;
        let mut nav = attach(&window, catalog, &config);

        let result = nav.detect("CHEER_IMAGE").unwrap();

        assert!(result.found);
        assert_eq!(result.location, Some(Region::new(100, 200, 20, 20)));
    }

    #[test]
    fn test_detect_scales_template_to_window() {
        // Reference 3580x2014 shown in a half-size window
        let window = FakeWindow::new(1790, 1007);
        let cheer = noise_image(60, 40, 5);
        let region = Region::new(1486, 1699, 700, 220);
        paste_scaled(&window, &cheer, 1600, 1750, 0.5);
        let catalog = TemplateCatalog::new(
            vec![Template::new("CHEER_IMAGE", cheer, 0.8, Some(region))],
            vec![],
        );
        let mut nav = attach(&window, catalog, &test_config());

        let location = nav.wait_for("CHEER_IMAGE").unwrap();

        assert_eq!((location.start_x, location.start_y), (800, 875));
    }

    #[test]
    fn test_wait_for_missing_template_is_not_found() {
        let window = FakeWindow::new(1280, 720);
        let catalog = TemplateCatalog::new(
            vec![Template::new(
                "CHEER_IMAGE",
                noise_image(16, 16, 8),
                0.8,
                Some(Region::new(0, 0, 200, 100)),
            )],
            vec![],
        );
        let mut config = test_config();
        config.timing.detect_attempts = 3;
        config.reference_width = 1280;
        config.reference_height = 720;
        let mut nav = attach(&window, catalog, &config);

        let result = nav.wait_for("CHEER_IMAGE");

        assert!(matches!(result, Err(StepError::NotFound { .. })));
        assert_eq!(window.captures(), 3);
    }

    #[test]
    fn test_wait_until_gives_up_after_timeout() {
        let window = FakeWindow::new(320, 180);
        let catalog = TemplateCatalog::new(
            vec![Template::new("STATISTIC", noise_image(16, 16, 8), 0.8, None)],
            vec![],
        );
        let mut nav = attach(&window, catalog, &test_config());

        let result = nav.wait_until("STATISTIC", Duration::ZERO);

        assert!(matches!(result, Err(StepError::NotFound { .. })));
        assert_eq!(window.captures(), 1);
    }

    #[test]
    fn test_wait_for_weak_match_is_ambiguous() {
        let window = FakeWindow::new(320, 180);
        let marker = noise_image(16, 16, 8);
        // Same pattern at reduced contrast with noise: scores between floor and threshold
        let mut faded = marker.clone();
        let noise = noise_image(16, 16, 77);
        for (x, y, p) in faded.enumerate_pixels_mut() {
            let n = noise.get_pixel(x, y);
            for c in 0..3 {
                p[c] = ((p[c] as u16 + n[c] as u16) / 2) as u8;
            }
        }
        window.paint(&faded, 50, 60);
        let catalog = TemplateCatalog::new(
            vec![Template::new("MARKER", marker, 0.95, Some(Region::new(40, 50, 40, 40)))],
            vec![],
        );
        let mut config = test_config();
        config.reference_width = 320;
        config.reference_height = 180;
        config.recovery.noise_floor = 0.4;
        let mut nav = attach(&window, catalog, &config);

        assert!(matches!(nav.wait_for("MARKER"), Err(StepError::Ambiguous { .. })));
    }

    #[test]
    fn test_confirm_skips_unknown_marker() {
        let window = FakeWindow::new(1280, 720);
        let mut nav = attach(&window, TemplateCatalog::default(), &test_config());
        nav.confirm("ROUND_1_SELECTED").unwrap();
        assert_eq!(window.captures(), 0);
    }

    #[test]
    fn test_cancel_stops_before_next_step() {
        let window = FakeWindow::new(1280, 720);
        let mut nav = attach(&window, TemplateCatalog::default(), &test_config());
        nav.cancel_token().cancel();

        assert!(matches!(nav.click(Point::new(10, 10)), Err(StepError::Cancelled)));
        assert!(window.clicks().is_empty());
    }

    #[test]
    fn test_lost_window_is_failed_structural() {
        let window = FakeWindow::new(1280, 720);
        let mut nav = attach(&window, TemplateCatalog::default(), &test_config());
        window.close();

        match nav.capture(None) {
            Err(StepError::Failed(e)) => assert!(e.is_structural()),
            other => panic!("unexpected {:?}", other.map(|i| i.dimensions())),
        }
    }

    #[test]
    fn test_identify_character() {
        let window = FakeWindow::new(1280, 720);
        let rapi = noise_image(24, 24, 12);
        let anis = noise_image(24, 24, 13);
        let catalog = TemplateCatalog::new(
            vec![],
            vec![
                Template::new("Anis", anis, 0.85, None),
                Template::new("Rapi", rapi.clone(), 0.85, None),
            ],
        );
        let mut config = test_config();
        config.reference_width = 1280;
        config.reference_height = 720;
        let mut nav = attach(&window, catalog, &config);

        let mut slot = noise_image(80, 100, 3);
        image::imageops::overlay(&mut slot, &rapi, 30, 40);
        assert_eq!(nav.identify_character(&slot).unwrap().as_deref(), Some("Rapi"));

        assert_eq!(nav.identify_character(&noise_image(80, 100, 4)).unwrap(), None);
    }
}
