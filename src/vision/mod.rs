//! Template matching against captured frames.

use image::{GrayImage, RgbaImage};
use serde::Serialize;

use crate::capture::Region;

pub mod catalog;
pub mod detector;

pub use catalog::TemplateCatalog;
pub use detector::TemplateDetector;

/// A reference bitmap identified by a stable key such as `CHEER_IMAGE`.
///
/// Coordinates in `region` are in reference resolution; the navigator
/// scales them to the live window.
#[derive(Clone, Debug)]
pub struct Template {
    pub key: String,
    pub image: RgbaImage,
    pub gray: GrayImage,
    pub threshold: f32,
    pub region: Option<Region>,
}

impl Template {
    pub fn new(key: impl Into<String>, image: RgbaImage, threshold: f32, region: Option<Region>) -> Self {
        let gray = image::imageops::grayscale(&image);
        Self {
            key: key.into(),
            image,
            gray,
            threshold,
            region,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Copy resized by per-axis factors. Tiny results keep the original size.
    pub fn scaled(&self, sx: f64, sy: f64) -> Template {
        let width = (self.width() as f64 * sx).round() as u32;
        let height = (self.height() as f64 * sy).round() as u32;
        if width < 5 || height < 5 {
            return self.clone();
        }
        let image = image::imageops::resize(
            &self.image,
            width,
            height,
            image::imageops::FilterType::Lanczos3,
        );
        Template::new(self.key.clone(), image, self.threshold, self.region)
    }
}

/// Outcome of one detection pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DetectionResult {
    pub found: bool,
    /// Matched rectangle, set only when `found`.
    pub location: Option<Region>,
    /// Best score seen, reported even below threshold.
    pub confidence: f32,
}

impl DetectionResult {
    pub fn not_found(confidence: f32) -> Self {
        Self {
            found: false,
            location: None,
            confidence,
        }
    }
}
