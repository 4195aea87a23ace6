//! Normalized correlation-coefficient template search.
//!
//! The cross term comes from `imageproc`'s sliding-window cross-correlation;
//! window sums and squared sums come from integral images, giving the
//! mean-subtracted score
//!
//! ```text
//!            Σ(I·T) - ΣI·ΣT/n
//! s = ---------------------------------
//!     sqrt((ΣI² - (ΣI)²/n)(ΣT² - (ΣT)²/n))
//! ```

use image::{GrayImage, Luma, RgbaImage};
use imageproc::definitions::Image;
use imageproc::template_matching::{match_template, MatchTemplateMethod};

use super::{DetectionResult, Template};
use crate::capture::Region;
use crate::error::{CollectorError, Result};

/// Scores closer than this are treated as equal, so the earlier position wins.
const TIE_EPSILON: f64 = 1e-5;

/// Variance below this (per pixel, on 0..=255 samples) counts as flat.
const FLAT_EPSILON: f64 = 1e-6;

/// Stateless detector; every call is independent.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateDetector;

impl TemplateDetector {
    pub fn new() -> Self {
        Self
    }

    /// Searches the whole of `capture` for `template`.
    ///
    /// `threshold` overrides the template's own. Malformed inputs (empty
    /// bitmaps, template larger than the capture) are errors, not misses.
    pub fn detect(
        &self,
        capture: &RgbaImage,
        template: &Template,
        threshold: Option<f32>,
    ) -> Result<DetectionResult> {
        let gray = image::imageops::grayscale(capture);
        self.detect_gray(&gray, &template.gray, threshold.unwrap_or(template.threshold))
    }

    pub fn detect_gray(
        &self,
        image: &GrayImage,
        template: &GrayImage,
        threshold: f32,
    ) -> Result<DetectionResult> {
        validate(image, template)?;

        let scores = correlation_map(image, template);
        let (x, y, best) = best_position(&scores);

        if best >= threshold {
            Ok(DetectionResult {
                found: true,
                location: Some(Region::new(x, y, template.width(), template.height())),
                confidence: best,
            })
        } else {
            Ok(DetectionResult::not_found(best))
        }
    }
}

fn validate(image: &GrayImage, template: &GrayImage) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(CollectorError::Detection("capture bitmap is empty".into()));
    }
    if template.width() == 0 || template.height() == 0 {
        return Err(CollectorError::Detection("template bitmap is empty".into()));
    }
    if template.width() > image.width() || template.height() > image.height() {
        return Err(CollectorError::Detection(format!(
            "template {}x{} is larger than capture {}x{}",
            template.width(),
            template.height(),
            image.width(),
            image.height()
        )));
    }
    Ok(())
}

/// Summed-area table with a zero row and column in front.
struct Integral {
    stride: usize,
    sum: Vec<f64>,
    sq: Vec<f64>,
}

impl Integral {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0.0; stride * (h + 1)];
        let mut sq = vec![0.0; stride * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = image.get_pixel(x as u32, y as u32)[0] as f64;
                row_sum += v;
                row_sq += v * v;
                let i = (y + 1) * stride + x + 1;
                sum[i] = sum[i - stride] + row_sum;
                sq[i] = sq[i - stride] + row_sq;
            }
        }
        Self { stride, sum, sq }
    }

    /// (Σv, Σv²) over the w×h window at (x, y).
    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let s = self.stride;
        let (a, b, c, d) = (y * s + x, y * s + x + w, (y + h) * s + x, (y + h) * s + x + w);
        (
            self.sum[d] - self.sum[b] - self.sum[c] + self.sum[a],
            self.sq[d] - self.sq[b] - self.sq[c] + self.sq[a],
        )
    }
}

/// Correlation-coefficient score for every top-left position.
fn correlation_map(image: &GrayImage, template: &GrayImage) -> Image<Luma<f32>> {
    let mut scores = match_template(image, template, MatchTemplateMethod::CrossCorrelation);

    let (tw, th) = (template.width() as usize, template.height() as usize);
    let n = (tw * th) as f64;
    let (t_sum, t_sq) = template.pixels().fold((0.0, 0.0), |(s, q), p| {
        let v = p[0] as f64;
        (s + v, q + v * v)
    });
    let t_var = t_sq - t_sum * t_sum / n;
    let t_flat = t_var <= FLAT_EPSILON * n;

    let integral = Integral::new(image);
    for (x, y, score) in scores.enumerate_pixels_mut() {
        let (i_sum, i_sq) = integral.window(x as usize, y as usize, tw, th);
        let i_var = i_sq - i_sum * i_sum / n;
        let i_flat = i_var <= FLAT_EPSILON * n;

        let value = match (t_flat, i_flat) {
            // Two flat patches match only when their levels agree
            (true, true) => {
                if ((i_sum - t_sum) / n).abs() < 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
            (true, false) | (false, true) => 0.0,
            (false, false) => {
                let numerator = score[0] as f64 - i_sum * t_sum / n;
                (numerator / (i_var * t_var).sqrt()).clamp(-1.0, 1.0)
            }
        };
        score[0] = value as f32;
    }
    scores
}

/// Highest score, lowest row-major position on ties.
fn best_position(scores: &Image<Luma<f32>>) -> (u32, u32, f32) {
    let mut best = (0, 0, f64::NEG_INFINITY);
    for (x, y, score) in scores.enumerate_pixels() {
        let value = score[0] as f64;
        if value > best.2 + TIE_EPSILON {
            best = (x, y, value);
        }
    }
    (best.0, best.1, best.2 as f32)
}
