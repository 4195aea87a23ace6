//! Window geometry and screen capture of the game client.
//!
//! This module provides:
//! - Geometry types (`Region`, `Point`, `WindowRect`, `WindowHandle`)
//! - The `WindowLocator` and `ScreenCapturer` seams the collectors drive
//! - Win32 implementations (`window`, `screenshot`) on Windows

use std::fmt;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{CollectorError, Result};

#[cfg(windows)]
pub mod screenshot;
#[cfg(windows)]
pub mod window;

#[cfg(windows)]
pub use screenshot::GraphicsCapturer;
#[cfg(windows)]
pub use window::Win32Locator;

/// A window-relative rectangle in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub start_x: u32,
    pub start_y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(start_x: u32, start_y: u32, width: u32, height: u32) -> Self {
        Self {
            start_x,
            start_y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.start_x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.start_y.saturating_add(self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.start_x + self.width / 2, self.start_y + self.height / 2)
    }

    /// True when the region is non-empty and fully inside a `width`x`height` area.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0 && self.height > 0 && self.right() <= width && self.bottom() <= height
    }

    /// Scales the region by per-axis factors, keeping it at least 1x1.
    /// Both edges are rounded, so a region touching the reference edge
    /// touches the scaled edge.
    pub fn scaled(&self, sx: f64, sy: f64) -> Region {
        let scale = |v: u32, s: f64| (v as f64 * s).round() as u32;
        let start_x = scale(self.start_x, sx);
        let start_y = scale(self.start_y, sy);
        Region {
            start_x,
            start_y,
            width: scale(self.right(), sx).saturating_sub(start_x).max(1),
            height: scale(self.bottom(), sy).saturating_sub(start_y).max(1),
        }
    }

    /// Moves the region by an offset (used to map search-local hits back to the window).
    pub fn offset(&self, dx: u32, dy: u32) -> Region {
        Region {
            start_x: self.start_x + dx,
            start_y: self.start_y + dy,
            ..*self
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) {}x{}",
            self.start_x, self.start_y, self.width, self.height
        )
    }
}

/// A window-relative point in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn scaled(&self, sx: f64, sy: f64) -> Point {
        Point {
            x: (self.x as f64 * sx).round() as u32,
            y: (self.y as f64 * sy).round() as u32,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Client area of the game window in screen coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowRect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowRect {
    pub const fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Converts a window-relative point to screen coordinates.
    pub fn to_screen(&self, point: Point) -> (i32, i32) {
        (self.left + point.x as i32, self.top + point.y as i32)
    }
}

impl fmt::Display for WindowRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Opaque handle to a located game window.
///
/// Becomes stale when the game process exits; operations then fail with
/// `CollectorError::WindowLost`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowHandle {
    pub raw: isize,
    pub process_name: String,
}

/// Finds the game window and reports its geometry.
pub trait WindowLocator {
    /// Finds the first visible, titled window owned by `process_name`.
    fn locate(&self, process_name: &str) -> Result<WindowHandle>;

    /// Current client rectangle. Re-queried on every call.
    fn rectangle(&self, handle: &WindowHandle) -> Result<WindowRect>;

    /// Resizes the client area to `width` (height follows the reference aspect ratio).
    fn resize_to_standard(&self, handle: &WindowHandle, width: u32) -> Result<()>;

    fn is_valid(&self, handle: &WindowHandle) -> bool;
}

/// Takes bitmaps of the game window.
pub trait ScreenCapturer {
    /// Captures the client area, or a window-relative `region` of it.
    fn capture(&self, handle: &WindowHandle, region: Option<Region>) -> Result<RgbaImage>;
}

/// Fails with `RegionOutOfBounds` unless `region` lies inside `rect`.
pub fn check_region(region: Region, rect: WindowRect) -> Result<()> {
    if region.fits_within(rect.width, rect.height) {
        Ok(())
    } else {
        Err(CollectorError::RegionOutOfBounds { region, rect })
    }
}

/// Crops a full client-area bitmap to `region` (already bounds-checked).
pub fn crop(image: &RgbaImage, region: Region) -> RgbaImage {
    image::imageops::crop_imm(
        image,
        region.start_x,
        region.start_y,
        region.width,
        region.height,
    )
    .to_image()
}
