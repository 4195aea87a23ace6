//! Stitching captured evidence into combined images.

use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

/// Stacks images top to bottom, each centered horizontally on a transparent
/// background as wide as the widest input.
pub fn combine_vertical(images: &[&RgbaImage]) -> Option<RgbaImage> {
    let width = images.iter().map(|i| i.width()).max()?;
    let height: u32 = images.iter().map(|i| i.height()).sum();
    if width == 0 || height == 0 {
        return None;
    }

    let mut canvas = RgbaImage::new(width, height);
    let mut y = 0i64;
    for image in images {
        let x = (width - image.width()) / 2;
        imageops::overlay(&mut canvas, *image, x as i64, y);
        y += image.height() as i64;
    }
    Some(canvas)
}

/// Frame drawn around each image in a horizontal combination.
pub const BORDER: u32 = 4;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const FRAME: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Places images left to right on an opaque white canvas, each inside a
/// black frame of `BORDER` pixels. Framed images sit `gap` pixels apart with
/// `boundary` pixels of margin on every side; shorter ones are centered
/// vertically.
pub fn combine_horizontal(images: &[&RgbaImage], gap: u32, boundary: u32) -> Option<RgbaImage> {
    if images.is_empty() {
        return None;
    }
    let content_width: u32 = images.iter().map(|i| i.width()).sum();
    let content_height = images.iter().map(|i| i.height()).max().unwrap_or(0);
    if content_width == 0 || content_height == 0 {
        return None;
    }

    let count = images.len() as u32;
    let mut canvas = RgbaImage::from_pixel(
        content_width + count * 2 * BORDER + gap * (count - 1) + 2 * boundary,
        content_height + 2 * BORDER + 2 * boundary,
        BACKGROUND,
    );
    let mut x = boundary;
    for image in images {
        let y = boundary + (content_height - image.height()) / 2;
        let frame = Rect::at(x as i32, y as i32)
            .of_size(image.width() + 2 * BORDER, image.height() + 2 * BORDER);
        draw_filled_rect_mut(&mut canvas, frame, FRAME);
        imageops::overlay(
            &mut canvas,
            *image,
            (x + BORDER) as i64,
            (y + BORDER) as i64,
        );
        x += image.width() + 2 * BORDER + gap;
    }
    Some(canvas)
}
