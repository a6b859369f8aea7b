use image::{imageops, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::color::{dominant_colors, Color};
use crate::surface::{DrawingSurface, Rect};

/// Gaussian sigma of the blurred-artwork background.
pub const BLUR_SIGMA: f32 = 30.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackgroundStyle {
    Blur,
    AverageColor,
    Gradient,
}

/// Fills the whole surface with the chosen treatment. `average` is the
/// artwork's average color, reused as the flat fill and as the gradient
/// fallback.
pub fn draw_background<S: DrawingSurface>(
    surface: &mut S,
    artwork: &RgbaImage,
    style: BackgroundStyle,
    average: Color,
) {
    let (w, h) = surface.size();
    let full = Rect::new(0.0, 0.0, w as f64, h as f64);

    match style {
        BackgroundStyle::Blur => match blurred_artwork(artwork, BLUR_SIGMA) {
            Some(blurred) => surface.draw_image(&aspect_fill(&blurred, w, h), full),
            None => {
                debug!("blur unavailable, falling back to white");
                surface.fill_rect(full, Color::WHITE);
            }
        },
        BackgroundStyle::AverageColor => surface.fill_rect(full, average),
        BackgroundStyle::Gradient => match dominant_colors(artwork, 2).as_slice() {
            [top, bottom] => surface.fill_vertical_gradient(full, *top, *bottom),
            _ => {
                debug!("fewer than two dominant colors, using flat fill");
                surface.fill_rect(full, average);
            }
        },
    }
}

/// Blurs the artwork with its edges extended so the border does not pull
/// in transparent black, then crops back to the original extent.
pub fn blurred_artwork(artwork: &RgbaImage, sigma: f32) -> Option<RgbaImage> {
    let (w, h) = artwork.dimensions();
    if w == 0 || h == 0 || !sigma.is_finite() || sigma <= 0.0 {
        return None;
    }

    let pad = (sigma * 3.0).ceil() as u32;
    let extended = RgbaImage::from_fn(w + 2 * pad, h + 2 * pad, |x, y| {
        let sx = (x as i64 - pad as i64).clamp(0, w as i64 - 1) as u32;
        let sy = (y as i64 - pad as i64).clamp(0, h as i64 - 1) as u32;
        *artwork.get_pixel(sx, sy)
    });

    let blurred = imageops::blur(&extended, sigma);
    Some(imageops::crop_imm(&blurred, pad, pad, w, h).to_image())
}

/// Scales `image` to cover `width` x `height` preserving aspect ratio and
/// crops the overflow evenly from both sides.
pub fn aspect_fill(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (iw, ih) = image.dimensions();
    if iw == 0 || ih == 0 || width == 0 || height == 0 {
        return RgbaImage::new(width, height);
    }

    let scale = (width as f64 / iw as f64).max(height as f64 / ih as f64);
    let scaled_w = ((iw as f64 * scale).round() as u32).max(width);
    let scaled_h = ((ih as f64 * scale).round() as u32).max(height);
    let scaled = imageops::resize(image, scaled_w, scaled_h, imageops::FilterType::Triangle);

    let left = (scaled_w - width) / 2;
    let top = (scaled_h - height) / 2;
    imageops::crop_imm(&scaled, left, top, width, height).to_image()
}
