use anyhow::{bail, Context, Result};
use image::{imageops, Rgba, RgbaImage};
use ndarray::Array2;
use qrcode::{EcLevel, QrCode};
use tracing::debug;

/// Each QR module becomes a square of this many pixels.
pub const MODULE_SCALE: u32 = 10;

/// Dark/light module grid at high error correction, row-major.
pub fn generate_qr_modules(text: &str) -> Result<Array2<bool>> {
    if text.is_empty() {
        bail!("Nothing to encode");
    }

    let code = QrCode::with_error_correction_level(text.as_bytes(), EcLevel::H)
        .context("Failed to generate QR code")?;

    let width = code.width();
    let modules: Vec<bool> = code
        .to_colors()
        .into_iter()
        .map(|c| matches!(c, qrcode::Color::Dark))
        .collect();

    Array2::from_shape_vec((width, width), modules).context("Failed to construct QR module grid")
}

/// QR bitmap for `text`, black on white, scaled up by `MODULE_SCALE`.
/// `None` when the text cannot be encoded; the overlay is optional.
pub fn generate_qr_image(text: &str) -> Option<RgbaImage> {
    let modules = match generate_qr_modules(text) {
        Ok(m) => m,
        Err(e) => {
            debug!("skipping QR overlay: {e:#}");
            return None;
        }
    };

    let (rows, cols) = modules.dim();
    let img = RgbaImage::from_fn(cols as u32, rows as u32, |x, y| {
        if modules[[y as usize, x as usize]] {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    });

    Some(imageops::resize(
        &img,
        img.width() * MODULE_SCALE,
        img.height() * MODULE_SCALE,
        imageops::FilterType::Nearest,
    ))
}
