use std::collections::HashMap;

use image::{imageops, Rgba, RgbaImage};

/// Side of the square the artwork is downsampled to before tallying.
const SAMPLE_SIZE: u32 = 50;

/// Pixels at or below this opacity are not counted as dominant candidates.
const MIN_OPACITY: f32 = 0.9;

/// Minimum distance in normalized RGB between two kept palette colors.
const MIN_DISTANCE: f32 = 0.2;

/// Straight (non-premultiplied) RGBA color with components in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn from_rgba8(p: Rgba<u8>) -> Self {
        Self {
            r: p[0] as f32 / 255.0,
            g: p[1] as f32 / 255.0,
            b: p[2] as f32 / 255.0,
            a: p[3] as f32 / 255.0,
        }
    }

    pub fn to_rgba8(self) -> Rgba<u8> {
        Rgba([
            to_channel(self.r),
            to_channel(self.g),
            to_channel(self.b),
            to_channel(self.a),
        ])
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Euclidean distance over the RGB channels, alpha ignored.
    pub fn distance(&self, other: &Color) -> f32 {
        let dr = self.r - other.r;
        let dg = self.g - other.g;
        let db = self.b - other.b;
        (dr * dr + dg * dg + db * db).sqrt()
    }

    pub fn luminance(&self) -> f32 {
        0.299 * self.r + 0.587 * self.g + 0.114 * self.b
    }
}

fn to_channel(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Mean of every channel over the whole image. An image with no pixels
/// yields white.
pub fn average_color(image: &RgbaImage) -> Color {
    let count = image.width() as u64 * image.height() as u64;
    if count == 0 {
        return Color::WHITE;
    }

    let mut sums = [0u64; 4];
    for p in image.pixels() {
        for (sum, &c) in sums.iter_mut().zip(p.0.iter()) {
            *sum += c as u64;
        }
    }

    let mean = |sum: u64| (sum as f64 / count as f64 / 255.0) as f32;
    Color {
        r: mean(sums[0]),
        g: mean(sums[1]),
        b: mean(sums[2]),
        a: mean(sums[3]),
    }
}

/// Up to `max_count` frequent, mutually dissimilar opaque colors, most
/// frequent first. May return fewer (or none) for low-diversity images.
pub fn dominant_colors(image: &RgbaImage, max_count: usize) -> Vec<Color> {
    if max_count == 0 || image.width() == 0 || image.height() == 0 {
        return Vec::new();
    }

    let sample = imageops::resize(image, SAMPLE_SIZE, SAMPLE_SIZE, imageops::FilterType::Nearest);

    let mut tally: HashMap<[u8; 3], u32> = HashMap::new();
    for p in sample.pixels() {
        if p[3] as f32 / 255.0 <= MIN_OPACITY {
            continue;
        }
        *tally.entry([p[0], p[1], p[2]]).or_insert(0) += 1;
    }

    let mut ranked: Vec<([u8; 3], u32)> = tally.into_iter().collect();
    // Ties break on the color itself so the order never depends on hashing.
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut kept: Vec<Color> = Vec::with_capacity(max_count);
    for (rgb, _) in ranked {
        let candidate = Color::from_rgba8(Rgba([rgb[0], rgb[1], rgb[2], 255]));
        if kept.iter().all(|c| c.distance(&candidate) > MIN_DISTANCE) {
            kept.push(candidate);
            if kept.len() == max_count {
                break;
            }
        }
    }
    kept
}

pub fn is_light(color: &Color) -> bool {
    color.luminance() > 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1.0 / 255.0
    }

    #[test]
    fn average_of_uniform_image_is_that_color() {
        let img = RgbaImage::from_pixel(17, 9, Rgba([200, 40, 90, 255]));
        let avg = average_color(&img);
        let expected = Color::from_rgba8(Rgba([200, 40, 90, 255]));
        assert!(close(avg.r, expected.r));
        assert!(close(avg.g, expected.g));
        assert!(close(avg.b, expected.b));
        assert!(close(avg.a, 1.0));
    }

    #[test]
    fn average_of_empty_image_is_white() {
        let img = RgbaImage::new(0, 0);
        assert_eq!(average_color(&img), Color::WHITE);
    }

    #[test]
    fn average_mixes_halves() {
        let img = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let avg = average_color(&img);
        assert!(close(avg.r, 0.5));
        assert!(close(avg.g, 0.5));
    }

    #[test]
    fn flat_image_has_a_single_dominant_color() {
        let img = RgbaImage::from_pixel(120, 80, Rgba([10, 120, 200, 255]));
        let colors = dominant_colors(&img, 2);
        assert_eq!(colors.len(), 1);
        assert_eq!(colors[0].to_rgba8(), Rgba([10, 120, 200, 255]));
    }

    #[test]
    fn dominant_colors_rank_by_frequency() {
        // Three quarters red, one quarter blue.
        let img = RgbaImage::from_fn(100, 100, |x, _| {
            if x < 75 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let colors = dominant_colors(&img, 4);
        assert_eq!(colors.len(), 2);
        assert_eq!(colors[0].to_rgba8(), Rgba([255, 0, 0, 255]));
        assert_eq!(colors[1].to_rgba8(), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn near_duplicates_are_collapsed() {
        let img = RgbaImage::from_fn(100, 100, |x, _| {
            if x < 60 {
                Rgba([100, 100, 100, 255])
            } else {
                Rgba([110, 105, 100, 255])
            }
        });
        assert_eq!(dominant_colors(&img, 3).len(), 1);
    }

    #[test]
    fn translucent_pixels_are_ignored() {
        let img = RgbaImage::from_pixel(64, 64, Rgba([255, 0, 0, 200]));
        assert!(dominant_colors(&img, 2).is_empty());
    }

    #[test]
    fn max_count_caps_the_palette() {
        let img = RgbaImage::from_fn(100, 100, |x, y| match (x < 50, y < 50) {
            (true, true) => Rgba([255, 0, 0, 255]),
            (false, true) => Rgba([0, 255, 0, 255]),
            (true, false) => Rgba([0, 0, 255, 255]),
            (false, false) => Rgba([255, 255, 255, 255]),
        });
        assert_eq!(dominant_colors(&img, 2).len(), 2);
        assert_eq!(dominant_colors(&img, 8).len(), 4);
    }

    #[test]
    fn lightness_uses_weighted_luminance() {
        assert!(is_light(&Color::WHITE));
        assert!(!is_light(&Color::BLACK));
        // Pure green is light, pure blue is dark.
        assert!(is_light(&Color::rgb(0.0, 1.0, 0.0)));
        assert!(!is_light(&Color::rgb(0.0, 0.0, 1.0)));
    }
}
