use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::background::{draw_background, BackgroundStyle};
use crate::color::{average_color, Color};
use crate::error::{CompositionError, CompositionResult};
use crate::fonts::FontDescriptor;
use crate::layout::{
    canvas_size, compute_layout, fit_line_counts, padding, text_space, AspectRatio, LayoutRects,
    TextHeights,
};
use crate::metadata::MusicMetadata;
use crate::qr::generate_qr_image;
use crate::surface::{DrawingSurface, Rect, Shadow, SurfaceBackend};
use crate::text_style::{resolve_text_styles, FontStyle, TextStyles};

/// Artwork corner radius as a fraction of artwork width.
const ARTWORK_CORNER_RATIO: f64 = 0.03;
const BADGE_FILL_OPACITY: f32 = 0.8;
/// Badge outline width as a fraction of the badge side.
const BADGE_STROKE_RATIO: f64 = 0.02;
/// Badge corner radius as a fraction of the badge side.
const BADGE_CORNER_RATIO: f64 = 0.15;
/// Margin between badge edge and QR code as a fraction of the badge side.
const BADGE_QR_INSET_RATIO: f64 = 0.08;

const ELLIPSIS: char = '\u{2026}';

const ARTWORK_SHADOW: Shadow = Shadow {
    offset_x: 0.0,
    offset_y: 8.0,
    blur: 10.0,
    color: Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.4,
    },
};

/// Everything besides artwork and metadata that decides how a card looks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleOptions {
    pub aspect_ratio: AspectRatio,
    pub background_style: BackgroundStyle,
    pub font_style: FontStyle,
    pub qr_visible: bool,
    #[serde(default)]
    pub qr_payload: String,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::Portrait,
            background_style: BackgroundStyle::Blur,
            font_style: FontStyle::Standard,
            qr_visible: false,
            qr_payload: String::new(),
        }
    }
}

/// Decodes artwork bytes in any format `image` understands.
pub fn decode_artwork(bytes: &[u8]) -> CompositionResult<RgbaImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| CompositionError::source_decode(e.to_string()))?;
    Ok(img.to_rgba8())
}

/// Renders cards on surfaces from `B`. Holds no per-render state, so one
/// compositor can serve concurrent renders.
pub struct Compositor<B> {
    backend: B,
    screen_ratio: f64,
}

impl<B: SurfaceBackend> Compositor<B> {
    /// `screen_ratio` is the height/width of the screen the device profile
    /// targets.
    pub fn new(backend: B, screen_ratio: f64) -> Self {
        Self {
            backend,
            screen_ratio,
        }
    }

    #[instrument(skip_all, fields(aspect = ?options.aspect_ratio, background = ?options.background_style))]
    pub fn render(
        &self,
        artwork: &RgbaImage,
        metadata: &MusicMetadata,
        options: &StyleOptions,
    ) -> CompositionResult<RgbaImage> {
        let (art_w, art_h) = artwork.dimensions();
        if art_w == 0 || art_h == 0 {
            return Err(CompositionError::source_decode("artwork has no pixels"));
        }

        let (width, height) = canvas_size(art_w, options.aspect_ratio, self.screen_ratio);
        debug!("canvas {width}x{height}");
        let mut surface = self.backend.create_surface(width, height)?;

        let average = average_color(artwork);
        draw_background(&mut surface, artwork, options.background_style, average);

        let styles =
            resolve_text_styles(options.font_style, options.background_style, art_w, &average);

        let TextPlan { rects, lines } = plan_text(&surface, metadata, &styles, options);
        let [title, subtitle, details] = lines;

        let canvas = Rect::new(0.0, 0.0, width as f64, height as f64);
        if !canvas.contains_rect(&rects.details) {
            warn!("text does not fit on the canvas and will be clipped");
        }
        if rects.qr.is_some_and(|qr| qr.intersects(&rects.details)) {
            debug!("QR badge overlaps the details line");
        }

        surface.draw_image_rounded(
            artwork,
            rects.artwork,
            art_w as f64 * ARTWORK_CORNER_RATIO,
            Some(ARTWORK_SHADOW),
        );

        surface.draw_text(&title, &styles.title, rects.title, styles.primary, Some(styles.shadow));
        surface.draw_text(
            &subtitle,
            &styles.subtitle,
            rects.subtitle,
            styles.primary,
            Some(styles.shadow),
        );
        surface.draw_text(
            &details,
            &styles.details,
            rects.details,
            styles.secondary,
            Some(styles.shadow),
        );

        if let Some(badge) = rects.qr {
            match generate_qr_image(&options.qr_payload) {
                Some(code) => draw_qr_badge(&mut surface, badge, &code, average),
                None => debug!("QR enabled but no code was produced; omitting badge"),
            }
        }

        Ok(surface.finish())
    }
}

/// Text lines as drawn plus where everything goes.
struct TextPlan {
    rects: LayoutRects,
    lines: [String; 3],
}

fn plan_text<S: DrawingSurface>(
    surface: &S,
    metadata: &MusicMetadata,
    styles: &TextStyles,
    options: &StyleOptions,
) -> TextPlan {
    let (w, h) = surface.size();
    let (width, height) = (w as f64, h as f64);
    let content_width = width - 2.0 * padding(width);

    let details_line = metadata.details_line();
    let lines = fit_text(
        surface,
        [
            metadata.display_name.as_str(),
            metadata.artist_name.as_str(),
            details_line.as_str(),
        ],
        [&styles.title, &styles.subtitle, &styles.details],
        content_width,
        text_space(width, height, options.aspect_ratio),
    );

    let heights = TextHeights {
        title: surface.measure_text(&lines[0], &styles.title, content_width),
        subtitle: surface.measure_text(&lines[1], &styles.subtitle, content_width),
        details: surface.measure_text(&lines[2], &styles.details, content_width),
    };
    let rects = compute_layout(
        width,
        height,
        options.aspect_ratio,
        &heights,
        options.qr_visible,
    );
    TextPlan { rects, lines }
}

/// Wraps the three text blocks and trims them to the lines that fit in
/// `available`, ending any shortened block with an ellipsis. Each block
/// comes back as its kept lines joined by newlines.
fn fit_text<S: DrawingSurface>(
    surface: &S,
    texts: [&str; 3],
    fonts: [&FontDescriptor; 3],
    max_width: f64,
    available: f64,
) -> [String; 3] {
    let wrapped = [0usize, 1, 2].map(|i| surface.wrap_text(texts[i], fonts[i], max_width));
    let counts = fit_line_counts(
        available,
        [0usize, 1, 2].map(|i| wrapped[i].len()),
        [0usize, 1, 2].map(|i| surface.line_height(fonts[i])),
    );

    [0usize, 1, 2].map(|i| {
        let lines = &wrapped[i];
        let keep = counts[i];
        if keep >= lines.len() {
            return lines.join("\n");
        }
        if keep == 0 {
            debug!("dropping text block {i}: no room on the canvas");
            return String::new();
        }
        let mut kept = lines[..keep].to_vec();
        if let Some(last) = kept.last_mut() {
            *last = ellipsize(surface, last, fonts[i], max_width);
        }
        kept.join("\n")
    })
}

/// `line` with an ellipsis appended, dropping trailing characters until
/// it fits `max_width`.
fn ellipsize<S: DrawingSurface>(
    surface: &S,
    line: &str,
    font: &FontDescriptor,
    max_width: f64,
) -> String {
    let mut chars: Vec<char> = line.chars().collect();
    loop {
        while chars.last().is_some_and(|c| c.is_whitespace()) {
            chars.pop();
        }
        let candidate: String = chars.iter().chain(std::iter::once(&ELLIPSIS)).collect();
        if chars.is_empty() || surface.text_width(&candidate, font) <= max_width {
            return candidate;
        }
        chars.pop();
    }
}

fn draw_qr_badge<S: DrawingSurface>(surface: &mut S, badge: Rect, code: &RgbaImage, fill: Color) {
    let radius = badge.width * BADGE_CORNER_RATIO;
    surface.fill_rounded_rect(badge, radius, fill.with_alpha(BADGE_FILL_OPACITY));
    surface.stroke_rounded_rect(
        badge,
        radius,
        badge.width * BADGE_STROKE_RATIO,
        Color::WHITE,
    );

    let inner = badge.inset(badge.width * BADGE_QR_INSET_RATIO);
    let side = inner.width.min(inner.height);
    let target = Rect::new(
        inner.x + (inner.width - side) / 2.0,
        inner.y + (inner.height - side) / 2.0,
        side,
        side,
    );
    surface.draw_image(code, target);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use image::Rgba;

    use super::*;
    use crate::fonts::{fixture_book, FontBook};
    use crate::metadata::ReleaseKind;
    use crate::raster::RasterBackend;

    fn compositor() -> Compositor<RasterBackend> {
        Compositor::new(RasterBackend::new(Arc::new(FontBook::empty())), 2.0)
    }

    fn metadata() -> MusicMetadata {
        MusicMetadata {
            kind: ReleaseKind::Track,
            artist_name: "A".into(),
            display_name: "T".into(),
            genre: "G".into(),
            release_year: "2024".into(),
        }
    }

    fn flat_options() -> StyleOptions {
        StyleOptions {
            aspect_ratio: AspectRatio::Portrait,
            background_style: BackgroundStyle::AverageColor,
            font_style: FontStyle::Standard,
            qr_visible: false,
            qr_payload: String::new(),
        }
    }

    fn red_artwork() -> RgbaImage {
        RgbaImage::from_pixel(300, 300, Rgba([255, 0, 0, 255]))
    }

    /// Blue left half, red right half.
    fn split_artwork() -> RgbaImage {
        RgbaImage::from_fn(300, 300, |x, _| {
            if x < 150 {
                Rgba([0, 0, 255, 255])
            } else {
                Rgba([255, 0, 0, 255])
            }
        })
    }

    fn is_blue(p: &Rgba<u8>) -> bool {
        p[2] > 245 && p[0] < 10
    }

    fn is_red(p: &Rgba<u8>) -> bool {
        p[0] > 245 && p[2] < 10
    }

    #[test]
    fn reference_render_dimensions_and_artwork_rect() {
        let out = compositor()
            .render(&split_artwork(), &metadata(), &flat_options())
            .unwrap();
        assert_eq!(out.dimensions(), (300, 400));
        assert!((padding(300.0) - 15.0).abs() < 1e-9);

        // Artwork occupies (15,15,270,270); the flat background is the
        // purple average, so artwork pixels are told apart from it.
        let px = |x, y| *out.get_pixel(x, y);
        assert!(is_blue(&px(16, 150)) && !is_blue(&px(13, 150)));
        assert!(is_red(&px(283, 150)) && !is_red(&px(286, 150)));
        assert!(is_blue(&px(80, 16)) && !is_blue(&px(80, 13)));
        assert!(is_blue(&px(80, 283)) && !is_blue(&px(80, 287)));
        assert!(is_red(&px(220, 16)) && is_red(&px(220, 283)));
        // The split lands at the middle of the artwork rect.
        assert!(is_blue(&px(140, 150)) && is_red(&px(160, 150)));
    }

    #[test]
    fn artwork_corners_are_rounded() {
        let out = compositor()
            .render(&split_artwork(), &metadata(), &flat_options())
            .unwrap();
        // Radius is 9px: the corner pixels themselves fall outside the clip.
        assert!(!is_blue(out.get_pixel(15, 15)));
        assert!(!is_red(out.get_pixel(284, 15)));
        assert!(!is_blue(out.get_pixel(15, 284)));
        assert!(!is_red(out.get_pixel(284, 284)));
        assert!(is_blue(out.get_pixel(20, 20)));
        assert!(is_red(out.get_pixel(279, 279)));
    }

    #[test]
    fn artwork_is_drawn_over_every_background() {
        for background_style in [
            BackgroundStyle::Blur,
            BackgroundStyle::AverageColor,
            BackgroundStyle::Gradient,
        ] {
            let options = StyleOptions {
                background_style,
                ..flat_options()
            };
            let out = compositor()
                .render(&split_artwork(), &metadata(), &options)
                .unwrap();
            assert!(is_blue(out.get_pixel(40, 150)), "{background_style:?}");
            assert!(is_red(out.get_pixel(260, 150)), "{background_style:?}");
        }
    }

    #[test]
    fn long_titles_are_trimmed_to_fit_the_canvas() {
        let metadata = MusicMetadata {
            display_name: "A Very Long Album Title That Goes On And On Forever".into(),
            ..metadata()
        };
        let options = flat_options();
        let average = average_color(&red_artwork());
        let styles = resolve_text_styles(
            options.font_style,
            options.background_style,
            300,
            &average,
        );
        let surface = RasterBackend::new(Arc::new(FontBook::empty()))
            .create_surface(300, 400)
            .unwrap();

        let plan = plan_text(&surface, &metadata, &styles, &options);
        let canvas = Rect::new(0.0, 0.0, 300.0, 400.0);
        for r in [plan.rects.title, plan.rects.subtitle, plan.rects.details] {
            assert!(canvas.contains_rect(&r), "{r:?}");
        }
        assert_eq!(plan.lines[0].lines().count(), 2);
        assert!(plan.lines[0].ends_with(ELLIPSIS));
        assert_eq!(plan.lines[1], "A");
        assert_eq!(plan.lines[2], "G \u{2022} 2024");

        // Still renders.
        compositor()
            .render(&red_artwork(), &metadata, &options)
            .unwrap();
    }

    #[test]
    fn short_text_is_left_alone() {
        let options = flat_options();
        let styles = resolve_text_styles(
            options.font_style,
            options.background_style,
            300,
            &Color::BLACK,
        );
        let surface = RasterBackend::new(Arc::new(FontBook::empty()))
            .create_surface(300, 400)
            .unwrap();
        let plan = plan_text(&surface, &metadata(), &styles, &options);
        assert_eq!(plan.lines, ["T".to_string(), "A".to_string(), "G \u{2022} 2024".to_string()]);
    }

    #[test]
    fn text_lands_in_its_rects_with_faded_details() {
        let fonts = Arc::new(fixture_book());
        let artwork = RgbaImage::from_pixel(300, 300, Rgba([40, 40, 40, 255]));
        let metadata = MusicMetadata {
            display_name: "Midnight".into(),
            artist_name: "Harbor Lights".into(),
            genre: "Ambient".into(),
            release_year: "2021".into(),
            ..metadata()
        };
        let options = flat_options();

        let styles = resolve_text_styles(
            options.font_style,
            options.background_style,
            300,
            &average_color(&artwork),
        );
        assert_eq!(styles.primary, Color::WHITE);
        assert_eq!(styles.secondary, Color::WHITE.with_alpha(0.8));

        let surface = RasterBackend::new(Arc::clone(&fonts))
            .create_surface(300, 400)
            .unwrap();
        let plan = plan_text(&surface, &metadata, &styles, &options);

        let out = Compositor::new(RasterBackend::new(fonts), 2.0)
            .render(&artwork, &metadata, &options)
            .unwrap();

        // Text is lighter than the background; the shadow only darkens.
        let bright: Vec<(u32, u32, u8)> = out
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] > 60)
            .map(|(x, y, p)| (x, y, p[0]))
            .collect();
        assert!(!bright.is_empty());

        let inside = |r: &Rect, x: u32, y: u32| {
            let (x, y) = (x as f64 + 0.5, y as f64 + 0.5);
            x >= r.x && x <= r.right() && y >= r.y && y <= r.bottom()
        };
        let in_title = |&&(x, y, _): &&(u32, u32, u8)| inside(&plan.rects.title, x, y);
        let in_details = |&&(x, y, _): &&(u32, u32, u8)| inside(&plan.rects.details, x, y);
        assert!(bright.iter().all(|&(x, y, _)| {
            inside(&plan.rects.title, x, y)
                || inside(&plan.rects.subtitle, x, y)
                || inside(&plan.rects.details, x, y)
        }));

        let title_peak = bright.iter().filter(in_title).map(|p| p.2).max().unwrap();
        let details_peak = bright.iter().filter(in_details).map(|p| p.2).max().unwrap();
        assert!(title_peak > 230, "title peak {title_peak}");
        // 80% white over the dark background tops out near 212.
        assert!(details_peak < 222, "details peak {details_peak}");
        assert!(details_peak > 150, "details peak {details_peak}");
    }

    #[test]
    fn output_is_opaque() {
        let artwork = RgbaImage::from_pixel(64, 64, Rgba([10, 200, 30, 128]));
        let options = StyleOptions {
            background_style: BackgroundStyle::Blur,
            ..flat_options()
        };
        let out = compositor().render(&artwork, &metadata(), &options).unwrap();
        assert!(out.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn rendering_is_repeatable() {
        let artwork = RgbaImage::from_fn(120, 120, |x, y| {
            Rgba([(x * 2) as u8, (y * 2) as u8, ((x + y) % 256) as u8, 255])
        });
        for background_style in [
            BackgroundStyle::Blur,
            BackgroundStyle::AverageColor,
            BackgroundStyle::Gradient,
        ] {
            let options = StyleOptions {
                aspect_ratio: AspectRatio::Story,
                background_style,
                font_style: FontStyle::Monospaced,
                qr_visible: true,
                qr_payload: "https://example.com/album/1".into(),
            };
            let c = compositor();
            let a = c.render(&artwork, &metadata(), &options).unwrap();
            let b = c.render(&artwork, &metadata(), &options).unwrap();
            assert_eq!(a.as_raw(), b.as_raw(), "{background_style:?}");
        }
    }

    #[test]
    fn empty_qr_payload_omits_badge() {
        let with_empty_qr = StyleOptions {
            qr_visible: true,
            qr_payload: String::new(),
            ..flat_options()
        };
        let c = compositor();
        let plain = c.render(&red_artwork(), &metadata(), &flat_options()).unwrap();
        let empty = c.render(&red_artwork(), &metadata(), &with_empty_qr).unwrap();
        assert_eq!(plain.as_raw(), empty.as_raw());
    }

    #[test]
    fn qr_badge_is_drawn_bottom_right() {
        let options = StyleOptions {
            qr_visible: true,
            qr_payload: "https://example.com".into(),
            ..flat_options()
        };
        let c = compositor();
        let plain = c.render(&red_artwork(), &metadata(), &flat_options()).unwrap();
        let badged = c.render(&red_artwork(), &metadata(), &options).unwrap();
        assert_ne!(plain.as_raw(), badged.as_raw());

        // Badge spans x 255..291, y 355..391 on a 300x400 canvas.
        let changed_outside = plain
            .enumerate_pixels()
            .filter(|(x, y, p)| badged.get_pixel(*x, *y) != *p)
            .any(|(x, y, _)| x < 250 || y < 350);
        assert!(!changed_outside);
    }

    #[test]
    fn device_profile_uses_screen_ratio() {
        let options = StyleOptions {
            aspect_ratio: AspectRatio::DeviceScreen,
            ..flat_options()
        };
        let out = Compositor::new(RasterBackend::new(Arc::new(FontBook::empty())), 2.5)
            .render(&red_artwork(), &metadata(), &options)
            .unwrap();
        assert_eq!(out.dimensions(), (300, 750));
    }

    #[test]
    fn empty_artwork_is_a_decode_failure() {
        let err = compositor()
            .render(&RgbaImage::new(0, 0), &metadata(), &flat_options())
            .unwrap_err();
        assert!(matches!(err, CompositionError::SourceDecodeFailed(_)));
    }

    #[test]
    fn oversized_canvas_fails_surface_creation() {
        let artwork = RgbaImage::new(13000, 1);
        let err = compositor()
            .render(&artwork, &metadata(), &flat_options())
            .unwrap_err();
        assert!(matches!(
            err,
            CompositionError::SurfaceCreationFailed { width: 13000, .. }
        ));
    }

    #[test]
    fn undecodable_bytes_fail() {
        assert!(matches!(
            decode_artwork(b"definitely not an image"),
            Err(CompositionError::SourceDecodeFailed(_))
        ));
    }
}
