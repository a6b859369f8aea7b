use std::sync::Arc;

use image::{imageops, GrayImage, Luma, Rgba, RgbaImage};
use tiny_skia::{
    ColorU8, FillRule, GradientStop, IntSize, LinearGradient, Mask, Paint, Path, PathBuilder,
    Pixmap, PixmapPaint, Point, SpreadMode, Stroke, Transform,
};
use tracing::debug;

use crate::color::Color;
use crate::error::{CompositionError, CompositionResult};
use crate::fonts::{FontBook, FontDescriptor};
use crate::surface::{DrawingSurface, Rect, Shadow, SurfaceBackend};

/// Largest canvas side the backend will allocate.
pub const MAX_SURFACE_SIDE: u32 = 16384;

/// Bezier handle length for a quarter circle, as a fraction of the radius.
const KAPPA: f32 = 0.552_284_8;

pub struct RasterBackend {
    fonts: Arc<FontBook>,
}

impl RasterBackend {
    pub fn new(fonts: Arc<FontBook>) -> Self {
        Self { fonts }
    }
}

impl SurfaceBackend for RasterBackend {
    type Surface = RasterSurface;

    fn create_surface(&self, width: u32, height: u32) -> CompositionResult<RasterSurface> {
        if width > MAX_SURFACE_SIDE || height > MAX_SURFACE_SIDE {
            return Err(CompositionError::SurfaceCreationFailed { width, height });
        }
        let pixmap = Pixmap::new(width, height)
            .ok_or(CompositionError::SurfaceCreationFailed { width, height })?;
        Ok(RasterSurface {
            pixmap,
            fonts: Arc::clone(&self.fonts),
        })
    }
}

/// A `tiny_skia` pixmap plus the fonts text is drawn with.
pub struct RasterSurface {
    pixmap: Pixmap,
    fonts: Arc<FontBook>,
}

fn skia_color(color: Color) -> tiny_skia::Color {
    let Rgba([r, g, b, a]) = color.to_rgba8();
    tiny_skia::Color::from_rgba8(r, g, b, a)
}

fn solid(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(skia_color(color));
    paint.anti_alias = true;
    paint
}

fn skia_rect(rect: &Rect) -> Option<tiny_skia::Rect> {
    tiny_skia::Rect::from_xywh(
        rect.x as f32,
        rect.y as f32,
        rect.width as f32,
        rect.height as f32,
    )
}

fn rounded_rect_path(rect: &Rect, radius: f64) -> Option<Path> {
    let r = radius.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0) as f32;
    if r <= 0.0 {
        return skia_rect(rect).map(PathBuilder::from_rect);
    }

    let (left, top) = (rect.x as f32, rect.y as f32);
    let (right, bottom) = (rect.right() as f32, rect.bottom() as f32);
    let k = r * (1.0 - KAPPA);

    let mut pb = PathBuilder::new();
    pb.move_to(left + r, top);
    pb.line_to(right - r, top);
    pb.cubic_to(right - k, top, right, top + k, right, top + r);
    pb.line_to(right, bottom - r);
    pb.cubic_to(right, bottom - k, right - k, bottom, right - r, bottom);
    pb.line_to(left + r, bottom);
    pb.cubic_to(left + k, bottom, left, bottom - k, left, bottom - r);
    pb.line_to(left, top + r);
    pb.cubic_to(left, top + k, left + k, top, left + r, top);
    pb.close();
    pb.finish()
}

/// Rounds the rect to whole pixels so resized artwork lands pixel-exact.
fn snap(rect: &Rect) -> Rect {
    let x = rect.x.round();
    let y = rect.y.round();
    Rect::new(
        x,
        y,
        (rect.right().round() - x).max(0.0),
        (rect.bottom().round() - y).max(0.0),
    )
}

fn to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(image.width(), image.height())?;
    let data = image
        .pixels()
        .flat_map(|&Rgba([r, g, b, a])| {
            let c = ColorU8::from_rgba(r, g, b, a).premultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    Pixmap::from_vec(data, size)
}

impl RasterSurface {
    fn canvas_mask(&self) -> Option<Mask> {
        Mask::new(self.pixmap.width(), self.pixmap.height())
    }

    fn shape_mask(&self, path: &Path) -> Option<Mask> {
        let mut mask = self.canvas_mask()?;
        mask.fill_path(path, FillRule::Winding, true, Transform::identity());
        Some(mask)
    }

    /// Fills the whole canvas with `color`, weighted by `mask`.
    fn paint_through(&mut self, mask: &Mask, color: Color) {
        let (w, h) = (self.pixmap.width(), self.pixmap.height());
        if let Some(area) = tiny_skia::Rect::from_xywh(0.0, 0.0, w as f32, h as f32) {
            self.pixmap
                .fill_rect(area, &solid(color), Transform::identity(), Some(mask));
        }
    }

    /// Offsets and blurs the `coverage` found around `bounds`, then paints
    /// the result in the shadow color.
    fn cast_shadow(&mut self, coverage: &Mask, bounds: &Rect, shadow: &Shadow) {
        let (cw, ch) = (self.pixmap.width() as i64, self.pixmap.height() as i64);
        let spread = (shadow.blur.max(0.0) * 3.0).ceil() as f64;
        let (dx, dy) = (shadow.offset_x.round() as i64, shadow.offset_y.round() as i64);

        let x0 = ((bounds.x - spread).floor() as i64 + dx).clamp(0, cw);
        let y0 = ((bounds.y - spread).floor() as i64 + dy).clamp(0, ch);
        let x1 = ((bounds.right() + spread).ceil() as i64 + dx).clamp(0, cw);
        let y1 = ((bounds.bottom() + spread).ceil() as i64 + dy).clamp(0, ch);
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let source = coverage.data();
        let mut region = GrayImage::from_fn((x1 - x0) as u32, (y1 - y0) as u32, |i, j| {
            let sx = x0 + i as i64 - dx;
            let sy = y0 + j as i64 - dy;
            if sx < 0 || sy < 0 || sx >= cw || sy >= ch {
                return Luma([0]);
            }
            Luma([source[(sy * cw + sx) as usize]])
        });
        if shadow.blur > 0.0 {
            region = imageops::blur(&region, shadow.blur);
        }

        let Some(mut mask) = self.canvas_mask() else {
            return;
        };
        let data = mask.data_mut();
        for (i, j, &Luma([v])) in region.enumerate_pixels() {
            data[((y0 + j as i64) * cw + x0 + i as i64) as usize] = v;
        }
        self.paint_through(&mask, shadow.color);
    }

    /// Draws `image` resized to the snapped `rect`, optionally through `clip`.
    fn blit(&mut self, image: &RgbaImage, rect: &Rect, clip: Option<&Mask>) {
        let target = snap(rect);
        let (tw, th) = (target.width as u32, target.height as u32);
        if tw == 0 || th == 0 || image.width() == 0 || image.height() == 0 {
            return;
        }
        let resized;
        let source = if image.dimensions() == (tw, th) {
            image
        } else {
            resized = imageops::resize(image, tw, th, imageops::FilterType::Lanczos3);
            &resized
        };
        let Some(art) = to_pixmap(source) else {
            return;
        };
        self.pixmap.draw_pixmap(
            target.x as i32,
            target.y as i32,
            art.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            clip,
        );
    }
}

impl DrawingSurface for RasterSurface {
    fn size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        if let Some(r) = skia_rect(&rect) {
            self.pixmap
                .fill_rect(r, &solid(color), Transform::identity(), None);
        }
    }

    fn fill_vertical_gradient(&mut self, rect: Rect, top: Color, bottom: Color) {
        let Some(r) = skia_rect(&rect) else {
            return;
        };
        let shader = LinearGradient::new(
            Point::from_xy(0.0, rect.y as f32),
            Point::from_xy(0.0, rect.bottom() as f32),
            vec![
                GradientStop::new(0.0, skia_color(top)),
                GradientStop::new(1.0, skia_color(bottom)),
            ],
            SpreadMode::Pad,
            Transform::identity(),
        );
        let Some(shader) = shader else {
            debug!("degenerate gradient; filling with the top color");
            self.fill_rect(rect, top);
            return;
        };
        let mut paint = Paint::default();
        paint.shader = shader;
        paint.anti_alias = true;
        self.pixmap.fill_rect(r, &paint, Transform::identity(), None);
    }

    fn draw_image(&mut self, image: &RgbaImage, rect: Rect) {
        self.blit(image, &rect, None);
    }

    fn draw_image_rounded(
        &mut self,
        image: &RgbaImage,
        rect: Rect,
        radius: f64,
        shadow: Option<Shadow>,
    ) {
        let clip = snap(&rect);
        let Some(path) = rounded_rect_path(&clip, radius) else {
            return;
        };
        let Some(mask) = self.shape_mask(&path) else {
            return;
        };
        if let Some(shadow) = shadow {
            self.cast_shadow(&mask, &clip, &shadow);
        }
        self.blit(image, &clip, Some(&mask));
    }

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f64, color: Color) {
        if let Some(path) = rounded_rect_path(&rect, radius) {
            self.pixmap.fill_path(
                &path,
                &solid(color),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    fn stroke_rounded_rect(&mut self, rect: Rect, radius: f64, line_width: f64, color: Color) {
        let Some(path) = rounded_rect_path(&rect, radius) else {
            return;
        };
        let stroke = Stroke {
            width: line_width as f32,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &solid(color), &stroke, Transform::identity(), None);
    }

    fn line_height(&self, font: &FontDescriptor) -> f64 {
        self.fonts.line_height(font)
    }

    fn text_width(&self, text: &str, font: &FontDescriptor) -> f64 {
        self.fonts.text_width(font, text)
    }

    fn wrap_text(&self, text: &str, font: &FontDescriptor, max_width: f64) -> Vec<String> {
        self.fonts.wrap_lines(font, text, max_width)
    }

    fn measure_text(&self, text: &str, font: &FontDescriptor, max_width: f64) -> f64 {
        self.fonts.text_height(font, text, max_width)
    }

    fn draw_text(
        &mut self,
        text: &str,
        font: &FontDescriptor,
        rect: Rect,
        color: Color,
        shadow: Option<Shadow>,
    ) {
        let lines = self.fonts.wrap_lines(font, text, rect.width);
        if lines.is_empty() {
            return;
        }
        let Some(mut mask) = self.canvas_mask() else {
            return;
        };

        let (cw, ch) = (self.pixmap.width() as i32, self.pixmap.height() as i32);
        let line_height = self.fonts.line_height(font);
        let mut drawn = false;
        {
            let data = mask.data_mut();
            for (i, line) in lines.iter().enumerate() {
                let width = self.fonts.text_width(font, line);
                let x = rect.x + (rect.width - width) / 2.0;
                let y = rect.y + i as f64 * line_height;
                drawn |= self.fonts.rasterize_line(font, line, x, y, |px, py, v| {
                    if px < 0 || py < 0 || px >= cw || py >= ch {
                        return;
                    }
                    let p = &mut data[(py * cw + px) as usize];
                    *p = (*p).max((v.clamp(0.0, 1.0) * 255.0).round() as u8);
                });
            }
        }
        if !drawn {
            debug!("no face for {:?}/{:?}; skipping {text:?}", font.family, font.weight);
            return;
        }

        if let Some(shadow) = shadow {
            // Glyph ink may overhang the advance box.
            let overhang = (font.size / 2.0).ceil() as f64;
            let bounds = Rect::new(
                rect.x - overhang,
                rect.y - overhang,
                rect.width + 2.0 * overhang,
                line_height * lines.len() as f64 + 2.0 * overhang,
            );
            self.cast_shadow(&mask, &bounds, &shadow);
        }
        self.paint_through(&mask, color);
    }

    fn finish(self) -> RgbaImage {
        let (w, h) = self.size();
        let mut out = RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]));
        let Some(mut flat) = to_pixmap(&out) else {
            return out;
        };
        flat.draw_pixmap(
            0,
            0,
            self.pixmap.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        for (dst, src) in out.pixels_mut().zip(flat.pixels()) {
            let c = src.demultiply();
            *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
        }
        out
    }
}
