use image::RgbaImage;

use crate::color::Color;
use crate::error::CompositionResult;
use crate::fonts::FontDescriptor;

/// Axis-aligned rectangle in canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Shrinks every side by `amount`.
    pub fn inset(&self, amount: f64) -> Rect {
        Rect::new(
            self.x + amount,
            self.y + amount,
            (self.width - 2.0 * amount).max(0.0),
            (self.height - 2.0 * amount).max(0.0),
        )
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// Soft drop shadow drawn beneath a shape or text run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shadow {
    pub offset_x: f64,
    pub offset_y: f64,
    /// Gaussian sigma of the shadow edge.
    pub blur: f32,
    pub color: Color,
}

pub trait DrawingSurface {
    fn size(&self) -> (u32, u32);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Two-stop linear gradient running from `top` at the rect's top edge
    /// to `bottom` at its bottom edge.
    fn fill_vertical_gradient(&mut self, rect: Rect, top: Color, bottom: Color);

    /// Draws `image` stretched to `rect`.
    fn draw_image(&mut self, image: &RgbaImage, rect: Rect);

    /// Draws `image` stretched to `rect`, clipped to a rounded rectangle,
    /// with an optional shadow cast by the clip shape.
    fn draw_image_rounded(
        &mut self,
        image: &RgbaImage,
        rect: Rect,
        radius: f64,
        shadow: Option<Shadow>,
    );

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f64, color: Color);

    /// Strokes the rounded rectangle outline, centered on the path.
    fn stroke_rounded_rect(&mut self, rect: Rect, radius: f64, line_width: f64, color: Color);

    fn line_height(&self, font: &FontDescriptor) -> f64;

    /// Advance width of a single unwrapped line.
    fn text_width(&self, text: &str, font: &FontDescriptor) -> f64;

    /// Splits `text` into lines no wider than `max_width` where possible.
    fn wrap_text(&self, text: &str, font: &FontDescriptor, max_width: f64) -> Vec<String>;

    /// Height of `text` once wrapped to `max_width` in `font`.
    fn measure_text(&self, text: &str, font: &FontDescriptor, max_width: f64) -> f64 {
        self.wrap_text(text, font, max_width).len() as f64 * self.line_height(font)
    }

    /// Draws `text` wrapped to `rect.width`, lines centered, starting at the
    /// top of `rect`.
    fn draw_text(
        &mut self,
        text: &str,
        font: &FontDescriptor,
        rect: Rect,
        color: Color,
        shadow: Option<Shadow>,
    );

    /// Flattens the surface into an opaque bitmap.
    fn finish(self) -> RgbaImage;
}

/// Creates drawing surfaces for one target environment.
pub trait SurfaceBackend {
    type Surface: DrawingSurface;

    fn create_surface(&self, width: u32, height: u32) -> CompositionResult<Self::Surface>;
}
