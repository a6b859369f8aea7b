use serde::{Deserialize, Serialize};

use crate::background::BackgroundStyle;
use crate::color::{is_light, Color};
use crate::fonts::{FontDescriptor, FontFamily, FontWeight};
use crate::surface::Shadow;

const TITLE_SIZE_RATIO: f32 = 0.065;
const SUBTITLE_SIZE_RATIO: f32 = 0.05;
const DETAILS_SIZE_RATIO: f32 = 0.04;
const SECONDARY_OPACITY: f32 = 0.8;

pub const TEXT_SHADOW: Shadow = Shadow {
    offset_x: 0.0,
    offset_y: 2.0,
    blur: 2.0,
    color: Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.3,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FontStyle {
    Standard,
    Monospaced,
}

impl FontStyle {
    fn family(&self) -> FontFamily {
        match self {
            FontStyle::Standard => FontFamily::Proportional,
            FontStyle::Monospaced => FontFamily::Monospaced,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyles {
    pub title: FontDescriptor,
    pub subtitle: FontDescriptor,
    pub details: FontDescriptor,
    pub primary: Color,
    pub secondary: Color,
    pub shadow: Shadow,
}

/// Resolves fonts sized off `artwork_width` and colors that contrast with
/// the background. For flat backgrounds contrast is judged against the
/// artwork's average color.
pub fn resolve_text_styles(
    font_style: FontStyle,
    background: BackgroundStyle,
    artwork_width: u32,
    artwork_average: &Color,
) -> TextStyles {
    let family = font_style.family();
    let width = artwork_width as f32;
    let font = |weight, ratio: f32| FontDescriptor {
        family,
        weight,
        size: width * ratio,
    };

    let primary = match background {
        BackgroundStyle::Blur | BackgroundStyle::Gradient => Color::WHITE,
        BackgroundStyle::AverageColor => {
            if is_light(artwork_average) {
                Color::BLACK
            } else {
                Color::WHITE
            }
        }
    };

    TextStyles {
        title: font(FontWeight::Bold, TITLE_SIZE_RATIO),
        subtitle: font(FontWeight::Regular, SUBTITLE_SIZE_RATIO),
        details: font(FontWeight::Light, DETAILS_SIZE_RATIO),
        primary,
        secondary: primary.with_alpha(primary.a * SECONDARY_OPACITY),
        shadow: TEXT_SHADOW,
    }
}
