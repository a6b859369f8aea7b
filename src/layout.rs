use serde::{Deserialize, Serialize};

use crate::surface::Rect;

/// Horizontal padding around the artwork, as a fraction of canvas width.
pub const PADDING_RATIO: f64 = 0.05;
/// Vertical gap between consecutive text blocks.
pub const LINE_GAP: f64 = 15.0;
/// Gap between artwork and text in the tall profiles, as a fraction of
/// canvas height.
pub const TALL_ARTWORK_GAP_RATIO: f64 = 0.05;
/// QR badge side as a fraction of artwork width.
pub const QR_BADGE_RATIO: f64 = 0.12;
/// Distance from the badge to the canvas edges, as a fraction of artwork width.
pub const QR_BADGE_INSET_RATIO: f64 = 0.03;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AspectRatio {
    /// 3:4, artwork pinned to the top.
    Portrait,
    /// 9:16, artwork and text centered as a group.
    Story,
    /// Current screen's height/width ratio, centered like `Story`.
    DeviceScreen,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 3] = [
        AspectRatio::Portrait,
        AspectRatio::Story,
        AspectRatio::DeviceScreen,
    ];

    /// Height/width of the canvas. `screen_ratio` only matters for
    /// `DeviceScreen`.
    pub fn height_ratio(&self, screen_ratio: f64) -> f64 {
        match self {
            AspectRatio::Portrait => 4.0 / 3.0,
            AspectRatio::Story => 16.0 / 9.0,
            AspectRatio::DeviceScreen => screen_ratio,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AspectRatio::Portrait => "3x4",
            AspectRatio::Story => "9x16",
            AspectRatio::DeviceScreen => "screen",
        }
    }
}

/// Canvas dimensions for an artwork `width` pixels wide.
pub fn canvas_size(width: u32, aspect: AspectRatio, screen_ratio: f64) -> (u32, u32) {
    let height = (width as f64 * aspect.height_ratio(screen_ratio)).round();
    (width, height.max(0.0) as u32)
}

/// Measured heights of the three text blocks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextHeights {
    pub title: f64,
    pub subtitle: f64,
    pub details: f64,
}

impl TextHeights {
    pub fn block_height(&self) -> f64 {
        self.title + LINE_GAP + self.subtitle + LINE_GAP + self.details
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutRects {
    pub artwork: Rect,
    pub title: Rect,
    pub subtitle: Rect,
    pub details: Rect,
    pub qr: Option<Rect>,
}

pub fn padding(canvas_width: f64) -> f64 {
    canvas_width * PADDING_RATIO
}

pub fn compute_layout(
    canvas_width: f64,
    canvas_height: f64,
    aspect: AspectRatio,
    heights: &TextHeights,
    with_qr: bool,
) -> LayoutRects {
    let pad = padding(canvas_width);
    let side = (canvas_width - 2.0 * pad).max(0.0);
    let block = heights.block_height();

    let (artwork_y, text_top) = match aspect {
        AspectRatio::Portrait => {
            let artwork_bottom = pad + side;
            let remaining = canvas_height - artwork_bottom;
            (pad, artwork_bottom + ((remaining - block) / 2.0).max(0.0))
        }
        AspectRatio::Story | AspectRatio::DeviceScreen => {
            let gap = canvas_height * TALL_ARTWORK_GAP_RATIO;
            let group = side + gap + block;
            let top = ((canvas_height - group) / 2.0).max(0.0);
            (top, top + side + gap)
        }
    };

    let artwork = Rect::new(pad, artwork_y, side, side);
    let title = Rect::new(pad, text_top, side, heights.title);
    let subtitle = Rect::new(pad, title.bottom() + LINE_GAP, side, heights.subtitle);
    let details = Rect::new(pad, subtitle.bottom() + LINE_GAP, side, heights.details);

    let qr = with_qr.then(|| qr_badge_rect(canvas_width, canvas_height));

    LayoutRects {
        artwork,
        title,
        subtitle,
        details,
        qr,
    }
}

/// Height left for the text block (both gaps included) once the artwork
/// is placed.
pub fn text_space(canvas_width: f64, canvas_height: f64, aspect: AspectRatio) -> f64 {
    let pad = padding(canvas_width);
    let side = (canvas_width - 2.0 * pad).max(0.0);
    let used = match aspect {
        AspectRatio::Portrait => pad + side,
        AspectRatio::Story | AspectRatio::DeviceScreen => {
            side + canvas_height * TALL_ARTWORK_GAP_RATIO
        }
    };
    (canvas_height - used).max(0.0)
}

/// Line counts for title, subtitle and details whose block fits in
/// `available`. Lines come off the title first, then the subtitle, then the
/// details, down to one line each; only then are whole blocks dropped,
/// details first.
pub fn fit_line_counts(available: f64, wanted: [usize; 3], line_heights: [f64; 3]) -> [usize; 3] {
    let block = |counts: &[usize; 3]| {
        counts
            .iter()
            .zip(line_heights)
            .map(|(&n, h)| n as f64 * h)
            .sum::<f64>()
            + 2.0 * LINE_GAP
    };

    let mut counts = wanted;
    for (floor, order) in [(1, [0, 1, 2]), (0, [2, 1, 0])] {
        for i in order {
            while counts[i] > floor && block(&counts) > available + 1e-9 {
                counts[i] -= 1;
            }
        }
    }
    counts
}

/// Badge square in the bottom-right corner.
pub fn qr_badge_rect(canvas_width: f64, canvas_height: f64) -> Rect {
    let size = canvas_width * QR_BADGE_RATIO;
    let inset = canvas_width * QR_BADGE_INSET_RATIO;
    Rect::new(
        canvas_width - size - inset,
        canvas_height - size - inset,
        size,
        size,
    )
}
