use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusttype::{point, Font, Scale};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::FontSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FontFamily {
    Proportional,
    Monospaced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FontWeight {
    Bold,
    Regular,
    Light,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FontDescriptor {
    pub family: FontFamily,
    pub weight: FontWeight,
    /// Pixel size (em height).
    pub size: f32,
}

const SYSTEM_FONT_DIRS: &[&str] = &[
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/System/Library/Fonts",
    "/Library/Fonts",
    "C:\\Windows\\Fonts",
];

fn candidates(family: FontFamily, weight: FontWeight) -> &'static [&'static str] {
    use FontFamily::*;
    use FontWeight::*;
    match (family, weight) {
        (Proportional, Bold) => &[
            "DejaVuSans-Bold.ttf",
            "LiberationSans-Bold.ttf",
            "NotoSans-Bold.ttf",
            "Arial Bold.ttf",
            "arialbd.ttf",
        ],
        (Proportional, Regular) => &[
            "DejaVuSans.ttf",
            "LiberationSans-Regular.ttf",
            "NotoSans-Regular.ttf",
            "Arial.ttf",
            "arial.ttf",
        ],
        (Proportional, Light) => &[
            "DejaVuSans-ExtraLight.ttf",
            "NotoSans-Light.ttf",
            "segoeuil.ttf",
        ],
        (Monospaced, Bold) => &[
            "DejaVuSansMono-Bold.ttf",
            "LiberationMono-Bold.ttf",
            "NotoSansMono-Bold.ttf",
            "Courier New Bold.ttf",
            "courbd.ttf",
        ],
        (Monospaced, Regular) => &[
            "DejaVuSansMono.ttf",
            "LiberationMono-Regular.ttf",
            "NotoSansMono-Regular.ttf",
            "Courier New.ttf",
            "cour.ttf",
        ],
        (Monospaced, Light) => &["NotoSansMono-Light.ttf"],
    }
}

const ALL_FACES: [(FontFamily, FontWeight); 6] = [
    (FontFamily::Proportional, FontWeight::Bold),
    (FontFamily::Proportional, FontWeight::Regular),
    (FontFamily::Proportional, FontWeight::Light),
    (FontFamily::Monospaced, FontWeight::Bold),
    (FontFamily::Monospaced, FontWeight::Regular),
    (FontFamily::Monospaced, FontWeight::Light),
];

/// The faces available to a drawing backend.
///
/// Missing faces are tolerated: light and bold fall back to regular, and a
/// family with no face at all is measured with a fixed metric model.
#[derive(Default)]
pub struct FontBook {
    faces: HashMap<(FontFamily, FontWeight), Font<'static>>,
}

impl FontBook {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(settings: &FontSettings) -> Self {
        let mut book = Self::empty();

        for (family, weight) in ALL_FACES {
            if let Some(path) = settings.path_for(family, weight) {
                match load_face(path) {
                    Ok(font) => {
                        book.insert(family, weight, font);
                    }
                    Err(e) => warn!("ignoring font {}: {e:#}", path.display()),
                }
            }
        }

        let mut dirs: Vec<PathBuf> = settings.dirs.clone();
        if settings.discover_system {
            dirs.extend(SYSTEM_FONT_DIRS.iter().map(PathBuf::from));
            if let Some(base) = directories::BaseDirs::new() {
                dirs.push(base.home_dir().join(".local/share/fonts"));
                dirs.push(base.home_dir().join("Library/Fonts"));
            }
        }
        let index = index_font_files(&dirs);

        for (family, weight) in ALL_FACES {
            if book.faces.contains_key(&(family, weight)) {
                continue;
            }
            let found = candidates(family, weight)
                .iter()
                .find_map(|name| index.get(*name));
            if let Some(path) = found {
                match load_face(path) {
                    Ok(font) => {
                        debug!("using {} for {family:?} {weight:?}", path.display());
                        book.insert(family, weight, font);
                    }
                    Err(e) => debug!("skipping font {}: {e:#}", path.display()),
                }
            }
        }

        if book.faces.is_empty() {
            warn!("no usable fonts found; text will be measured but not drawn");
        }
        book
    }

    pub fn insert(&mut self, family: FontFamily, weight: FontWeight, font: Font<'static>) {
        self.faces.insert((family, weight), font);
    }

    pub fn face(&self, font: &FontDescriptor) -> Option<&Font<'static>> {
        self.faces
            .get(&(font.family, font.weight))
            .or_else(|| self.faces.get(&(font.family, FontWeight::Regular)))
    }

    pub fn line_height(&self, font: &FontDescriptor) -> f64 {
        match self.face(font) {
            Some(face) => {
                let v = face.v_metrics(Scale::uniform(font.size));
                (v.ascent - v.descent + v.line_gap) as f64
            }
            None => font.size as f64 * 1.2,
        }
    }

    /// Advance width of a single line of text.
    pub fn text_width(&self, font: &FontDescriptor, text: &str) -> f64 {
        let Some(face) = self.face(font) else {
            let advance = match font.family {
                FontFamily::Proportional => 0.55,
                FontFamily::Monospaced => 0.6,
            };
            return text.chars().count() as f64 * font.size as f64 * advance;
        };

        let scale = Scale::uniform(font.size);
        let mut width = 0.0f32;
        let mut prev = None;
        for ch in text.chars() {
            let glyph = face.glyph(ch);
            if let Some(prev) = prev {
                width += face.pair_kerning(scale, prev, glyph.id());
            }
            prev = Some(glyph.id());
            width += glyph.scaled(scale).h_metrics().advance_width;
        }
        width as f64
    }

    /// Greedy word wrap. Words wider than `max_width` are broken between
    /// characters.
    pub fn wrap_lines(&self, font: &FontDescriptor, text: &str, max_width: f64) -> Vec<String> {
        let mut lines = Vec::new();

        for paragraph in text.lines() {
            let mut line = String::new();
            for word in paragraph.split_whitespace() {
                let candidate = if line.is_empty() {
                    word.to_string()
                } else {
                    format!("{line} {word}")
                };
                if self.text_width(font, &candidate) <= max_width {
                    line = candidate;
                    continue;
                }

                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                if self.text_width(font, word) <= max_width {
                    line = word.to_string();
                    continue;
                }

                for ch in word.chars() {
                    line.push(ch);
                    if line.chars().count() > 1 && self.text_width(font, &line) > max_width {
                        line.pop();
                        lines.push(std::mem::take(&mut line));
                        line.push(ch);
                    }
                }
            }
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    pub fn text_height(&self, font: &FontDescriptor, text: &str, max_width: f64) -> f64 {
        self.wrap_lines(font, text, max_width).len() as f64 * self.line_height(font)
    }

    /// Rasterizes one line with its left edge at `x` and top at `y`, handing
    /// each covered pixel and its coverage to `plot`.
    pub fn rasterize_line(
        &self,
        font: &FontDescriptor,
        text: &str,
        x: f64,
        y: f64,
        mut plot: impl FnMut(i32, i32, f32),
    ) -> bool {
        let Some(face) = self.face(font) else {
            return false;
        };

        let scale = Scale::uniform(font.size);
        let baseline = y as f32 + face.v_metrics(scale).ascent;
        let mut caret = x as f32;
        let mut prev = None;
        for ch in text.chars() {
            let glyph = face.glyph(ch);
            if let Some(prev) = prev {
                caret += face.pair_kerning(scale, prev, glyph.id());
            }
            prev = Some(glyph.id());

            let glyph = glyph.scaled(scale);
            let advance = glyph.h_metrics().advance_width;
            let glyph = glyph.positioned(point(caret, baseline));
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|gx, gy, v| plot(bb.min.x + gx as i32, bb.min.y + gy as i32, v));
            }
            caret += advance;
        }
        true
    }
}

fn load_face(path: &Path) -> anyhow::Result<Font<'static>> {
    let data = std::fs::read(path)?;
    Font::try_from_vec(data).ok_or_else(|| anyhow::anyhow!("not a TrueType/OpenType font"))
}

fn index_font_files(dirs: &[PathBuf]) -> HashMap<String, PathBuf> {
    let mut index = HashMap::new();
    for dir in dirs.iter().filter(|d| d.is_dir()) {
        for entry in WalkDir::new(dir)
            .max_depth(5)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            index.entry(name).or_insert_with(|| entry.path().to_path_buf());
        }
    }
    index
}

/// A book holding the bundled DejaVu Sans as the proportional regular face.
#[cfg(test)]
pub(crate) fn fixture_book() -> FontBook {
    static DEJAVU_SANS: &[u8] = include_bytes!("../tests/fixtures/DejaVuSans.ttf");
    let mut book = FontBook::empty();
    let font = Font::try_from_bytes(DEJAVU_SANS).expect("bundled font parses");
    book.insert(FontFamily::Proportional, FontWeight::Regular, font);
    book
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sans(size: f32) -> FontDescriptor {
        FontDescriptor {
            family: FontFamily::Proportional,
            weight: FontWeight::Regular,
            size,
        }
    }

    #[test]
    fn metric_model_without_faces() {
        let book = FontBook::empty();
        let font = sans(20.0);
        assert!((book.line_height(&font) - 24.0).abs() < 1e-6);
        assert!((book.text_width(&font, "abcd") - 44.0).abs() < 1e-6);
    }

    #[test]
    fn short_text_stays_on_one_line() {
        let book = FontBook::empty();
        let lines = book.wrap_lines(&sans(10.0), "Hello world", 1000.0);
        assert_eq!(lines, vec!["Hello world".to_string()]);
    }

    #[test]
    fn wraps_between_words() {
        let book = FontBook::empty();
        // 5.5 units per char at size 10; "aaaa bbbb" is 49.5 wide.
        let lines = book.wrap_lines(&sans(10.0), "aaaa bbbb cccc", 40.0);
        assert_eq!(lines, vec!["aaaa", "bbbb", "cccc"]);
    }

    #[test]
    fn breaks_overlong_words() {
        let book = FontBook::empty();
        let lines = book.wrap_lines(&sans(10.0), "abcdefghij", 23.0);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn empty_text_has_no_height() {
        let book = FontBook::empty();
        assert_eq!(book.text_height(&sans(10.0), "", 100.0), 0.0);
    }

    #[test]
    fn height_counts_wrapped_lines() {
        let book = FontBook::empty();
        let h = book.text_height(&sans(10.0), "aaaa bbbb cccc", 40.0);
        assert!((h - 36.0).abs() < 1e-6);
    }

    #[test]
    fn whitespace_only_text_has_no_lines() {
        let book = FontBook::empty();
        assert!(book.wrap_lines(&sans(10.0), "   ", 100.0).is_empty());
        assert_eq!(book.text_height(&sans(10.0), " \t ", 100.0), 0.0);
        assert_eq!(book.wrap_lines(&sans(10.0), "a\n \nb", 100.0), vec!["a", "b"]);
    }

    #[test]
    fn bundled_face_measures_and_rasterizes() {
        let book = fixture_book();
        let bold = FontDescriptor {
            weight: FontWeight::Bold,
            ..sans(20.0)
        };
        // Bold falls back to the regular face rather than the metric model.
        assert!(book.face(&bold).is_some());
        assert!(book.text_width(&sans(20.0), "ii") < book.text_width(&sans(20.0), "WW"));

        let mut ink = Vec::new();
        let drawn = book.rasterize_line(&sans(20.0), "H", 10.0, 5.0, |x, y, v| {
            if v > 0.5 {
                ink.push((x, y));
            }
        });
        assert!(drawn);
        assert!(!ink.is_empty());
        let line_bottom = 5.0 + book.line_height(&sans(20.0));
        assert!(ink
            .iter()
            .all(|&(x, y)| x >= 10 && (y as f64) >= 5.0 && (y as f64) < line_bottom));
    }

    #[test]
    fn rasterizing_without_a_face_reports_nothing_drawn() {
        let book = FontBook::empty();
        let mut hits = 0;
        let drawn = book.rasterize_line(&sans(10.0), "x", 0.0, 0.0, |_, _, _| hits += 1);
        assert!(!drawn);
        assert_eq!(hits, 0);
    }
}
