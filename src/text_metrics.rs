use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use resvg::tiny_skia::{Path, PathBuilder};
use std::collections::HashMap;
use std::sync::Mutex;
use ttf_parser::{Face, GlyphId, OutlineBuilder};

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Advance per character, in font sizes, when no font can be loaded.
pub const FALLBACK_ADVANCE: f32 = 0.56;

/// Width of `text` set at `font_px`. Falls back to a fixed advance per
/// character when no matching font is installed.
pub fn measure_text_width(text: &str, font_px: f32, font_family: &str, weight: u16) -> f32 {
    if text.is_empty() || font_px <= 0.0 {
        return 0.0;
    }
    let fallback = || text.chars().count() as f32 * font_px * FALLBACK_ADVANCE;
    let Ok(mut guard) = TEXT_MEASURER.lock() else {
        return fallback();
    };
    match guard.face(font_family, weight) {
        Some(face) => face.measure(text, font_px),
        None => fallback(),
    }
}

/// Glyph outlines of `text`, or `None` when no font is available.
pub fn shape_text(text: &str, font_px: f32, font_family: &str, weight: u16) -> Option<GlyphRun> {
    if font_px <= 0.0 {
        return None;
    }
    let mut guard = TEXT_MEASURER.lock().ok()?;
    let face = guard.face(font_family, weight)?;
    Some(face.shape(text, font_px))
}

pub fn font_available(font_family: &str, weight: u16) -> bool {
    TEXT_MEASURER
        .lock()
        .map(|mut guard| guard.face(font_family, weight).is_some())
        .unwrap_or(false)
}

/// A line of text broken into glyphs. Outlines are in font units with y up;
/// multiply by `scale` (and flip y) to get pixels.
#[derive(Debug, Clone)]
pub struct GlyphRun {
    pub glyphs: Vec<ShapedGlyph>,
    pub scale: f32,
    /// Pixels above the baseline.
    pub ascent: f32,
    /// Pixels below the baseline (positive).
    pub descent: f32,
}

#[derive(Debug, Clone)]
pub struct ShapedGlyph {
    pub ch: char,
    /// Pixels.
    pub advance: f32,
    pub outline: Option<Path>,
}

impl GlyphRun {
    pub fn width(&self) -> f32 {
        self.glyphs.iter().map(|g| g.advance).sum()
    }
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    faces: HashMap<(String, u16), Option<FontFace>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            faces: HashMap::new(),
        }
    }

    fn face(&mut self, font_family: &str, weight: u16) -> Option<&mut FontFace> {
        let key = (normalize_family_key(font_family), weight.clamp(100, 900));
        if !self.faces.contains_key(&key) {
            let face = self.load_face(&key.0, key.1);
            if face.is_none() {
                log::warn!("no font found for {:?} (weight {}), using fallback metrics", key.0, key.1);
            }
            self.faces.insert(key.clone(), face);
        }
        self.faces.get_mut(&key).and_then(|face| face.as_mut())
    }

    fn load_face(&mut self, font_family: &str, weight: u16) -> Option<FontFace> {
        let names = family_list(font_family);
        let families: Vec<Family<'_>> = names
            .iter()
            .map(|token| match token {
                FamilyToken::Generic(family) => *family,
                FamilyToken::Name(name) => Family::Name(name.as_str()),
            })
            .collect();

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: Weight(weight),
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        let mut loaded: Option<FontFace> = None;
        self.db.with_face_data(id, |data, index| {
            loaded = FontFace::new(data.to_vec(), index);
        });
        loaded
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FamilyToken {
    Generic(Family<'static>),
    Name(String),
}

/// Splits a CSS-like family list, mapping generic names onto fontdb's.
fn family_list(font_family: &str) -> Vec<FamilyToken> {
    let mut order = Vec::new();
    for part in font_family.split(',') {
        let raw = part.trim().trim_matches('"').trim_matches('\'');
        if raw.is_empty() {
            continue;
        }
        let token = match raw.to_ascii_lowercase().as_str() {
            "serif" => FamilyToken::Generic(Family::Serif),
            "sans-serif" | "system-ui" | "ui-sans-serif" => FamilyToken::Generic(Family::SansSerif),
            "monospace" | "ui-monospace" => FamilyToken::Generic(Family::Monospace),
            "cursive" => FamilyToken::Generic(Family::Cursive),
            "fantasy" => FamilyToken::Generic(Family::Fantasy),
            _ => FamilyToken::Name(raw.to_string()),
        };
        order.push(token);
    }
    // always end on a generic so some installed face matches
    if !order.iter().any(|t| matches!(t, FamilyToken::Generic(_))) {
        order.push(FamilyToken::Generic(Family::SansSerif));
    }
    order
}

struct GlyphEntry {
    advance: u16,
    outline: Option<Path>,
}

struct FontFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    glyphs: HashMap<char, Option<GlyphEntry>>,
}

impl FontFace {
    fn new(data: Vec<u8>, index: u32) -> Option<Self> {
        let face = Face::parse(&data, index).ok()?;
        let units_per_em = face.units_per_em().max(1);
        let (ascender, descender) = (face.ascender(), face.descender());
        Some(Self {
            data,
            index,
            units_per_em,
            ascender,
            descender,
            glyphs: HashMap::new(),
        })
    }

    fn glyph(&mut self, ch: char) -> Option<&GlyphEntry> {
        let (data, index) = (&self.data, self.index);
        self.glyphs
            .entry(ch)
            .or_insert_with(|| {
                let face = Face::parse(data, index).ok()?;
                let id: GlyphId = face.glyph_index(ch)?;
                let mut builder = OutlinePath(PathBuilder::new());
                let outline = face.outline_glyph(id, &mut builder).and_then(|_| builder.0.finish());
                Some(GlyphEntry {
                    advance: face.glyph_hor_advance(id).unwrap_or(0),
                    outline,
                })
            })
            .as_ref()
    }

    fn measure(&mut self, text: &str, font_px: f32) -> f32 {
        let scale = font_px / self.units_per_em as f32;
        let fallback = font_px * FALLBACK_ADVANCE;
        let mut width = 0.0f32;
        for ch in text.chars().filter(|c| *c != '\n') {
            width += match self.glyph(ch) {
                Some(entry) if entry.advance > 0 => entry.advance as f32 * scale,
                _ => fallback,
            };
        }
        width.max(0.0)
    }

    fn shape(&mut self, text: &str, font_px: f32) -> GlyphRun {
        let scale = font_px / self.units_per_em as f32;
        let fallback = font_px * FALLBACK_ADVANCE;
        let mut glyphs = Vec::with_capacity(text.len());
        for ch in text.chars().filter(|c| *c != '\n') {
            let glyph = match self.glyph(ch) {
                Some(entry) => ShapedGlyph {
                    ch,
                    advance: if entry.advance > 0 { entry.advance as f32 * scale } else { fallback },
                    outline: entry.outline.clone(),
                },
                None => ShapedGlyph {
                    ch,
                    advance: fallback,
                    outline: None,
                },
            };
            glyphs.push(glyph);
        }
        GlyphRun {
            glyphs,
            scale,
            ascent: self.ascender as f32 * scale,
            descent: -(self.descender as f32) * scale,
        }
    }
}

struct OutlinePath(PathBuilder);

impl OutlineBuilder for OutlinePath {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.0.close();
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_list_maps_generics_and_appends_fallback() {
        assert_eq!(
            family_list("'Open Sans', serif"),
            vec![
                FamilyToken::Name("Open Sans".to_string()),
                FamilyToken::Generic(Family::Serif)
            ]
        );
        assert_eq!(
            family_list("Inter"),
            vec![
                FamilyToken::Name("Inter".to_string()),
                FamilyToken::Generic(Family::SansSerif)
            ]
        );
        assert_eq!(family_list(""), vec![FamilyToken::Generic(Family::SansSerif)]);
    }

    #[test]
    fn widths_grow_with_text_and_size() {
        let family = "sans-serif";
        assert_eq!(measure_text_width("", 12.0, family, 400), 0.0);
        let one = measure_text_width("m", 12.0, family, 400);
        let two = measure_text_width("mm", 12.0, family, 400);
        assert!(one > 0.0);
        assert!(two > one);
        assert!(measure_text_width("mm", 24.0, family, 400) > two);
    }

    #[test]
    fn shaped_run_matches_measurement() {
        let text = "Hello map";
        let family = "sans-serif";
        match shape_text(text, 20.0, family, 400) {
            Some(run) => {
                assert_eq!(run.glyphs.len(), text.chars().count());
                let measured = measure_text_width(text, 20.0, family, 400);
                assert!((run.width() - measured).abs() < 1e-3);
                assert!(run.ascent > 0.0);
            }
            None => assert!(!font_available(family, 400)),
        }
    }
}
