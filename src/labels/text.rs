//! Label text preparation and the size -> font mapping.

use crate::ir::MapNode;
use once_cell::sync::Lazy;
use regex::Regex;

static URL_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z][a-z0-9+.-]*://").expect("valid scheme pattern"));

const ELLIPSIS: char = '…';

/// Stroke thickness relative to the font size, against the weight that
/// draws strokes about that thick.
const THICKNESS_TO_WEIGHT: [(f32, u16); 9] = [
    (0.020, 100),
    (0.030, 200),
    (0.040, 300),
    (0.055, 400),
    (0.070, 500),
    (0.085, 600),
    (0.100, 700),
    (0.120, 800),
    (0.140, 900),
];

/// Strips a leading URL scheme and `www.`, then truncates to `max_chars`
/// characters (ellipsis included). `max_chars == 0` disables truncation.
pub fn prepare_label_text(raw: &str, max_chars: usize) -> String {
    let trimmed = raw.trim();
    let rest = URL_SCHEME.replace(trimmed, "");
    let rest = match rest.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("www.") => &rest[4..],
        _ => &rest[..],
    };
    let text = rest.trim();
    if max_chars == 0 || text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars - 1).collect();
    out.truncate(out.trim_end().len());
    out.push(ELLIPSIS);
    out
}

/// Linear node size -> font size scale, in pixels.
#[derive(Debug, Clone, Copy)]
pub struct FontScale {
    size_min: f32,
    size_max: f32,
    px_min: f32,
    px_max: f32,
}

impl FontScale {
    pub fn new(nodes: &[MapNode], min_pt: f32, max_pt: f32, dpi: f32) -> Self {
        let (size_min, size_max) = nodes.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), n| {
            (lo.min(n.size), hi.max(n.size))
        });
        Self {
            size_min,
            size_max,
            px_min: crate::config::pt_to_px(min_pt, dpi),
            px_max: crate::config::pt_to_px(max_pt, dpi),
        }
    }

    pub fn font_px(&self, size: f32) -> f32 {
        let span = self.size_max - self.size_min;
        if !span.is_finite() || span <= 0.0 {
            return self.px_max;
        }
        let t = ((size - self.size_min) / span).clamp(0.0, 1.0);
        self.px_min + t * (self.px_max - self.px_min)
    }
}

/// Nearest font weight whose strokes are `thickness_px` thick at `font_px`.
pub fn font_weight(thickness_px: f32, font_px: f32) -> u16 {
    if font_px <= 0.0 {
        return 400;
    }
    let ratio = thickness_px / font_px;
    THICKNESS_TO_WEIGHT
        .iter()
        .min_by(|a, b| (a.0 - ratio).abs().total_cmp(&(b.0 - ratio).abs()))
        .map(|(_, weight)| *weight)
        .unwrap_or(400)
}
