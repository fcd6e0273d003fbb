//! Glyph drawing, straight and along label paths.

use crate::labels::LabelPath;
use crate::raster::Canvas;
use crate::text_metrics::{GlyphRun, shape_text};
use crate::theme::Color;
use resvg::tiny_skia::{FillRule, Transform};

#[derive(Debug, Clone, Copy)]
pub struct TextStyle<'a> {
    pub family: &'a str,
    pub font_px: f32,
    pub weight: u16,
    pub color: Color,
    /// Pixels; 0 disables the halo.
    pub halo_width: f32,
    pub halo_color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

/// Placement of one glyph: the pixel frame its outline is drawn in.
fn glyph_frame(run: &GlyphRun, at: (f32, f32), angle: f32, shift_x: f32) -> Transform {
    Transform::from_translate(at.0, at.1)
        .pre_concat(Transform::from_rotate(angle.to_degrees()))
        .pre_concat(Transform::from_translate(shift_x, (run.ascent - run.descent) / 2.0))
        .pre_concat(Transform::from_scale(run.scale, -run.scale))
}

/// Halos go under every glyph first, so they never cover a neighbour.
fn draw_glyphs(canvas: &mut Canvas, run: &GlyphRun, frames: &[(usize, Transform)], style: &TextStyle<'_>) {
    if style.halo_width > 0.0 && style.halo_color.a > 0 && run.scale > 0.0 {
        for (index, frame) in frames {
            if let Some(outline) = &run.glyphs[*index].outline {
                canvas.stroke_path(outline, style.halo_width / run.scale, style.halo_color, *frame);
            }
        }
    }
    for (index, frame) in frames {
        if let Some(outline) = &run.glyphs[*index].outline {
            canvas.fill_path(outline, style.color, FillRule::Winding, *frame);
        }
    }
}

/// Draws `text` along `path`, centred on its length. Returns false when no
/// font is available.
pub fn draw_on_path(canvas: &mut Canvas, text: &str, path: &LabelPath, style: &TextStyle<'_>) -> bool {
    let Some(run) = shape_text(text, style.font_px, style.family, style.weight) else {
        return false;
    };
    let mut pen = ((path.length() - run.width()) / 2.0).max(0.0);
    let mut frames = Vec::with_capacity(run.glyphs.len());
    for (index, glyph) in run.glyphs.iter().enumerate() {
        let centre = pen + glyph.advance / 2.0;
        pen += glyph.advance;
        let Some(sample) = path.point_at(centre) else {
            continue;
        };
        frames.push((
            index,
            glyph_frame(&run, (sample.x, sample.y), sample.angle, -glyph.advance / 2.0),
        ));
    }
    draw_glyphs(canvas, &run, &frames, style);
    true
}

/// Draws one horizontal line of text whose vertical middle sits on
/// `anchor.1`. Returns the advance width, or `None` without a font.
pub fn draw_line(canvas: &mut Canvas, text: &str, anchor: (f32, f32), align: Align, style: &TextStyle<'_>) -> Option<f32> {
    let run = shape_text(text, style.font_px, style.family, style.weight)?;
    let width = run.width();
    let mut pen = match align {
        Align::Left => anchor.0,
        Align::Center => anchor.0 - width / 2.0,
    };
    let mut frames = Vec::with_capacity(run.glyphs.len());
    for (index, glyph) in run.glyphs.iter().enumerate() {
        frames.push((index, glyph_frame(&run, (pen, anchor.1), 0.0, 0.0)));
        pen += glyph.advance;
    }
    draw_glyphs(canvas, &run, &frames, style);
    Some(width)
}
