//! Premultiplied RGBA layers, the compositor and image output.
//!
//! Layers are immutable once built: drawing happens on a [`Canvas`] and
//! compositing always returns a new layer.

use crate::error::RenderError;
use crate::theme::Color;
use image::imageops::{self, FilterType};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use rayon::prelude::*;
use resvg::tiny_skia::{
    self, FillRule, FilterQuality, IntRect, IntSize, LineCap, LineJoin, Paint, PathBuilder, Pixmap,
    PixmapPaint, Stroke, Transform,
};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct RasterLayer {
    pixmap: Pixmap,
}

impl RasterLayer {
    /// Fully transparent layer. `None` for a zero-sized request.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Pixmap::new(width, height).map(|pixmap| Self { pixmap })
    }

    pub fn filled(width: u32, height: u32, color: Color) -> Option<Self> {
        let mut pixmap = Pixmap::new(width, height)?;
        pixmap.fill(color.to_skia());
        Some(Self { pixmap })
    }

    /// Wraps premultiplied RGBA bytes; `None` if the length does not match.
    pub fn from_premultiplied(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let size = IntSize::from_wh(width, height)?;
        Pixmap::from_vec(data, size).map(|pixmap| Self { pixmap })
    }

    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        Self { pixmap }
    }

    /// Builds a layer pixel by pixel from straight colours, rows in parallel.
    pub fn from_fn<F>(width: u32, height: u32, shade: F) -> Option<Self>
    where
        F: Fn(u32, u32) -> Color + Sync,
    {
        let row_bytes = width as usize * 4;
        if row_bytes == 0 || height == 0 {
            return None;
        }
        let mut data = vec![0u8; row_bytes * height as usize];
        data.par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let c = shade(x as u32, y as u32);
                    px.copy_from_slice(&premultiply(c));
                }
            });
        Self::from_premultiplied(width, height, data)
    }

    /// Copy of the `width` x `height` window at `(x, y)`.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Option<Self> {
        let rect = IntRect::from_xywh(x as i32, y as i32, width, height)?;
        self.pixmap.clone_rect(rect).map(|pixmap| Self { pixmap })
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Premultiplied RGBA bytes, row-major.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// Straight colour of one pixel; transparent outside the layer.
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        match self.pixmap.pixel(x, y) {
            Some(p) => {
                let c = p.demultiply();
                Color::rgba(c.red(), c.green(), c.blue(), c.alpha())
            }
            None => Color::TRANSPARENT,
        }
    }
}

fn premultiply(c: Color) -> [u8; 4] {
    let a = c.a as u16;
    let mul = |v: u8| ((v as u16 * a + 127) / 255) as u8;
    [mul(c.r), mul(c.g), mul(c.b), c.a]
}

/// Separable and non-separable blend modes used by the layer pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Normal,
    Multiply,
    Screen,
    Darken,
    Lighten,
    HardLight,
    Luminosity,
}

impl BlendMode {
    fn to_skia(self) -> tiny_skia::BlendMode {
        match self {
            BlendMode::Normal => tiny_skia::BlendMode::SourceOver,
            BlendMode::Multiply => tiny_skia::BlendMode::Multiply,
            BlendMode::Screen => tiny_skia::BlendMode::Screen,
            BlendMode::Darken => tiny_skia::BlendMode::Darken,
            BlendMode::Lighten => tiny_skia::BlendMode::Lighten,
            BlendMode::HardLight => tiny_skia::BlendMode::HardLight,
            BlendMode::Luminosity => tiny_skia::BlendMode::Luminosity,
        }
    }
}

/// Source-over composition of `top` onto `bottom`.
pub fn draw_on_top(bottom: &RasterLayer, top: &RasterLayer) -> RasterLayer {
    overlay(bottom, top, BlendMode::Normal)
}

/// Composites `top` onto `bottom` with `mode`. The result has the size of
/// `bottom`; `top` is anchored at the origin.
pub fn overlay(bottom: &RasterLayer, top: &RasterLayer, mode: BlendMode) -> RasterLayer {
    let mut out = bottom.pixmap.clone();
    let paint = PixmapPaint {
        opacity: 1.0,
        blend_mode: mode.to_skia(),
        quality: FilterQuality::Nearest,
    };
    out.draw_pixmap(0, 0, top.pixmap.as_ref(), &paint, Transform::identity(), None);
    RasterLayer { pixmap: out }
}

/// Scales every channel of a premultiplied layer, i.e. its opacity.
pub fn multiply_alpha(layer: &RasterLayer, factor: f32) -> RasterLayer {
    let factor = factor.clamp(0.0, 1.0);
    let mut pixmap = layer.pixmap.clone();
    for v in pixmap.data_mut() {
        *v = (*v as f32 * factor).round() as u8;
    }
    RasterLayer { pixmap }
}

/// Canvas rectangle covered by one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Tiles are numbered row-major on a `factor x factor` grid; neighbouring
/// tiles share their borders exactly so stitching has no gaps.
pub fn tile_rect(canvas: (u32, u32), factor: u32, index: u32) -> TileRect {
    let factor = factor.max(1);
    let (col, row) = (index % factor, index / factor);
    let split = |extent: u32, i: u32| (extent as u64 * i as u64 / factor as u64) as u32;
    let x = split(canvas.0, col);
    let y = split(canvas.1, row);
    TileRect {
        x,
        y,
        width: split(canvas.0, col + 1) - x,
        height: split(canvas.1, row + 1) - y,
    }
}

/// Reassembles tiles rendered at `tile_rect` positions into one layer.
pub fn stitch(canvas: (u32, u32), factor: u32, tiles: &[RasterLayer]) -> Result<RasterLayer, RenderError> {
    let mut out = Pixmap::new(canvas.0, canvas.1).ok_or(RenderError::EmptyCanvas {
        width: canvas.0,
        height: canvas.1,
    })?;
    let paint = PixmapPaint {
        blend_mode: tiny_skia::BlendMode::Source,
        ..PixmapPaint::default()
    };
    for (index, tile) in tiles.iter().enumerate() {
        let rect = tile_rect(canvas, factor, index as u32);
        out.draw_pixmap(
            rect.x as i32,
            rect.y as i32,
            tile.pixmap.as_ref(),
            &paint,
            Transform::identity(),
            None,
        );
    }
    Ok(RasterLayer { pixmap: out })
}

/// Bicubic (Catmull-Rom) resampling to an exact pixel size. The kernel is
/// widened by the scale factor when shrinking, so large downscales average
/// instead of skipping pixels.
pub fn resample(layer: &RasterLayer, width: u32, height: u32) -> Result<RasterLayer, RenderError> {
    if width == layer.width() && height == layer.height() {
        return Ok(layer.clone());
    }
    if width == 0 || height == 0 {
        return Err(RenderError::EmptyCanvas { width, height });
    }
    let empty = || RenderError::EmptyCanvas {
        width: layer.width(),
        height: layer.height(),
    };
    // premultiplied channels filter without dark fringes at alpha edges
    let source = image::RgbaImage::from_raw(layer.width(), layer.height(), layer.data().to_vec()).ok_or_else(empty)?;
    let mut data = imageops::resize(&source, width, height, FilterType::CatmullRom).into_raw();
    // ringing may push a colour channel above its alpha
    for px in data.chunks_exact_mut(4) {
        let a = px[3];
        for c in &mut px[..3] {
            *c = (*c).min(a);
        }
    }
    RasterLayer::from_premultiplied(width, height, data).ok_or(RenderError::EmptyCanvas { width, height })
}

/// Mutable drawing surface for one tile. Shapes are given in full-canvas
/// coordinates and shifted by the tile origin.
pub struct Canvas {
    pixmap: Pixmap,
    origin: (f32, f32),
}

impl Canvas {
    pub fn new(rect: TileRect) -> Result<Self, RenderError> {
        let pixmap = Pixmap::new(rect.width, rect.height).ok_or(RenderError::EmptyCanvas {
            width: rect.width,
            height: rect.height,
        })?;
        Ok(Self {
            pixmap,
            origin: (rect.x as f32, rect.y as f32),
        })
    }

    /// Surface of `width` x `height` whose top-left corner sits at `origin`
    /// in canvas coordinates; the origin may lie outside the canvas.
    pub fn with_origin(width: u32, height: u32, origin: (f32, f32)) -> Result<Self, RenderError> {
        let pixmap = Pixmap::new(width, height).ok_or(RenderError::EmptyCanvas { width, height })?;
        Ok(Self { pixmap, origin })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn origin(&self) -> (f32, f32) {
        self.origin
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translate(-self.origin.0, -self.origin.1)
    }

    /// Whether a canvas-space circle can touch this tile.
    pub fn touches(&self, x: f32, y: f32, r: f32) -> bool {
        let (ox, oy) = self.origin;
        x + r >= ox
            && y + r >= oy
            && x - r <= ox + self.pixmap.width() as f32
            && y - r <= oy + self.pixmap.height() as f32
    }

    pub fn fill(&mut self, color: Color) {
        self.pixmap.fill(color.to_skia());
    }

    pub fn fill_circle(&mut self, x: f32, y: f32, r: f32, color: Color) {
        if r <= 0.0 || color.a == 0 || !self.touches(x, y, r) {
            return;
        }
        if let Some(path) = PathBuilder::from_circle(x, y, r) {
            self.fill_path(&path, color, FillRule::EvenOdd, Transform::identity());
        }
    }

    pub fn stroke_circle(&mut self, x: f32, y: f32, r: f32, width: f32, color: Color) {
        if r <= 0.0 || width <= 0.0 || !self.touches(x, y, r + width) {
            return;
        }
        if let Some(path) = PathBuilder::from_circle(x, y, r) {
            self.stroke_path(&path, width, color, Transform::identity());
        }
    }

    pub fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Color) {
        if width <= 0.0 || color.a == 0 {
            return;
        }
        let mut pb = PathBuilder::new();
        pb.move_to(from.0, from.1);
        pb.line_to(to.0, to.1);
        if let Some(path) = pb.finish() {
            self.stroke_with(&path, width, color, LineCap::Butt, Transform::identity());
        }
    }

    /// Fills closed rings with the even-odd rule, so nested rings cut holes.
    pub fn fill_rings(&mut self, rings: &[Vec<(f32, f32)>], color: Color) {
        if let Some(path) = rings_path(rings)
            && color.a > 0
        {
            self.fill_path(&path, color, FillRule::EvenOdd, Transform::identity());
        }
    }

    pub fn stroke_rings(&mut self, rings: &[Vec<(f32, f32)>], width: f32, color: Color) {
        if let Some(path) = rings_path(rings)
            && width > 0.0
        {
            self.stroke_path(&path, width, color, Transform::identity());
        }
    }

    /// Fills a path given in a local frame placed on the canvas by `local`.
    pub fn fill_path(&mut self, path: &tiny_skia::Path, color: Color, rule: FillRule, local: Transform) {
        let paint = solid(color);
        let transform = local.post_concat(self.transform());
        self.pixmap.fill_path(path, &paint, rule, transform, None);
    }

    pub fn stroke_path(&mut self, path: &tiny_skia::Path, width: f32, color: Color, local: Transform) {
        self.stroke_with(path, width, color, LineCap::Round, local);
    }

    fn stroke_with(&mut self, path: &tiny_skia::Path, width: f32, color: Color, cap: LineCap, local: Transform) {
        let paint = solid(color);
        let stroke = Stroke {
            width,
            line_cap: cap,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        let transform = local.post_concat(self.transform());
        self.pixmap.stroke_path(path, &paint, &stroke, transform, None);
    }

    pub fn finish(self) -> RasterLayer {
        RasterLayer { pixmap: self.pixmap }
    }
}

fn solid(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}

fn rings_path(rings: &[Vec<(f32, f32)>]) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    for ring in rings.iter().filter(|r| r.len() >= 3) {
        pb.move_to(ring[0].0, ring[0].1);
        for &(x, y) in &ring[1..] {
            pb.line_to(x, y);
        }
        pb.close();
    }
    pb.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Result<Self, RenderError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            other => Err(RenderError::UnknownFormat(other.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, RenderError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| RenderError::UnknownFormat(path.display().to_string()))?;
        Self::from_name(ext)
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

/// Encodes a layer. JPEG has no alpha, so the layer is first flattened onto
/// `background`.
pub fn encode(
    layer: &RasterLayer,
    format: OutputFormat,
    background: Color,
    jpeg_quality: u8,
    path: &Path,
) -> Result<Vec<u8>, RenderError> {
    let encode_err = |message: String| RenderError::Encode {
        path: path.to_path_buf(),
        message,
    };
    let (w, h) = (layer.width(), layer.height());
    let mut bytes = Vec::new();
    match format {
        OutputFormat::Png => {
            let rgba: Vec<u8> = layer
                .pixmap
                .pixels()
                .iter()
                .flat_map(|p| {
                    let c = p.demultiply();
                    [c.red(), c.green(), c.blue(), c.alpha()]
                })
                .collect();
            PngEncoder::new(&mut bytes)
                .write_image(&rgba, w, h, ExtendedColorType::Rgba8)
                .map_err(|e| encode_err(e.to_string()))?;
        }
        OutputFormat::Jpeg => {
            let backdrop = RasterLayer::filled(w, h, Color { a: 255, ..background })
                .ok_or(RenderError::EmptyCanvas { width: w, height: h })?;
            let flat = draw_on_top(&backdrop, layer);
            let rgb: Vec<u8> = flat
                .pixmap
                .pixels()
                .iter()
                .flat_map(|p| {
                    let c = p.demultiply();
                    [c.red(), c.green(), c.blue()]
                })
                .collect();
            JpegEncoder::new_with_quality(&mut bytes, jpeg_quality.clamp(1, 100))
                .write_image(&rgb, w, h, ExtendedColorType::Rgb8)
                .map_err(|e| encode_err(e.to_string()))?;
        }
    }
    Ok(bytes)
}

pub fn write_layer(
    layer: &RasterLayer,
    path: &Path,
    format: OutputFormat,
    background: Color,
    jpeg_quality: u8,
) -> Result<(), RenderError> {
    let bytes = encode(layer, format, background, jpeg_quality, path)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| RenderError::OutputWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, bytes).map_err(|source| RenderError::OutputWrite {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Color, b: Color, tol: u8) -> bool {
        a.r.abs_diff(b.r) <= tol
            && a.g.abs_diff(b.g) <= tol
            && a.b.abs_diff(b.b) <= tol
            && a.a.abs_diff(b.a) <= tol
    }

    #[test]
    fn source_over_blends_half_alpha() {
        let bottom = RasterLayer::filled(4, 4, Color::rgb(0, 0, 255)).unwrap();
        let top = RasterLayer::filled(4, 4, Color::rgba(255, 0, 0, 128)).unwrap();
        let out = draw_on_top(&bottom, &top);
        assert!(close(out.pixel(1, 1), Color::rgb(128, 0, 127), 2), "{:?}", out.pixel(1, 1));
        // inputs untouched
        assert_eq!(bottom.pixel(1, 1), Color::rgb(0, 0, 255));
    }

    #[test]
    fn multiply_on_white_keeps_colour() {
        let white = RasterLayer::filled(3, 3, Color::WHITE).unwrap();
        let tint = RasterLayer::filled(3, 3, Color::rgb(100, 150, 200)).unwrap();
        let out = overlay(&white, &tint, BlendMode::Multiply);
        assert!(close(out.pixel(0, 0), Color::rgb(100, 150, 200), 1));
        let transparent = RasterLayer::new(3, 3).unwrap();
        let out = overlay(&white, &transparent, BlendMode::Multiply);
        assert_eq!(out.pixel(2, 2), Color::WHITE);
    }

    #[test]
    fn hard_light_multiplies_dark_sources_and_screens_light_ones() {
        let grey = RasterLayer::filled(2, 2, Color::rgb(100, 100, 100)).unwrap();
        let dark = RasterLayer::filled(2, 2, Color::rgb(64, 64, 64)).unwrap();
        let light = RasterLayer::filled(2, 2, Color::rgb(200, 200, 200)).unwrap();
        // 2 * s * d
        let out = overlay(&grey, &dark, BlendMode::HardLight);
        assert!(close(out.pixel(0, 0), Color::rgb(50, 50, 50), 2), "{:?}", out.pixel(0, 0));
        // 1 - (1 - d) * (1 - (2s - 1))
        let out = overlay(&grey, &light, BlendMode::HardLight);
        assert!(close(out.pixel(1, 1), Color::rgb(188, 188, 188), 2), "{:?}", out.pixel(1, 1));
    }

    #[test]
    fn multiply_scales_channels_and_honours_alpha() {
        let land = RasterLayer::filled(2, 2, Color::rgb(200, 100, 50)).unwrap();
        let shade = RasterLayer::filled(2, 2, Color::rgb(128, 128, 128)).unwrap();
        let out = overlay(&land, &shade, BlendMode::Multiply);
        assert!(close(out.pixel(1, 0), Color::rgb(100, 50, 25), 2), "{:?}", out.pixel(1, 0));
        // a half-transparent black shadow halves white
        let white = RasterLayer::filled(2, 2, Color::WHITE).unwrap();
        let shadow = RasterLayer::filled(2, 2, Color::rgba(0, 0, 0, 128)).unwrap();
        let out = overlay(&white, &shadow, BlendMode::Multiply);
        assert!(close(out.pixel(0, 1), Color::rgb(127, 127, 127), 2), "{:?}", out.pixel(0, 1));
    }

    #[test]
    fn from_fn_premultiplies() {
        let layer = RasterLayer::from_fn(2, 1, |x, _| {
            if x == 0 { Color::rgba(200, 100, 0, 255) } else { Color::rgba(200, 100, 0, 0) }
        })
        .unwrap();
        assert_eq!(&layer.data()[..4], &[200, 100, 0, 255]);
        assert_eq!(&layer.data()[4..], &[0, 0, 0, 0]);
        assert!(RasterLayer::from_fn(0, 3, |_, _| Color::BLACK).is_none());
    }

    #[test]
    fn tiles_partition_the_canvas() {
        let canvas = (101, 57);
        let factor = 3;
        let mut area = 0;
        for i in 0..factor * factor {
            let r = tile_rect(canvas, factor, i);
            area += r.width * r.height;
            if i % factor == factor - 1 {
                assert_eq!(r.x + r.width, canvas.0);
            }
        }
        assert_eq!(area, canvas.0 * canvas.1);
        assert_eq!(tile_rect(canvas, 3, 4), TileRect { x: 33, y: 19, width: 34, height: 19 });
    }

    #[test]
    fn stitch_places_tiles_row_major() {
        let canvas = (10, 10);
        let colors = [Color::rgb(255, 0, 0), Color::rgb(0, 255, 0), Color::rgb(0, 0, 255), Color::WHITE];
        let tiles: Vec<RasterLayer> = (0..4)
            .map(|i| {
                let r = tile_rect(canvas, 2, i);
                RasterLayer::filled(r.width, r.height, colors[i as usize]).unwrap()
            })
            .collect();
        let out = stitch(canvas, 2, &tiles).unwrap();
        assert_eq!(out.pixel(0, 0), colors[0]);
        assert_eq!(out.pixel(9, 0), colors[1]);
        assert_eq!(out.pixel(0, 9), colors[2]);
        assert_eq!(out.pixel(9, 9), colors[3]);
    }

    #[test]
    fn canvas_draws_in_canvas_coordinates() {
        let rect = TileRect { x: 50, y: 50, width: 20, height: 20 };
        let mut canvas = Canvas::new(rect).unwrap();
        canvas.fill_circle(60.0, 60.0, 4.0, Color::BLACK);
        // outside the tile: skipped entirely
        canvas.fill_circle(10.0, 10.0, 4.0, Color::BLACK);
        let layer = canvas.finish();
        assert_eq!(layer.pixel(10, 10), Color::BLACK);
        assert_eq!(layer.pixel(0, 0).a, 0);
    }

    #[test]
    fn resample_keeps_flat_colour() {
        let layer = RasterLayer::filled(40, 20, Color::rgb(10, 120, 240)).unwrap();
        let out = resample(&layer, 17, 9).unwrap();
        assert_eq!((out.width(), out.height()), (17, 9));
        assert!(close(out.pixel(8, 4), Color::rgb(10, 120, 240), 2));
    }

    #[test]
    fn large_downscale_averages_fine_stripes() {
        let stripes =
            RasterLayer::from_fn(64, 64, |x, _| if x % 2 == 0 { Color::BLACK } else { Color::WHITE }).unwrap();
        let out = resample(&stripes, 8, 8).unwrap();
        for y in 2..6 {
            for x in 2..6 {
                let p = out.pixel(x, y);
                assert!(p.r.abs_diff(128) <= 12, "({x}, {y}) = {p:?}");
                assert!(p.a >= 254);
            }
        }
    }

    #[test]
    fn png_keeps_straight_alpha_and_jpeg_flattens() {
        let layer = RasterLayer::filled(6, 4, Color { r: 200, g: 40, b: 0, a: 128 }).unwrap();
        let path = Path::new("map.png");

        let png = encode(&layer, OutputFormat::Png, Color::WHITE, 90, path).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (6, 4));
        let [r, g, b, a] = decoded.get_pixel(2, 2).0;
        assert_eq!(a, 128);
        assert!(r.abs_diff(200) <= 2 && g.abs_diff(40) <= 2 && b <= 2, "{r} {g} {b}");

        let jpeg = encode(&layer, OutputFormat::Jpeg, Color::WHITE, 95, path).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap().to_rgb8();
        let [r, _, b] = decoded.get_pixel(2, 2).0;
        // half red over white
        assert!(r >= 215 && b >= 110, "{r} {b}");
    }

    #[test]
    fn formats_from_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("a/map.PNG")).unwrap(), OutputFormat::Png);
        assert_eq!(OutputFormat::from_path(Path::new("map.jpeg")).unwrap(), OutputFormat::Jpeg);
        assert!(matches!(
            OutputFormat::from_path(Path::new("map.tiff")),
            Err(RenderError::UnknownFormat(_))
        ));
    }

    #[test]
    fn writes_png_and_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let layer = RasterLayer::filled(8, 8, Color::rgba(255, 0, 0, 128)).unwrap();
        let png = dir.path().join("out/map.png");
        write_layer(&layer, &png, OutputFormat::Png, Color::WHITE, 90).unwrap();
        let bytes = std::fs::read(&png).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        let jpg = dir.path().join("map.jpg");
        write_layer(&layer, &jpg, OutputFormat::Jpeg, Color::WHITE, 90).unwrap();
        let bytes = std::fs::read(&jpg).unwrap();
        assert_eq!(&bytes[..2], &[0xff, 0xd8]);
    }
}
