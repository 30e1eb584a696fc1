//! # Raster Canvas
//!
//! A [`Canvas`] backed by a tiny-skia pixmap. Coordinates are points; the
//! canvas multiplies everything by `scale` pixels per point. Text is drawn
//! from real glyph outlines (shaped with rustybuzz) and stretched to the
//! width layout measured, so a bitmap matches the PDF geometry.

use tiny_skia::{
    FillRule, FilterQuality, Mask, Paint as SkPaint, Path, PathBuilder, Pixmap, PixmapPaint,
    Stroke as SkStroke, StrokeDash, Transform,
};
use ttf_parser::{GlyphId, OutlineBuilder};

use super::{round_rect_path, Bitmap, Canvas, Paint, PathSeg, Stroke};
use crate::error::{ReportError, Result};
use crate::font::FontContext;
use crate::geometry::{Point, Rect};
use crate::style::Color;
use crate::text::{shaping, TextBlock};

pub struct RasterCanvas<'f> {
    pixmap: Pixmap,
    scale: f32,
    clips: Vec<Mask>,
    fonts: &'f FontContext,
}

impl<'f> RasterCanvas<'f> {
    /// A canvas for a `width` x `height` point area at `scale` px/pt,
    /// filled with `background`.
    pub fn new(
        width: f64,
        height: f64,
        scale: f64,
        background: Color,
        fonts: &'f FontContext,
    ) -> Result<Self> {
        let px_w = (width * scale).round().max(1.0) as u32;
        let px_h = (height * scale).round().max(1.0) as u32;
        Self::with_pixel_size(px_w, px_h, scale, background, fonts)
    }

    pub fn with_pixel_size(
        px_width: u32,
        px_height: u32,
        scale: f64,
        background: Color,
        fonts: &'f FontContext,
    ) -> Result<Self> {
        let mut pixmap = Pixmap::new(px_width, px_height).ok_or_else(|| {
            ReportError::Render(format!("cannot allocate a {px_width}x{px_height} bitmap"))
        })?;
        pixmap.fill(to_sk_color(background));
        Ok(Self {
            pixmap,
            scale: scale as f32,
            clips: Vec::new(),
            fonts,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    /// Straight-alpha copy of the pixels.
    pub fn to_bitmap(&self) -> Bitmap {
        pixmap_to_bitmap(&self.pixmap)
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        self.pixmap
            .encode_png()
            .map_err(|e| ReportError::Render(format!("PNG encoding failed: {e}")))
    }

    fn device(&self) -> Transform {
        Transform::from_scale(self.scale, self.scale)
    }

    fn fill(&mut self, path: &Path, color: Color) {
        let paint = sk_paint(color);
        let ts = self.device();
        let mask = self.clips.last();
        self.pixmap
            .fill_path(path, &paint, FillRule::Winding, ts, mask);
    }

    fn stroke(&mut self, path: &Path, stroke: &Stroke) {
        let paint = sk_paint(stroke.color);
        let sk = sk_stroke(stroke);
        let ts = self.device();
        let mask = self.clips.last();
        self.pixmap.stroke_path(path, &paint, &sk, ts, mask);
    }

    fn paint_path(&mut self, path: &Path, paint: &Paint) {
        if let Some(fill) = paint.fill.filter(Color::is_visible) {
            self.fill(path, fill);
        }
        if let Some(stroke) = paint.stroke.filter(|s| s.width > 0.0) {
            self.stroke(path, &stroke);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_run(
        &mut self,
        text: &str,
        rtl: bool,
        x: f64,
        baseline: f64,
        width: f64,
        block: &TextBlock,
        color: Color,
    ) {
        let Some(data) = self.fonts.outline_data(&block.font) else {
            return;
        };
        let Ok(face) = ttf_parser::Face::parse(&data, 0) else {
            return;
        };
        let Some(glyphs) = shaping::shape_run(text, &data, rtl) else {
            return;
        };
        let upem = face.units_per_em().max(1);
        let shaped = shaping::shaped_width(&glyphs, upem, block.font_size);
        // Squeeze or stretch so the run covers exactly the measured width.
        let stretch = if shaped > 0.0 && width > 0.0 {
            (width / shaped) as f32
        } else {
            1.0
        };
        let unit = (block.font_size / upem as f64) as f32;
        let paint = sk_paint(color);
        let device = self.device();

        let mut pen = 0.0f32;
        for g in &glyphs {
            let mut builder = GlyphPathBuilder::new(unit);
            if face
                .outline_glyph(GlyphId(g.glyph_id), &mut builder)
                .is_some()
            {
                if let Some(path) = builder.finish() {
                    let gx = x as f32 + (pen + g.x_offset as f32 * unit) * stretch;
                    let gy = baseline as f32 - g.y_offset as f32 * unit;
                    let local = Transform::from_row(stretch, 0.0, 0.0, 1.0, gx, gy);
                    self.pixmap.fill_path(
                        &path,
                        &paint,
                        FillRule::Winding,
                        device.pre_concat(local),
                        self.clips.last(),
                    );
                }
            }
            pen += g.x_advance as f32 * unit;
        }
    }
}

impl Canvas for RasterCanvas<'_> {
    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        if let Some(path) = rect_path(rect) {
            self.paint_path(&path, paint);
        }
    }

    fn draw_round_rect(&mut self, rect: Rect, radius: f64, paint: &Paint) {
        if let Some(path) = segments_to_path(&round_rect_path(rect, radius)) {
            self.paint_path(&path, paint);
        }
    }

    fn draw_line(&mut self, from: Point, to: Point, stroke: &Stroke) {
        let mut pb = PathBuilder::new();
        pb.move_to(from.x as f32, from.y as f32);
        pb.line_to(to.x as f32, to.y as f32);
        if let Some(path) = pb.finish() {
            self.stroke(&path, stroke);
        }
    }

    fn draw_text(&mut self, block: &TextBlock, origin: Point, color: Color) {
        for line in &block.lines {
            for run in &line.runs {
                self.draw_run(
                    &run.text,
                    run.rtl,
                    origin.x + run.x,
                    origin.y + line.baseline,
                    run.width,
                    block,
                    color,
                );
            }
        }
    }

    fn draw_image(&mut self, image: &Bitmap, dest: Rect) {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 || dest.is_empty() {
            return;
        }
        let Some(source) = bitmap_to_pixmap(image) else {
            return;
        };
        let sx = (dest.width / w as f64) as f32;
        let sy = (dest.height / h as f64) as f32;
        let local = Transform::from_row(sx, 0.0, 0.0, sy, dest.x as f32, dest.y as f32);
        let mut paint = PixmapPaint::default();
        paint.quality = FilterQuality::Bilinear;
        let ts = self.device().pre_concat(local);
        self.pixmap
            .draw_pixmap(0, 0, source.as_ref(), &paint, ts, self.clips.last());
    }

    fn push_clip(&mut self, rect: Rect) {
        let Some(path) = rect_path(rect) else {
            // An empty clip hides everything until popped.
            if let Some(mask) = Mask::new(self.pixmap.width(), self.pixmap.height()) {
                self.clips.push(mask);
            }
            return;
        };
        let ts = self.device();
        let mask = match self.clips.last() {
            Some(current) => {
                let mut mask = current.clone();
                mask.intersect_path(&path, FillRule::Winding, true, ts);
                Some(mask)
            }
            None => Mask::new(self.pixmap.width(), self.pixmap.height()).map(|mut m| {
                m.fill_path(&path, FillRule::Winding, true, ts);
                m
            }),
        };
        if let Some(mask) = mask {
            self.clips.push(mask);
        }
    }

    fn pop_clip(&mut self) {
        self.clips.pop();
    }
}

fn rect_path(rect: Rect) -> Option<Path> {
    let r = tiny_skia::Rect::from_xywh(
        rect.x as f32,
        rect.y as f32,
        rect.width as f32,
        rect.height as f32,
    )?;
    Some(PathBuilder::from_rect(r))
}

fn segments_to_path(segs: &[PathSeg]) -> Option<Path> {
    let mut pb = PathBuilder::new();
    for seg in segs {
        match *seg {
            PathSeg::MoveTo(x, y) => pb.move_to(x as f32, y as f32),
            PathSeg::LineTo(x, y) => pb.line_to(x as f32, y as f32),
            PathSeg::CubicTo(x1, y1, x2, y2, x, y) => pb.cubic_to(
                x1 as f32, y1 as f32, x2 as f32, y2 as f32, x as f32, y as f32,
            ),
            PathSeg::Close => pb.close(),
        }
    }
    pb.finish()
}

fn to_sk_color(color: Color) -> tiny_skia::Color {
    let [r, g, b, a] = color.to_rgba8();
    tiny_skia::Color::from_rgba8(r, g, b, a)
}

fn sk_paint(color: Color) -> SkPaint<'static> {
    let mut paint = SkPaint::default();
    paint.set_color(to_sk_color(color));
    paint.anti_alias = true;
    paint
}

fn sk_stroke(stroke: &Stroke) -> SkStroke {
    let mut sk = SkStroke::default();
    sk.width = stroke.width.max(0.0) as f32;
    if let Some([on, off]) = stroke.dash {
        sk.dash = StrokeDash::new(vec![on.max(0.0) as f32, off.max(0.0) as f32], 0.0);
    }
    sk
}

/// Premultiplied pixmap from straight-alpha RGBA.
pub(crate) fn bitmap_to_pixmap(image: &Bitmap) -> Option<Pixmap> {
    let (width, height) = image.dimensions();
    let mut pixmap = Pixmap::new(width, height)?;
    for (src, dst) in image
        .as_raw()
        .chunks_exact(4)
        .zip(pixmap.data_mut().chunks_exact_mut(4))
    {
        let a = src[3];
        dst[0] = premul_u8(src[0], a);
        dst[1] = premul_u8(src[1], a);
        dst[2] = premul_u8(src[2], a);
        dst[3] = a;
    }
    Some(pixmap)
}

pub(crate) fn pixmap_to_bitmap(pixmap: &Pixmap) -> Bitmap {
    let mut raw = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        raw.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Bitmap::from_raw(pixmap.width(), pixmap.height(), raw)
        .unwrap_or_else(|| Bitmap::new(pixmap.width(), pixmap.height()))
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

/// Glyph outlines in font units to a y-down path in points.
struct GlyphPathBuilder {
    builder: PathBuilder,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            scale,
        }
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }

    fn pt(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale, -y * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.pt(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.pt(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.pt(x1, y1);
        let (x, y) = self.pt(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.pt(x1, y1);
        let (x2, y2) = self.pt(x2, y2);
        let (x, y) = self.pt(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}
