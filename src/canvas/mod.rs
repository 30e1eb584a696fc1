//! # Drawing Surfaces
//!
//! Layout code never talks to a file format. It draws through [`Canvas`]
//! and manages pages through [`PageSink`]. Two implementations ship with
//! the crate:
//!
//! - [`crate::pdf::PdfSink`], a multi-page PDF document;
//! - [`raster::RasterCanvas`], a single tiny-skia bitmap used for composed
//!   photo pages.
//!
//! Clickable links are a separate capability, [`LinkAnnotator`]. Sinks that
//! cannot carry links are wrapped in [`WithoutLinks`], so the choice is made
//! by the type the caller passes in.

pub mod raster;

use std::io::Write;

use crate::error::Result;
use crate::geometry::{Point, Rect};
use crate::style::Color;
use crate::text::TextBlock;

/// Decoded, orientation-corrected RGBA pixels.
pub type Bitmap = image::RgbaImage;

/// Bezier control-point factor for quarter circles.
pub(crate) const KAPPA: f64 = 0.5522847498;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f64,
    /// Dash on/off lengths. Solid when `None`.
    pub dash: Option<[f64; 2]>,
}

impl Stroke {
    pub fn solid(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            dash: None,
        }
    }

    pub fn dashed(color: Color, width: f64, dash: [f64; 2]) -> Self {
        Self {
            color,
            width,
            dash: Some(dash),
        }
    }
}

/// Fill and/or outline for a closed shape.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Paint {
    pub fill: Option<Color>,
    pub stroke: Option<Stroke>,
}

impl Paint {
    pub fn fill(color: Color) -> Self {
        Self {
            fill: Some(color),
            stroke: None,
        }
    }

    pub fn stroke(stroke: Stroke) -> Self {
        Self {
            fill: None,
            stroke: Some(stroke),
        }
    }

    pub fn fill_and_stroke(color: Color, stroke: Stroke) -> Self {
        Self {
            fill: Some(color),
            stroke: Some(stroke),
        }
    }
}

/// 2D drawing operations in top-left origin coordinates.
pub trait Canvas {
    fn draw_rect(&mut self, rect: Rect, paint: &Paint);
    fn draw_round_rect(&mut self, rect: Rect, radius: f64, paint: &Paint);
    fn draw_line(&mut self, from: Point, to: Point, stroke: &Stroke);
    /// Draw a laid-out block with its top-left corner at `origin`.
    fn draw_text(&mut self, block: &TextBlock, origin: Point, color: Color);
    /// Draw `image` stretched to `dest`. Callers compute aspect-correct
    /// rects first.
    fn draw_image(&mut self, image: &Bitmap, dest: Rect);
    /// Intersect the clip region with `rect` until the matching `pop_clip`.
    fn push_clip(&mut self, rect: Rect);
    fn pop_clip(&mut self);
}

/// Identifies a page started on a [`PageSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle(pub usize);

/// A multi-page document target. Drawing goes to the open page.
pub trait PageSink: Canvas {
    fn start_page(&mut self, width: f64, height: f64) -> PageHandle;
    fn finish_page(&mut self, page: PageHandle);
    fn page_count(&self) -> usize;
    fn write_document(&mut self, out: &mut dyn Write) -> Result<()>;
}

/// Clickable regions on a page.
pub trait LinkAnnotator {
    fn add_link(&mut self, page: PageHandle, rect: Rect, url: &str);
}

/// Adapts a sink that has no link support. Links are dropped; the text
/// under them still renders.
pub struct WithoutLinks<S>(pub S);

impl<S> WithoutLinks<S> {
    pub fn into_inner(self) -> S {
        self.0
    }
}

impl<S: Canvas> Canvas for WithoutLinks<S> {
    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        self.0.draw_rect(rect, paint)
    }
    fn draw_round_rect(&mut self, rect: Rect, radius: f64, paint: &Paint) {
        self.0.draw_round_rect(rect, radius, paint)
    }
    fn draw_line(&mut self, from: Point, to: Point, stroke: &Stroke) {
        self.0.draw_line(from, to, stroke)
    }
    fn draw_text(&mut self, block: &TextBlock, origin: Point, color: Color) {
        self.0.draw_text(block, origin, color)
    }
    fn draw_image(&mut self, image: &Bitmap, dest: Rect) {
        self.0.draw_image(image, dest)
    }
    fn push_clip(&mut self, rect: Rect) {
        self.0.push_clip(rect)
    }
    fn pop_clip(&mut self) {
        self.0.pop_clip()
    }
}

impl<S: PageSink> PageSink for WithoutLinks<S> {
    fn start_page(&mut self, width: f64, height: f64) -> PageHandle {
        self.0.start_page(width, height)
    }
    fn finish_page(&mut self, page: PageHandle) {
        self.0.finish_page(page)
    }
    fn page_count(&self) -> usize {
        self.0.page_count()
    }
    fn write_document(&mut self, out: &mut dyn Write) -> Result<()> {
        self.0.write_document(out)
    }
}

impl<S> LinkAnnotator for WithoutLinks<S> {
    fn add_link(&mut self, _page: PageHandle, _rect: Rect, _url: &str) {}
}

/// A recorded drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Rect {
        rect: Rect,
        paint: Paint,
    },
    RoundRect {
        rect: Rect,
        radius: f64,
        paint: Paint,
    },
    Line {
        from: Point,
        to: Point,
        stroke: Stroke,
    },
    Text {
        block: TextBlock,
        origin: Point,
        color: Color,
    },
    /// `image` indexes the recorder's image table.
    Image {
        dest: Rect,
        image: usize,
        pixel_size: (u32, u32),
    },
    PushClip(Rect),
    PopClip,
}

impl DrawCommand {
    /// Text of a text command, lines joined by newlines.
    pub fn text(&self) -> Option<String> {
        match self {
            DrawCommand::Text { block, .. } => Some(
                block
                    .lines
                    .iter()
                    .map(|l| l.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => None,
        }
    }
}

/// A canvas that only records what was drawn. Image pixels are dropped
/// after their size is noted.
#[derive(Debug, Default)]
pub struct Recorder {
    pub commands: Vec<DrawCommand>,
    images: usize,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn images(&self) -> impl Iterator<Item = (Rect, (u32, u32))> + '_ {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Image {
                dest, pixel_size, ..
            } => Some((*dest, *pixel_size)),
            _ => None,
        })
    }

    pub fn texts(&self) -> Vec<String> {
        self.commands.iter().filter_map(DrawCommand::text).collect()
    }
}

impl Canvas for Recorder {
    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        self.commands.push(DrawCommand::Rect {
            rect,
            paint: *paint,
        });
    }
    fn draw_round_rect(&mut self, rect: Rect, radius: f64, paint: &Paint) {
        self.commands.push(DrawCommand::RoundRect {
            rect,
            radius,
            paint: *paint,
        });
    }
    fn draw_line(&mut self, from: Point, to: Point, stroke: &Stroke) {
        self.commands.push(DrawCommand::Line {
            from,
            to,
            stroke: *stroke,
        });
    }
    fn draw_text(&mut self, block: &TextBlock, origin: Point, color: Color) {
        self.commands.push(DrawCommand::Text {
            block: block.clone(),
            origin,
            color,
        });
    }
    fn draw_image(&mut self, image: &Bitmap, dest: Rect) {
        self.commands.push(DrawCommand::Image {
            dest,
            image: self.images,
            pixel_size: image.dimensions(),
        });
        self.images += 1;
    }
    fn push_clip(&mut self, rect: Rect) {
        self.commands.push(DrawCommand::PushClip(rect));
    }
    fn pop_clip(&mut self) {
        self.commands.push(DrawCommand::PopClip);
    }
}

/// Outline segments shared by the vector and raster backends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PathSeg {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    CubicTo(f64, f64, f64, f64, f64, f64),
    Close,
}

/// A rounded rectangle as lines and quarter-circle cubics, clockwise from
/// the top-left corner in top-left origin space.
pub(crate) fn round_rect_path(rect: Rect, radius: f64) -> Vec<PathSeg> {
    let (x, y, w, h) = (rect.x, rect.y, rect.width, rect.height);
    let r = radius.max(0.0).min(w / 2.0).min(h / 2.0);
    if r <= 0.0 {
        return vec![
            PathSeg::MoveTo(x, y),
            PathSeg::LineTo(x + w, y),
            PathSeg::LineTo(x + w, y + h),
            PathSeg::LineTo(x, y + h),
            PathSeg::Close,
        ];
    }
    let k = r * KAPPA;
    vec![
        PathSeg::MoveTo(x + r, y),
        PathSeg::LineTo(x + w - r, y),
        PathSeg::CubicTo(x + w - r + k, y, x + w, y + r - k, x + w, y + r),
        PathSeg::LineTo(x + w, y + h - r),
        PathSeg::CubicTo(x + w, y + h - r + k, x + w - r + k, y + h, x + w - r, y + h),
        PathSeg::LineTo(x + r, y + h),
        PathSeg::CubicTo(x + r - k, y + h, x, y + h - r + k, x, y + h - r),
        PathSeg::LineTo(x, y + r),
        PathSeg::CubicTo(x, y + r - k, x + r - k, y, x + r, y),
        PathSeg::Close,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingSink {
        pages: usize,
        commands: usize,
    }

    impl Canvas for CountingSink {
        fn draw_rect(&mut self, _: Rect, _: &Paint) {
            self.commands += 1;
        }
        fn draw_round_rect(&mut self, _: Rect, _: f64, _: &Paint) {
            self.commands += 1;
        }
        fn draw_line(&mut self, _: Point, _: Point, _: &Stroke) {
            self.commands += 1;
        }
        fn draw_text(&mut self, _: &TextBlock, _: Point, _: Color) {
            self.commands += 1;
        }
        fn draw_image(&mut self, _: &Bitmap, _: Rect) {
            self.commands += 1;
        }
        fn push_clip(&mut self, _: Rect) {}
        fn pop_clip(&mut self) {}
    }

    impl PageSink for CountingSink {
        fn start_page(&mut self, _: f64, _: f64) -> PageHandle {
            self.pages += 1;
            PageHandle(self.pages - 1)
        }
        fn finish_page(&mut self, _: PageHandle) {}
        fn page_count(&self) -> usize {
            self.pages
        }
        fn write_document(&mut self, out: &mut dyn Write) -> Result<()> {
            write!(out, "{} pages", self.pages)?;
            Ok(())
        }
    }

    #[test]
    fn test_without_links_delegates_drawing() {
        let mut sink = WithoutLinks(CountingSink {
            pages: 0,
            commands: 0,
        });
        let page = sink.start_page(100.0, 100.0);
        sink.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), &Paint::fill(Color::BLACK));
        sink.add_link(page, Rect::new(0.0, 0.0, 10.0, 10.0), "https://example.com");
        sink.finish_page(page);
        let mut out = Vec::new();
        sink.write_document(&mut out).unwrap();
        assert_eq!(out, b"1 pages");
        assert_eq!(sink.into_inner().commands, 1);
    }

    #[test]
    fn test_recorder_tracks_images() {
        let mut rec = Recorder::new();
        let img = Bitmap::new(4, 3);
        rec.draw_image(&img, Rect::new(1.0, 2.0, 8.0, 6.0));
        rec.draw_image(&img, Rect::new(1.0, 2.0, 8.0, 6.0));
        let images: Vec<_> = rec.images().collect();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].1, (4, 3));
        assert!(matches!(rec.commands[1], DrawCommand::Image { image: 1, .. }));
    }

    #[test]
    fn test_round_rect_clamps_radius() {
        let path = round_rect_path(Rect::new(0.0, 0.0, 10.0, 4.0), 50.0);
        // Radius is limited to half the shorter side
        assert_eq!(path[0], PathSeg::MoveTo(2.0, 0.0));
        assert_eq!(path.last(), Some(&PathSeg::Close));
        let square = round_rect_path(Rect::new(0.0, 0.0, 10.0, 4.0), 0.0);
        assert_eq!(square.len(), 5);
    }
}
