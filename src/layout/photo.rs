//! # Photo Grid Composer
//!
//! Draws one template page of photos: every slot gets its image fitted
//! inside (never cropped), a gray placeholder when the image is missing, or
//! a dashed outline when no entry fills it. Each slot carries a caption band
//! with up to two lines of autosized text.
//!
//! The same composition runs onto any [`Canvas`]. [`PhotoGridComposer::compose`]
//! targets a standalone bitmap; the paginator calls
//! [`PhotoGridComposer::compose_onto`] with the document page.

use std::collections::BTreeMap;

use crate::canvas::raster::RasterCanvas;
use crate::canvas::{Bitmap, Canvas, Paint, Stroke};
use crate::config::{Palette, PhotoConfig, RenderConfig};
use crate::error::Result;
use crate::font::FontContext;
use crate::geometry::{center_crop, fit_inside, Point, Rect};
use crate::image_loader::ImageFetcher;
use crate::model::{normalize_caption, PhotoEntry, Template};
use crate::style::{Color, Edges, FontSpec, TextAlign};
use crate::text::{bidi, AutosizeSpec, Overflow, ParagraphLayout, TextBlock};

use super::grid;

const CAPTION_LINE_SPACING: f64 = 1.15;

/// How a slot's image area was filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotFill {
    Image,
    /// The entry's image could not be loaded.
    Placeholder,
    /// No entry for this slot.
    Empty,
}

/// What was drawn for one slot.
#[derive(Debug, Clone)]
pub struct SlotRender {
    pub slot_index: usize,
    pub image_rect: Rect,
    pub caption_rect: Rect,
    /// Where the image landed inside `image_rect`, for `SlotFill::Image`.
    pub drawn_rect: Option<Rect>,
    pub fill: SlotFill,
    pub caption: Option<TextBlock>,
}

/// A standalone composed page. Slot rects are in pixels.
pub struct ComposedPage {
    pub bitmap: Bitmap,
    pub slots: Vec<SlotRender>,
}

impl ComposedPage {
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(self.bitmap.clone())
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .map_err(|e| crate::error::ReportError::Render(format!("PNG encoding failed: {e}")))?;
        Ok(out)
    }
}

/// True when `entry` was made for `template`. Entries without a template
/// ID belong to any template.
pub fn belongs_to(entry: &PhotoEntry, template: &Template) -> bool {
    entry.template_id.is_empty() || entry.template_id == template.id
}

pub struct PhotoGridComposer<'a> {
    fonts: &'a FontContext,
    config: &'a PhotoConfig,
    colors: &'a Palette,
    caption_font: &'a FontSpec,
}

impl<'a> PhotoGridComposer<'a> {
    pub fn new(fonts: &'a FontContext, config: &'a RenderConfig) -> Self {
        Self {
            fonts,
            config: &config.photos,
            colors: &config.colors,
            caption_font: &config.fonts.regular,
        }
    }

    /// Compose page `page_index` of `template` into a fresh bitmap of
    /// `page_width_px` x `page_height_px`, inside `margins_px`.
    #[allow(clippy::too_many_arguments)]
    pub fn compose(
        &self,
        entries: &[PhotoEntry],
        template: &Template,
        page_width_px: u32,
        page_height_px: u32,
        margins_px: Edges,
        page_index: u32,
        fetcher: &dyn ImageFetcher,
    ) -> Result<ComposedPage> {
        let scale = if self.config.compose_scale > 0.0 {
            self.config.compose_scale
        } else {
            1.0
        };
        let mut canvas =
            RasterCanvas::with_pixel_size(page_width_px, page_height_px, scale, Color::WHITE, self.fonts)?;
        let area = Rect::new(
            margins_px.left,
            margins_px.top,
            (page_width_px as f64 - margins_px.horizontal()).max(0.0),
            (page_height_px as f64 - margins_px.vertical()).max(0.0),
        )
        .scale_toward(Point::new(0.0, 0.0), 1.0 / scale);

        let slots = self.compose_onto(&mut canvas, area, entries, template, page_index, fetcher)?;
        let to_px = |r: Rect| r.scale_toward(Point::new(0.0, 0.0), scale);
        let slots = slots
            .into_iter()
            .map(|s| SlotRender {
                image_rect: to_px(s.image_rect),
                caption_rect: to_px(s.caption_rect),
                drawn_rect: s.drawn_rect.map(to_px),
                ..s
            })
            .collect();
        tracing::debug!(
            template = %template.id,
            page_index,
            width = page_width_px,
            height = page_height_px,
            "composed photo page"
        );
        Ok(ComposedPage {
            bitmap: canvas.to_bitmap(),
            slots,
        })
    }

    /// Draw page `page_index` of `template` inside `area` on `canvas`.
    pub fn compose_onto<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        area: Rect,
        entries: &[PhotoEntry],
        template: &Template,
        page_index: u32,
        fetcher: &dyn ImageFetcher,
    ) -> Result<Vec<SlotRender>> {
        let layouts = grid::compute(
            template,
            area,
            self.config.gutter,
            self.config.caption_height,
            self.config.caption_spacing,
            self.config.image_aspect,
        )?;

        let mut by_slot: BTreeMap<usize, &PhotoEntry> = BTreeMap::new();
        for entry in entries
            .iter()
            .filter(|e| e.page_index == page_index && belongs_to(e, template))
        {
            let slot = entry.slot_index as usize;
            if slot >= layouts.len() {
                tracing::warn!(
                    template = %template.id,
                    page_index,
                    slot,
                    "photo entry points past the last slot, skipped"
                );
                continue;
            }
            if by_slot.contains_key(&slot) {
                tracing::warn!(template = %template.id, page_index, slot, "duplicate photo entry, keeping the first");
                continue;
            }
            by_slot.insert(slot, entry);
        }

        let mut renders = Vec::with_capacity(layouts.len());
        for layout in &layouts {
            let entry = by_slot.get(&layout.slot_index).copied();
            let (fill, drawn_rect) = match entry {
                Some(entry) => match fetcher.fetch(&entry.image, self.config.max_image_dimension) {
                    Some(bitmap) => {
                        let (w, h) = bitmap.dimensions();
                        let dest = fit_inside(w as f64, h as f64, layout.image_rect);
                        canvas.push_clip(layout.image_rect);
                        canvas.draw_image(&bitmap, dest);
                        canvas.pop_clip();
                        (SlotFill::Image, Some(dest))
                    }
                    None => {
                        self.draw_placeholder(canvas, layout.image_rect);
                        (SlotFill::Placeholder, None)
                    }
                },
                None => {
                    canvas.draw_rect(
                        layout.image_rect,
                        &Paint::stroke(Stroke::dashed(
                            self.colors.empty_slot,
                            1.0,
                            self.config.placeholder_dash,
                        )),
                    );
                    (SlotFill::Empty, None)
                }
            };

            canvas.draw_rect(
                layout.caption_rect,
                &Paint::fill_and_stroke(
                    self.colors.caption_fill,
                    Stroke::solid(self.colors.caption_border, 0.5),
                ),
            );
            let caption = entry
                .and_then(|e| normalize_caption(e.caption.as_deref()))
                .map(|text| self.draw_caption(canvas, &text, layout.caption_rect));

            renders.push(SlotRender {
                slot_index: layout.slot_index,
                image_rect: layout.image_rect,
                caption_rect: layout.caption_rect,
                drawn_rect,
                fill,
                caption,
            });
        }
        Ok(renders)
    }

    /// Gray box with a border where an image failed to load.
    pub fn draw_placeholder<C: Canvas + ?Sized>(&self, canvas: &mut C, rect: Rect) {
        canvas.draw_rect(
            rect,
            &Paint::fill_and_stroke(
                self.colors.placeholder_fill,
                Stroke::solid(self.colors.placeholder_border, 1.0),
            ),
        );
    }

    fn draw_caption<C: Canvas + ?Sized>(&self, canvas: &mut C, text: &str, band: Rect) -> TextBlock {
        let pad = self.config.caption_padding;
        let inner = band.inset(pad, pad);
        let direction = bidi::paragraph_direction(text);
        let spec = AutosizeSpec {
            sizing: self.config.caption_sizing,
            max_width: inner.width.max(1.0),
            max_lines: self.config.caption_max_lines,
            direction,
            align: TextAlign::Center,
            line_spacing: CAPTION_LINE_SPACING,
            overflow: Overflow::Ellipsis,
        };
        let block = ParagraphLayout::new(self.fonts).autosize(
            &bidi::wrap_foreign_runs(text, direction),
            self.caption_font,
            &spec,
        );
        let y = inner.y + ((inner.height - block.height) / 2.0).max(0.0);
        canvas.push_clip(band);
        canvas.draw_text(&block, Point::new(inner.x, y), self.colors.text);
        canvas.pop_clip();
        block
    }
}

/// Draw `bitmap` filling `cell`, cropping the overflow around the center.
pub fn draw_center_cropped<C: Canvas + ?Sized>(canvas: &mut C, bitmap: &Bitmap, cell: Rect) -> Rect {
    let (w, h) = bitmap.dimensions();
    let dest = center_crop(w as f64, h as f64, cell);
    canvas.push_clip(cell);
    canvas.draw_image(bitmap, dest);
    canvas.pop_clip();
    dest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawCommand, Recorder};
    use crate::model::{ImageRef, SlotSpec};

    fn entry(slot: u32, src: &str, caption: Option<&str>) -> PhotoEntry {
        PhotoEntry::new("t", 0, slot, ImageRef::parse(src), caption)
    }

    fn fetch_wide(image: &ImageRef, _max: u32) -> Option<Bitmap> {
        match image.as_str() {
            "wide.jpg" => Some(Bitmap::from_pixel(400, 200, image::Rgba([200, 10, 10, 255]))),
            "tall.jpg" => Some(Bitmap::from_pixel(100, 300, image::Rgba([10, 200, 10, 255]))),
            _ => None,
        }
    }

    #[test]
    fn test_slots_filled_placeholder_and_empty() {
        let fonts = FontContext::new();
        let config = RenderConfig::default();
        let composer = PhotoGridComposer::new(&fonts, &config);
        let template = Template::uniform("t", 2, 2);
        let entries = vec![
            entry(0, "wide.jpg", Some("North wall formwork")),
            entry(1, "missing.jpg", None),
            entry(3, "tall.jpg", Some("   ")),
        ];
        let mut rec = Recorder::new();
        let area = Rect::new(0.0, 0.0, 500.0, 700.0);
        let slots = composer
            .compose_onto(&mut rec, area, &entries, &template, 0, &fetch_wide)
            .unwrap();
        let fills: Vec<SlotFill> = slots.iter().map(|s| s.fill).collect();
        assert_eq!(
            fills,
            vec![SlotFill::Image, SlotFill::Placeholder, SlotFill::Empty, SlotFill::Image]
        );

        let wide = &slots[0];
        let drawn = wide.drawn_rect.unwrap();
        assert!(wide.image_rect.contains(&drawn));
        assert!((drawn.width / drawn.height - 2.0).abs() < 1e-9);
        assert_eq!(wide.caption.as_ref().unwrap().lines[0].text, "North wall formwork");
        // Blank captions are dropped
        assert!(slots[3].caption.is_none());
        // Placeholder box sits exactly on the image rect
        assert!(rec.commands.iter().any(|c| matches!(
            c,
            DrawCommand::Rect { rect, paint } if *rect == slots[1].image_rect && paint.fill.is_some()
        )));
        assert_eq!(rec.images().count(), 2);
    }

    #[test]
    fn test_other_pages_and_templates_ignored() {
        let fonts = FontContext::new();
        let config = RenderConfig::default();
        let composer = PhotoGridComposer::new(&fonts, &config);
        let template = Template::uniform("t", 1, 1);
        let entries = vec![
            PhotoEntry::new("t", 1, 0, ImageRef::parse("wide.jpg"), None),
            PhotoEntry::new("other", 0, 0, ImageRef::parse("wide.jpg"), None),
        ];
        let mut rec = Recorder::new();
        let slots = composer
            .compose_onto(&mut rec, Rect::new(0.0, 0.0, 300.0, 300.0), &entries, &template, 0, &fetch_wide)
            .unwrap();
        assert_eq!(slots[0].fill, SlotFill::Empty);
    }

    #[test]
    fn test_duplicate_and_out_of_range_entries() {
        let fonts = FontContext::new();
        let config = RenderConfig::default();
        let composer = PhotoGridComposer::new(&fonts, &config);
        let template = Template::uniform("t", 1, 1);
        let entries = vec![
            entry(0, "missing.jpg", None),
            entry(0, "wide.jpg", None),
            entry(7, "wide.jpg", None),
        ];
        let mut rec = Recorder::new();
        let slots = composer
            .compose_onto(&mut rec, Rect::new(0.0, 0.0, 300.0, 300.0), &entries, &template, 0, &fetch_wide)
            .unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].fill, SlotFill::Placeholder);
        assert_eq!(rec.images().count(), 0);
    }

    #[test]
    fn test_long_caption_is_elided_to_two_lines() {
        let fonts = FontContext::new();
        let config = RenderConfig::default();
        let composer = PhotoGridComposer::new(&fonts, &config);
        let template = Template::uniform("t", 3, 1);
        let long = "Rebar placement inspected along grid lines A through F ".repeat(3);
        let entries = vec![entry(0, "wide.jpg", Some(long.as_str()))];
        let mut rec = Recorder::new();
        let slots = composer
            .compose_onto(&mut rec, Rect::new(0.0, 0.0, 300.0, 600.0), &entries, &template, 0, &fetch_wide)
            .unwrap();
        let caption = slots[0].caption.as_ref().unwrap();
        assert!(caption.lines.len() <= 2);
        assert!(caption.lines.last().unwrap().text.ends_with('\u{2026}'));
    }

    #[test]
    fn test_zero_columns_is_error() {
        let fonts = FontContext::new();
        let config = RenderConfig::default();
        let composer = PhotoGridComposer::new(&fonts, &config);
        let template = Template {
            id: "bad".into(),
            columns: 0,
            rows: 1,
            slots: vec![SlotSpec::new(0, 0, 1)],
        };
        let mut rec = Recorder::new();
        assert!(composer
            .compose_onto(&mut rec, Rect::new(0.0, 0.0, 100.0, 100.0), &[], &template, 0, &fetch_wide)
            .is_err());
    }

    #[test]
    fn test_compose_bitmap() {
        let fonts = FontContext::new();
        let config = RenderConfig::default();
        let composer = PhotoGridComposer::new(&fonts, &config);
        let template = Template::uniform("t", 1, 1);
        let entries = vec![entry(0, "wide.jpg", None)];
        let page = composer
            .compose(&entries, &template, 400, 600, Edges::uniform(20.0), 0, &fetch_wide)
            .unwrap();
        assert_eq!(page.bitmap.dimensions(), (400, 600));
        // White margin, red photo
        assert_eq!(page.bitmap.get_pixel(5, 5).0, [255, 255, 255, 255]);
        let drawn = page.slots[0].drawn_rect.unwrap();
        assert!((drawn.x - 20.0).abs() < 1e-6);
        assert!((drawn.width - 360.0).abs() < 1e-6);
        let c = drawn.center();
        let px = page.bitmap.get_pixel(c.x as u32, c.y as u32).0;
        assert_eq!(px, [200, 10, 10, 255]);
        assert!(page.encode_png().unwrap().starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn test_center_crop_covers_cell() {
        let mut rec = Recorder::new();
        let bitmap = Bitmap::new(400, 100);
        let cell = Rect::new(10.0, 10.0, 160.0, 90.0);
        let dest = draw_center_cropped(&mut rec, &bitmap, cell);
        assert!(dest.x <= cell.x && dest.right() >= cell.right());
        assert!((dest.height - cell.height).abs() < 1e-9);
        assert!(matches!(rec.commands[0], DrawCommand::PushClip(r) if r == cell));
    }
}
