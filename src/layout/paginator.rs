//! # Document Paginator
//!
//! Flows a [`ReportDocument`] onto pages in a fixed order:
//!
//! 1. project information table
//! 2. activities, equipment and obstacles as bulleted paragraphs
//! 3. labor summary table
//! 4. photo pages
//!
//! Empty sections are skipped without a header. Paragraphs split across
//! pages line by line under orphan/widow control; table rows and photo
//! cells move whole. Photo pages come from one of three sources: site pages
//! (one pre-composed image per page, fitted inside), a legacy flat list
//! (center-cropped 16:9 cells), or a template composed live onto the page.

use std::collections::BTreeMap;

use crate::canvas::{LinkAnnotator, PageSink};
use crate::config::RenderConfig;
use crate::error::Result;
use crate::font::FontContext;
use crate::geometry::{fit_inside, Point, Rect};
use crate::image_loader::ImageFetcher;
use crate::model::{ImageRef, PhotoEntry, PhotoSource, ReportDocument, ReportInfoEntry, Template};
use crate::style::{Direction, TextAlign};
use crate::text::{bidi, ParagraphLayout, TextBlock};

use super::page::{PageBuilder, SpaceCheck};
use super::page_break::{decide_break, BreakDecision};
use super::photo::{belongs_to, draw_center_cropped, PhotoGridComposer};
use super::table::TableRenderer;

/// Logo pixels requested per point of header band width.
const LOGO_PIXELS_PER_POINT: f64 = 4.0;

/// What a pagination run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationSummary {
    pub pages: usize,
    pub photo_pages: usize,
}

pub struct Paginator<'a> {
    fonts: &'a FontContext,
    config: &'a RenderConfig,
    fetcher: &'a dyn ImageFetcher,
}

impl<'a> Paginator<'a> {
    pub fn new(fonts: &'a FontContext, config: &'a RenderConfig, fetcher: &'a dyn ImageFetcher) -> Self {
        Self {
            fonts,
            config,
            fetcher,
        }
    }

    /// Lay out `doc` onto `sink`. The sink holds the pages afterwards; call
    /// `write_document` on it to serialize.
    pub fn paginate<S: PageSink + LinkAnnotator>(
        &self,
        doc: &ReportDocument,
        sink: &mut S,
    ) -> Result<PaginationSummary> {
        let config = self.config;
        let logo = doc.logo.as_ref().and_then(|logo| {
            let max = (config.header.logo_max_width * LOGO_PIXELS_PER_POINT).ceil().max(1.0) as u32;
            self.fetcher.fetch(logo, max)
        });
        let footer_text = doc.organization.as_deref().unwrap_or_default().trim().to_string();
        let mut page = PageBuilder::new(sink, self.fonts, config, logo, footer_text);
        page.start_page();

        let labels = &config.labels;
        let table = TableRenderer::new(self.fonts, config);

        let info = doc.info_entries(&labels.info);
        self.table_section(&mut page, &table, &labels.sections.info, &info);

        for (title, paragraphs) in [
            (&labels.sections.activities, &doc.activities),
            (&labels.sections.equipment, &doc.equipment),
            (&labels.sections.obstacles, &doc.obstacles),
        ] {
            self.text_section(&mut page, title, paragraphs);
        }

        let labor = doc.labor_entries(&labels.labor);
        self.table_section(&mut page, &table, &labels.sections.labor, &labor);

        let photo_pages = match &doc.photos {
            PhotoSource::None => 0,
            PhotoSource::SitePages { pages } => self.site_pages(&mut page, pages),
            PhotoSource::Legacy { photos } => self.legacy_photos(&mut page, photos),
            PhotoSource::Template { template, entries } => {
                self.template_pages(&mut page, template.as_ref(), entries)?
            }
        };

        let pages = page.finish();
        tracing::debug!(pages, photo_pages, "pagination finished");
        Ok(PaginationSummary { pages, photo_pages })
    }

    fn table_section<S: PageSink + LinkAnnotator>(
        &self,
        page: &mut PageBuilder<S>,
        table: &TableRenderer,
        title: &str,
        entries: &[ReportInfoEntry],
    ) {
        let Some(first) = entries.first() else {
            return;
        };
        let width = page.content_width();
        let label_width = table.label_width(entries, width);
        let first_row = table.layout_row(first, label_width, width - label_width);
        page.draw_section_header(title, first_row.height);
        table.render(entries, page);
        page.end_section();
    }

    /// Bulleted paragraphs under a section header.
    fn text_section<S: PageSink>(&self, page: &mut PageBuilder<S>, title: &str, paragraphs: &[String]) {
        let body = &self.config.body;
        let text_width = (page.content_width() - body.bullet_indent).max(1.0);
        let layout = ParagraphLayout::new(self.fonts);
        let blocks: Vec<TextBlock> = paragraphs
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| {
                let direction = bidi::paragraph_direction(p);
                layout.layout(
                    &bidi::wrap_foreign_runs(p, direction),
                    &self.config.fonts.regular,
                    body.font_size,
                    text_width,
                    direction,
                    TextAlign::Start,
                    None,
                    body.line_spacing,
                )
            })
            .collect();
        let Some(first) = blocks.first() else {
            return;
        };

        let keep = first.line_height * first.lines.len().min(body.min_orphan_lines.max(1)) as f64;
        page.draw_section_header(title, keep);
        for block in &blocks {
            self.place_paragraph(page, block);
        }
        page.end_section();
    }

    /// Place a paragraph, splitting it across pages where it meets the
    /// content floor.
    fn place_paragraph<S: PageSink>(&self, page: &mut PageBuilder<S>, block: &TextBlock) {
        let body = &self.config.body;
        let total = block.lines.len();
        let mut start = 0;
        while start < total {
            let heights = vec![block.line_height; total - start];
            let decision = decide_break(
                page.remaining(),
                &heights,
                page.at_page_top(),
                body.min_orphan_lines,
                body.min_widow_lines,
            );
            tracing::debug!(page = page.cursor().page_index, start, ?decision, "paragraph break");
            match decision {
                BreakDecision::Place => {
                    self.draw_lines(page, block, start..total);
                    start = total;
                }
                BreakDecision::MoveToNextPage => page.break_page(),
                BreakDecision::Split {
                    lines_on_current_page,
                } => {
                    let end = (start + lines_on_current_page).min(total);
                    self.draw_lines(page, block, start..end);
                    start = end;
                    if start < total {
                        page.break_page();
                    }
                }
            }
        }
        page.advance(body.paragraph_spacing);
    }

    /// Draw `range` of the paragraph's lines at the cursor. The bullet goes
    /// with the first line only, on the leading side.
    fn draw_lines<S: PageSink>(&self, page: &mut PageBuilder<S>, block: &TextBlock, range: std::ops::Range<usize>) {
        let body = &self.config.body;
        let left = page.content_left();
        let width = page.content_width();
        let top = page.cursor().vertical_offset;
        let rtl = block.direction.is_rtl();
        let colors = &self.config.colors;

        if range.start == 0 && !body.bullet.trim().is_empty() {
            let bullet = ParagraphLayout::new(self.fonts).layout(
                &body.bullet,
                &block.font,
                block.font_size,
                body.bullet_indent,
                Direction::Ltr,
                if rtl { TextAlign::End } else { TextAlign::Start },
                Some(1),
                block.line_height / block.font_size,
            );
            let x = if rtl { left + width - body.bullet_indent } else { left };
            page.draw_text(&bullet, Point::new(x, top), colors.muted);
        }

        let slice = block.slice_lines(range);
        let x = if rtl { left } else { left + body.bullet_indent };
        page.draw_text(&slice, Point::new(x, top), colors.text);
        page.advance(slice.height);
    }

    /// Open a fresh page unless the current one is still empty.
    fn fresh_page<S: PageSink>(&self, page: &mut PageBuilder<S>) {
        page.clear_section();
        if !page.at_page_top() {
            page.start_page();
        }
    }

    /// One page per pre-composed image, fitted below the photos header.
    fn site_pages<S: PageSink>(&self, page: &mut PageBuilder<S>, images: &[ImageRef]) -> usize {
        let composer = PhotoGridComposer::new(self.fonts, self.config);
        for image in images {
            self.fresh_page(page);
            page.draw_section_header(&self.config.labels.sections.photos, 0.0);
            let area = page.content_rect();
            match self.fetcher.fetch(image, self.config.photos.max_image_dimension) {
                Some(bitmap) => {
                    let (w, h) = bitmap.dimensions();
                    let dest = fit_inside(w as f64, h as f64, area);
                    page.sink().draw_image(&bitmap, dest);
                }
                None => composer.draw_placeholder(page.sink(), area),
            }
            page.advance(area.height);
        }
        page.clear_section();
        images.len()
    }

    /// Center-cropped thumbnail grid continuing across pages.
    fn legacy_photos<S: PageSink>(&self, page: &mut PageBuilder<S>, photos: &[ImageRef]) -> usize {
        if photos.is_empty() {
            return 0;
        }
        let cfg = &self.config.photos;
        let columns = cfg.legacy_columns.max(1) as usize;
        let gutter = cfg.legacy_gutter.max(0.0);
        let width = page.content_width();
        let cell_width = ((width - gutter * (columns - 1) as f64) / columns as f64).max(0.0);
        let cell_height = cell_width * cfg.legacy_aspect;
        let composer = PhotoGridComposer::new(self.fonts, self.config);

        page.draw_section_header(&self.config.labels.sections.photos, cell_height);
        let first_page = page.cursor().page_index;
        for row in photos.chunks(columns) {
            let check = page.ensure_space(cell_height);
            let left = page.content_left();
            let top = page.cursor().vertical_offset;
            let floor = page.content_floor();
            let clipped = check == SpaceCheck::Overflow || top + cell_height > floor + 1e-6;
            if clipped {
                page.sink()
                    .push_clip(Rect::new(left, top, width, (floor - top).max(0.0)));
            }
            for (i, image) in row.iter().enumerate() {
                let cell = Rect::new(left + i as f64 * (cell_width + gutter), top, cell_width, cell_height);
                match self.fetcher.fetch(image, cfg.max_image_dimension) {
                    Some(bitmap) => {
                        draw_center_cropped(page.sink(), &bitmap, cell);
                    }
                    None => composer.draw_placeholder(page.sink(), cell),
                }
            }
            if clipped {
                page.sink().pop_clip();
            }
            page.advance(cell_height + gutter);
        }
        page.end_section();
        page.cursor().page_index - first_page + 1
    }

    /// One fresh page per template page index that has entries.
    fn template_pages<S: PageSink>(
        &self,
        page: &mut PageBuilder<S>,
        template: Option<&Template>,
        entries: &[PhotoEntry],
    ) -> Result<usize> {
        let Some(template) = template.filter(|t| !t.slots.is_empty()) else {
            tracing::debug!("no photo template, text-only document");
            return Ok(0);
        };
        for issue in template.validate() {
            tracing::warn!(template = %template.id, ?issue, "template issue, clamping");
        }

        let mut by_page: BTreeMap<u32, Vec<PhotoEntry>> = BTreeMap::new();
        for entry in entries.iter().filter(|e| belongs_to(e, template)) {
            by_page.entry(entry.page_index).or_default().push(entry.clone());
        }

        let composer = PhotoGridComposer::new(self.fonts, self.config);
        for (&index, page_entries) in &by_page {
            self.fresh_page(page);
            page.draw_section_header(&self.config.labels.sections.photos, 0.0);
            let area = page.content_rect();
            composer.compose_onto(page.sink(), area, page_entries, template, index, self.fetcher)?;
            page.advance(area.height);
        }
        page.clear_section();
        Ok(by_page.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Bitmap, DrawCommand, WithoutLinks};
    use crate::image_loader::NoImages;
    use crate::pdf::PdfSink;

    fn run(doc: &ReportDocument, fetcher: &dyn ImageFetcher) -> (PaginationSummary, Vec<crate::pdf::RecordedPage>) {
        let fonts = FontContext::new();
        let config = RenderConfig::default();
        let mut sink = PdfSink::new(&fonts);
        let summary = Paginator::new(&fonts, &config, fetcher)
            .paginate(doc, &mut sink)
            .unwrap();
        (summary, sink.pages().to_vec())
    }

    fn any_image(_: &ImageRef, _: u32) -> Option<Bitmap> {
        Some(Bitmap::from_pixel(160, 90, image::Rgba([90, 90, 90, 255])))
    }

    #[test]
    fn test_minimal_document_is_one_page() {
        let (summary, pages) = run(&ReportDocument::default(), &NoImages);
        assert_eq!(summary, PaginationSummary { pages: 1, photo_pages: 0 });
        let texts = pages[0].texts();
        assert!(texts.iter().any(|t| t == "Project Information"));
        // Empty sections are skipped entirely
        assert!(!texts.iter().any(|t| t == "Activities" || t == "Labor"));
    }

    #[test]
    fn test_sections_in_order() {
        let doc = ReportDocument {
            activities: vec!["Poured slab on level 2".into()],
            equipment: vec!["  ".into(), "Tower crane".into()],
            obstacles: vec!["Rain in the afternoon".into()],
            labor: crate::model::LaborSummary {
                skilled: Some("12".into()),
                unskilled: None,
                total: Some("20".into()),
            },
            ..Default::default()
        };
        let (_, pages) = run(&doc, &NoImages);
        let texts: Vec<String> = pages.iter().flat_map(|p| p.texts()).collect();
        let pos = |s: &str| texts.iter().position(|t| t == s).unwrap();
        assert!(pos("Project Information") < pos("Activities"));
        assert!(pos("Activities") < pos("Equipment"));
        assert!(pos("Equipment") < pos("Obstacles"));
        assert!(pos("Obstacles") < pos("Labor"));
        assert!(texts.iter().any(|t| t == "Tower crane"));
        // The blank equipment paragraph produced no bullet
        assert_eq!(texts.iter().filter(|t| *t == "\u{2022}").count(), 3);
    }

    #[test]
    fn test_long_section_splits_and_repeats_header() {
        let paragraph = "Formwork crews continued on the east stair core while rebar was tied for the next pour. ".repeat(6);
        let doc = ReportDocument {
            activities: vec![paragraph; 20],
            ..Default::default()
        };
        let (summary, pages) = run(&doc, &NoImages);
        assert!(summary.pages >= 2);
        for p in &pages[1..] {
            assert!(p.texts().iter().any(|t| t == "Activities"));
        }
    }

    #[test]
    fn test_site_pages_one_page_each_with_placeholder() {
        let doc = ReportDocument {
            photos: PhotoSource::SitePages {
                pages: vec![ImageRef::parse("a.jpg"), ImageRef::parse("b.jpg")],
            },
            ..Default::default()
        };
        let fetch = |image: &ImageRef, max: u32| {
            (image.as_str() == "a.jpg").then(|| Bitmap::from_pixel(max.min(50), 70, image::Rgba([0, 0, 0, 255])))
        };
        let (summary, pages) = run(&doc, &fetch);
        assert_eq!(summary.photo_pages, 2);
        assert_eq!(summary.pages, 3);
        assert!(pages[1].texts().iter().any(|t| t == "Photos"));
        // Second site page failed: gray box, no image beyond the logo
        let images = |p: &crate::pdf::RecordedPage| {
            p.commands
                .iter()
                .filter(|c| matches!(c, DrawCommand::Image { .. }))
                .count()
        };
        assert_eq!(images(&pages[1]), 2);
        assert_eq!(images(&pages[2]), 1);
    }

    #[test]
    fn test_legacy_grid_continues_across_pages() {
        let doc = ReportDocument {
            photos: PhotoSource::Legacy {
                photos: (0..20).map(|i| ImageRef::parse(&format!("p{}.jpg", i))).collect(),
            },
            ..Default::default()
        };
        let (summary, pages) = run(&doc, &any_image);
        assert!(summary.photo_pages >= 2);
        let clipped_images: usize = pages
            .iter()
            .map(|p| {
                p.commands
                    .windows(2)
                    .filter(|w| matches!(w, [DrawCommand::PushClip(_), DrawCommand::Image { .. }]))
                    .count()
            })
            .sum();
        assert_eq!(clipped_images, 20);
    }

    #[test]
    fn test_legacy_cells_taller_than_page_are_clipped_to_floor() {
        let fonts = FontContext::new();
        let mut config = RenderConfig::default();
        config.page.size = crate::config::PageSize::Custom {
            width: 595.0,
            height: 300.0,
        };
        let floor = 300.0 - config.page.margin.bottom - config.footer.height;
        let doc = ReportDocument {
            photos: PhotoSource::Legacy {
                photos: (0..4).map(|i| ImageRef::parse(&format!("p{}.jpg", i))).collect(),
            },
            ..Default::default()
        };
        let mut sink = PdfSink::new(&fonts);
        Paginator::new(&fonts, &config, &any_image)
            .paginate(&doc, &mut sink)
            .unwrap();

        let mut images = 0;
        for page in sink.pages() {
            let mut clips: Vec<Rect> = Vec::new();
            for c in &page.commands {
                match c {
                    DrawCommand::PushClip(r) => clips.push(*r),
                    DrawCommand::PopClip => {
                        clips.pop();
                    }
                    DrawCommand::Image { dest, .. } if dest.bottom() > floor + 1e-6 => {
                        images += 1;
                        assert!(clips.iter().any(|r| r.bottom() <= floor + 1e-6));
                    }
                    _ => {}
                }
            }
        }
        // Every cell is taller than the page's content area
        assert_eq!(images, 4);
    }

    #[test]
    fn test_missing_template_is_text_only() {
        let doc = ReportDocument {
            photos: PhotoSource::Template {
                template: None,
                entries: vec![PhotoEntry::new("t", 0, 0, ImageRef::parse("a.jpg"), None)],
            },
            ..Default::default()
        };
        let (summary, _) = run(&doc, &any_image);
        assert_eq!(summary, PaginationSummary { pages: 1, photo_pages: 0 });
    }

    #[test]
    fn test_template_pages_per_index() {
        let doc = ReportDocument {
            photos: PhotoSource::Template {
                template: Some(Template::uniform("t", 2, 2)),
                entries: vec![
                    PhotoEntry::new("t", 0, 0, ImageRef::parse("a.jpg"), Some("first")),
                    PhotoEntry::new("t", 2, 1, ImageRef::parse("b.jpg"), None),
                    PhotoEntry::new("other", 5, 0, ImageRef::parse("c.jpg"), None),
                ],
            },
            ..Default::default()
        };
        let (summary, pages) = run(&doc, &any_image);
        assert_eq!(summary.photo_pages, 2);
        assert_eq!(pages.len(), 3);
        assert!(pages[1].texts().iter().any(|t| t == "first"));
    }

    #[test]
    fn test_zero_column_template_is_error() {
        let doc = ReportDocument {
            photos: PhotoSource::Template {
                template: Some(Template {
                    id: "t".into(),
                    columns: 0,
                    rows: 1,
                    slots: vec![crate::model::SlotSpec::new(0, 0, 1)],
                }),
                entries: vec![PhotoEntry::new("t", 0, 0, ImageRef::parse("a.jpg"), None)],
            },
            ..Default::default()
        };
        let fonts = FontContext::new();
        let config = RenderConfig::default();
        let mut sink = PdfSink::new(&fonts);
        let result = Paginator::new(&fonts, &config, &any_image).paginate(&doc, &mut sink);
        assert!(matches!(result, Err(crate::error::ReportError::Template(_))));
    }

    #[test]
    fn test_without_links_sink_renders_same_pages() {
        let doc = ReportDocument {
            location: Some("Site 4".into()),
            map_link: Some("https://maps.example.com/?q=site4".into()),
            ..Default::default()
        };
        let fonts = FontContext::new();
        let config = RenderConfig::default();
        let mut linked = PdfSink::new(&fonts);
        Paginator::new(&fonts, &config, &NoImages)
            .paginate(&doc, &mut linked)
            .unwrap();
        let mut plain = WithoutLinks(PdfSink::new(&fonts));
        Paginator::new(&fonts, &config, &NoImages)
            .paginate(&doc, &mut plain)
            .unwrap();
        let plain = plain.into_inner();
        assert_eq!(linked.pages()[0].links.len(), 1);
        assert!(plain.pages()[0].links.is_empty());
        assert_eq!(linked.pages()[0].commands, plain.pages()[0].commands);
    }
}
