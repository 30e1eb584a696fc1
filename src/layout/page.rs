//! # Page State
//!
//! [`PageBuilder`] owns everything that changes while pages are filled: the
//! open page, the vertical cursor, and the section whose header repeats at
//! the top of continuation pages. Renderers take it by `&mut` and ask it for
//! space before drawing; it decides when a page ends.
//!
//! ```text
//! Idle -> HeaderDrawn -> FlowingSections <-> TableRendering -> Finalized
//!             ^                                                   |
//!             +------------------- next page ---------------------+
//! ```

use crate::canvas::{Bitmap, LinkAnnotator, PageHandle, PageSink, Paint, Stroke};
use crate::config::RenderConfig;
use crate::font::FontContext;
use crate::geometry::{fit_inside, Point, Rect};
use crate::image_loader::default_logo;
use crate::style::{Color, Direction, FontSpec, TextAlign};
use crate::text::{bidi, ParagraphLayout, TextBlock};

/// Page breaks attempted for one unit before drawing it anyway.
pub const MAX_BREAK_RETRIES: usize = 3;

const FOOTER_PAGE_TOKEN: &str = "{{pageNumber}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Idle,
    HeaderDrawn,
    FlowingSections,
    TableRendering,
    Finalized,
}

/// Where the next unit goes.
#[derive(Debug, Clone, PartialEq)]
pub struct PageCursor {
    /// Zero-based index of the open (or last) page.
    pub page_index: usize,
    /// Distance from the top edge of the page, in points.
    pub vertical_offset: f64,
    /// Section header repeated on continuation pages.
    pub active_section_title: Option<String>,
}

/// Outcome of [`PageBuilder::ensure_space`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceCheck {
    Fits,
    /// Even a fresh page is too short. Draw clipped.
    Overflow,
}

pub struct PageBuilder<'a, S: PageSink> {
    sink: &'a mut S,
    fonts: &'a FontContext,
    config: &'a RenderConfig,
    logo: Bitmap,
    footer_text: String,
    state: PageState,
    cursor: PageCursor,
    handle: Option<PageHandle>,
    pages_started: usize,
    /// First y on the page below the header band and any repeated section
    /// header.
    page_top: f64,
}

impl<'a, S: PageSink> PageBuilder<'a, S> {
    /// `logo` falls back to a generated badge.
    pub fn new(
        sink: &'a mut S,
        fonts: &'a FontContext,
        config: &'a RenderConfig,
        logo: Option<Bitmap>,
        footer_text: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            fonts,
            config,
            logo: logo.unwrap_or_else(default_logo),
            footer_text: footer_text.into(),
            state: PageState::Idle,
            cursor: PageCursor {
                page_index: 0,
                vertical_offset: 0.0,
                active_section_title: None,
            },
            handle: None,
            pages_started: 0,
            page_top: 0.0,
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn fonts(&self) -> &'a FontContext {
        self.fonts
    }

    pub fn config(&self) -> &'a RenderConfig {
        self.config
    }

    pub fn handle(&self) -> Option<PageHandle> {
        self.handle
    }

    pub fn pages_started(&self) -> usize {
        self.pages_started
    }

    /// The sink, for drawing at positions the caller computed.
    pub fn sink(&mut self) -> &mut S {
        &mut *self.sink
    }

    pub fn page_size(&self) -> (f64, f64) {
        self.config.page.size.dimensions()
    }

    pub fn content_left(&self) -> f64 {
        self.config.page.margin.left
    }

    pub fn content_width(&self) -> f64 {
        let (w, _) = self.page_size();
        (w - self.config.page.margin.horizontal()).max(0.0)
    }

    /// Lowest y content may reach: above the bottom margin and footer band.
    pub fn content_floor(&self) -> f64 {
        let (_, h) = self.page_size();
        h - self.config.page.margin.bottom - self.config.footer.height
    }

    /// Space left between the cursor and the content floor.
    pub fn remaining(&self) -> f64 {
        (self.content_floor() - self.cursor.vertical_offset).max(0.0)
    }

    /// The free area from the cursor down to the floor.
    pub fn content_rect(&self) -> Rect {
        Rect::new(
            self.content_left(),
            self.cursor.vertical_offset,
            self.content_width(),
            self.remaining(),
        )
    }

    pub fn fits(&self, height: f64) -> bool {
        self.handle.is_some() && self.cursor.vertical_offset + height <= self.content_floor() + 1e-6
    }

    /// True when nothing has been placed below the header yet.
    pub fn at_page_top(&self) -> bool {
        self.handle.is_some() && (self.cursor.vertical_offset - self.page_top).abs() < 1e-6
    }

    pub fn advance(&mut self, dy: f64) {
        self.cursor.vertical_offset += dy.max(0.0);
    }

    pub fn enter(&mut self, state: PageState) {
        self.state = state;
    }

    pub fn draw_text(&mut self, block: &TextBlock, origin: Point, color: Color) {
        self.sink.draw_text(block, origin, color);
    }

    /// Open a page: logo, centered title, and the active section header if
    /// one is carried over. Finishes the open page first.
    pub fn start_page(&mut self) {
        if self.handle.is_some() {
            self.finish_page();
        }
        let (width, height) = self.page_size();
        let handle = self.sink.start_page(width, height);
        self.handle = Some(handle);
        self.pages_started += 1;
        self.cursor.page_index = self.pages_started - 1;
        self.state = PageState::HeaderDrawn;

        let config = self.config;
        let colors = &config.colors;
        if colors.page_background != Color::WHITE && colors.page_background.is_visible() {
            self.sink
                .draw_rect(Rect::new(0.0, 0.0, width, height), &Paint::fill(colors.page_background));
        }
        self.draw_header_band();

        let header = &config.header;
        self.cursor.vertical_offset = config.page.margin.top + header.height + header.gap_after;
        if let Some(title) = self.cursor.active_section_title.clone() {
            self.draw_section_band(&title);
            self.state = PageState::FlowingSections;
        }
        self.page_top = self.cursor.vertical_offset;
        tracing::debug!(
            page = self.cursor.page_index,
            top = self.page_top,
            section = ?self.cursor.active_section_title,
            "started page"
        );
    }

    fn draw_header_band(&mut self) {
        let config = self.config;
        let header = &config.header;
        let margin = &config.page.margin;
        let band = Rect::new(margin.left, margin.top, self.content_width(), header.height);

        let logo_box = Rect::new(band.x, band.y, header.logo_max_width.min(band.width), band.height);
        let (lw, lh) = self.logo.dimensions();
        let dest = fit_inside(lw as f64, lh as f64, logo_box);
        self.sink.draw_image(&self.logo, dest);

        let title = header.title.trim();
        if title.is_empty() {
            return;
        }
        let direction = bidi::paragraph_direction(title);
        let block = ParagraphLayout::new(self.fonts).layout(
            &bidi::wrap_foreign_runs(title, direction),
            &config.fonts.bold,
            header.title_font_size,
            band.width,
            direction,
            TextAlign::Center,
            Some(1),
            1.2,
        );
        let y = band.y + ((band.height - block.height) / 2.0).max(0.0);
        self.sink
            .draw_text(&block, Point::new(band.x, y), config.colors.title);
    }

    /// Bold title with a rule beneath; advances past it.
    fn draw_section_band(&mut self, title: &str) {
        let config = self.config;
        let section = &config.section;
        let direction = bidi::paragraph_direction(title);
        let width = self.content_width();
        let left = self.content_left();
        let top = self.cursor.vertical_offset;
        let block = ParagraphLayout::new(self.fonts).layout(
            &bidi::wrap_foreign_runs(title, direction),
            &config.fonts.bold,
            section.font_size,
            width,
            direction,
            TextAlign::Start,
            Some(1),
            1.2,
        );
        let y = top + ((section.height - block.height) / 2.0).max(0.0);
        self.sink
            .draw_text(&block, Point::new(left, y), config.colors.title);
        let rule_y = top + section.height;
        self.sink.draw_line(
            Point::new(left, rule_y),
            Point::new(left + width, rule_y),
            &Stroke::solid(config.colors.divider, 0.75),
        );
        self.advance(section.height + section.spacing_after);
    }

    /// Height a section header occupies.
    pub fn section_header_height(&self) -> f64 {
        self.config.section.height + self.config.section.spacing_after
    }

    /// Make room for `height` below the cursor, breaking pages as needed.
    pub fn ensure_space(&mut self, height: f64) -> SpaceCheck {
        if self.handle.is_none() {
            self.start_page();
        }
        let mut retries = 0;
        loop {
            if self.fits(height) {
                return SpaceCheck::Fits;
            }
            if self.at_page_top() || retries >= MAX_BREAK_RETRIES {
                tracing::warn!(
                    page = self.cursor.page_index,
                    height,
                    remaining = self.remaining(),
                    "unit taller than the page, drawing clipped"
                );
                return SpaceCheck::Overflow;
            }
            self.break_page();
            retries += 1;
        }
    }

    pub fn break_page(&mut self) {
        tracing::debug!(page = self.cursor.page_index, "page break");
        self.start_page();
    }

    /// Start a section. The header is kept on the same page as the first
    /// `keep_with_next` points of content.
    pub fn draw_section_header(&mut self, title: &str, keep_with_next: f64) -> SpaceCheck {
        self.cursor.active_section_title = None;
        let check = self.ensure_space(self.section_header_height() + keep_with_next.max(0.0));
        self.state = PageState::FlowingSections;
        self.cursor.active_section_title = Some(title.to_string());
        self.draw_section_band(title);
        check
    }

    /// Close the active section with a divider.
    pub fn end_section(&mut self) {
        self.cursor.active_section_title = None;
        if self.handle.is_none() {
            return;
        }
        let gap = self.config.section.divider_gap;
        if !self.fits(gap) {
            // The page ends here anyway.
            self.advance(gap);
            return;
        }
        let y = self.cursor.vertical_offset + gap / 2.0;
        let left = self.content_left();
        let right = left + self.content_width();
        self.sink.draw_line(
            Point::new(left, y),
            Point::new(right, y),
            &Stroke::solid(self.config.colors.divider, 0.5),
        );
        self.advance(gap);
    }

    /// Forget the active section without drawing a divider.
    pub fn clear_section(&mut self) {
        self.cursor.active_section_title = None;
    }

    /// Footer divider, page label and footer text, then close the page.
    pub fn finish_page(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let config = self.config;
        let footer = &config.footer;
        let left = self.content_left();
        let width = self.content_width();
        let top = self.content_floor();
        let colors = &config.colors;
        self.sink.draw_line(
            Point::new(left, top),
            Point::new(left + width, top),
            &Stroke::solid(colors.divider, 0.5),
        );

        let layout = ParagraphLayout::new(self.fonts);
        let regular = &config.fonts.regular;
        let page_label = footer
            .page_label
            .replace(FOOTER_PAGE_TOKEN, &(self.cursor.page_index + 1).to_string());
        let label = footer_block(&layout, &page_label, regular, footer.font_size, width, TextAlign::Start);
        let y = top + ((footer.height - label.height) / 2.0).max(0.0);
        self.sink.draw_text(&label, Point::new(left, y), colors.muted);

        let text = footer.text.as_deref().unwrap_or(&self.footer_text).trim();
        if !text.is_empty() {
            let direction = bidi::paragraph_direction(text);
            let block = footer_block(
                &layout,
                &bidi::wrap_foreign_runs(text, direction),
                regular,
                footer.font_size,
                width,
                TextAlign::End,
            );
            self.sink.draw_text(&block, Point::new(left, y), colors.muted);
        }

        self.sink.finish_page(handle);
        self.state = PageState::Finalized;
        tracing::debug!(page = self.cursor.page_index, "finished page");
    }

    /// Close the last page. Returns how many pages were produced.
    pub fn finish(&mut self) -> usize {
        self.finish_page();
        self.state = PageState::Finalized;
        self.pages_started
    }
}

impl<S: PageSink + LinkAnnotator> PageBuilder<'_, S> {
    /// Make `rect` on the open page a link to `url`.
    pub fn add_link(&mut self, rect: Rect, url: &str) {
        if let Some(handle) = self.handle {
            self.sink.add_link(handle, rect, url);
        }
    }
}

fn footer_block(
    layout: &ParagraphLayout,
    text: &str,
    font: &FontSpec,
    size: f64,
    width: f64,
    align: TextAlign,
) -> TextBlock {
    // Footer text is laid out LTR so End always means the right edge.
    layout.layout(text, font, size, width, Direction::Ltr, align, Some(1), 1.2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::DrawCommand;
    use crate::pdf::PdfSink;

    fn page_height_content(config: &RenderConfig) -> f64 {
        let (_, h) = config.page.size.dimensions();
        h - config.page.margin.vertical() - config.footer.height - config.header.height - config.header.gap_after
    }

    #[test]
    fn test_start_page_places_cursor_below_header() {
        let fonts = FontContext::new();
        let config = RenderConfig::default();
        let mut sink = PdfSink::new(&fonts);
        let mut page = PageBuilder::new(&mut sink, &fonts, &config, None, "Acme");
        assert_eq!(page.state(), PageState::Idle);
        page.start_page();
        assert_eq!(page.state(), PageState::HeaderDrawn);
        let expected = config.page.margin.top + config.header.height + config.header.gap_after;
        assert!((page.cursor().vertical_offset - expected).abs() < 1e-9);
        assert!(page.at_page_top());
        assert_eq!(page.finish(), 1);
        assert_eq!(page.state(), PageState::Finalized);

        let texts = sink.pages()[0].texts();
        assert!(texts.iter().any(|t| t == "Daily Site Report"));
        assert!(texts.iter().any(|t| t == "Page 1 of {{totalPages}}"));
        assert!(texts.iter().any(|t| t == "Acme"));
        // The default logo is drawn in the header band
        assert!(sink.pages()[0]
            .commands
            .iter()
            .any(|c| matches!(c, DrawCommand::Image { .. })));
    }

    #[test]
    fn test_ensure_space_breaks_and_repeats_section() {
        let fonts = FontContext::new();
        let config = RenderConfig::default();
        let mut sink = PdfSink::new(&fonts);
        let mut page = PageBuilder::new(&mut sink, &fonts, &config, None, "");
        page.start_page();
        page.draw_section_header("Activities", 20.0);
        let remaining = page.remaining();
        page.advance(remaining - 5.0);
        assert_eq!(page.ensure_space(20.0), SpaceCheck::Fits);
        assert_eq!(page.cursor().page_index, 1);
        assert_eq!(
            page.cursor().active_section_title.as_deref(),
            Some("Activities")
        );
        page.finish();
        let second = sink.pages()[1].texts();
        assert!(second.iter().any(|t| t == "Activities"));
    }

    #[test]
    fn test_ensure_space_reports_overflow_on_fresh_page() {
        let fonts = FontContext::new();
        let config = RenderConfig::default();
        let mut sink = PdfSink::new(&fonts);
        let mut page = PageBuilder::new(&mut sink, &fonts, &config, None, "");
        page.start_page();
        page.advance(10.0);
        let too_tall = page_height_content(&config) + 100.0;
        assert_eq!(page.ensure_space(too_tall), SpaceCheck::Overflow);
        // One break to reach a fresh page, no more
        assert_eq!(page.pages_started(), 2);
    }

    #[test]
    fn test_section_header_keeps_with_next() {
        let fonts = FontContext::new();
        let config = RenderConfig::default();
        let mut sink = PdfSink::new(&fonts);
        let mut page = PageBuilder::new(&mut sink, &fonts, &config, None, "");
        page.start_page();
        let remaining = page.remaining();
        // Room for the header alone but not the first line after it
        page.advance(remaining - page.section_header_height() - 1.0);
        page.draw_section_header("Equipment", 12.0);
        assert_eq!(page.cursor().page_index, 1);
        page.finish();
        assert!(!sink.pages()[0].texts().iter().any(|t| t == "Equipment"));
    }

    #[test]
    fn test_end_section_clears_title() {
        let fonts = FontContext::new();
        let config = RenderConfig::default();
        let mut sink = PdfSink::new(&fonts);
        let mut page = PageBuilder::new(&mut sink, &fonts, &config, None, "");
        page.start_page();
        page.draw_section_header("Obstacles", 0.0);
        page.end_section();
        assert!(page.cursor().active_section_title.is_none());
        page.break_page();
        assert!(page.at_page_top());
        page.finish();
        assert!(!sink.pages()[1].texts().iter().any(|t| t == "Obstacles"));
    }

    #[test]
    fn test_links_go_to_open_page() {
        let fonts = FontContext::new();
        let config = RenderConfig::default();
        let mut sink = PdfSink::new(&fonts);
        let mut page = PageBuilder::new(&mut sink, &fonts, &config, None, "");
        page.add_link(Rect::new(0.0, 0.0, 1.0, 1.0), "https://ignored.example");
        page.start_page();
        page.add_link(Rect::new(0.0, 0.0, 1.0, 1.0), "https://example.com");
        page.finish();
        assert_eq!(sink.pages()[0].links.len(), 1);
    }
}
