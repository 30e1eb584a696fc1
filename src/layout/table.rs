//! # Key-Value Table
//!
//! Two-column label/value tables (project info, labor summary). Both cells
//! of a row autosize independently; the row is as tall as the taller cell.
//! Rows never split. When a row does not fit, the current segment is closed
//! with a bottom border and the table continues on the next page under the
//! repeated section header.

use crate::canvas::{LinkAnnotator, PageSink, Paint, Stroke};
use crate::config::{Palette, RenderConfig, TableConfig};
use crate::font::FontContext;
use crate::geometry::{Point, Rect};
use crate::model::ReportInfoEntry;
use crate::style::{FontSpec, TextAlign};
use crate::text::{bidi, AutosizeSpec, Overflow, ParagraphLayout, TextBlock};

use super::page::{PageBuilder, PageCursor, PageState, SpaceCheck};

/// A row laid out against the column widths, ready to draw.
#[derive(Debug, Clone)]
pub struct RowLayout {
    pub label: TextBlock,
    pub value: TextBlock,
    pub height: f64,
}

pub struct TableRenderer<'a> {
    fonts: &'a FontContext,
    config: &'a TableConfig,
    colors: &'a Palette,
    label_font: &'a FontSpec,
    value_font: &'a FontSpec,
}

impl<'a> TableRenderer<'a> {
    pub fn new(fonts: &'a FontContext, config: &'a RenderConfig) -> Self {
        Self {
            fonts,
            config: &config.table,
            colors: &config.colors,
            label_font: &config.fonts.bold,
            value_font: &config.fonts.regular,
        }
    }

    /// Label column width: the widest label at full size plus padding,
    /// held between the configured share of `content_width`.
    pub fn label_width(&self, entries: &[ReportInfoEntry], content_width: f64) -> f64 {
        let widest = entries
            .iter()
            .map(|e| {
                self.fonts
                    .measure(e.label.trim(), self.label_font, self.config.sizing.max)
            })
            .fold(0.0, f64::max);
        let min = content_width * self.config.label_min_ratio;
        let max = content_width * self.config.label_max_ratio;
        (widest + 2.0 * self.config.padding_horizontal).clamp(min, max)
    }

    pub fn layout_row(&self, entry: &ReportInfoEntry, label_width: f64, value_width: f64) -> RowLayout {
        let label = self.cell(&entry.label, self.label_font, label_width, self.config.label_max_lines);
        let value = self.cell(&entry.value, self.value_font, value_width, self.config.value_max_lines);
        let height = label.height.max(value.height) + 2.0 * self.config.padding_vertical;
        RowLayout {
            label,
            value,
            height,
        }
    }

    fn cell(&self, text: &str, font: &FontSpec, column_width: f64, max_lines: usize) -> TextBlock {
        let text = text.trim();
        let direction = bidi::paragraph_direction(text);
        let spec = AutosizeSpec {
            sizing: self.config.sizing,
            max_width: (column_width - 2.0 * self.config.padding_horizontal).max(1.0),
            max_lines,
            direction,
            align: TextAlign::Center,
            line_spacing: self.config.line_spacing,
            overflow: Overflow::Ellipsis,
        };
        ParagraphLayout::new(self.fonts).autosize(&bidi::wrap_foreign_runs(text, direction), font, &spec)
    }

    /// Draw one row per entry, in order, starting at the page cursor.
    pub fn render<S: PageSink + LinkAnnotator>(
        &self,
        entries: &[ReportInfoEntry],
        page: &mut PageBuilder<S>,
    ) -> PageCursor {
        if entries.is_empty() {
            return page.cursor().clone();
        }
        if page.handle().is_none() {
            page.start_page();
        }
        page.enter(PageState::TableRendering);

        let content_width = page.content_width();
        let label_width = self.label_width(entries, content_width);
        let value_width = content_width - label_width;
        let mut segment_open = false;

        for (i, entry) in entries.iter().enumerate() {
            let row = self.layout_row(entry, label_width, value_width);
            let mut check = SpaceCheck::Fits;
            if !page.fits(row.height) {
                if segment_open {
                    self.close_segment(page);
                    segment_open = false;
                }
                check = page.ensure_space(row.height);
                page.enter(PageState::TableRendering);
            }
            let first_in_segment = !segment_open;
            segment_open = true;
            self.draw_row(page, i, entry, &row, label_width, first_in_segment, check);
            page.advance(row.height);
        }

        if segment_open {
            self.close_segment(page);
        }
        page.advance(self.config.spacing_after);
        page.enter(PageState::FlowingSections);
        page.cursor().clone()
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_row<S: PageSink + LinkAnnotator>(
        &self,
        page: &mut PageBuilder<S>,
        index: usize,
        entry: &ReportInfoEntry,
        row: &RowLayout,
        label_width: f64,
        first_in_segment: bool,
        check: SpaceCheck,
    ) {
        let left = page.content_left();
        let width = page.content_width();
        let top = page.cursor().vertical_offset;
        let floor = page.content_floor();
        let pad_h = self.config.padding_horizontal;
        let rect = Rect::new(left, top, width, row.height);
        let clipped = check == SpaceCheck::Overflow || rect.bottom() > floor + 1e-6;
        let border = Stroke::solid(self.colors.border, self.config.border_width);

        let sink = page.sink();
        if clipped {
            sink.push_clip(Rect::new(left, top, width, (floor - top).max(0.0)));
        }
        if index % 2 == 1 {
            sink.draw_rect(rect, &Paint::fill(self.colors.row_tint));
        }
        if first_in_segment {
            sink.draw_line(Point::new(left, top), Point::new(left + width, top), &border);
        } else {
            sink.draw_line(
                Point::new(left, top),
                Point::new(left + width, top),
                &Stroke::solid(self.colors.divider, self.config.border_width * 0.5),
            );
        }
        let bottom = rect.bottom().min(floor.max(top));
        sink.draw_line(Point::new(left, top), Point::new(left, bottom), &border);
        sink.draw_line(
            Point::new(left + width, top),
            Point::new(left + width, bottom),
            &border,
        );
        sink.draw_line(
            Point::new(left + label_width, top),
            Point::new(left + label_width, bottom),
            &border,
        );

        let label_origin = Point::new(left + pad_h, top + (row.height - row.label.height) / 2.0);
        sink.draw_text(&row.label, label_origin, self.colors.label_text);

        let value_origin = Point::new(
            left + label_width + pad_h,
            top + (row.height - row.value.height) / 2.0,
        );
        let value_color = if entry.link_url.is_some() {
            self.colors.link
        } else {
            self.colors.text
        };
        sink.draw_text(&row.value, value_origin, value_color);
        if clipped {
            sink.pop_clip();
        }

        if let Some(url) = &entry.link_url {
            let ink = row.value.ink_bounds();
            if !ink.is_empty() {
                page.add_link(ink.translate(value_origin.x, value_origin.y), url);
            }
        }
    }

    /// Bottom border under the last row drawn on this page.
    fn close_segment<S: PageSink>(&self, page: &mut PageBuilder<S>) {
        let left = page.content_left();
        let width = page.content_width();
        let y = page.cursor().vertical_offset.min(page.content_floor());
        let border = Stroke::solid(self.colors.border, self.config.border_width);
        page.sink()
            .draw_line(Point::new(left, y), Point::new(left + width, y), &border);
    }
}
