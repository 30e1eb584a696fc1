//! # Template Grid Layout
//!
//! Maps a photo template (columns x rows, slots with a row, a column and a
//! column span) onto concrete rectangles inside a bounding area. Each slot
//! gets an image rectangle and a caption band beneath it.
//!
//! Rows are stacked top to bottom, each as tall as its tallest slot, with
//! `gutter` between rows and between columns. If the stack is taller than
//! the area, every rectangle is scaled uniformly toward the area's top-left
//! corner so the whole grid fits. Grids are never scaled up.

use std::collections::BTreeMap;

use crate::error::{ReportError, Result};
use crate::geometry::{Point, Rect};
use crate::model::Template;

/// Computed placement of one template slot, in the coordinates of the
/// bounding area passed to [`compute`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotLayout {
    /// Position of the slot in `Template::slots`.
    pub slot_index: usize,
    pub image_rect: Rect,
    pub caption_rect: Rect,
}

impl SlotLayout {
    /// Image and caption together.
    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.image_rect.x,
            self.image_rect.y,
            self.image_rect.width,
            self.caption_rect.bottom() - self.image_rect.y,
        )
    }
}

/// A slot after clamping to the column count.
#[derive(Debug, Clone, Copy)]
struct ClampedSlot {
    row: u32,
    col: usize,
    span: usize,
}

/// Lay out `template` inside `area`.
///
/// Out-of-range columns and spans are clamped; rows past `template.rows`
/// extend the grid. Rows without slots take no space. Output is sorted by
/// slot index.
pub fn compute(
    template: &Template,
    area: Rect,
    gutter: f64,
    caption_height: f64,
    caption_spacing: f64,
    image_aspect: f64,
) -> Result<Vec<SlotLayout>> {
    if template.slots.is_empty() {
        return Ok(Vec::new());
    }
    if template.columns == 0 {
        return Err(ReportError::Template(format!(
            "template '{}' has {} slots but zero columns",
            template.id,
            template.slots.len()
        )));
    }

    let columns = template.columns as usize;
    let gutter = gutter.max(0.0);
    let col_width = ((area.width - gutter * (columns - 1) as f64) / columns as f64).max(0.0);
    let slot_width = |span: usize| col_width * span as f64 + gutter * (span - 1) as f64;
    let slot_height = |span: usize| {
        slot_width(span) * image_aspect.max(0.0) + caption_spacing.max(0.0) + caption_height.max(0.0)
    };

    let clamped: Vec<ClampedSlot> = template
        .slots
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            let col = (slot.col as usize).min(columns - 1);
            let span = (slot.col_span.max(1) as usize).min(columns - col);
            if col != slot.col as usize || span != slot.col_span as usize {
                tracing::warn!(
                    template = %template.id,
                    slot = i,
                    col = slot.col,
                    col_span = slot.col_span,
                    "clamped slot to column {} span {}",
                    col,
                    span
                );
            }
            ClampedSlot {
                row: slot.row,
                col,
                span,
            }
        })
        .collect();

    // Tallest slot per occupied row, in row order.
    let mut row_heights: BTreeMap<u32, f64> = BTreeMap::new();
    for slot in &clamped {
        let h = slot_height(slot.span);
        let entry = row_heights.entry(slot.row).or_insert(0.0);
        *entry = entry.max(h);
    }

    let mut row_tops: BTreeMap<u32, f64> = BTreeMap::new();
    let mut cursor = 0.0;
    for (i, (&row, &height)) in row_heights.iter().enumerate() {
        if i > 0 {
            cursor += gutter;
        }
        row_tops.insert(row, cursor);
        cursor += height;
    }
    let used_height = cursor;

    let factor = if used_height > area.height && used_height > 0.0 {
        (area.height.max(0.0) / used_height).min(1.0)
    } else {
        1.0
    };
    let origin = Point::new(area.x, area.y);

    let layouts = clamped
        .iter()
        .enumerate()
        .map(|(slot_index, slot)| {
            let x = area.x + slot.col as f64 * (col_width + gutter);
            let y = area.y + row_tops.get(&slot.row).copied().unwrap_or(0.0);
            let width = slot_width(slot.span);
            let image_height = width * image_aspect.max(0.0);
            let image_rect = Rect::new(x, y, width, image_height);
            let caption_rect = Rect::new(
                x,
                y + image_height + caption_spacing.max(0.0),
                width,
                caption_height.max(0.0),
            );
            SlotLayout {
                slot_index,
                image_rect: image_rect.scale_toward(origin, factor),
                caption_rect: caption_rect.scale_toward(origin, factor),
            }
        })
        .collect();

    if factor < 1.0 {
        tracing::debug!(
            template = %template.id,
            used_height,
            area_height = area.height,
            factor,
            "scaled photo grid to fit"
        );
    }
    Ok(layouts)
}
