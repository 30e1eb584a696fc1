//! # Text Layout
//!
//! Line breaking, alignment and autosizing for report text.
//!
//! Breaking is greedy at UAX#14 opportunities (via `unicode-linebreak`),
//! honors mandatory breaks, and splits a word per character when it is
//! wider than the box. Each produced line is split into visual runs so
//! mixed-direction text draws in display order.

pub mod bidi;
pub mod shaping;

use unicode_linebreak::{linebreaks, BreakOpportunity};

use crate::config::FontSizing;
use crate::font::FontContext;
use crate::style::{Direction, FontSpec, TextAlign};

const ELLIPSIS: char = '\u{2026}';
const WIDTH_EPSILON: f64 = 1e-6;

/// A line of text after line-breaking, before positioning.
#[derive(Debug, Clone)]
pub struct BrokenLine {
    /// The text with trailing whitespace and line terminators removed.
    pub text: String,
    /// Width of `text`.
    pub width: f64,
}

/// A directional run inside a positioned line.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// Logical-order text of the run, without directional marks.
    pub text: String,
    /// Left edge relative to the block origin.
    pub x: f64,
    pub width: f64,
    pub rtl: bool,
}

/// A positioned line inside a [`TextBlock`].
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// Left edge relative to the block origin, after alignment.
    pub x: f64,
    /// Baseline relative to the block top.
    pub baseline: f64,
    pub width: f64,
    /// Runs in left-to-right display order.
    pub runs: Vec<TextRun>,
}

/// A laid-out paragraph. Coordinates are relative to the block's top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub font: FontSpec,
    pub font_size: f64,
    pub line_height: f64,
    pub direction: Direction,
    pub lines: Vec<TextLine>,
    /// Lines the text needed before any `max_lines` truncation.
    pub line_count: usize,
    /// The width the text was broken against.
    pub max_width: f64,
    /// Height of the kept lines.
    pub height: f64,
    pub truncated: bool,
}

impl TextBlock {
    /// Widest kept line.
    pub fn content_width(&self) -> f64 {
        self.lines.iter().map(|l| l.width).fold(0.0, f64::max)
    }

    /// True when no line is wider than the box.
    pub fn fits_width(&self) -> bool {
        self.lines
            .iter()
            .all(|l| l.width <= self.max_width + WIDTH_EPSILON)
    }

    /// True when the text fits the box without truncation.
    pub fn fits(&self, max_lines: usize) -> bool {
        self.line_count <= max_lines && self.fits_width()
    }

    /// Bounding box of the inked lines relative to the block origin.
    pub fn ink_bounds(&self) -> crate::geometry::Rect {
        if self.lines.is_empty() {
            return crate::geometry::Rect::default();
        }
        let left = self.lines.iter().map(|l| l.x).fold(f64::INFINITY, f64::min);
        let right = self
            .lines
            .iter()
            .map(|l| l.x + l.width)
            .fold(f64::NEG_INFINITY, f64::max);
        crate::geometry::Rect::new(left, 0.0, (right - left).max(0.0), self.height)
    }

    /// Keep only lines `range` and re-base them to the top of the block.
    pub fn slice_lines(&self, range: std::ops::Range<usize>) -> TextBlock {
        let start = range.start.min(self.lines.len());
        let end = range.end.min(self.lines.len()).max(start);
        let shift = start as f64 * self.line_height;
        let lines: Vec<TextLine> = self.lines[start..end]
            .iter()
            .cloned()
            .map(|mut l| {
                l.baseline -= shift;
                l
            })
            .collect();
        TextBlock {
            height: lines.len() as f64 * self.line_height,
            line_count: lines.len(),
            truncated: false,
            lines,
            ..self.clone()
        }
    }
}

/// What to do with text that still overflows at the smallest size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Overflow {
    /// Drop the extra lines; the caller clips anything wider than the box.
    #[default]
    Clip,
    /// Drop the extra lines and end the last kept line with an ellipsis.
    Ellipsis,
}

/// Parameters for [`ParagraphLayout::autosize`].
#[derive(Debug, Clone, Copy)]
pub struct AutosizeSpec {
    pub sizing: FontSizing,
    pub max_width: f64,
    pub max_lines: usize,
    pub direction: Direction,
    pub align: TextAlign,
    pub line_spacing: f64,
    pub overflow: Overflow,
}

/// Compute UAX#14 break opportunities indexed by char position.
///
/// Each entry is the opportunity *before* that char. Index 0 is always
/// `None`.
fn compute_break_opportunities(text: &str) -> Vec<Option<BreakOpportunity>> {
    let char_count = text.chars().count();
    let mut result = vec![None; char_count];

    let mut byte_to_char = vec![0usize; text.len() + 1];
    for (char_idx, (byte_idx, _)) in text.char_indices().enumerate() {
        byte_to_char[byte_idx] = char_idx;
    }
    byte_to_char[text.len()] = char_count;

    for (byte_offset, opp) in linebreaks(text) {
        let char_idx = byte_to_char[byte_offset];
        if char_idx < char_count {
            result[char_idx] = Some(opp);
        }
    }
    result
}

fn is_hanging_space(ch: char) -> bool {
    ch.is_whitespace() && ch != '\u{00A0}' && ch != '\u{202F}'
}

fn is_newline(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// Lays out paragraphs against a font context.
pub struct ParagraphLayout<'a> {
    fonts: &'a FontContext,
}

impl<'a> ParagraphLayout<'a> {
    pub fn new(fonts: &'a FontContext) -> Self {
        Self { fonts }
    }

    pub fn measure(&self, text: &str, font: &FontSpec, font_size: f64) -> f64 {
        self.fonts.measure(text, font, font_size)
    }

    /// Break a string into lines no wider than `max_width`, except where a
    /// single character is wider than the box.
    pub fn break_into_lines(
        &self,
        text: &str,
        font: &FontSpec,
        font_size: f64,
        max_width: f64,
    ) -> Vec<BrokenLine> {
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let widths: Vec<f64> = chars
            .iter()
            .map(|&c| {
                if is_newline(c) {
                    0.0
                } else {
                    self.fonts.char_width(c, font, font_size)
                }
            })
            .collect();
        let break_opps = compute_break_opportunities(text);

        let mut lines = Vec::new();
        let mut line_start = 0;
        let mut line_width = 0.0;
        let mut last_break_point: Option<usize> = None;

        for (i, &ch) in chars.iter().enumerate() {
            if i > 0 {
                match break_opps[i] {
                    Some(BreakOpportunity::Mandatory) => {
                        lines.push(self.make_line(&chars[line_start..i], &widths[line_start..i]));
                        line_start = i;
                        line_width = 0.0;
                        last_break_point = None;
                    }
                    Some(BreakOpportunity::Allowed) => {
                        // Break *after* char i-1
                        last_break_point = Some(i - 1);
                    }
                    None => {}
                }
            }

            if is_newline(ch) {
                continue;
            }

            // Spaces hang past the edge; make_line drops them from the line.
            if is_hanging_space(ch) {
                line_width += widths[i];
                continue;
            }

            if line_width + widths[i] > max_width + WIDTH_EPSILON && line_start < i {
                if let Some(bp) = last_break_point.filter(|&bp| bp >= line_start) {
                    let break_at = bp + 1;
                    lines.push(self.make_line(
                        &chars[line_start..break_at],
                        &widths[line_start..break_at],
                    ));
                    line_start = break_at;
                    line_width = widths[line_start..=i].iter().sum();
                    last_break_point = None;
                    continue;
                }

                // No break opportunity: force a break before this char
                lines.push(self.make_line(&chars[line_start..i], &widths[line_start..i]));
                line_start = i;
                line_width = widths[i];
                last_break_point = None;
                continue;
            }

            line_width += widths[i];
        }

        if line_start < chars.len() {
            lines.push(self.make_line(&chars[line_start..], &widths[line_start..]));
        }

        lines
    }

    /// Create a BrokenLine, dropping terminators and trailing whitespace.
    fn make_line(&self, chars: &[char], widths: &[f64]) -> BrokenLine {
        let mut end = chars.len();
        while end > 0 && (chars[end - 1].is_whitespace() || is_newline(chars[end - 1])) {
            end -= 1;
        }
        let text: String = chars[..end].iter().filter(|c| !is_newline(**c)).collect();
        let width = widths[..end].iter().sum();
        BrokenLine { text, width }
    }

    /// Lay out `text` inside a box `max_width` wide.
    ///
    /// With `max_lines`, extra lines are dropped and `truncated` is set.
    /// `line_count` always reports how many lines the text needed.
    #[allow(clippy::too_many_arguments)]
    pub fn layout(
        &self,
        text: &str,
        font: &FontSpec,
        font_size: f64,
        max_width: f64,
        direction: Direction,
        align: TextAlign,
        max_lines: Option<usize>,
        line_spacing: f64,
    ) -> TextBlock {
        let broken = self.break_into_lines(text, font, font_size, max_width);
        let line_count = broken.len();
        let keep = max_lines.map_or(line_count, |m| m.min(line_count));
        let line_height = font_size * line_spacing;
        let ascent = self.fonts.ascent(font, font_size);
        let descent = self.fonts.descent(font, font_size);
        let lead = ((line_height - (ascent + descent)) / 2.0).max(0.0);

        let lines: Vec<TextLine> = broken
            .into_iter()
            .take(keep)
            .enumerate()
            .map(|(i, line)| {
                let baseline = i as f64 * line_height + lead + ascent;
                self.position_line(line, font, font_size, max_width, direction, align, baseline)
            })
            .collect();

        TextBlock {
            font: font.clone(),
            font_size,
            line_height,
            direction,
            height: lines.len() as f64 * line_height,
            lines,
            line_count,
            max_width,
            truncated: keep < line_count,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn position_line(
        &self,
        line: BrokenLine,
        font: &FontSpec,
        font_size: f64,
        max_width: f64,
        direction: Direction,
        align: TextAlign,
        baseline: f64,
    ) -> TextLine {
        let x = align.offset(direction, max_width, line.width);
        let mut run_x = x;
        let runs = bidi::visual_runs(&line.text, direction)
            .into_iter()
            .map(|run| {
                let text = bidi::strip_marks(&line.text[run.range]);
                let width = self.fonts.measure(&text, font, font_size);
                let positioned = TextRun {
                    text,
                    x: run_x,
                    width,
                    rtl: run.rtl,
                };
                run_x += width;
                positioned
            })
            .filter(|run| !run.text.is_empty())
            .collect();
        TextLine {
            text: line.text,
            x,
            baseline,
            width: line.width,
            runs,
        }
    }

    /// Shrink the font from `sizing.max` by `sizing.step` until the text
    /// fits `max_lines` with no line wider than `max_width`.
    ///
    /// At `sizing.min` the floor layout is returned regardless, truncated to
    /// `max_lines` and treated per `overflow`.
    pub fn autosize(&self, text: &str, font: &FontSpec, spec: &AutosizeSpec) -> TextBlock {
        let FontSizing { max, min, step } = spec.sizing;
        let steps = if step > 0.0 && max > min {
            ((max - min) / step + WIDTH_EPSILON).floor() as usize
        } else {
            0
        };

        for i in 0..=steps {
            let size = (max - i as f64 * step).max(min);
            if size <= min {
                break;
            }
            let block = self.layout(
                text,
                font,
                size,
                spec.max_width,
                spec.direction,
                spec.align,
                Some(spec.max_lines),
                spec.line_spacing,
            );
            if block.fits(spec.max_lines) {
                return block;
            }
        }

        let mut block = self.layout(
            text,
            font,
            min,
            spec.max_width,
            spec.direction,
            spec.align,
            Some(spec.max_lines),
            spec.line_spacing,
        );
        if block.truncated && spec.overflow == Overflow::Ellipsis {
            self.elide_last_line(&mut block, spec);
        }
        block
    }

    /// Replace the tail of the last kept line with an ellipsis that fits.
    fn elide_last_line(&self, block: &mut TextBlock, spec: &AutosizeSpec) {
        let Some(last) = block.lines.last() else {
            return;
        };
        let ellipsis_width = self.fonts.char_width(ELLIPSIS, &block.font, block.font_size);
        let mut chars: Vec<char> = last.text.chars().collect();
        while !chars.is_empty()
            && self
                .fonts
                .measure(&chars.iter().collect::<String>(), &block.font, block.font_size)
                + ellipsis_width
                > spec.max_width + WIDTH_EPSILON
        {
            chars.pop();
        }
        while chars.last().is_some_and(|c| c.is_whitespace()) {
            chars.pop();
        }
        let mut text: String = chars.into_iter().collect();
        text.push(ELLIPSIS);
        let width = self.fonts.measure(&text, &block.font, block.font_size);
        let line = BrokenLine { text, width };
        let baseline = last.baseline;
        let positioned = self.position_line(
            line,
            &block.font.clone(),
            block.font_size,
            spec.max_width,
            spec.direction,
            spec.align,
            baseline,
        );
        if let Some(slot) = block.lines.last_mut() {
            *slot = positioned;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> FontContext {
        FontContext::new()
    }

    fn spec(max_width: f64, max_lines: usize, overflow: Overflow) -> AutosizeSpec {
        AutosizeSpec {
            sizing: FontSizing {
                max: 10.0,
                min: 6.0,
                step: 1.0,
            },
            max_width,
            max_lines,
            direction: Direction::Ltr,
            align: TextAlign::Center,
            line_spacing: 1.2,
            overflow,
        }
    }

    #[test]
    fn test_single_line() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let lines = layout.break_into_lines("Hello", &FontSpec::regular(), 12.0, 200.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Hello");
    }

    #[test]
    fn test_line_break_at_space() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let lines = layout.break_into_lines("Hello World", &FontSpec::regular(), 12.0, 40.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Hello");
        assert_eq!(lines[1].text, "World");
    }

    #[test]
    fn test_width_of_first_word_leaves_no_empty_line() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let font = FontSpec::regular();
        let width = layout.measure("Hello", &font, 12.0);
        let lines = layout.break_into_lines("Hello World again", &font, 12.0, width);
        assert!(lines.iter().all(|l| !l.text.is_empty()));
        assert_eq!(lines[0].text, "Hello");
        // The space after a full line never starts the next one
        assert!(lines.iter().all(|l| !l.text.starts_with(' ')));
        let joined: String = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(joined, "HelloWorldagain");
    }

    #[test]
    fn test_trailing_spaces_hang() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let font = FontSpec::regular();
        let width = layout.measure("Hello World", &font, 12.0);
        let lines = layout.break_into_lines("Hello World   next", &font, 12.0, width);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Hello World");
        assert_eq!(lines[1].text, "next");
    }

    #[test]
    fn test_explicit_newline() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let lines = layout.break_into_lines("Line one\nLine two", &FontSpec::regular(), 12.0, 500.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Line one");
        assert_eq!(lines[1].text, "Line two");
    }

    #[test]
    fn test_long_word_is_force_broken() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let lines = layout.break_into_lines("Supercalifragilistic", &FontSpec::regular(), 12.0, 30.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.width <= 30.0 + 1e-6));
        let joined: String = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(joined, "Supercalifragilistic");
    }

    #[test]
    fn test_empty_string_has_no_lines() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let block = layout.layout(
            "",
            &FontSpec::regular(),
            10.0,
            100.0,
            Direction::Ltr,
            TextAlign::Start,
            None,
            1.2,
        );
        assert!(block.lines.is_empty());
        assert_eq!(block.height, 0.0);
    }

    #[test]
    fn test_max_lines_truncates_softly() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let block = layout.layout(
            "one two three four five six seven",
            &FontSpec::regular(),
            12.0,
            40.0,
            Direction::Ltr,
            TextAlign::Start,
            Some(2),
            1.2,
        );
        assert_eq!(block.lines.len(), 2);
        assert!(block.line_count > 2);
        assert!(block.truncated);
        assert!(!block.fits(2));
        assert!((block.height - 2.0 * 12.0 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_alignment_respects_direction() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let block = layout.layout(
            "abc",
            &FontSpec::regular(),
            10.0,
            100.0,
            Direction::Rtl,
            TextAlign::Start,
            None,
            1.2,
        );
        let line = &block.lines[0];
        assert!((line.x + line.width - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_baselines_step_by_line_height() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let block = layout.layout(
            "a\nb\nc",
            &FontSpec::regular(),
            10.0,
            100.0,
            Direction::Ltr,
            TextAlign::Start,
            None,
            1.5,
        );
        assert_eq!(block.lines.len(), 3);
        let gap = block.lines[1].baseline - block.lines[0].baseline;
        assert!((gap - 15.0).abs() < 1e-9);
        assert!(block.lines[0].baseline > 0.0 && block.lines[0].baseline < 15.0);
    }

    #[test]
    fn test_autosize_keeps_max_when_it_fits() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let block = layout.autosize("Short", &FontSpec::regular(), &spec(200.0, 2, Overflow::Clip));
        assert_eq!(block.font_size, 10.0);
        assert!(!block.truncated);
    }

    #[test]
    fn test_autosize_shrinks_to_fit() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let text = "Concrete pour at grid C4";
        let at_max = layout.measure(text, &FontSpec::regular(), 10.0);
        let block = layout.autosize(text, &FontSpec::regular(), &spec(at_max * 0.85, 1, Overflow::Clip));
        assert!(block.font_size < 10.0);
        assert!(block.font_size >= 6.0);
        assert!(block.fits(1));
    }

    #[test]
    fn test_autosize_floor_with_ellipsis() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let text = "word ".repeat(60);
        let block = layout.autosize(&text, &FontSpec::regular(), &spec(80.0, 2, Overflow::Ellipsis));
        assert_eq!(block.font_size, 6.0);
        assert_eq!(block.lines.len(), 2);
        assert!(block.truncated);
        let last = block.lines.last().unwrap();
        assert!(last.text.ends_with('\u{2026}'));
        assert!(last.width <= 80.0 + 1e-6);
    }

    #[test]
    fn test_autosize_is_monotonic_in_width() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let text = "Excavation of the north trench continued after dewatering";
        let mut previous = f64::INFINITY;
        for w in (20..=400).rev().step_by(7) {
            let block = layout.autosize(text, &FontSpec::regular(), &spec(w as f64, 2, Overflow::Clip));
            assert!(block.font_size <= previous, "width {} grew the font", w);
            previous = block.font_size;
        }
    }

    #[test]
    fn test_rtl_line_has_visual_runs() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let text = bidi::wrap_foreign_runs("مرحبا ABC", Direction::Rtl);
        let block = layout.layout(
            &text,
            &FontSpec::regular(),
            10.0,
            300.0,
            Direction::Rtl,
            TextAlign::Start,
            None,
            1.2,
        );
        let runs = &block.lines[0].runs;
        assert!(runs.len() >= 2);
        assert!(runs.iter().all(|r| !r.text.contains('\u{200E}')));
        // Runs are laid end to end from the line's left edge
        assert!((runs[0].x - block.lines[0].x).abs() < 1e-9);
    }

    #[test]
    fn test_slice_lines_rebases() {
        let fonts = ctx();
        let layout = ParagraphLayout::new(&fonts);
        let block = layout.layout(
            "a\nb\nc\nd",
            &FontSpec::regular(),
            10.0,
            100.0,
            Direction::Ltr,
            TextAlign::Start,
            None,
            1.2,
        );
        let tail = block.slice_lines(2..4);
        assert_eq!(tail.lines.len(), 2);
        assert_eq!(tail.lines[0].text, "c");
        assert!((tail.lines[0].baseline - block.lines[0].baseline).abs() < 1e-9);
    }
}
