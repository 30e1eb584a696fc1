//! # BiDi Text Support
//!
//! Two jobs:
//!
//! 1. Before layout, wrap "foreign" runs in invisible directional marks so
//!    a bidi-aware renderer keeps them intact inside the paragraph: Latin,
//!    digit and URL clusters inside an RTL paragraph get LRM on both sides,
//!    Arabic runs inside an LTR paragraph get RLM.
//! 2. After line breaking, split each line into visual runs with
//!    `unicode-bidi` (UAX#9) so sinks can emit them left to right.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use unicode_bidi::{BidiInfo, Level};
use unicode_script::{Script, UnicodeScript};

use crate::style::Direction;

pub const LRM: char = '\u{200E}';
pub const RLM: char = '\u{200F}';
const ALM: char = '\u{061C}';

/// URLs, then runs of Latin words and ASCII digits with the symbols that
/// usually travel with them (units, dates, codes). Arabic-Indic digits are
/// left alone.
fn ltr_run_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let word = r"[\p{Latin}0-9](?:[\p{Latin}0-9@#%&_+=./:'\-]*[\p{Latin}0-9%])?";
        Regex::new(&format!(
            r"(?:https?://|www\.)[^\s]+|{word}(?:[ \t]+{word})*"
        ))
        .expect("static LTR run pattern")
    })
}

fn arabic_run_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\p{Arabic}(?:[\p{Arabic}\s\u{0660}-\u{0669}]*\p{Arabic})?")
            .expect("static Arabic run pattern")
    })
}

/// True if any code point belongs to the Arabic script.
pub fn contains_arabic(text: &str) -> bool {
    text.chars().any(|c| c.script() == Script::Arabic)
}

/// Base direction to lay a paragraph out with.
pub fn paragraph_direction(text: &str) -> Direction {
    if contains_arabic(text) {
        Direction::Rtl
    } else {
        Direction::Ltr
    }
}

fn is_mark(c: char) -> bool {
    matches!(c, LRM | RLM | ALM)
}

/// Remove directional marks.
pub fn strip_marks(text: &str) -> String {
    text.chars().filter(|&c| !is_mark(c)).collect()
}

/// Wrap runs that do not match the base direction in directional marks.
///
/// Existing marks are removed first, so the result is the same no matter
/// how many times this is applied.
pub fn wrap_foreign_runs(text: &str, base: Direction) -> String {
    let clean = strip_marks(text);
    let (pattern, mark) = match base {
        Direction::Rtl => (ltr_run_pattern(), LRM),
        Direction::Ltr => (arabic_run_pattern(), RLM),
    };

    let mut out = String::with_capacity(clean.len() + 8);
    let mut last = 0;
    for m in pattern.find_iter(&clean) {
        out.push_str(&clean[last..m.start()]);
        out.push(mark);
        out.push_str(m.as_str());
        out.push(mark);
        last = m.end();
    }
    out.push_str(&clean[last..]);
    out
}

/// A visually ordered run of a laid-out line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualRun {
    /// Byte range into the line text.
    pub range: Range<usize>,
    pub rtl: bool,
}

/// Split a single line into runs in left-to-right display order.
pub fn visual_runs(line: &str, base: Direction) -> Vec<VisualRun> {
    if line.is_empty() {
        return Vec::new();
    }
    let level = match base {
        Direction::Ltr => Level::ltr(),
        Direction::Rtl => Level::rtl(),
    };
    if base == Direction::Ltr && !line.chars().any(is_rtl_char) {
        return vec![VisualRun {
            range: 0..line.len(),
            rtl: false,
        }];
    }

    let info = BidiInfo::new(line, Some(level));
    let mut runs = Vec::new();
    for para in &info.paragraphs {
        let (levels, level_runs) = info.visual_runs(para, para.range.clone());
        for run in level_runs {
            if run.is_empty() {
                continue;
            }
            runs.push(VisualRun {
                rtl: levels[run.start].is_rtl(),
                range: run,
            });
        }
    }
    runs
}

/// Strong right-to-left code points (Hebrew, Arabic and their blocks).
fn is_rtl_char(ch: char) -> bool {
    matches!(ch,
        '\u{0590}'..='\u{08FF}' |
        '\u{FB1D}'..='\u{FDFF}' |
        '\u{FE70}'..='\u{FEFF}' |
        '\u{10800}'..='\u{10FFF}' |
        '\u{1E800}'..='\u{1EEFF}' |
        RLM | '\u{202B}' | '\u{202E}' | '\u{2067}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_arabic() {
        assert!(contains_arabic("تقرير يومي"));
        assert!(!contains_arabic("Daily report"));
        assert!(!contains_arabic("שלום"));
        assert_eq!(paragraph_direction("موقع A"), Direction::Rtl);
        assert_eq!(paragraph_direction("Site A"), Direction::Ltr);
    }

    #[test]
    fn test_rtl_base_wraps_latin_and_digits() {
        let out = wrap_foreign_runs("تم صب 25 m3 من الخرسانة", Direction::Rtl);
        assert_eq!(out, "تم صب \u{200E}25 m3\u{200E} من الخرسانة");
    }

    #[test]
    fn test_rtl_base_wraps_urls_whole() {
        let out = wrap_foreign_runs("الموقع https://maps.example.com/?q=1 هنا", Direction::Rtl);
        assert!(out.contains("\u{200E}https://maps.example.com/?q=1\u{200E}"));
    }

    #[test]
    fn test_ltr_base_wraps_arabic() {
        let out = wrap_foreign_runs("Crew: فريق العمل arrived", Direction::Ltr);
        assert_eq!(out, "Crew: \u{200F}فريق العمل\u{200F} arrived");
    }

    #[test]
    fn test_idempotent() {
        for (text, dir) in [
            ("تم صب 25 m3 من الخرسانة", Direction::Rtl),
            ("Crew: فريق العمل arrived", Direction::Ltr),
            ("plain text only", Direction::Ltr),
        ] {
            let once = wrap_foreign_runs(text, dir);
            assert_eq!(wrap_foreign_runs(&once, dir), once);
        }
    }

    #[test]
    fn test_no_foreign_runs_is_identity() {
        assert_eq!(wrap_foreign_runs("تقرير يومي", Direction::Rtl), "تقرير يومي");
        assert_eq!(wrap_foreign_runs("Daily report", Direction::Ltr), "Daily report");
    }

    #[test]
    fn test_visual_runs_pure_ltr() {
        let runs = visual_runs("Hello World", Direction::Ltr);
        assert_eq!(runs, vec![VisualRun { range: 0..11, rtl: false }]);
    }

    #[test]
    fn test_visual_runs_mixed_rtl_base() {
        let line = "مرحبا ABC";
        let runs = visual_runs(line, Direction::Rtl);
        assert!(runs.len() >= 2);
        // In an RTL paragraph the Latin run is displayed first (leftmost)
        assert!(!runs[0].rtl);
        assert_eq!(&line[runs[0].range.clone()], "ABC");
        assert!(runs.iter().any(|r| r.rtl));
    }

    #[test]
    fn test_visual_runs_empty() {
        assert!(visual_runs("", Direction::Rtl).is_empty());
    }
}
