//! # Page Break Decisions
//!
//! Where to cut a paragraph when it reaches the content floor. Paragraph
//! lines are the only content that splits; table rows and photo cells move
//! whole.

/// What to do with a paragraph that meets the bottom of the page.
#[derive(Debug, Clone, PartialEq)]
pub enum BreakDecision {
    /// All lines fit on the current page.
    Place,
    /// Start the paragraph on the next page.
    MoveToNextPage,
    /// Put the first `lines_on_current_page` here, the rest on the next page.
    Split { lines_on_current_page: usize },
}

/// Decide how a paragraph of `line_heights` breaks against
/// `remaining_height`.
///
/// At least `min_orphan_lines` stay behind and at least `min_widow_lines`
/// carry over. On a fresh page (`at_page_top`) the orphan rule is waived so
/// a paragraph taller than a page still makes progress.
pub fn decide_break(
    remaining_height: f64,
    line_heights: &[f64],
    at_page_top: bool,
    min_orphan_lines: usize,
    min_widow_lines: usize,
) -> BreakDecision {
    let total: f64 = line_heights.iter().sum();
    if total <= remaining_height + 1e-6 {
        return BreakDecision::Place;
    }

    let mut running = 0.0;
    let mut fit_count = 0;
    for &h in line_heights {
        if running + h > remaining_height + 1e-6 {
            break;
        }
        running += h;
        fit_count += 1;
    }

    if at_page_top {
        // Progress beats aesthetics on an empty page.
        return BreakDecision::Split {
            lines_on_current_page: fit_count.max(1),
        };
    }

    let total_lines = line_heights.len();
    if fit_count < min_orphan_lines && fit_count < total_lines {
        return BreakDecision::MoveToNextPage;
    }

    let carried = total_lines - fit_count;
    if carried < min_widow_lines && carried > 0 {
        let adjusted = fit_count.saturating_sub(min_widow_lines - carried);
        if adjusted == 0 || adjusted < min_orphan_lines {
            return BreakDecision::MoveToNextPage;
        }
        return BreakDecision::Split {
            lines_on_current_page: adjusted,
        };
    }

    if fit_count == 0 {
        return BreakDecision::MoveToNextPage;
    }

    BreakDecision::Split {
        lines_on_current_page: fit_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_fits() {
        let decision = decide_break(100.0, &[20.0, 30.0, 40.0], false, 2, 2);
        assert_eq!(decision, BreakDecision::Place);
    }

    #[test]
    fn split_at_right_point() {
        let decision = decide_break(55.0, &[20.0, 30.0, 40.0], false, 1, 1);
        assert_eq!(
            decision,
            BreakDecision::Split {
                lines_on_current_page: 2,
            }
        );
    }

    #[test]
    fn orphan_control() {
        // One line would fit, two must stay behind
        let decision = decide_break(25.0, &[12.0; 5], false, 2, 2);
        assert_eq!(decision, BreakDecision::MoveToNextPage);
    }

    #[test]
    fn widow_control() {
        // 3 of 4 fit, leaving one widow: pull one back
        let decision = decide_break(70.0, &[20.0; 4], false, 2, 2);
        assert_eq!(
            decision,
            BreakDecision::Split {
                lines_on_current_page: 2,
            }
        );
    }

    #[test]
    fn widow_pullback_that_orphans_moves_instead() {
        // 2 of 3 fit; pulling one back would leave a single orphan
        let decision = decide_break(25.0, &[12.0; 3], false, 2, 2);
        assert_eq!(decision, BreakDecision::MoveToNextPage);
    }

    #[test]
    fn page_top_always_makes_progress() {
        let decision = decide_break(5.0, &[12.0; 3], true, 2, 2);
        assert_eq!(
            decision,
            BreakDecision::Split {
                lines_on_current_page: 1,
            }
        );
        let decision = decide_break(50.0, &[12.0; 10], true, 2, 2);
        assert_eq!(
            decision,
            BreakDecision::Split {
                lines_on_current_page: 4,
            }
        );
    }
}
