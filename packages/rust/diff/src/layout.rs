//! Row layout for the two-column diff image.

use crate::analysis::{DiffAnalysis, Line, Side};

pub const WIDTH: u32 = 1200;
pub const PADDING: u32 = 40;
pub const FONT_SIZE: f32 = 14.0;
pub const LINE_HEIGHT: u32 = 24;
pub const COL_GAP: u32 = 20;
/// Vertical space after each rendered row.
pub const ROW_SPACING: u32 = 10;
/// Horizontal offset of the first word inside a column.
pub const TEXT_INSET: u32 = 40;
/// Right edge of the line number inside a column.
pub const LINE_NUMBER_RIGHT: u32 = 30;
/// Vertical offset of text inside a row.
pub const TEXT_TOP: u32 = 5;

pub const COLUMN_WIDTH: u32 = (WIDTH - PADDING * 2 - COL_GAP) / 2;
/// Maximum width of one wrapped sub-line.
pub const WRAP_WIDTH: f32 = (COLUMN_WIDTH - TEXT_INSET) as f32;

/// Text measurement, in pixels, against the active font.
pub trait TextMeasure {
    fn text_width(&self, text: &str) -> f32;
}

/// Layout of one selected source line.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLayout {
    /// Zero-based line index in the documents.
    pub index: usize,
    /// An ellipsis row precedes this one.
    pub gap_before: bool,
    pub top: u32,
    pub height: u32,
    /// Wrapped sub-lines as token indices, per side.
    pub wrap_old: Vec<Vec<usize>>,
    pub wrap_new: Vec<Vec<usize>>,
    /// Tint weights. A half is tinted when its weight is non-zero.
    pub weight_old: usize,
    pub weight_new: usize,
}

impl RowLayout {
    pub fn wrap(&self, side: Side) -> &[Vec<usize>] {
        match side {
            Side::Old => &self.wrap_old,
            Side::New => &self.wrap_new,
        }
    }

    pub fn weight(&self, side: Side) -> usize {
        match side {
            Side::Old => self.weight_old,
            Side::New => self.weight_new,
        }
    }
}

/// Render metadata for one comparison. Lives only as long as one render.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffReport {
    pub rows: Vec<RowLayout>,
    pub width: u32,
    pub height: u32,
}

/// Greedy word wrap of a line's tokens to [`WRAP_WIDTH`].
///
/// A single word wider than the column gets a sub-line of its own.
pub fn wrap_tokens(line: &Line, measure: &dyn TextMeasure) -> Vec<Vec<usize>> {
    let mut lines = Vec::new();
    let mut current = Vec::new();
    let mut width = 0.0;

    for (i, token) in line.tokens.iter().enumerate() {
        let w = measure.text_width(&format!("{} ", token.display));
        if width + w > WRAP_WIDTH && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            width = 0.0;
        }
        current.push(i);
        width += w;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Lay out the selected lines. Returns `None` when nothing is selected.
pub fn layout(analysis: &DiffAnalysis, measure: &dyn TextMeasure) -> Option<DiffReport> {
    let selected = analysis.selected_lines();
    if selected.is_empty() {
        return None;
    }

    let mut rows = Vec::with_capacity(selected.len());
    let mut y = PADDING;
    let mut prev: Option<usize> = None;

    for index in selected {
        let gap_before = match prev {
            None => index > 0,
            Some(p) => index > p + 1,
        };
        if gap_before {
            y += LINE_HEIGHT;
        }

        let wrap_side = |side| {
            analysis
                .line(side, index)
                .map(|line| wrap_tokens(line, measure))
                .unwrap_or_default()
        };
        let wrap_old = wrap_side(Side::Old);
        let wrap_new = wrap_side(Side::New);

        let sub_lines = wrap_old.len().max(wrap_new.len()).max(1) as u32;
        let height = sub_lines * LINE_HEIGHT;

        rows.push(RowLayout {
            index,
            gap_before,
            top: y,
            height,
            wrap_old,
            wrap_new,
            weight_old: analysis.weight(Side::Old, index),
            weight_new: analysis.weight(Side::New, index),
        });

        y += height + ROW_SPACING;
        prev = Some(index);
    }

    Some(DiffReport {
        rows,
        width: WIDTH,
        height: y + PADDING,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::tokenize;

    /// Every character is 10px wide.
    pub(crate) struct FixedWidth;

    impl TextMeasure for FixedWidth {
        fn text_width(&self, text: &str) -> f32 {
            text.chars().count() as f32 * 10.0
        }
    }

    #[test]
    fn column_geometry() {
        assert_eq!(COLUMN_WIDTH, 550);
        assert_eq!(WRAP_WIDTH, 510.0);
    }

    #[test]
    fn wraps_at_column_width() {
        // "word " is 50px, so ten words fill 500px and the eleventh wraps.
        let line = &tokenize(&"word ".repeat(12))[0];
        let wrapped = wrap_tokens(line, &FixedWidth);
        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped[0].len(), 10);
        assert_eq!(wrapped[1], vec![10, 11]);
    }

    #[test]
    fn oversized_word_never_leaves_empty_sub_line() {
        let long = "x".repeat(80);
        let line = &tokenize(&format!("{long} tail"))[0];
        let wrapped = wrap_tokens(line, &FixedWidth);
        assert_eq!(wrapped, vec![vec![0], vec![1]]);
    }

    #[test]
    fn identical_texts_have_no_report() {
        let analysis = DiffAnalysis::new("same text\nhere", "same text\nhere");
        assert!(layout(&analysis, &FixedWidth).is_none());
    }

    #[test]
    fn gaps_insert_ellipsis_space() {
        let old = "a\nb\nc\nd\nold five\nf";
        let new = "a\nb\nc\nd\nnew five\nf";
        let analysis = DiffAnalysis::new(old, new);
        let report = layout(&analysis, &FixedWidth).unwrap();

        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        assert_eq!(row.index, 4);
        assert!(row.gap_before);
        assert_eq!(row.top, PADDING + LINE_HEIGHT);
        assert_eq!(row.height, LINE_HEIGHT);
        assert_eq!(report.height, PADDING + LINE_HEIGHT + LINE_HEIGHT + ROW_SPACING + PADDING);
        assert_eq!(report.width, WIDTH);
    }

    #[test]
    fn adjacent_rows_have_no_gap() {
        let analysis = DiffAnalysis::new("one x\ntwo x", "one y\ntwo y");
        let report = layout(&analysis, &FixedWidth).unwrap();
        let gaps: Vec<_> = report.rows.iter().map(|r| r.gap_before).collect();
        assert_eq!(gaps, vec![false, false]);
        assert_eq!(report.rows[1].top, PADDING + LINE_HEIGHT + ROW_SPACING);
    }

    #[test]
    fn row_height_follows_longest_wrap() {
        let old = "word ".repeat(25);
        let analysis = DiffAnalysis::new(&old, "short");
        let report = layout(&analysis, &FixedWidth).unwrap();
        let row = &report.rows[0];
        assert_eq!(row.wrap_old.len(), 3);
        assert_eq!(row.wrap_new.len(), 1);
        assert_eq!(row.height, 3 * LINE_HEIGHT);
        assert!(row.weight_old > 0);
        assert!(row.weight_new > 0);
    }

    #[test]
    fn deleted_word_tints_only_old_half() {
        let analysis = DiffAnalysis::new("keep this\nremove me please", "keep this\nremove please");
        let report = layout(&analysis, &FixedWidth).unwrap();
        let row = &report.rows[0];
        assert_eq!(row.index, 1);
        assert!(row.gap_before);
        assert_eq!(row.weight(Side::Old), 1);
        assert_eq!(row.weight(Side::New), 0);
    }
}
