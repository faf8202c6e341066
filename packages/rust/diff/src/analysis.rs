//! Tokenization, boilerplate dedup, frequency maps and line selection.

use std::collections::HashMap;

/// Which document a line or token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Pre-migration text.
    Old,
    /// Post-migration text.
    New,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Self::Old => Self::New,
            Self::New => Self::Old,
        }
    }
}

/// A word as displayed and its comparison key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub display: String,
    /// Case-folded form used for comparison.
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub tokens: Vec<Token>,
}

impl Line {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn same_keys(&self, other: &Line) -> bool {
        self.tokens.len() == other.tokens.len()
            && self
                .tokens
                .iter()
                .zip(&other.tokens)
                .all(|(a, b)| a.key == b.key)
    }
}

/// Characters treated as word separators in addition to whitespace.
const PUNCTUATION: &[char] = &[',', '，', '。', '"', '\'', '“', '”', '‘', '’', '.'];

/// Split text into lines of punctuation-stripped, case-folded tokens.
pub fn tokenize(text: &str) -> Vec<Line> {
    text.split('\n')
        .map(|line| {
            let cleaned = line.trim_end().replace(PUNCTUATION, " ");
            let tokens = cleaned
                .split_whitespace()
                .map(|word| Token {
                    display: word.to_string(),
                    key: word.to_lowercase(),
                })
                .collect();
            Line { tokens }
        })
        .collect()
}

/// Clear every pair of non-empty lines with identical token keys.
///
/// Pairs are taken greedily in document order, so each line cancels at most
/// one counterpart. A paragraph that moved without changes is cleared on both
/// sides and never shows up in the diff.
pub fn dedup(old: &mut [Line], new: &mut [Line]) {
    for a in old.iter_mut() {
        for b in new.iter_mut() {
            if a.is_empty() || b.is_empty() {
                continue;
            }
            if a.same_keys(b) {
                a.tokens.clear();
                b.tokens.clear();
            }
        }
    }
}

fn frequencies(lines: &[Line]) -> HashMap<String, usize> {
    let mut freq = HashMap::new();
    for token in lines.iter().flat_map(|l| &l.tokens) {
        *freq.entry(token.key.clone()).or_insert(0) += 1;
    }
    freq
}

/// Tint strength for a frequency delta, saturating below 1.0.
pub fn intensity(delta: usize) -> f32 {
    const BASE: f32 = 0.4;
    const K: f32 = 0.2;
    BASE + (1.0 - BASE) * (1.0 - 1.0 / (1.0 + K * delta as f32))
}

/// Both documents after dedup, with their token frequencies.
#[derive(Debug, Clone)]
pub struct DiffAnalysis {
    old: Vec<Line>,
    new: Vec<Line>,
    freq_old: HashMap<String, usize>,
    freq_new: HashMap<String, usize>,
}

impl DiffAnalysis {
    pub fn new(old_text: &str, new_text: &str) -> Self {
        let mut old = tokenize(old_text);
        let mut new = tokenize(new_text);
        dedup(&mut old, &mut new);
        let freq_old = frequencies(&old);
        let freq_new = frequencies(&new);
        Self {
            old,
            new,
            freq_old,
            freq_new,
        }
    }

    /// Length of the longer document, in lines.
    pub fn line_count(&self) -> usize {
        self.old.len().max(self.new.len())
    }

    pub fn line(&self, side: Side, index: usize) -> Option<&Line> {
        match side {
            Side::Old => self.old.get(index),
            Side::New => self.new.get(index),
        }
    }

    pub fn count(&self, side: Side, key: &str) -> usize {
        let freq = match side {
            Side::Old => &self.freq_old,
            Side::New => &self.freq_new,
        };
        freq.get(key).copied().unwrap_or(0)
    }

    /// How many more times `key` occurs on `side` than on the other side.
    pub fn surplus(&self, side: Side, key: &str) -> usize {
        self.count(side, key)
            .saturating_sub(self.count(side.other(), key))
    }

    /// Sum of token surpluses on one side of a line. Non-zero means the half is tinted.
    pub fn weight(&self, side: Side, index: usize) -> usize {
        self.line(side, index)
            .map(|l| l.tokens.iter().map(|t| self.surplus(side, &t.key)).sum())
            .unwrap_or(0)
    }

    fn is_empty_at(&self, side: Side, index: usize) -> bool {
        self.line(side, index).is_none_or(Line::is_empty)
    }

    /// Whether line `index` shows a frequency shift or a presence mismatch.
    pub fn is_selected(&self, index: usize) -> bool {
        self.weight(Side::Old, index) > 0
            || self.weight(Side::New, index) > 0
            || self.is_empty_at(Side::Old, index) != self.is_empty_at(Side::New, index)
    }

    pub fn selected_lines(&self) -> Vec<usize> {
        (0..self.line_count())
            .filter(|&i| self.is_selected(i))
            .collect()
    }
}
