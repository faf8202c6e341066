//! DiffVisualizer: word-frequency comparison of two linearized documents,
//! rendered as a two-column PNG.
//!
//! The pipeline is [`DiffAnalysis`] (tokens, dedup, frequencies, selection),
//! then [`layout`] (wrapping and row geometry into a [`DiffReport`]), then
//! [`render`] (raster output).

pub mod analysis;
pub mod layout;
pub mod render;

use tracing::{debug, instrument};

use migratebot_shared::Result;

pub use analysis::{DiffAnalysis, Line, Side, Token, intensity, tokenize};
pub use layout::{DiffReport, RowLayout, TextMeasure, layout};
pub use render::{FontFace, render};

/// Compare `old` and `new` and render the differences.
///
/// Returns `Ok(None)` when no line differs.
#[instrument(skip_all, fields(old_len = old.len(), new_len = new.len()))]
pub fn visualize(old: &str, new: &str, font: &FontFace) -> Result<Option<Vec<u8>>> {
    let analysis = DiffAnalysis::new(old, new);
    let Some(report) = layout::layout(&analysis, font) else {
        debug!("texts match, no diff image");
        return Ok(None);
    };
    debug!(rows = report.rows.len(), "diff rows selected");
    render::render(&analysis, &report, font).map(Some)
}
