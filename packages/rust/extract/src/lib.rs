//! Source page extraction and plain-text linearization.
//!
//! This crate provides:
//! - [`HttpPageFetcher`]: retrieves source pages over HTTP
//! - [`extract_page`]: locates the main content, strips noise, captures the heading
//! - [`DomTree`] / [`linearize`]: deterministic DOM-to-text rendering for diffing

pub mod dom;
pub mod fetch;
pub mod linearize;

use scraper::{Html, Selector};
use tracing::{debug, instrument};

use migratebot_shared::{ExtractedContent, MigrateError, Result, SourceConfig};

pub use dom::{DomNode, DomTree, ElementData, InlineStyle, NodeId};
pub use fetch::HttpPageFetcher;
pub use linearize::{linearize, linearize_node};

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| MigrateError::config(format!("invalid selector '{selector}': {e}")))
}

/// Pull the main content, heading and linearized text out of a source page.
#[instrument(skip_all, fields(bytes = html.len()))]
pub fn extract_page(html: &str, source: &SourceConfig) -> Result<ExtractedContent> {
    let mut doc = Html::parse_document(html);

    for noise in &source.noise_selectors {
        let selector = parse_selector(noise)?;
        let ids: Vec<_> = doc.select(&selector).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = doc.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    let heading_sel = parse_selector(&source.heading_selector)?;
    let title = doc
        .select(&heading_sel)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();

    let content_sel = parse_selector(&source.content_selector)?;
    let content = doc.select(&content_sel).next().ok_or_else(|| {
        MigrateError::extraction(format!(
            "could not find content element '{}'",
            source.content_selector
        ))
    })?;

    let body = linearize(&DomTree::from_element(content));
    let text = if title.is_empty() {
        body
    } else {
        format!("{title}\n{body}")
    };

    debug!(%title, text_len = text.len(), "page extracted");

    Ok(ExtractedContent {
        html: content.inner_html(),
        title,
        text,
    })
}

/// Linearize the element matching `selector` in a full HTML document.
///
/// Used on built corpus pages to obtain the "after" side of a comparison.
pub fn linearize_document(html: &str, selector: &str) -> Result<String> {
    let doc = Html::parse_document(html);
    let sel = parse_selector(selector)?;
    let root = doc
        .select(&sel)
        .next()
        .ok_or_else(|| MigrateError::extraction(format!("could not find element '{selector}'")))?;
    Ok(linearize(&DomTree::from_element(root)))
}
