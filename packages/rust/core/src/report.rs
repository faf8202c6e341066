//! Migration progress report over the slug table.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use url::Url;

use migratebot_shared::{AppConfig, MigrateError, Result, SlugTable};

const SOURCE_PAGE_BASE: &str = "http://en.cppreference.com/w/";
const SITE_BASE: &str = "http://cppdoc.cc/";

/// Migration state of one slug table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEntry {
    pub source: String,
    pub destination: Option<String>,
    pub migrated: bool,
}

/// Whether a document exists for `destination`, as `<dest>.mdx` or `<dest>/index.mdx`.
pub fn is_migrated(docs_root: &Path, destination: &str) -> bool {
    let dest = destination.trim_matches('/');
    docs_root.join(format!("{dest}.mdx")).is_file()
        || docs_root.join(dest).join("index.mdx").is_file()
}

/// Check every table entry against the docs directory.
pub fn collect_progress(slugs: &SlugTable, docs_root: &Path) -> Vec<ProgressEntry> {
    slugs
        .entries()
        .iter()
        .map(|entry| ProgressEntry {
            source: entry.source.clone(),
            destination: entry.destination.clone(),
            migrated: entry
                .destination
                .as_deref()
                .is_some_and(|d| is_migrated(docs_root, d)),
        })
        .collect()
}

/// Link targets used in the report.
#[derive(Debug, Clone)]
pub struct ReportLinks {
    pub source_name: String,
    /// `https://github.com/<owner>/<repo>/issues/new`.
    pub new_ticket: String,
    pub label: String,
}

impl ReportLinks {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            source_name: config.source.name.clone(),
            new_ticket: format!(
                "https://github.com/{}/{}/issues/new",
                config.github.owner, config.github.repo
            ),
            label: config.github.label.clone(),
        }
    }

    fn source_page(&self, key: &str) -> String {
        format!("{SOURCE_PAGE_BASE}{key}.html")
    }

    fn create_ticket(&self, source_page: &str) -> String {
        Url::parse_with_params(
            &self.new_ticket,
            &[("title", source_page), ("labels", self.label.as_str())],
        )
        .map(String::from)
        .unwrap_or_else(|_| self.new_ticket.clone())
    }
}

fn entry_label(entry: &ProgressEntry) -> String {
    match &entry.destination {
        Some(dest) => dest.clone(),
        None => format!("{}(cppref)", entry.source),
    }
}

fn render_row(entry: &ProgressEntry, links: &ReportLinks) -> String {
    let source = links.source_page(&entry.source);
    let label = entry_label(entry);
    match (&entry.destination, entry.migrated) {
        (Some(dest), true) => {
            format!("| ✅ | [source]({source}) | [site]({SITE_BASE}{dest}) | `{label}` |")
        }
        (Some(_), false) => format!(
            "| ❌ | [source]({source}) | [create]({}) | `{label}` |",
            links.create_ticket(&source)
        ),
        (None, _) => format!("| ❌ | [source]({source}) | N/A | `{label}` |"),
    }
}

/// Markdown report with overall counts and one row per entry.
pub fn render_report(entries: &[ProgressEntry], links: &ReportLinks, generated_at: DateTime<Utc>) -> String {
    let total = entries.len();
    let migrated = entries.iter().filter(|e| e.migrated).count();
    let percent = if total == 0 {
        0.0
    } else {
        migrated as f64 * 100.0 / total as f64
    };

    let mut out = format!(
        "### {} Migration Progress\n\
         #### Overall Progress: {migrated} / {total} migrated ({percent:.2}%)\n\
         Updated at {}\n\n\
         | Status | Source Link | Site Link | Entry |\n\
         |--------|-------------|-----------|-------|\n",
        links.source_name,
        generated_at.to_rfc3339(),
    );
    for entry in entries {
        out.push_str(&render_row(entry, links));
        out.push('\n');
    }
    out
}

/// Build the report from the slug table and write it to `output`.
#[instrument(skip(config, slugs), fields(output = %output.display()))]
pub fn write_progress_report(config: &AppConfig, slugs: &SlugTable, output: &Path) -> Result<(usize, usize)> {
    let entries = collect_progress(slugs, &config.corpus.docs_root());
    let report = render_report(&entries, &ReportLinks::from_config(config), Utc::now());
    std::fs::write(output, report).map_err(|e| MigrateError::io(output, e))?;

    let migrated = entries.iter().filter(|e| e.migrated).count();
    info!(migrated, total = entries.len(), "progress report written");
    Ok((migrated, entries.len()))
}
