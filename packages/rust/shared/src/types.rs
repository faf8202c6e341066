//! Core domain types for migration jobs.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MigrateError, Result};

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

/// An open migration ticket as seen on the issue tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket number.
    pub number: u64,
    /// Current title. Carries the source URL and, once linked, `[#<pr>]`.
    pub title: String,
}

static CHANGE_REQUEST_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[#\d+\]").expect("valid regex"));

static CHANGE_REQUEST_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[#\d+\]\s*").expect("valid regex"));

static SOURCE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s/]+/w/[^\s]+").expect("valid regex"));

impl Ticket {
    /// Whether the title already embeds a change-request reference (`[#<n>]`).
    pub fn has_change_request_reference(&self) -> bool {
        CHANGE_REQUEST_REF_RE.is_match(&self.title)
    }

    /// First source-page URL found in the title.
    pub fn source_url(&self) -> Result<Url> {
        let raw = SOURCE_URL_RE.find(&self.title).ok_or_else(|| {
            MigrateError::validation(format!(
                "no source page link found in ticket title '{}'",
                self.title
            ))
        })?;
        Url::parse(raw.as_str())
            .map_err(|e| MigrateError::validation(format!("invalid URL '{}': {e}", raw.as_str())))
    }

    /// Title rewritten to point at change request `number`.
    pub fn linked_title(&self, number: u64) -> String {
        let rest = CHANGE_REQUEST_PREFIX_RE.replace(&self.title, "");
        format!("[#{number}] {rest}")
    }
}

/// Slug table key for a source URL of the shape `scheme://host/w/<path>.html`.
pub fn source_key(url: &Url) -> Result<String> {
    let path = url.path();
    let rest = path.strip_prefix("/w/").ok_or_else(|| {
        MigrateError::validation(format!("source URL '{url}' is not under /w/"))
    })?;
    let key = rest.strip_suffix(".html").unwrap_or(rest).trim_end_matches('/');
    if key.is_empty() {
        return Err(MigrateError::validation(format!(
            "source URL '{url}' has an empty page path"
        )));
    }
    Ok(key.to_string())
}

// ---------------------------------------------------------------------------
// MigrationJob
// ---------------------------------------------------------------------------

/// Lifecycle of a single migration job. Variants are ordered by progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Fetching,
    Converting,
    Writing,
    Verifying,
    Publishing,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Converting => "converting",
            Self::Writing => "writing",
            Self::Verifying => "verifying",
            Self::Publishing => "publishing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Done and Failed accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ticket-driven unit of work.
#[derive(Debug, Clone)]
pub struct MigrationJob {
    pub ticket: Ticket,
    /// Source page, known once the title has been parsed.
    pub source_url: Option<Url>,
    status: JobStatus,
    /// Change request opened for this job.
    pub change_request: Option<u64>,
}

impl MigrationJob {
    pub fn new(ticket: Ticket) -> Self {
        Self {
            ticket,
            source_url: None,
            status: JobStatus::Queued,
            change_request: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Move the job forward. Jobs never regress, and terminal states are final.
    /// `Failed` is reachable from any non-terminal state.
    pub fn advance(&mut self, next: JobStatus) -> Result<()> {
        if self.status.is_terminal() || (next != JobStatus::Failed && next <= self.status) {
            return Err(MigrateError::validation(format!(
                "job #{} cannot move from {} to {next}",
                self.ticket.number, self.status
            )));
        }
        tracing::debug!(ticket = self.ticket.number, from = %self.status, to = %next, "job transition");
        self.status = next;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stage payloads
// ---------------------------------------------------------------------------

/// Content pulled from the source page.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// Inner markup of the main content subtree, noise removed.
    pub html: String,
    /// Page heading.
    pub title: String,
    /// Heading plus linearized body; kept for diffing, never persisted.
    pub text: String,
}

/// Model output normalized into the target dialect.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    /// Document body, starting with the import line when components are used.
    pub body: String,
    /// Structural components actually referenced, sorted.
    pub components: BTreeSet<String>,
}
