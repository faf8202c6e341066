//! Narrow contracts for the external collaborators the pipeline talks to.
//!
//! Every stage takes these as trait objects so tests can substitute fakes.

use std::path::Path;

use async_trait::async_trait;
use url::Url;

use crate::error::Result;
use crate::types::Ticket;

/// Ticket intake and status reporting.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Open tickets carrying the migration label.
    async fn open_tickets(&self) -> Result<Vec<Ticket>>;
    async fn comment(&self, ticket: u64, body: &str) -> Result<()>;
    async fn retitle(&self, ticket: u64, title: &str) -> Result<()>;
    async fn close(&self, ticket: u64) -> Result<()>;
}

/// A draft change request to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRequest {
    pub title: String,
    pub body: String,
    /// Branch carrying the change.
    pub head: String,
    /// Branch the change targets.
    pub base: String,
}

/// Change-request (pull request) creation.
#[async_trait]
pub trait ChangeRequests: Send + Sync {
    /// Open a draft change request and return its number.
    async fn open_draft(&self, request: &DraftRequest) -> Result<u64>;
}

/// Source page retrieval.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page body; non-success responses are errors.
    async fn fetch(&self, url: &Url) -> Result<String>;
}

/// Generative model service.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model identifier, used for attribution.
    fn model(&self) -> &str;
    /// Send a system instruction and a user message, returning the raw reply text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Image hosting for diff images.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload a PNG and return its public URL.
    async fn upload(&self, file_name: &str, png: Vec<u8>) -> Result<String>;
}

/// Captured result of an external process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process never ran or was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Error reported while spawning or waiting on the process.
    pub error: Option<String>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.error.is_none() && self.exit_code == Some(0)
    }

    /// Single diagnostic message combining every captured channel.
    pub fn diagnostic(&self, command: &str) -> String {
        let mut msg = match self.exit_code {
            Some(code) => format!("`{command}` exited with code {code}"),
            None => format!("`{command}` did not exit normally"),
        };
        if let Some(err) = &self.error {
            msg.push_str(&format!("\nerror: {err}"));
        }
        if !self.stdout.trim().is_empty() {
            msg.push_str(&format!("\nstdout:\n{}", self.stdout.trim_end()));
        }
        if !self.stderr.trim().is_empty() {
            msg.push_str(&format!("\nstderr:\n{}", self.stderr.trim_end()));
        }
        msg
    }
}

/// External process execution (build tooling, git).
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program args...` in `cwd`. Spawn failures are reported in [`CommandOutput::error`].
    async fn run(&self, program: &str, args: &[String], cwd: &Path) -> CommandOutput;
}
