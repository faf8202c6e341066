//! Orchestrator: drives each open ticket through
//! fetch → convert → write → verify → publish, one job at a time.

use tracing::{debug, error, info, instrument, warn};

use migratebot_convert::Converter;
use migratebot_diff::{FontFace, visualize};
use migratebot_extract::{extract_page, linearize_document};
use migratebot_shared::{
    AppConfig, ChangeRequests, CommandRunner, ImageHost, IssueTracker, JobStatus, MigrationJob,
    ModelClient, PageFetcher, Result, SlugTable, Ticket, source_key,
};

use crate::publish::{Publication, Publisher};
use crate::retry::{AttemptPolicy, with_attempts};
use crate::verify::Verifier;
use crate::writer;

/// Ticket comments are capped below the tracker's 65536-character limit.
pub const MAX_COMMENT_CHARS: usize = 60_000;

/// External collaborators, shared by every job in a run.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub tracker: &'a dyn IssueTracker,
    pub fetcher: &'a dyn PageFetcher,
    pub model: &'a dyn ModelClient,
    pub change_requests: &'a dyn ChangeRequests,
    pub image_host: Option<&'a dyn ImageHost>,
    pub runner: &'a dyn CommandRunner,
}

/// Read-only state built once at startup.
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub config: &'a AppConfig,
    pub slugs: &'a SlugTable,
    pub converter: &'a Converter,
    /// Font for diff images. No font means no diff image.
    pub font: Option<&'a FontFace>,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The ticket already references a change request.
    Skipped,
    Published { change_request: u64 },
    Failed { stage: JobStatus, message: String },
}

/// Outcomes of one run, in processing order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<(u64, JobOutcome)>,
}

impl RunSummary {
    pub fn published(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Published { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Skipped))
    }

    fn count(&self, pred: impl Fn(&JobOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a ticket is processed.
    fn job_started(&self, ticket: &Ticket, current: usize, total: usize);
    /// Called when a job enters a stage.
    fn stage(&self, ticket: u64, status: JobStatus);
    /// Called when a job reaches a terminal state.
    fn job_finished(&self, ticket: u64, outcome: &JobOutcome);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn job_started(&self, _ticket: &Ticket, _current: usize, _total: usize) {}
    fn stage(&self, _ticket: u64, _status: JobStatus) {}
    fn job_finished(&self, _ticket: u64, _outcome: &JobOutcome) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Keep the last `max_chars` characters of `text`, marking the cut.
pub fn truncate_tail(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let skip = total - max_chars;
    let start = text
        .char_indices()
        .nth(skip)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    format!("[... {skip} characters truncated ...]\n{}", &text[start..])
}

pub struct Orchestrator<'a> {
    services: Services<'a>,
    ctx: RunContext<'a>,
    progress: &'a dyn ProgressReporter,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        services: Services<'a>,
        ctx: RunContext<'a>,
        progress: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            services,
            ctx,
            progress,
        }
    }

    /// Process every open ticket. Only the initial listing can fail the run.
    #[instrument(skip_all)]
    pub async fn run(&self) -> Result<RunSummary> {
        let tickets = self.services.tracker.open_tickets().await?;
        let total = tickets.len();
        info!(total, "processing open tickets");

        let mut summary = RunSummary::default();
        for (i, ticket) in tickets.into_iter().enumerate() {
            self.progress.job_started(&ticket, i + 1, total);
            let number = ticket.number;
            let outcome = self.process(ticket).await;
            self.progress.job_finished(number, &outcome);
            summary.outcomes.push((number, outcome));
        }

        info!(
            published = summary.published(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            "run complete"
        );
        self.progress.done(&summary);
        Ok(summary)
    }

    /// Run one ticket to completion. Failures are reported on the ticket, never propagated.
    #[instrument(skip_all, fields(ticket = ticket.number))]
    pub async fn process(&self, ticket: Ticket) -> JobOutcome {
        let mut job = MigrationJob::new(ticket);

        if job.ticket.has_change_request_reference() {
            info!(title = %job.ticket.title, "ticket already linked, skipping");
            self.finish(&mut job, JobStatus::Done);
            return JobOutcome::Skipped;
        }

        match self.execute(&mut job).await {
            Ok(number) => {
                job.change_request = Some(number);
                self.finish(&mut job, JobStatus::Done);
                self.report_success(&job.ticket, number).await;
                JobOutcome::Published {
                    change_request: number,
                }
            }
            Err(e) => {
                let stage = job.status();
                error!(%stage, error = %e, "job failed");
                self.finish(&mut job, JobStatus::Failed);
                self.report_failure(&job.ticket, &e.to_string()).await;
                JobOutcome::Failed {
                    stage,
                    message: e.to_string(),
                }
            }
        }
    }

    fn enter(&self, job: &mut MigrationJob, status: JobStatus) -> Result<()> {
        job.advance(status)?;
        self.progress.stage(job.ticket.number, status);
        Ok(())
    }

    fn finish(&self, job: &mut MigrationJob, status: JobStatus) {
        if let Err(e) = self.enter(job, status) {
            warn!(error = %e, "could not record final job status");
        }
    }

    async fn execute(&self, job: &mut MigrationJob) -> Result<u64> {
        let config = self.ctx.config;
        let policy = AttemptPolicy::from(&config.retry);

        let url = job.ticket.source_url()?;
        job.source_url = Some(url.clone());
        let key = source_key(&url)?;
        debug!(%url, %key, "source resolved");

        // --- Fetching ---
        self.enter(job, JobStatus::Fetching)?;
        let fetcher = self.services.fetcher;
        let source = &config.source;
        let url_ref = &url;
        let content = with_attempts(policy, "fetch", |_| async move {
            let html = fetcher.fetch(url_ref).await?;
            extract_page(&html, source)
        })
        .await?;

        // --- Converting ---
        self.enter(job, JobStatus::Converting)?;
        let converter = self.ctx.converter;
        let model = self.services.model;
        let slugs = self.ctx.slugs;
        let content_ref = &content;
        let doc = with_attempts(policy, "convert", |_| async move {
            converter.convert(model, content_ref, url_ref, slugs).await
        })
        .await?;

        // --- Writing ---
        self.enter(job, JobStatus::Writing)?;
        let destination = slugs.output_destination(&key)?;
        let path = writer::output_path(&config.corpus.docs_root(), destination);
        let title = if content.title.is_empty() {
            key.as_str()
        } else {
            content.title.as_str()
        };
        writer::write_document(&path, &doc, title, &config.source.name, &url)?;

        // --- Verifying ---
        self.enter(job, JobStatus::Verifying)?;
        Verifier::new(self.services.runner, &config.corpus)
            .verify()
            .await?;

        // --- Publishing ---
        self.enter(job, JobStatus::Publishing)?;
        let diff_png = self.render_diff(&content.text, destination);
        let publisher = Publisher {
            runner: self.services.runner,
            change_requests: self.services.change_requests,
            image_host: self.services.image_host,
            github: &config.github,
            repo_root: &config.corpus.root,
            source_name: &config.source.name,
            model: model.model(),
        };
        publisher
            .publish(Publication {
                ticket: &job.ticket,
                source_url: &url,
                source_key: &key,
                document: &path,
                diff_png,
            })
            .await
    }

    /// Compare the extracted text with the freshly built page. Any problem yields no image.
    fn render_diff(&self, before: &str, destination: &str) -> Option<Vec<u8>> {
        let Some(font) = self.ctx.font else {
            debug!("no font loaded, diff image skipped");
            return None;
        };
        let corpus = &self.ctx.config.corpus;
        let built = corpus
            .build_output_root()
            .join(destination.trim_matches('/'))
            .join("index.html");

        let html = match std::fs::read_to_string(&built) {
            Ok(html) => html,
            Err(e) => {
                warn!(path = %built.display(), error = %e, "built page unavailable, no diff image");
                return None;
            }
        };
        let after = match linearize_document(&html, &corpus.built_content_selector) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "could not linearize built page, no diff image");
                return None;
            }
        };

        match visualize(before, &after, font) {
            Ok(png) => png,
            Err(e) => {
                warn!(error = %e, "diff rendering failed, no diff image");
                None
            }
        }
    }

    async fn report_success(&self, ticket: &Ticket, number: u64) {
        let tracker = self.services.tracker;
        let comment = format!("Migration complete! Opened draft pull request #{number}.");
        if let Err(e) = tracker.comment(ticket.number, &comment).await {
            warn!(error = %e, "failed to comment on ticket");
        }
        if let Err(e) = tracker.retitle(ticket.number, &ticket.linked_title(number)).await {
            warn!(error = %e, "failed to retitle ticket");
        }
        info!(change_request = number, "ticket linked");
    }

    async fn report_failure(&self, ticket: &Ticket, message: &str) {
        let tracker = self.services.tracker;
        let comment = format!(
            "Migration failed: {}\n\nClosing this issue.",
            truncate_tail(message, MAX_COMMENT_CHARS)
        );
        if let Err(e) = tracker.comment(ticket.number, &comment).await {
            warn!(error = %e, "failed to comment on ticket");
        }
        if let Err(e) = tracker.close(ticket.number).await {
            warn!(error = %e, "failed to close ticket");
        }
    }
}
