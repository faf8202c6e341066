//! Core pipeline orchestration for the migration bot.
//!
//! This crate ties together extraction, conversion, writing, build
//! verification, and publishing into the per-ticket migration workflow.

pub mod pipeline;
pub mod process;
pub mod publish;
pub mod report;
pub mod retry;
pub mod verify;
pub mod writer;

pub use pipeline::{
    JobOutcome, Orchestrator, ProgressReporter, RunContext, RunSummary, Services, SilentProgress,
};
pub use process::SystemRunner;
pub use report::write_progress_report;
