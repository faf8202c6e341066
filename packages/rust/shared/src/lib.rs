//! Shared types, error model, and configuration for the migration bot.
//!
//! This crate is the foundation depended on by all other migratebot crates.
//! It provides:
//! - [`MigrateError`]: the unified error type
//! - Domain types ([`Ticket`], [`MigrationJob`], [`ExtractedContent`], [`ConvertedDocument`])
//! - The read-only [`SlugTable`]
//! - Collaborator contracts ([`IssueTracker`], [`PageFetcher`], [`ModelClient`], ...)
//! - Configuration ([`AppConfig`], config loading, credentials)

pub mod config;
pub mod error;
pub mod services;
pub mod slug;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CorpusConfig, Credentials, DiffConfig, GitHubConfig, ImageHostConfig,
    OpenRouterConfig, RetryConfig, SourceConfig, apply_repository_override, config_dir,
    config_file_path, init_config, load_config, load_config_from, load_credentials,
    load_github_token,
};
pub use error::{MigrateError, Result};
pub use services::{
    ChangeRequests, CommandOutput, CommandRunner, DraftRequest, ImageHost, IssueTracker,
    ModelClient, PageFetcher,
};
pub use slug::{SlugLookup, SlugMapEntry, SlugTable};
pub use types::{
    ConvertedDocument, ExtractedContent, JobStatus, MigrationJob, Ticket, source_key,
};
