//! Forge integrations: the GitHub REST API and diff image hosting.

pub mod github;
pub mod image_host;
pub mod sweep;

pub use github::GitHubClient;
pub use image_host::HttpImageHost;
pub use sweep::{SweepReport, stale_branches, sweep_branches};
