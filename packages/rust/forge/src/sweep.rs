//! Cleanup of migration branches left behind without an open pull request.

use std::collections::HashSet;

use tracing::{info, instrument, warn};

use migratebot_shared::Result;

use crate::github::GitHubClient;

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Branches under the prefix with no open pull request.
    pub stale: Vec<String>,
    pub deleted: Vec<String>,
    /// Branches whose deletion failed, with the error message.
    pub failed: Vec<(String, String)>,
}

/// Branches under `prefix` that no open pull request uses as its head.
pub fn stale_branches(branches: &[String], open_heads: &[String], prefix: &str) -> Vec<String> {
    let heads: HashSet<&str> = open_heads.iter().map(String::as_str).collect();
    branches
        .iter()
        .filter(|b| b.starts_with(prefix) && !heads.contains(b.as_str()))
        .cloned()
        .collect()
}

/// Delete stale migration branches. With `dry_run`, only report them.
///
/// A failed deletion is logged and recorded; the sweep continues.
#[instrument(skip(client), fields(repo = %client.repository()))]
pub async fn sweep_branches(client: &GitHubClient, prefix: &str, dry_run: bool) -> Result<SweepReport> {
    let (heads, branches) = list_repository(client).await?;
    info!(open_pulls = heads.len(), branches = branches.len(), "repository listed");

    let stale = stale_branches(&branches, &heads, prefix);
    info!(count = stale.len(), "stale migration branches");

    let mut report = SweepReport {
        stale: stale.clone(),
        ..Default::default()
    };
    if dry_run {
        return Ok(report);
    }

    for branch in stale {
        match client.delete_branch(&branch).await {
            Ok(()) => report.deleted.push(branch),
            Err(e) => {
                warn!(%branch, error = %e, "failed to delete branch");
                report.failed.push((branch, e.to_string()));
            }
        }
    }
    Ok(report)
}

async fn list_repository(client: &GitHubClient) -> Result<(Vec<String>, Vec<String>)> {
    let heads = client.open_pull_request_heads().await?;
    let branches = client.branch_names().await?;
    Ok((heads, branches))
}
