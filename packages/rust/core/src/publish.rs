//! Publisher: branch, commit, push and open a draft change request.

use std::path::Path;

use chrono::Utc;
use tracing::{info, instrument, warn};
use url::Url;

use migratebot_shared::{
    ChangeRequests, CommandRunner, DraftRequest, GitHubConfig, ImageHost, MigrateError, Result,
    Ticket,
};

use crate::process::command_line;

/// Shown in place of the diff image when none is available.
pub const NO_DIFF_PLACEHOLDER: &str = "_No diff available._";

const COLOR_LEGEND: &str = "\
Legend: <span style=\"color:#ffb4ab\">red</span> words occur less often after migration \
(removed or reduced), <span style=\"color:#b7f0d9\">green</span> words occur more often \
(added or repeated), grey words are unchanged context. Skipped regions are shown as `...`.";

/// Lowercase base-36 rendering.
pub fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Branch for a ticket: `<prefix><ticket>-<base36 millis>`.
pub fn branch_name(prefix: &str, ticket: u64, created_millis: u64) -> String {
    format!("{prefix}{ticket}-{}", base36(created_millis))
}

/// Change-request title; also used as the commit message.
pub fn change_request_title(source_key: &str, source_name: &str, ticket: u64) -> String {
    format!("feat: migrate {source_key} from {source_name} [#{ticket}]")
}

/// Inputs for one change-request body.
#[derive(Debug, Clone)]
pub struct BodyContext<'a> {
    pub source_url: &'a Url,
    pub model: &'a str,
    pub owner: &'a str,
    pub repo: &'a str,
    pub branch: &'a str,
    /// Document path relative to the repository root.
    pub document: &'a str,
    pub ticket: u64,
    pub diff_image_url: Option<&'a str>,
}

pub fn change_request_body(ctx: &BodyContext<'_>) -> String {
    let diff = match ctx.diff_image_url {
        Some(url) => format!("![content diff]({url})"),
        None => NO_DIFF_PLACEHOLDER.to_string(),
    };
    format!(
        "Automatically migrated from {source} using `{model}`.\n\n\
         [Edit {doc}](https://github.com/{owner}/{repo}/edit/{branch}/{doc})\n\n\
         <small>Close #{ticket}</small>\n\n\
         ### Content diff\n\n\
         {diff}\n\n\
         {legend}\n",
        source = ctx.source_url,
        model = ctx.model,
        doc = ctx.document,
        owner = ctx.owner,
        repo = ctx.repo,
        branch = ctx.branch,
        ticket = ctx.ticket,
        legend = COLOR_LEGEND,
    )
}

/// What to publish for one job.
#[derive(Debug)]
pub struct Publication<'a> {
    pub ticket: &'a Ticket,
    pub source_url: &'a Url,
    pub source_key: &'a str,
    /// Absolute path of the written document.
    pub document: &'a Path,
    pub diff_png: Option<Vec<u8>>,
}

pub struct Publisher<'a> {
    pub runner: &'a dyn CommandRunner,
    pub change_requests: &'a dyn ChangeRequests,
    pub image_host: Option<&'a dyn ImageHost>,
    pub github: &'a GitHubConfig,
    /// Repository working tree.
    pub repo_root: &'a Path,
    pub source_name: &'a str,
    pub model: &'a str,
}

impl Publisher<'_> {
    /// Publish and return the change-request number.
    ///
    /// The base branch is checked out again afterwards, whatever the outcome.
    #[instrument(skip_all, fields(ticket = publication.ticket.number))]
    pub async fn publish(&self, publication: Publication<'_>) -> Result<u64> {
        let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let branch = branch_name(&self.github.branch_prefix, publication.ticket.number, millis);

        let result = self.publish_on_branch(&branch, publication).await;

        let restore = self
            .runner
            .run("git", &args(&["checkout", &self.github.base_branch]), self.repo_root)
            .await;
        if !restore.success() {
            warn!(
                diagnostic = %restore.diagnostic("git checkout"),
                "failed to return to base branch"
            );
        }
        result
    }

    async fn publish_on_branch(&self, branch: &str, publication: Publication<'_>) -> Result<u64> {
        let number = publication.ticket.number;
        let document = relative_document(self.repo_root, publication.document);
        let title = change_request_title(publication.source_key, self.source_name, number);

        self.git(&["config", "user.name", &self.github.bot_name]).await?;
        self.git(&["config", "user.email", &self.github.bot_email]).await?;
        self.git(&["checkout", "-b", branch]).await?;
        self.git(&["add", &document]).await?;
        self.git(&["commit", "-m", &title]).await?;
        self.git(&["push", "origin", branch]).await?;
        info!(%branch, "branch pushed");

        let image_url = match (publication.diff_png, self.image_host) {
            (Some(png), Some(host)) => {
                Some(host.upload(&format!("diff-{number}-{}.png", branch_suffix(branch)), png).await?)
            }
            (Some(_), None) => {
                info!("no image host configured, diff image omitted");
                None
            }
            (None, _) => None,
        };

        let body = change_request_body(&BodyContext {
            source_url: publication.source_url,
            model: self.model,
            owner: &self.github.owner,
            repo: &self.github.repo,
            branch,
            document: &document,
            ticket: number,
            diff_image_url: image_url.as_deref(),
        });

        self.change_requests
            .open_draft(&DraftRequest {
                title,
                body,
                head: branch.to_string(),
                base: self.github.base_branch.clone(),
            })
            .await
    }

    async fn git(&self, git_args: &[&str]) -> Result<()> {
        let git_args = args(git_args);
        let out = self.runner.run("git", &git_args, self.repo_root).await;
        if !out.success() {
            return Err(MigrateError::Publish(
                out.diagnostic(&command_line("git", &git_args)),
            ));
        }
        Ok(())
    }
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn branch_suffix(branch: &str) -> &str {
    branch.rsplit('/').next().unwrap_or(branch)
}

/// Path of `document` relative to `root`, with `/` separators.
fn relative_document(root: &Path, document: &Path) -> String {
    let rel = document.strip_prefix(root).unwrap_or(document);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::verify::tests::ScriptedRunner;

    #[derive(Default)]
    struct RecordingRequests {
        opened: Mutex<Vec<DraftRequest>>,
    }

    #[async_trait]
    impl ChangeRequests for RecordingRequests {
        async fn open_draft(&self, request: &DraftRequest) -> Result<u64> {
            self.opened.lock().unwrap().push(request.clone());
            Ok(42)
        }
    }

    struct FixedHost;

    #[async_trait]
    impl ImageHost for FixedHost {
        async fn upload(&self, file_name: &str, _png: Vec<u8>) -> Result<String> {
            Ok(format!("https://img.example/{file_name}"))
        }
    }

    struct BrokenHost;

    #[async_trait]
    impl ImageHost for BrokenHost {
        async fn upload(&self, _file_name: &str, _png: Vec<u8>) -> Result<String> {
            Err(MigrateError::Publish("upload refused".into()))
        }
    }

    fn ticket() -> Ticket {
        Ticket {
            number: 7,
            title: "https://en.cppreference.com/w/cpp/comments.html".into(),
        }
    }

    fn url() -> Url {
        Url::parse("https://en.cppreference.com/w/cpp/comments.html").unwrap()
    }

    #[test]
    fn base36_matches_radix_formatting() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
        assert_eq!(base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn names_branch_and_title() {
        assert_eq!(branch_name("migrate/", 7, 36), "migrate/7-10");
        assert_eq!(
            change_request_title("cpp/comments", "cppreference", 7),
            "feat: migrate cpp/comments from cppreference [#7]"
        );
    }

    #[test]
    fn body_embeds_image_or_placeholder() {
        let url = url();
        let mut ctx = BodyContext {
            source_url: &url,
            model: "google/gemini-2.5-flash",
            owner: "cppdoc-cc",
            repo: "cppdoc",
            branch: "migrate/7-abc",
            document: "src/content/docs/cpp/comments.mdx",
            ticket: 7,
            diff_image_url: Some("https://img.example/d.png"),
        };
        let body = change_request_body(&ctx);
        assert!(body.starts_with(
            "Automatically migrated from https://en.cppreference.com/w/cpp/comments.html using `google/gemini-2.5-flash`."
        ));
        assert!(body.contains(
            "[Edit src/content/docs/cpp/comments.mdx](https://github.com/cppdoc-cc/cppdoc/edit/migrate/7-abc/src/content/docs/cpp/comments.mdx)"
        ));
        assert!(body.contains("Close #7"));
        assert!(body.contains("![content diff](https://img.example/d.png)"));
        assert!(body.contains("Legend:"));

        ctx.diff_image_url = None;
        let body = change_request_body(&ctx);
        assert!(body.contains(NO_DIFF_PLACEHOLDER));
        assert!(!body.contains("!["));
    }

    #[tokio::test]
    async fn publishes_with_git_sequence_and_uploaded_diff() {
        let runner = ScriptedRunner::default();
        let requests = RecordingRequests::default();
        let github = GitHubConfig::default();
        let root = PathBuf::from("/repo");
        let doc = root.join("src/content/docs/cpp/comments.mdx");
        let publisher = Publisher {
            runner: &runner,
            change_requests: &requests,
            image_host: Some(&FixedHost),
            github: &github,
            repo_root: &root,
            source_name: "cppreference",
            model: "m",
        };

        let number = publisher
            .publish(Publication {
                ticket: &ticket(),
                source_url: &url(),
                source_key: "cpp/comments",
                document: &doc,
                diff_png: Some(vec![1, 2, 3]),
            })
            .await
            .unwrap();
        assert_eq!(number, 42);

        let calls = runner.calls();
        assert_eq!(calls[0], "git config user.name github-actions[bot]");
        assert_eq!(calls[1], "git config user.email github-actions[bot]@users.noreply.github.com");
        assert!(calls[2].starts_with("git checkout -b migrate/7-"));
        assert_eq!(calls[3], "git add src/content/docs/cpp/comments.mdx");
        assert_eq!(calls[4], "git commit -m feat: migrate cpp/comments from cppreference [#7]");
        assert!(calls[5].starts_with("git push origin migrate/7-"));
        assert_eq!(calls[6], "git checkout main");

        let opened = requests.opened.lock().unwrap();
        let request = &opened[0];
        assert!(request.head.starts_with("migrate/7-"));
        assert_eq!(request.base, "main");
        assert!(request.body.contains("![content diff](https://img.example/diff-7-"));
    }

    #[tokio::test]
    async fn git_failure_is_publish_error_and_restores_base() {
        let runner = ScriptedRunner::failing("git push", 128, "permission denied");
        let requests = RecordingRequests::default();
        let github = GitHubConfig::default();
        let root = PathBuf::from("/repo");
        let doc = root.join("src/content/docs/cpp/comments.mdx");
        let publisher = Publisher {
            runner: &runner,
            change_requests: &requests,
            image_host: None,
            github: &github,
            repo_root: &root,
            source_name: "cppreference",
            model: "m",
        };

        let err = publisher
            .publish(Publication {
                ticket: &ticket(),
                source_url: &url(),
                source_key: "cpp/comments",
                document: &doc,
                diff_png: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Publish(ref m) if m.contains("permission denied")));
        assert!(!err.is_retryable());
        assert_eq!(runner.calls().last().map(String::as_str), Some("git checkout main"));
        assert!(requests.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_failure_is_fatal() {
        let runner = ScriptedRunner::default();
        let requests = RecordingRequests::default();
        let github = GitHubConfig::default();
        let root = PathBuf::from("/repo");
        let doc = root.join("d.mdx");
        let publisher = Publisher {
            runner: &runner,
            change_requests: &requests,
            image_host: Some(&BrokenHost),
            github: &github,
            repo_root: &root,
            source_name: "cppreference",
            model: "m",
        };

        let result = publisher
            .publish(Publication {
                ticket: &ticket(),
                source_url: &url(),
                source_key: "cpp/comments",
                document: &doc,
                diff_png: Some(vec![0]),
            })
            .await;
        assert!(matches!(result, Err(MigrateError::Publish(_))));
        assert!(requests.opened.lock().unwrap().is_empty());
    }
}
