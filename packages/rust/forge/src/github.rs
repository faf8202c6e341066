//! GitHub REST client for tickets, draft pull requests and branch housekeeping.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use migratebot_shared::{
    ChangeRequests, DraftRequest, GitHubConfig, IssueTracker, MigrateError, Result, Ticket,
};

const USER_AGENT: &str = concat!("migratebot/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";

/// Open tickets fetched per poll.
const TICKET_PAGE_SIZE: usize = 50;
/// Page size for exhaustive listings.
const LIST_PAGE_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IssueItem {
    number: u64,
    title: String,
    /// Present when the "issue" is actually a pull request.
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct IssuePatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CreatePull<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
    draft: bool,
}

#[derive(Debug, Deserialize)]
struct Numbered {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct PullItem {
    head: PullHead,
}

#[derive(Debug, Deserialize)]
struct PullHead {
    #[serde(rename = "ref")]
    branch: String,
}

#[derive(Debug, Deserialize)]
struct BranchItem {
    name: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Authenticated client bound to one repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    api_base: String,
    owner: String,
    repo: String,
    label: String,
    token: String,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MigrateError::Tracker(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            label: config.label.clone(),
            token: token.into(),
        })
    }

    /// `owner/repo`.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/repos/{}/{}/{path}", self.api_base, self.owner, self.repo);
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Send and check the status; `err` picks the error variant for this call site.
    async fn send(
        &self,
        request: RequestBuilder,
        what: &str,
        err: fn(String) -> MigrateError,
    ) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| err(format!("{what}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(err(format!("{what}: HTTP {status}: {body}")));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
        err: fn(String) -> MigrateError,
    ) -> Result<T> {
        self.send(request, what, err)
            .await?
            .json()
            .await
            .map_err(|e| err(format!("{what}: invalid response: {e}")))
    }

    /// Fetch every page of a listing endpoint.
    async fn paginate<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<Vec<T>> {
        let mut all = Vec::new();
        let mut page = 1usize;
        loop {
            let per_page = LIST_PAGE_SIZE.to_string();
            let page_str = page.to_string();
            let request = self
                .request(Method::GET, path)
                .query(query)
                .query(&[("per_page", per_page.as_str()), ("page", page_str.as_str())]);
            let items: Vec<T> = self.send_json(request, what, MigrateError::Tracker).await?;
            let count = items.len();
            all.extend(items);
            if count < LIST_PAGE_SIZE {
                break;
            }
            page += 1;
        }
        debug!(what, total = all.len(), pages = page, "listing complete");
        Ok(all)
    }

    async fn patch_issue(&self, ticket: u64, patch: &IssuePatch<'_>, what: &str) -> Result<()> {
        let request = self
            .request(Method::PATCH, &format!("issues/{ticket}"))
            .json(patch);
        self.send(request, what, MigrateError::Tracker).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Branch housekeeping
    // -----------------------------------------------------------------------

    /// Head branch names of all open pull requests.
    pub async fn open_pull_request_heads(&self) -> Result<Vec<String>> {
        let pulls: Vec<PullItem> = self
            .paginate("pulls", &[("state", "open")], "list pull requests")
            .await?;
        Ok(pulls.into_iter().map(|p| p.head.branch).collect())
    }

    /// Names of all branches in the repository.
    pub async fn branch_names(&self) -> Result<Vec<String>> {
        let branches: Vec<BranchItem> = self.paginate("branches", &[], "list branches").await?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }

    #[instrument(skip(self))]
    pub async fn delete_branch(&self, branch: &str) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("git/refs/heads/{branch}"));
        self.send(request, "delete branch", MigrateError::Tracker)
            .await?;
        info!(branch, "remote branch deleted");
        Ok(())
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    #[instrument(skip(self), fields(repo = %self.repository(), label = %self.label))]
    async fn open_tickets(&self) -> Result<Vec<Ticket>> {
        let per_page = TICKET_PAGE_SIZE.to_string();
        let request = self.request(Method::GET, "issues").query(&[
            ("labels", self.label.as_str()),
            ("state", "open"),
            ("per_page", per_page.as_str()),
        ]);
        let items: Vec<IssueItem> = self
            .send_json(request, "list tickets", MigrateError::Tracker)
            .await?;

        let tickets: Vec<Ticket> = items
            .into_iter()
            .filter(|item| item.pull_request.is_none())
            .map(|item| Ticket {
                number: item.number,
                title: item.title,
            })
            .collect();
        info!(count = tickets.len(), "open tickets fetched");
        Ok(tickets)
    }

    async fn comment(&self, ticket: u64, body: &str) -> Result<()> {
        let request = self
            .request(Method::POST, &format!("issues/{ticket}/comments"))
            .json(&CommentBody { body });
        self.send(request, "comment on ticket", MigrateError::Tracker)
            .await?;
        debug!(ticket, "comment posted");
        Ok(())
    }

    async fn retitle(&self, ticket: u64, title: &str) -> Result<()> {
        let patch = IssuePatch {
            title: Some(title),
            state: None,
        };
        self.patch_issue(ticket, &patch, "retitle ticket").await
    }

    async fn close(&self, ticket: u64) -> Result<()> {
        let patch = IssuePatch {
            title: None,
            state: Some("closed"),
        };
        self.patch_issue(ticket, &patch, "close ticket").await
    }
}

#[async_trait]
impl ChangeRequests for GitHubClient {
    #[instrument(skip_all, fields(head = %request.head, base = %request.base))]
    async fn open_draft(&self, request: &DraftRequest) -> Result<u64> {
        let payload = CreatePull {
            title: &request.title,
            body: &request.body,
            head: &request.head,
            base: &request.base,
            draft: true,
        };
        let http = self.request(Method::POST, "pulls").json(&payload);
        let created: Numbered = self
            .send_json(http, "open pull request", MigrateError::Publish)
            .await?;
        info!(number = created.number, "draft pull request opened");
        Ok(created.number)
    }
}
