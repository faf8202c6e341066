//! HTTP retrieval of source pages.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use migratebot_shared::{MigrateError, PageFetcher, Result};

/// User-Agent string for page requests.
const USER_AGENT: &str = concat!("migratebot/", env!("CARGO_PKG_VERSION"));

/// [`PageFetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    /// Client without a request timeout; a stalled server blocks the run.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| MigrateError::Fetch(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| MigrateError::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MigrateError::Fetch(format!(
                "failed to fetch {url}: HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MigrateError::Fetch(format!("{url}: {e}")))?;

        debug!(bytes = body.len(), "page fetched");
        Ok(body)
    }
}
