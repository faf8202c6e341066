//! Multipart image upload for diff images.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::{info, instrument};

use migratebot_shared::{ImageHost, ImageHostConfig, MigrateError, Result};

/// [`ImageHost`] posting a multipart form and reading the URL from the JSON reply.
///
/// The URL is taken from `url`, `data.url` or `link`, whichever is present.
#[derive(Debug, Clone)]
pub struct HttpImageHost {
    client: Client,
    endpoint: String,
    field_name: String,
    token: Option<String>,
}

impl HttpImageHost {
    pub fn new(config: &ImageHostConfig, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| MigrateError::Publish(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            field_name: config.field_name.clone(),
            token,
        })
    }
}

fn image_url(reply: &serde_json::Value) -> Option<&str> {
    reply
        .get("url")
        .or_else(|| reply.get("data").and_then(|d| d.get("url")))
        .or_else(|| reply.get("link"))
        .and_then(|v| v.as_str())
}

#[async_trait]
impl ImageHost for HttpImageHost {
    #[instrument(skip(self, png), fields(bytes = png.len()))]
    async fn upload(&self, file_name: &str, png: Vec<u8>) -> Result<String> {
        let part = Part::bytes(png)
            .file_name(file_name.to_string())
            .mime_str("image/png")
            .map_err(|e| MigrateError::Publish(format!("invalid upload part: {e}")))?;
        let form = Form::new().part(self.field_name.clone(), part);

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MigrateError::Publish(format!("image upload failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MigrateError::Publish(format!(
                "image upload failed: HTTP {status}: {body}"
            )));
        }

        let reply: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MigrateError::Publish(format!("invalid image host reply: {e}")))?;
        let url = image_url(&reply)
            .ok_or_else(|| MigrateError::Publish("image host reply has no URL".into()))?
            .to_string();

        info!(%url, "diff image uploaded");
        Ok(url)
    }
}
