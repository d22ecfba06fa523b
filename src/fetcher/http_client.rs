use crate::config::Config;
use crate::error::{HarvestError, Result};
use reqwest::header::USER_AGENT;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const CLIENT_USER_AGENT: &str = concat!("obcine/", env!("CARGO_PKG_VERSION"));

/// Thin wrapper over a shared `reqwest::Client`.
///
/// Pages are requested with the crate's own user agent; images are
/// requested with the configured browser-like one.
#[derive(Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    image_user_agent: String,
}

impl PageFetcher {
    pub fn new(timeout: Duration, image_user_agent: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(CLIENT_USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| HarvestError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            image_user_agent: image_user_agent.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.request_timeout(),
            config.source.image_user_agent.clone(),
        )
    }

    /// Single GET, no retry. Non-2xx answers become `HttpStatus`.
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        debug!(url = %url, "Fetching page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HarvestError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| HarvestError::Fetch {
            url: url.to_string(),
            message: format!("Failed to read response body: {}", e),
        })
    }

    /// Streams an image body to `dest`, returning the number of bytes written.
    ///
    /// The body goes to a temporary file next to `dest` that only replaces it
    /// once every chunk is written and flushed. Any earlier error drops the
    /// temporary file, so no partial image is left behind.
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<u64> {
        debug!(url = %url, dest = %dest.display(), "Downloading image");

        let image_error = |message: String| HarvestError::ImageFetch {
            url: url.to_string(),
            message,
        };

        let mut response = self
            .client
            .get(url)
            .header(USER_AGENT, self.image_user_agent.as_str())
            .send()
            .await
            .map_err(|e| image_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(image_error(format!("HTTP {}", status)));
        }

        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        let partial = NamedTempFile::new_in(dir)?;
        let mut file = tokio::fs::File::from_std(partial.reopen()?);
        let mut written = 0u64;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| image_error(format!("Body interrupted: {}", e)))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        drop(file);
        partial.persist(dest).map_err(|e| HarvestError::Io(e.error))?;

        Ok(written)
    }
}
