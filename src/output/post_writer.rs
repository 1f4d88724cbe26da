//! `post` writer: pushes each batch to an HTTP collector
//!
//! Every batch goes out as one `{ "user": ..., "weibo": [...] }` JSON
//! document, the same shape the `json` writer keeps on disk.

use crate::config::PostConfig;
use crate::output::traits::{SinkError, SinkResult, Writer};
use crate::record::{AccountMetadata, Record};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::Mutex;

/// Header carrying the collector token
pub const API_TOKEN_HEADER: &str = "api-token";

#[derive(Serialize)]
struct PostDocument<'a> {
    user: &'a AccountMetadata,
    weibo: &'a [Record],
}

/// Builds the client used for every POST of a run
///
/// # Arguments
///
/// * `config` - The `[post]` section
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_post_client(config: &PostConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout))
        .connect_timeout(Duration::from_secs(10))
        .build()
}

/// Sends posts to `api-url`
pub struct PostWriter {
    client: Client,
    api_url: String,
    api_token: Option<String>,
    retries: u32,
    backoff: Duration,
    user: Mutex<AccountMetadata>,
}

impl PostWriter {
    pub fn new(client: Client, config: &PostConfig, user: &AccountMetadata) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            api_token: config.api_token.clone(),
            retries: config.retries,
            backoff: Duration::from_secs(config.backoff_seconds),
            user: Mutex::new(user.clone()),
        }
    }

    async fn send_once(&self, body: &[u8]) -> SinkResult<()> {
        let mut request = self
            .client
            .post(&self.api_url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body.to_vec());
        if let Some(token) = &self.api_token {
            request = request.header(API_TOKEN_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected {
                url: self.api_url.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Sends `body`, retrying with a linearly growing pause
    ///
    /// Attempt `n` (counting from 1) that fails is followed by a pause of
    /// `n * backoff` before the next one; the last error is returned once
    /// `1 + retries` attempts have failed.
    async fn send(&self, body: &[u8]) -> SinkResult<()> {
        let mut attempt = 1;
        loop {
            match self.send_once(body).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt <= self.retries => {
                    tracing::debug!(
                        "POST to {} failed (attempt {}/{}): {}",
                        self.api_url,
                        attempt,
                        self.retries + 1,
                        e
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        "POST to {} failed after {} attempts: {}",
                        self.api_url,
                        attempt,
                        e
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl Writer for PostWriter {
    fn name(&self) -> &str {
        "post"
    }

    async fn write_account(&self, user: &AccountMetadata) -> SinkResult<()> {
        *self.user.lock().await = user.clone();
        Ok(())
    }

    async fn write_records(&self, records: &[Record]) -> SinkResult<()> {
        if records.is_empty() {
            tracing::info!("No posts in batch, skipping POST to {}", self.api_url);
            return Ok(());
        }
        let body = {
            let user = self.user.lock().await;
            serde_json::to_vec(&PostDocument {
                user: &user,
                weibo: records,
            })?
        };
        self.send(&body).await?;
        tracing::info!("{} posts sent to {}", records.len(), self.api_url);
        Ok(())
    }
}
