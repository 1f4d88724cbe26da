//! Page fetching with bounded retries
//!
//! This module handles every page request of the harvest:
//! - Building the HTTP client with browser-like headers
//! - Attaching the account cookie to each request
//! - Retrying a page until its decoded form passes the liveness check
//! - Telling soft failures (retry budget exhausted) from fatal ones (login wall)

use crate::config::CrawlerConfig;
use crate::decoder::DecodeError;
use crate::HarvestError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, COOKIE};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Attempts per logical page before giving up on it
pub const MAX_FETCH_ATTEMPTS: u32 = 3;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9"));

    Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(Duration::from_secs(config.request_timeout))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Something that can return the raw content of a page
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, HarvestError>;
}

/// Cookie-authenticated HTTP page source
pub struct HttpSource {
    client: Client,
    cookie: String,
}

impl HttpSource {
    pub fn new(client: Client, cookie: impl Into<String>) -> Self {
        Self {
            client,
            cookie: cookie.into(),
        }
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch_text(&self, url: &str) -> Result<String, HarvestError> {
        let response = self
            .client
            .get(url)
            .header(COOKIE, &self.cookie)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

/// A decoded page and how many attempts it took
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPage<T> {
    pub value: T,
    pub attempts: u32,
}

/// Fetches one logical page and decodes it, retrying on failure
///
/// A network error, a non-success status, and a decode that fails the
/// liveness check all consume one attempt. A login-wall decode ends the
/// fetch immediately.
#[derive(Clone)]
pub struct FetchGateway {
    source: Arc<dyn PageSource>,
    max_attempts: u32,
}

impl FetchGateway {
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self {
            source,
            max_attempts: MAX_FETCH_ATTEMPTS,
        }
    }

    /// Fetches `url` and runs `decode` on the body until it succeeds
    ///
    /// # Returns
    ///
    /// * `Ok(DecodedPage)` - The first successful decode
    /// * `Err(HarvestError::NotLoggedIn)` - Fatal; no retry was made
    /// * `Err(HarvestError::FetchExhausted)` - Every attempt failed; soft
    pub async fn fetch<T, F>(&self, url: &str, decode: F) -> Result<DecodedPage<T>, HarvestError>
    where
        F: Fn(&str) -> Result<T, DecodeError>,
    {
        for attempt in 1..=self.max_attempts {
            match self.source.fetch_text(url).await {
                Ok(body) => match decode(&body) {
                    Ok(value) => {
                        return Ok(DecodedPage {
                            value,
                            attempts: attempt,
                        })
                    }
                    Err(DecodeError::NotLoggedIn) => {
                        return Err(HarvestError::NotLoggedIn {
                            url: url.to_string(),
                        })
                    }
                    Err(DecodeError::Malformed(reason)) => {
                        tracing::warn!(
                            "Attempt {}/{} for {}: {}",
                            attempt,
                            self.max_attempts,
                            url,
                            reason
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt,
                        self.max_attempts,
                        url,
                        e
                    );
                }
            }
        }

        Err(HarvestError::FetchExhausted {
            url: url.to_string(),
            attempts: self.max_attempts,
        })
    }
}
