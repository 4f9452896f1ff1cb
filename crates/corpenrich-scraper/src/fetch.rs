//! Page fetching collaborator.

use std::time::Duration;

use async_trait::async_trait;
use corpenrich_core::FetchConfig;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::cache::{CachedPage, PageCache};
use crate::error::ScraperError;
use crate::html::clean_text_from_html;
use crate::rate_limit::retry_with_backoff;

/// One fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub html: String,
    /// Visible text with navigation chrome and cookie banners removed.
    pub text: String,
    pub screenshot: Option<Vec<u8>>,
}

impl FetchedPage {
    #[must_use]
    pub fn from_html(url: &str, final_url: &str, html: String) -> Self {
        let text = clean_text_from_html(&html);
        Self {
            url: url.to_string(),
            final_url: final_url.to_string(),
            html,
            text,
            screenshot: None,
        }
    }
}

/// A page that yielded no evidence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("timed out")]
    Timeout,
    #[error("fetch failed: {0}")]
    Failed(String),
}

impl From<ScraperError> for FetchFailure {
    fn from(err: ScraperError) -> Self {
        match err {
            ScraperError::Timeout { .. } => FetchFailure::Timeout,
            other => FetchFailure::Failed(other.to_string()),
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// # Errors
    ///
    /// [`FetchFailure::Timeout`] when the page did not answer in time and
    /// [`FetchFailure::Failed`] for everything else.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchFailure>;
}

/// `reqwest`-backed fetcher with retry and a read-through page cache.
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    backoff_base_secs: u64,
    cache: PageCache,
}

fn is_html_content_type(value: Option<&str>) -> bool {
    value.is_none_or(|v| {
        let v = v.to_ascii_lowercase();
        v.contains("html") || v.contains("xml") || v.starts_with("text/plain")
    })
}

/// `http://` form of an `https://` URL.
fn http_fallback(url: &str) -> Option<String> {
    url.strip_prefix("https://").map(|rest| format!("http://{rest}"))
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &FetchConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .user_agent(&config.user_agent)
            .build()?;
        let cache = config
            .cache_dir
            .as_ref()
            .map_or_else(PageCache::in_memory, PageCache::with_dir);
        Ok(Self {
            client,
            max_retries: config.max_retries,
            backoff_base_secs: config.backoff_base_secs,
            cache,
        })
    }

    async fn get_once(&self, url: &str) -> Result<CachedPage, ScraperError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScraperError::from_request(url, e))?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            let domain = url::Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_owned))
                .unwrap_or_default();
            return Err(ScraperError::RateLimited {
                domain,
                retry_after_secs,
            });
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ScraperError::NotFound {
                url: url.to_owned(),
            });
        }
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        if !is_html_content_type(content_type.as_deref()) {
            return Err(ScraperError::InvalidUrl {
                url: url.to_owned(),
                reason: format!(
                    "unsupported content type {}",
                    content_type.unwrap_or_default()
                ),
            });
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| ScraperError::from_request(url, e))?;
        Ok(CachedPage {
            url: url.to_owned(),
            final_url,
            status: status.as_u16(),
            html,
        })
    }

    async fn get_with_retry(&self, url: &str) -> Result<CachedPage, ScraperError> {
        retry_with_backoff(self.max_retries, self.backoff_base_secs, || self.get_once(url)).await
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchFailure> {
        if let Some(hit) = self.cache.get(url).await {
            tracing::debug!(url, "page cache hit");
            return Ok(FetchedPage::from_html(url, &hit.final_url, hit.html));
        }

        let page = match self.get_with_retry(url).await {
            Ok(page) => page,
            // TLS and connection failures on https get one plain-http attempt.
            Err(ScraperError::Http(e)) => match http_fallback(url) {
                Some(fallback) => {
                    tracing::debug!(url, error = %e, "retrying over http");
                    self.get_once(&fallback).await.map_err(|err| {
                        tracing::warn!(url, error = %err, "fetch failed");
                        FetchFailure::from(err)
                    })?
                }
                None => {
                    tracing::warn!(url, error = %e, "fetch failed");
                    return Err(FetchFailure::Failed(e.to_string()));
                }
            },
            Err(err) => {
                tracing::warn!(url, error = %err, "fetch failed");
                return Err(err.into());
            }
        };

        self.cache.put(url, page.clone()).await;
        Ok(FetchedPage::from_html(url, &page.final_url, page.html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_filter() {
        assert!(is_html_content_type(None));
        assert!(is_html_content_type(Some("text/html; charset=utf-8")));
        assert!(is_html_content_type(Some("application/xhtml+xml")));
        assert!(!is_html_content_type(Some("application/pdf")));
        assert!(!is_html_content_type(Some("image/png")));
    }

    #[test]
    fn http_fallback_only_for_https() {
        assert_eq!(
            http_fallback("https://example.co.jp/company/").as_deref(),
            Some("http://example.co.jp/company/")
        );
        assert_eq!(http_fallback("http://example.co.jp/"), None);
    }

    #[test]
    fn timeout_is_distinguishable() {
        let failure = FetchFailure::from(ScraperError::Timeout {
            url: "https://example.co.jp/".to_string(),
        });
        assert_eq!(failure, FetchFailure::Timeout);
        let failure = FetchFailure::from(ScraperError::NotFound {
            url: "https://example.co.jp/x".to_string(),
        });
        assert!(matches!(failure, FetchFailure::Failed(_)));
    }
}
