//! Homepage search collaborator backed by the DuckDuckGo HTML endpoint.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use corpenrich_core::SearchConfig;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::error::ScraperError;
use crate::officiality::is_excluded_url;
use crate::rate_limit::retry_with_backoff;

static RESULT_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.result__a").expect("valid selector"));

const SEARCH_BASE: &str = "https://duckduckgo.com";

#[async_trait]
pub trait HomepageSearch: Send + Sync {
    /// Candidate homepage URLs for a company, best first.
    ///
    /// # Errors
    ///
    /// Returns a [`ScraperError`] when the search backend cannot be queried.
    async fn search(&self, company_name: &str, address: &str) -> Result<Vec<String>, ScraperError>;
}

/// Resolve one result `href`: unwrap `/l/?uddg=` redirects and make
/// protocol-relative and site-relative links absolute.
#[must_use]
pub fn resolve_result_href(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let absolute = if raw.starts_with("//") {
        format!("https:{raw}")
    } else if raw.starts_with('/') {
        format!("{SEARCH_BASE}{raw}")
    } else {
        raw.to_string()
    };
    let parsed = Url::parse(&absolute).ok()?;
    let is_redirect = parsed
        .host_str()
        .is_some_and(|h| h.ends_with("duckduckgo.com"))
        && parsed.path().starts_with("/l/");
    if is_redirect {
        return parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned());
    }
    Some(absolute)
}

/// Result URLs from a DuckDuckGo HTML page, minus excluded hosts.
#[must_use]
pub fn parse_results(html: &str, max_results: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut out: Vec<String> = Vec::new();
    for anchor in document.select(&RESULT_LINK) {
        let Some(href) = anchor.value().attr("href").and_then(resolve_result_href) else {
            continue;
        };
        if is_excluded_url(&href) || out.contains(&href) {
            continue;
        }
        out.push(href);
        if out.len() >= max_results {
            break;
        }
    }
    out
}

pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: String,
    max_results: usize,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl DuckDuckGoSearch {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn new(
        config: &SearchConfig,
        user_agent: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            max_results: config.max_results,
            max_retries,
            backoff_base_secs,
        })
    }

    async fn query_once(&self, query: &str) -> Result<String, ScraperError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| ScraperError::from_request(&self.endpoint, e))?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ScraperError::RateLimited {
                domain: Url::parse(&self.endpoint)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_owned))
                    .unwrap_or_default(),
                retry_after_secs: 60,
            });
        }
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            });
        }
        response
            .text()
            .await
            .map_err(|e| ScraperError::from_request(&self.endpoint, e))
    }
}

#[async_trait]
impl HomepageSearch for DuckDuckGoSearch {
    async fn search(&self, company_name: &str, address: &str) -> Result<Vec<String>, ScraperError> {
        let query = format!("{company_name} {address}").trim().to_string();
        let body = retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            self.query_once(&query)
        })
        .await?;
        let results = parse_results(&body, self.max_results);
        tracing::debug!(query = %query, count = results.len(), "search results");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_links_are_unwrapped() {
        assert_eq!(
            resolve_result_href("/l/?uddg=https%3A%2F%2Fwww.example.co.jp%2F&rut=abc").as_deref(),
            Some("https://www.example.co.jp/")
        );
        assert_eq!(
            resolve_result_href("//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.jp%2Fcompany").as_deref(),
            Some("https://example.jp/company")
        );
        assert_eq!(
            resolve_result_href("https://www.example.co.jp/").as_deref(),
            Some("https://www.example.co.jp/")
        );
        assert_eq!(resolve_result_href("/l/?rut=abc"), None);
    }

    #[test]
    fn results_skip_excluded_hosts_and_respect_limit() {
        let html = r#"
        <div class="result"><a class="result__a" href="/l/?uddg=https%3A%2F%2Fwww.facebook.com%2Fexample">FB</a></div>
        <div class="result"><a class="result__a" href="/l/?uddg=https%3A%2F%2Fwww.example.co.jp%2F">Example</a></div>
        <div class="result"><a class="result__a" href="https://korps.jp/corporations/1">Directory</a></div>
        <div class="result"><a class="result__a" href="https://www.example.co.jp/">Example again</a></div>
        <div class="result"><a class="result__a" href="https://other.example.com/">Other</a></div>
        <div class="result"><a class="result__a" href="https://third.example.com/">Third</a></div>
        <div class="result"><a class="other" href="https://ignored.example.com/">Ad</a></div>"#;
        assert_eq!(
            parse_results(html, 2),
            vec![
                "https://www.example.co.jp/".to_string(),
                "https://other.example.com/".to_string()
            ]
        );
    }
}
