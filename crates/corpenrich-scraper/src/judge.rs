//! Generative-AI judge collaborator.
//!
//! The judge receives the evidence gathered for one homepage candidate and
//! answers whether it is the company's official site. Answers below the
//! configured confidence never decide anything on their own.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ScraperError;

/// Characters of page text sent along with a judge request.
pub const EVIDENCE_TEXT_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Yes,
    No,
    Unsure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    pub verdict: Verdict,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
    /// Head-office address the judge read off the page, if any.
    #[serde(default)]
    pub address: Option<String>,
}

impl JudgeVerdict {
    /// Outcome used when the judge could not answer in time.
    #[must_use]
    pub fn unsure(reason: &str) -> Self {
        Self {
            verdict: Verdict::Unsure,
            confidence: 0.0,
            reason: reason.to_string(),
            address: None,
        }
    }
}

/// What the judge gets to see.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JudgeEvidence {
    pub company_name: String,
    pub expected_address: Option<String>,
    pub url: String,
    pub title: String,
    pub text: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub rep_name: Option<String>,
}

impl JudgeEvidence {
    /// Trim page text to the request budget.
    #[must_use]
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.chars().take(EVIDENCE_TEXT_CHARS).collect();
        self
    }
}

#[async_trait]
pub trait AiJudge: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`ScraperError`] when the judge cannot be reached or its
    /// answer cannot be parsed.
    async fn judge(&self, evidence: &JudgeEvidence) -> Result<JudgeVerdict, ScraperError>;
}

/// Judge behind a JSON-over-HTTP endpoint.
pub struct HttpAiJudge {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpAiJudge {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn new(url: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl AiJudge for HttpAiJudge {
    async fn judge(&self, evidence: &JudgeEvidence) -> Result<JudgeVerdict, ScraperError> {
        let mut request = self.client.post(&self.url).json(evidence);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ScraperError::from_request(&self.url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }
        let body = response
            .text()
            .await
            .map_err(|e| ScraperError::from_request(&self.url, e))?;
        let mut verdict: JudgeVerdict =
            serde_json::from_str(&body).map_err(|source| ScraperError::Deserialize {
                context: format!("judge response from {}", self.url),
                source,
            })?;
        if !(0.0..=1.0).contains(&verdict.confidence) {
            return Err(ScraperError::Judge(format!(
                "confidence {} out of range",
                verdict.confidence
            )));
        }
        verdict.address = verdict
            .address
            .take()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        Ok(verdict)
    }
}

/// Ask the judge with a deadline. Elapsed time and judge failures both
/// come back as an `Unsure` verdict.
pub async fn judge_with_timeout(
    judge: &dyn AiJudge,
    evidence: &JudgeEvidence,
    timeout: Duration,
) -> JudgeVerdict {
    match tokio::time::timeout(timeout, judge.judge(evidence)).await {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(e)) => {
            tracing::warn!(url = %evidence.url, error = %e, "AI judge failed");
            JudgeVerdict::unsure("judge_error")
        }
        Err(_) => {
            tracing::warn!(url = %evidence.url, "AI judge timed out");
            JudgeVerdict::unsure("judge_timeout")
        }
    }
}
