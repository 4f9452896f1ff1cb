//! Cached officiality verdicts per URL.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Who produced a cached verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeSource {
    Rule,
    Ai,
}

impl JudgeSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JudgeSource::Rule => "rule",
            JudgeSource::Ai => "ai",
        }
    }
}

impl fmt::Display for JudgeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JudgeSource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rule" => Ok(JudgeSource::Rule),
            "ai" => Ok(JudgeSource::Ai),
            other => Err(CoreError::InvalidJudgeSource(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlFlag {
    /// Key produced by [`normalize_flag_key`].
    pub url_key: String,
    pub is_official: bool,
    pub judge_source: JudgeSource,
    pub confidence: Option<f64>,
    pub reason: String,
}

/// Cache key for a URL: lower-cased host without `www.`, path without a
/// trailing slash, no scheme, query or fragment.
#[must_use]
pub fn normalize_flag_key(url: &str) -> String {
    let s = url.trim();
    let s = s.split_once("://").map_or(s, |(_, rest)| rest);
    let s = s.split(['?', '#']).next().unwrap_or_default();
    let (host, path) = s.split_once('/').unwrap_or((s, ""));
    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        host.to_string()
    } else {
        format!("{host}/{path}")
    }
}

/// `true` when a cached negative verdict means the URL need not be
/// fetched again: any rule negative, or an AI negative at or above
/// `ai_skip_confidence`.
#[must_use]
pub fn should_skip_by_url_flag(flag: &UrlFlag, ai_skip_confidence: f64) -> bool {
    if flag.is_official {
        return false;
    }
    match flag.judge_source {
        JudgeSource::Rule => true,
        JudgeSource::Ai => flag.confidence.is_some_and(|c| c >= ai_skip_confidence),
    }
}
