use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::record::CompanyStatus;
use crate::CoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Order in which pending rows are handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimOrder {
    /// Larger companies first, ties by ascending id.
    #[default]
    EmployeeDescIdAsc,
    IdAsc,
    IdDesc,
    Random,
}

impl ClaimOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ClaimOrder::EmployeeDescIdAsc => "employee_desc_id_asc",
            ClaimOrder::IdAsc => "id_asc",
            ClaimOrder::IdDesc => "id_desc",
            ClaimOrder::Random => "random",
        }
    }
}

impl FromStr for ClaimOrder {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "employee_desc_id_asc" | "" => Ok(ClaimOrder::EmployeeDescIdAsc),
            "id_asc" => Ok(ClaimOrder::IdAsc),
            "id_desc" => Ok(ClaimOrder::IdDesc),
            "random" => Ok(ClaimOrder::Random),
            other => Err(CoreError::InvalidClaimOrder(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Component configs
// ---------------------------------------------------------------------------

/// Worker loop and claim protocol settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub worker_id: String,
    /// Wall-clock budget for one row's whole pipeline.
    pub row_budget_secs: u64,
    pub stale_lock_ttl_minutes: u32,
    pub idle_sleep_secs: u64,
    pub claim_order: ClaimOrder,
    /// Terminal statuses re-claimed once no `pending` row is left.
    pub retry_statuses: Vec<CompanyStatus>,
    pub max_pages_per_company: usize,
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: "worker".to_string(),
            row_budget_secs: 120,
            stale_lock_ttl_minutes: 30,
            idle_sleep_secs: 10,
            claim_order: ClaimOrder::default(),
            retry_statuses: Vec::new(),
            max_pages_per_company: 6,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    pub cache_dir: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            user_agent: "corpenrich/0.1 (company-profile-enrichment)".to_string(),
            max_retries: 2,
            backoff_base_secs: 1,
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub endpoint: String,
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://html.duckduckgo.com/html".to_string(),
            max_results: 5,
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct JudgeConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Minimum confidence for an "official" verdict to count as a hint.
    pub hint_min_confidence: f64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: 20,
            hint_min_confidence: 0.65,
        }
    }
}

impl fmt::Debug for JudgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JudgeConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("hint_min_confidence", &self.hint_min_confidence)
            .finish()
    }
}

/// Corroboration bar a provisional homepage must clear to be kept.
///
/// Any one satisfied condition keeps the homepage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionalThresholds {
    /// Domain score that is strong enough on its own.
    pub strong_domain_score: i32,
    /// Domain score required alongside a host-token match.
    pub host_token_domain_score: i32,
    /// Domain score required alongside the company name in page content.
    pub name_present_domain_score: i32,
    /// Domain score required alongside an address match.
    pub address_ok_domain_score: i32,
    /// Aggregate evidence score that is strong enough on its own.
    pub strong_evidence_score: i32,
}

impl Default for ProvisionalThresholds {
    fn default() -> Self {
        Self {
            strong_domain_score: 4,
            host_token_domain_score: 3,
            name_present_domain_score: 3,
            address_ok_domain_score: 4,
            strong_evidence_score: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfficialityConfig {
    pub provisional: ProvisionalThresholds,
    /// Domain score from which a candidate counts as official without
    /// further corroboration.
    pub official_domain_score: i32,
    /// Name-match ratio treated as "company name present" on the page.
    pub name_match_min_ratio: f64,
    /// AI-negative url flags at or above this confidence skip the URL.
    pub url_flag_ai_skip_confidence: f64,
}

impl Default for OfficialityConfig {
    fn default() -> Self {
        Self {
            provisional: ProvisionalThresholds::default(),
            official_domain_score: 5,
            name_match_min_ratio: 0.7,
            url_flag_ai_skip_confidence: 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileConfig {
    /// Official score from which a flagged homepage counts as strong.
    pub strong_official_score: f64,
    /// Minimum confidence for an AI-sourced head-office address.
    pub address_hq_confidence_min: f64,
    /// Also overwrite on a prefecture mismatch when the found address is
    /// clearly more specific, even without head-office evidence.
    pub allow_pref_mismatch_overwrite: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            strong_official_score: 4.0,
            address_hq_confidence_min: 0.88,
            allow_pref_mismatch_overwrite: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectorConfig {
    /// Only accept representative names that came from a structured source.
    pub rep_require_structured_source: bool,
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub worker: WorkerConfig,
    pub fetch: FetchConfig,
    pub search: SearchConfig,
    pub judge: JudgeConfig,
    pub officiality: OfficialityConfig,
    pub reconcile: ReconcileConfig,
    pub selector: SelectorConfig,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("worker", &self.worker)
            .field("fetch", &self.fetch)
            .field("search", &self.search)
            .field("judge", &self.judge)
            .field("officiality", &self.officiality)
            .field("reconcile", &self.reconcile)
            .field("selector", &self.selector)
            .finish()
    }
}
