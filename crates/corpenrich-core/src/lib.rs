pub mod app_config;
pub mod config;
pub mod fields;
pub mod page_type;
pub mod prefecture;
pub mod reconcile;
pub mod record;
pub mod text;
pub mod url_flag;

use thiserror::Error;

pub use app_config::{
    AppConfig, ClaimOrder, Environment, FetchConfig, JudgeConfig, OfficialityConfig,
    ProvisionalThresholds, ReconcileConfig, SearchConfig, SelectorConfig, WorkerConfig,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use page_type::PageType;
pub use reconcile::{
    reconcile, AddressSource, AiUsage, CompanyUpdate, EnrichmentResult, FoundAddress, FoundValue,
};
pub use record::{CompanyRecord, CompanyStatus, FieldValue, HomepageDecision};
pub use url_flag::{normalize_flag_key, should_skip_by_url_flag, JudgeSource, UrlFlag};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid company status: {0}")]
    InvalidStatus(String),
    #[error("invalid page type: {0}")]
    InvalidPageType(String),
    #[error("invalid claim order: {0}")]
    InvalidClaimOrder(String),
    #[error("invalid judge source: {0}")]
    InvalidJudgeSource(String),
}
