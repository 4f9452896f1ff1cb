use std::path::PathBuf;

use crate::app_config::{
    AppConfig, ClaimOrder, Environment, FetchConfig, JudgeConfig, OfficialityConfig,
    ProvisionalThresholds, ReconcileConfig, SearchConfig, SelectorConfig, WorkerConfig,
};
use crate::record::CompanyStatus;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

fn invalid(var: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing is decoupled from the process environment so it can be tested with
/// a plain `HashMap` lookup.
#[allow(clippy::too_many_lines)]
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e))
    };

    let parse_i32 = |var: &str, default: i32| -> Result<i32, ConfigError> {
        match lookup(var) {
            Ok(raw) => raw.parse::<i32>().map_err(|e| invalid(var, e)),
            Err(_) => Ok(default),
        }
    };

    let parse_f64 = |var: &str, default: f64| -> Result<f64, ConfigError> {
        match lookup(var) {
            Ok(raw) => raw.parse::<f64>().map_err(|e| invalid(var, e)),
            Err(_) => Ok(default),
        }
    };

    let parse_confidence = |var: &str, default: f64| -> Result<f64, ConfigError> {
        let value = parse_f64(var, default)?;
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            Err(invalid(var, "must be between 0.0 and 1.0"))
        }
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" | "" => Ok(false),
                other => Err(invalid(var, format!("not a boolean: {other}"))),
            },
            Err(_) => Ok(default),
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("CORPENRICH_ENV", "development"))?;
    let log_level = or_default("CORPENRICH_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("CORPENRICH_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("CORPENRICH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("CORPENRICH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let worker_defaults = WorkerConfig::default();
    let worker_id = optional("CORPENRICH_WORKER_ID").unwrap_or_else(|| {
        let host = optional("HOSTNAME").unwrap_or_else(|| worker_defaults.worker_id.clone());
        format!("{host}-{}", std::process::id())
    });
    let claim_order = or_default("CORPENRICH_CLAIM_ORDER", "employee_desc_id_asc")
        .parse::<ClaimOrder>()
        .map_err(|e| invalid("CORPENRICH_CLAIM_ORDER", e))?;
    let retry_statuses = parse_retry_statuses(&or_default("CORPENRICH_RETRY_STATUSES", ""))?;
    let worker = WorkerConfig {
        worker_id,
        row_budget_secs: parse_u64("CORPENRICH_ROW_BUDGET_SECS", "120")?,
        stale_lock_ttl_minutes: parse_u32("CORPENRICH_STALE_LOCK_TTL_MINUTES", "30")?,
        idle_sleep_secs: parse_u64("CORPENRICH_IDLE_SLEEP_SECS", "10")?,
        claim_order,
        retry_statuses,
        max_pages_per_company: parse_usize("CORPENRICH_MAX_PAGES_PER_COMPANY", "6")?,
        concurrency: parse_usize("CORPENRICH_WORKER_CONCURRENCY", "1")?.max(1),
    };

    let fetch_defaults = FetchConfig::default();
    let fetch = FetchConfig {
        timeout_secs: parse_u64("CORPENRICH_FETCH_TIMEOUT_SECS", "20")?,
        user_agent: or_default("CORPENRICH_USER_AGENT", &fetch_defaults.user_agent),
        max_retries: parse_u32("CORPENRICH_FETCH_MAX_RETRIES", "2")?,
        backoff_base_secs: parse_u64("CORPENRICH_FETCH_BACKOFF_BASE_SECS", "1")?,
        cache_dir: optional("CORPENRICH_FETCH_CACHE_DIR").map(PathBuf::from),
    };

    let search_defaults = SearchConfig::default();
    let search = SearchConfig {
        endpoint: or_default("CORPENRICH_SEARCH_ENDPOINT", &search_defaults.endpoint),
        max_results: parse_usize("CORPENRICH_SEARCH_MAX_RESULTS", "5")?,
    };

    let judge_defaults = JudgeConfig::default();
    let judge = JudgeConfig {
        url: optional("CORPENRICH_AI_JUDGE_URL"),
        api_key: optional("CORPENRICH_AI_JUDGE_API_KEY"),
        timeout_secs: parse_u64("CORPENRICH_AI_JUDGE_TIMEOUT_SECS", "20")?,
        hint_min_confidence: parse_confidence(
            "CORPENRICH_AI_HINT_MIN_CONFIDENCE",
            judge_defaults.hint_min_confidence,
        )?,
    };

    let provisional_defaults = ProvisionalThresholds::default();
    let officiality_defaults = OfficialityConfig::default();
    let officiality = OfficialityConfig {
        provisional: ProvisionalThresholds {
            strong_domain_score: parse_i32(
                "CORPENRICH_PROVISIONAL_STRONG_DOMAIN_SCORE",
                provisional_defaults.strong_domain_score,
            )?,
            host_token_domain_score: parse_i32(
                "CORPENRICH_PROVISIONAL_HOST_TOKEN_DOMAIN_SCORE",
                provisional_defaults.host_token_domain_score,
            )?,
            name_present_domain_score: parse_i32(
                "CORPENRICH_PROVISIONAL_NAME_DOMAIN_SCORE",
                provisional_defaults.name_present_domain_score,
            )?,
            address_ok_domain_score: parse_i32(
                "CORPENRICH_PROVISIONAL_ADDRESS_DOMAIN_SCORE",
                provisional_defaults.address_ok_domain_score,
            )?,
            strong_evidence_score: parse_i32(
                "CORPENRICH_PROVISIONAL_STRONG_EVIDENCE_SCORE",
                provisional_defaults.strong_evidence_score,
            )?,
        },
        official_domain_score: parse_i32(
            "CORPENRICH_OFFICIAL_DOMAIN_SCORE",
            officiality_defaults.official_domain_score,
        )?,
        name_match_min_ratio: parse_confidence(
            "CORPENRICH_NAME_MATCH_MIN_RATIO",
            officiality_defaults.name_match_min_ratio,
        )?,
        url_flag_ai_skip_confidence: parse_confidence(
            "CORPENRICH_URL_FLAG_AI_SKIP_CONFIDENCE",
            officiality_defaults.url_flag_ai_skip_confidence,
        )?,
    };

    let reconcile_defaults = ReconcileConfig::default();
    let reconcile = ReconcileConfig {
        strong_official_score: parse_f64(
            "CORPENRICH_STRONG_OFFICIAL_SCORE",
            reconcile_defaults.strong_official_score,
        )?,
        address_hq_confidence_min: parse_confidence(
            "CORPENRICH_ADDRESS_HQ_CONFIDENCE_MIN",
            reconcile_defaults.address_hq_confidence_min,
        )?,
        allow_pref_mismatch_overwrite: parse_bool(
            "CORPENRICH_ALLOW_PREF_MISMATCH_OVERWRITE",
            reconcile_defaults.allow_pref_mismatch_overwrite,
        )?,
    };

    let selector = SelectorConfig {
        rep_require_structured_source: parse_bool(
            "CORPENRICH_REP_REQUIRE_STRUCTURED_SOURCE",
            false,
        )?,
    };

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        worker,
        fetch,
        search,
        judge,
        officiality,
        reconcile,
        selector,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(invalid(
            "CORPENRICH_ENV",
            format!("expected development, test, or production; got {other}"),
        )),
    }
}

/// Parse a comma-separated list of statuses eligible for re-claiming.
fn parse_retry_statuses(raw: &str) -> Result<Vec<CompanyStatus>, ConfigError> {
    let mut out = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let status = part
            .parse::<CompanyStatus>()
            .map_err(|e| invalid("CORPENRICH_RETRY_STATUSES", e))?;
        if !status.is_terminal() {
            return Err(invalid(
                "CORPENRICH_RETRY_STATUSES",
                format!("{status} is not a terminal status"),
            ));
        }
        if !out.contains(&status) {
            out.push(status);
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
