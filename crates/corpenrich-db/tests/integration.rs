//! Offline unit tests for corpenrich-db pool configuration and row types.
//! These tests do not require a live database connection.

use corpenrich_core::{
    AppConfig, CompanyRecord, Environment, FetchConfig, JudgeConfig, OfficialityConfig,
    ReconcileConfig, SearchConfig, SelectorConfig, WorkerConfig,
};
use corpenrich_db::{CompanyRow, PoolConfig};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        worker: WorkerConfig::default(),
        fetch: FetchConfig::default(),
        search: SearchConfig::default(),
        judge: JudgeConfig::default(),
        officiality: OfficialityConfig::default(),
        reconcile: ReconcileConfig::default(),
        selector: SelectorConfig::default(),
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

fn sample_row() -> CompanyRow {
    CompanyRow {
        id: 7,
        company_name: "株式会社サンプル".to_string(),
        address: Some("東京都千代田区1-1-1".to_string()),
        csv_address: Some("東京都千代田区1-1-1".to_string()),
        employee_count: Some(120),
        status: "running".to_string(),
        locked_by: Some("w1".to_string()),
        locked_at: Some(chrono::Utc::now()),
        homepage: None,
        homepage_official_flag: false,
        homepage_official_source: None,
        homepage_official_score: None,
        final_homepage: None,
        provisional_homepage: None,
        provisional_reason: None,
        phone: Some("03-1111-2222".to_string()),
        phone_source: Some("rule".to_string()),
        source_url_phone: None,
        found_address: None,
        address_source: None,
        source_url_address: None,
        address_confidence: None,
        address_evidence: None,
        address_conflict_level: None,
        address_review_reason: None,
        rep_name: None,
        source_url_rep: None,
        description: None,
        listing: None,
        revenue: None,
        profit: None,
        capital: None,
        fiscal_month: None,
        founded_year: None,
        error_code: None,
        timeout_stage: None,
        last_checked_at: None,
    }
}

#[test]
fn company_row_converts_to_record() {
    let record = CompanyRecord::from(sample_row());

    assert_eq!(record.id, 7);
    assert_eq!(record.company_name, "株式会社サンプル");
    assert_eq!(record.status.as_deref(), Some("running"));
    assert_eq!(record.locked_by.as_deref(), Some("w1"));
    assert_eq!(record.phone.as_deref(), Some("03-1111-2222"));
    assert_eq!(record.baseline_address(), Some("東京都千代田区1-1-1"));
    assert_eq!(
        record.parsed_status(),
        Some(corpenrich_core::CompanyStatus::Running)
    );
}
