//! Database operations for `url_flags`.

use corpenrich_core::{normalize_flag_key, JudgeSource, UrlFlag};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
struct UrlFlagRow {
    url_key: String,
    is_official: bool,
    judge_source: String,
    confidence: Option<f64>,
    reason: String,
}

impl TryFrom<UrlFlagRow> for UrlFlag {
    type Error = DbError;

    fn try_from(row: UrlFlagRow) -> Result<Self, Self::Error> {
        let judge_source = row
            .judge_source
            .parse::<JudgeSource>()
            .map_err(|_| DbError::InvalidJudgeSource(row.judge_source.clone()))?;
        Ok(UrlFlag {
            url_key: row.url_key,
            is_official: row.is_official,
            judge_source,
            confidence: row.confidence,
            reason: row.reason,
        })
    }
}

/// Look up the cached verdict for `url`. The URL is normalized first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or
/// [`DbError::InvalidJudgeSource`] for a corrupt row.
pub async fn get_url_flag(pool: &PgPool, url: &str) -> Result<Option<UrlFlag>, DbError> {
    let row = sqlx::query_as::<_, UrlFlagRow>(
        "SELECT url_key, is_official, judge_source, confidence, reason \
         FROM url_flags WHERE url_key = $1",
    )
    .bind(normalize_flag_key(url))
    .fetch_optional(pool)
    .await?;

    row.map(UrlFlag::try_from).transpose()
}

/// Insert or replace the verdict for `flag.url_key`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_url_flag(pool: &PgPool, flag: &UrlFlag) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO url_flags (url_key, is_official, judge_source, confidence, reason) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (url_key) DO UPDATE SET \
             is_official  = EXCLUDED.is_official, \
             judge_source = EXCLUDED.judge_source, \
             confidence   = EXCLUDED.confidence, \
             reason       = EXCLUDED.reason, \
             updated_at   = NOW()",
    )
    .bind(normalize_flag_key(&flag.url_key))
    .bind(flag.is_official)
    .bind(flag.judge_source.as_str())
    .bind(flag.confidence)
    .bind(&flag.reason)
    .execute(pool)
    .await?;

    Ok(())
}
