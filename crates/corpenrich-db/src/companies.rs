//! Claim, release and recovery over the `companies` backlog.
//!
//! A row is owned by at most one worker: `claim_next` flips it to
//! `running` under `FOR UPDATE SKIP LOCKED`, and every release is guarded
//! by `locked_by = $worker` so a row re-claimed after a stale sweep is
//! never overwritten by its previous holder.

use chrono::{DateTime, Utc};
use corpenrich_core::{ClaimOrder, CompanyRecord, CompanyStatus, CompanyUpdate};
use sqlx::{PgPool, Postgres, Transaction};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

const COMPANY_COLUMNS: &str = "id, company_name, address, csv_address, employee_count, \
     status, locked_by, locked_at, \
     homepage, homepage_official_flag, homepage_official_source, homepage_official_score, \
     final_homepage, provisional_homepage, provisional_reason, \
     phone, phone_source, source_url_phone, found_address, address_source, \
     source_url_address, address_confidence, address_evidence, address_conflict_level, \
     address_review_reason, rep_name, source_url_rep, \
     description, listing, revenue, profit, capital, fiscal_month, founded_year, \
     error_code, timeout_stage, last_checked_at";

/// A row from the `companies` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompanyRow {
    pub id: i64,
    pub company_name: String,
    pub address: Option<String>,
    pub csv_address: Option<String>,
    pub employee_count: Option<i32>,
    pub status: String,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,

    pub homepage: Option<String>,
    pub homepage_official_flag: bool,
    pub homepage_official_source: Option<String>,
    pub homepage_official_score: Option<f64>,
    pub final_homepage: Option<String>,
    pub provisional_homepage: Option<String>,
    pub provisional_reason: Option<String>,

    pub phone: Option<String>,
    pub phone_source: Option<String>,
    pub source_url_phone: Option<String>,
    pub found_address: Option<String>,
    pub address_source: Option<String>,
    pub source_url_address: Option<String>,
    pub address_confidence: Option<f64>,
    pub address_evidence: Option<String>,
    pub address_conflict_level: Option<String>,
    pub address_review_reason: Option<String>,
    pub rep_name: Option<String>,
    pub source_url_rep: Option<String>,

    pub description: Option<String>,
    pub listing: Option<String>,
    pub revenue: Option<String>,
    pub profit: Option<String>,
    pub capital: Option<String>,
    pub fiscal_month: Option<String>,
    pub founded_year: Option<String>,

    pub error_code: Option<String>,
    pub timeout_stage: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl From<CompanyRow> for CompanyRecord {
    fn from(row: CompanyRow) -> Self {
        CompanyRecord {
            id: row.id,
            company_name: row.company_name,
            address: row.address,
            csv_address: row.csv_address,
            employee_count: row.employee_count,
            status: Some(row.status),
            locked_by: row.locked_by,
            locked_at: row.locked_at,
            homepage: row.homepage,
            homepage_official_flag: row.homepage_official_flag,
            homepage_official_source: row.homepage_official_source,
            homepage_official_score: row.homepage_official_score,
            final_homepage: row.final_homepage,
            provisional_homepage: row.provisional_homepage,
            provisional_reason: row.provisional_reason,
            phone: row.phone,
            found_address: row.found_address,
            rep_name: row.rep_name,
            source_url_phone: row.source_url_phone,
            source_url_address: row.source_url_address,
            source_url_rep: row.source_url_rep,
            phone_source: row.phone_source,
            address_source: row.address_source,
            address_confidence: row.address_confidence,
            address_evidence: row.address_evidence,
            address_conflict_level: row.address_conflict_level,
            address_review_reason: row.address_review_reason,
            description: row.description,
            listing: row.listing,
            revenue: row.revenue,
            profit: row.profit,
            capital: row.capital,
            fiscal_month: row.fiscal_month,
            founded_year: row.founded_year,
            error_code: row.error_code,
            timeout_stage: row.timeout_stage,
            last_checked_at: row.last_checked_at,
        }
    }
}

/// Result of a guarded release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The row is no longer locked by this worker; nothing was written.
    LockMismatch,
}

// ---------------------------------------------------------------------------
// Claim protocol
// ---------------------------------------------------------------------------

fn order_clause(order: ClaimOrder) -> &'static str {
    match order {
        ClaimOrder::EmployeeDescIdAsc => "employee_count DESC NULLS LAST, id ASC",
        ClaimOrder::IdAsc => "id ASC",
        ClaimOrder::IdDesc => "id DESC",
        ClaimOrder::Random => "random()",
    }
}

fn claim_sql(order: ClaimOrder) -> String {
    format!(
        "UPDATE companies \
         SET status = 'running', locked_by = $1, locked_at = NOW(), updated_at = NOW() \
         WHERE id = ( \
             SELECT id FROM companies \
             WHERE status = ANY($2) \
             ORDER BY {order} \
             LIMIT 1 \
             FOR UPDATE SKIP LOCKED \
         ) \
         RETURNING {COMPANY_COLUMNS}",
        order = order_clause(order),
    )
}

async fn sweep_stale(
    tx: &mut Transaction<'_, Postgres>,
    stale_lock_ttl_minutes: u32,
) -> Result<u64, DbError> {
    let ttl = i32::try_from(stale_lock_ttl_minutes).unwrap_or(i32::MAX);
    let result = sqlx::query(
        "UPDATE companies \
         SET status = 'pending', locked_by = NULL, locked_at = NULL, updated_at = NOW() \
         WHERE status = 'running' AND locked_at < NOW() - make_interval(mins => $1)",
    )
    .bind(ttl)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

/// Return `running` rows whose lock is older than the TTL to `pending`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn recover_stale(pool: &PgPool, stale_lock_ttl_minutes: u32) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;
    let recovered = sweep_stale(&mut tx, stale_lock_ttl_minutes).await?;
    tx.commit().await?;
    if recovered > 0 {
        tracing::warn!(recovered, "recovered stale locks");
    }
    Ok(recovered)
}

/// Sweep stale locks, then claim the next row for `worker_id`.
///
/// `pending` rows are handed out first; `retry_statuses` are only
/// considered once no `pending` row is left. Both steps run in one
/// transaction. Returns `None` when there is no work.
///
/// # Errors
///
/// Returns [`DbError::InvalidStatus`] if a retry status is `running`, or
/// [`DbError::Sqlx`] if any statement fails.
pub async fn claim_next(
    pool: &PgPool,
    worker_id: &str,
    order: ClaimOrder,
    retry_statuses: &[CompanyStatus],
    stale_lock_ttl_minutes: u32,
) -> Result<Option<CompanyRecord>, DbError> {
    if let Some(bad) = retry_statuses.iter().find(|s| !s.is_terminal()) {
        return Err(DbError::InvalidStatus(bad.to_string()));
    }

    let mut tx = pool.begin().await?;
    let recovered = sweep_stale(&mut tx, stale_lock_ttl_minutes).await?;
    if recovered > 0 {
        tracing::warn!(worker_id, recovered, "stale locks returned to pending");
    }

    let sql = claim_sql(order);
    let mut claimed = sqlx::query_as::<_, CompanyRow>(&sql)
        .bind(worker_id)
        .bind(vec![CompanyStatus::Pending.as_str().to_string()])
        .fetch_optional(&mut *tx)
        .await?;

    if claimed.is_none() && !retry_statuses.is_empty() {
        let statuses: Vec<String> = retry_statuses.iter().map(ToString::to_string).collect();
        claimed = sqlx::query_as::<_, CompanyRow>(&sql)
            .bind(worker_id)
            .bind(statuses)
            .fetch_optional(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(claimed.map(CompanyRecord::from))
}

/// Write one cycle's result and release the lock.
///
/// The write only happens while `worker_id` still holds the row.
/// `csv_address` is never touched.
///
/// # Errors
///
/// Returns [`DbError::InvalidStatus`] for a non-terminal status, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn save_result(
    pool: &PgPool,
    id: i64,
    worker_id: &str,
    update: &CompanyUpdate,
) -> Result<SaveOutcome, DbError> {
    if !update.status.is_terminal() {
        return Err(DbError::InvalidStatus(update.status.to_string()));
    }

    let result = sqlx::query(
        "UPDATE companies SET \
             status = $3, address = $4, \
             homepage = $5, homepage_official_flag = $6, homepage_official_source = $7, \
             homepage_official_score = $8, final_homepage = $9, \
             provisional_homepage = $10, provisional_reason = $11, \
             phone = $12, phone_source = $13, source_url_phone = $14, \
             found_address = $15, address_source = $16, source_url_address = $17, \
             address_confidence = $18, address_evidence = $19, \
             address_conflict_level = $20, address_review_reason = $21, \
             rep_name = $22, source_url_rep = $23, \
             description = $24, listing = $25, revenue = $26, profit = $27, \
             capital = $28, fiscal_month = $29, founded_year = $30, \
             page_type_per_url = $31, extracted_candidates_count = $32, drop_reasons = $33, \
             ai_used = $34, ai_confidence = $35, ai_reason = $36, \
             error_code = $37, timeout_stage = $38, \
             locked_by = NULL, locked_at = NULL, \
             last_checked_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND locked_by = $2 AND status = 'running'",
    )
    .bind(id)
    .bind(worker_id)
    .bind(update.status.as_str())
    .bind(update.address.as_deref())
    .bind(update.homepage.as_deref())
    .bind(update.homepage_official_flag)
    .bind(update.homepage_official_source.as_deref())
    .bind(update.homepage_official_score)
    .bind(update.final_homepage.as_deref())
    .bind(update.provisional_homepage.as_deref())
    .bind(update.provisional_reason.as_deref())
    .bind(update.phone.as_deref())
    .bind(update.phone_source.as_deref())
    .bind(update.source_url_phone.as_deref())
    .bind(update.found_address.as_deref())
    .bind(update.address_source.as_deref())
    .bind(update.source_url_address.as_deref())
    .bind(update.address_confidence)
    .bind(update.address_evidence.as_deref())
    .bind(update.address_conflict_level.as_deref())
    .bind(update.address_review_reason.as_deref())
    .bind(update.rep_name.as_deref())
    .bind(update.source_url_rep.as_deref())
    .bind(update.description.as_deref())
    .bind(update.listing.as_deref())
    .bind(update.revenue.as_deref())
    .bind(update.profit.as_deref())
    .bind(update.capital.as_deref())
    .bind(update.fiscal_month.as_deref())
    .bind(update.founded_year.as_deref())
    .bind(&update.page_type_per_url)
    .bind(update.extracted_candidates_count)
    .bind(&update.drop_reasons)
    .bind(update.ai_used)
    .bind(update.ai_confidence)
    .bind(update.ai_reason.as_deref())
    .bind(update.error_code.as_deref())
    .bind(update.timeout_stage.as_deref())
    .execute(pool)
    .await?;

    Ok(release_outcome(id, worker_id, result.rows_affected()))
}

/// Release a row with status `error`, keeping every derived field.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_error(
    pool: &PgPool,
    id: i64,
    worker_id: &str,
    error_code: &str,
) -> Result<SaveOutcome, DbError> {
    let result = sqlx::query(
        "UPDATE companies \
         SET status = 'error', error_code = $3, \
             locked_by = NULL, locked_at = NULL, \
             last_checked_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND locked_by = $2 AND status = 'running'",
    )
    .bind(id)
    .bind(worker_id)
    .bind(error_code)
    .execute(pool)
    .await?;

    Ok(release_outcome(id, worker_id, result.rows_affected()))
}

fn release_outcome(id: i64, worker_id: &str, rows_affected: u64) -> SaveOutcome {
    if rows_affected == 0 {
        tracing::warn!(
            company_id = id,
            worker_id,
            "lock mismatch on release; row was re-claimed, result discarded"
        );
        SaveOutcome::LockMismatch
    } else {
        SaveOutcome::Saved
    }
}

// ---------------------------------------------------------------------------
// Reads and import
// ---------------------------------------------------------------------------

/// Fetches a single company by `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_company(pool: &PgPool, id: i64) -> Result<CompanyRow, DbError> {
    let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1");
    sqlx::query_as::<_, CompanyRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Row count per status, ordered by status name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn status_counts(pool: &PgPool) -> Result<Vec<(String, i64)>, DbError> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM companies GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Insert a `pending` company. The address lands in both `csv_address`
/// and `address`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_company(
    pool: &PgPool,
    company_name: &str,
    address: Option<&str>,
    employee_count: Option<i32>,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO companies (company_name, address, csv_address, employee_count) \
         VALUES ($1, $2, $2, $3) RETURNING id",
    )
    .bind(company_name)
    .bind(address)
    .bind(employee_count)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_order_puts_large_companies_first() {
        let sql = claim_sql(ClaimOrder::EmployeeDescIdAsc);
        assert!(sql.contains("ORDER BY employee_count DESC NULLS LAST, id ASC"));
        assert!(sql.contains("FOR UPDATE SKIP LOCKED"));
    }

    #[test]
    fn every_order_has_a_clause() {
        assert_eq!(order_clause(ClaimOrder::IdAsc), "id ASC");
        assert_eq!(order_clause(ClaimOrder::IdDesc), "id DESC");
        assert_eq!(order_clause(ClaimOrder::Random), "random()");
    }

    #[test]
    fn zero_rows_is_a_lock_mismatch() {
        assert_eq!(release_outcome(1, "w", 0), SaveOutcome::LockMismatch);
        assert_eq!(release_outcome(1, "w", 1), SaveOutcome::Saved);
    }
}
