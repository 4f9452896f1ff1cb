//! The `work` command: claim rows from the backlog, enrich them and write
//! the reconciled result back.
//!
//! Each lane processes one row fully before claiming the next. Pipeline
//! panics and database failures on save release the row as `error`; they
//! never stop the loop.

mod pipeline;

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use corpenrich_core::{reconcile, AppConfig, CompanyRecord, CompanyStatus};
use corpenrich_db::SaveOutcome;
use corpenrich_scraper::{
    AiJudge, DuckDuckGoSearch, HttpAiJudge, HttpFetcher, OfficialityResolver,
};
use futures::{stream, FutureExt, StreamExt};
use rand::Rng;
use tokio::sync::watch;
use tokio::time::Instant;

use pipeline::{process_company, Collaborators, PgFlagStore, PipelineSettings};

/// Flags of the `work` subcommand after merging with config.
#[derive(Debug, Clone, Default)]
pub(crate) struct WorkOptions {
    /// Exit once no claimable row is left instead of idling.
    pub once: bool,
    pub max_rows: Option<usize>,
    pub concurrency: Option<usize>,
    pub worker_id: Option<String>,
}

/// Build the HTTP-backed collaborators from config.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be constructed.
pub(crate) fn build_collaborators(
    pool: &sqlx::PgPool,
    config: &AppConfig,
) -> anyhow::Result<Collaborators> {
    let fetcher = HttpFetcher::new(&config.fetch).context("failed to build fetcher")?;
    let search = DuckDuckGoSearch::new(
        &config.search,
        &config.fetch.user_agent,
        config.fetch.timeout_secs,
        config.fetch.max_retries,
        config.fetch.backoff_base_secs,
    )
    .context("failed to build search client")?;
    let judge = match &config.judge.url {
        Some(url) => {
            let judge = HttpAiJudge::new(
                url,
                config.judge.api_key.clone(),
                config.judge.timeout_secs,
            )
            .context("failed to build AI judge client")?;
            Some(Arc::new(judge) as Arc<dyn AiJudge>)
        }
        None => {
            tracing::info!("CORPENRICH_AI_JUDGE_URL not set; officiality is rule-only");
            None
        }
    };

    Ok(Collaborators {
        fetcher: Arc::new(fetcher),
        search: Arc::new(search),
        judge,
        flags: Arc::new(PgFlagStore { pool: pool.clone() }),
    })
}

// ---------------------------------------------------------------------------
// Tally
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Saved(CompanyStatus),
    LockLost,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WorkTally {
    pub done: usize,
    pub review: usize,
    pub no_homepage: usize,
    pub error: usize,
    pub lock_lost: usize,
}

impl WorkTally {
    fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Saved(CompanyStatus::Done) => self.done += 1,
            RowOutcome::Saved(CompanyStatus::NoHomepage) => self.no_homepage += 1,
            RowOutcome::Saved(CompanyStatus::Review) => self.review += 1,
            RowOutcome::Saved(_) | RowOutcome::Failed => self.error += 1,
            RowOutcome::LockLost => self.lock_lost += 1,
        }
    }

    fn merge(mut self, other: WorkTally) -> Self {
        self.done += other.done;
        self.review += other.review;
        self.no_homepage += other.no_homepage;
        self.error += other.error;
        self.lock_lost += other.lock_lost;
        self
    }

    #[must_use]
    pub(crate) fn total(&self) -> usize {
        self.done + self.review + self.no_homepage + self.error + self.lock_lost
    }
}

// ---------------------------------------------------------------------------
// Row budget
// ---------------------------------------------------------------------------

/// Remaining rows under `--max-rows`; unlimited when `None`.
struct RowBudget(Option<AtomicUsize>);

impl RowBudget {
    fn new(max_rows: Option<usize>) -> Self {
        Self(max_rows.map(AtomicUsize::new))
    }

    fn take(&self) -> bool {
        match &self.0 {
            None => true,
            Some(left) => left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok(),
        }
    }

    fn give_back(&self) {
        if let Some(left) = &self.0 {
            left.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Lane worker ids: the base id alone, or `{base}-{n}` for several lanes.
fn lane_ids(base: &str, lanes: usize) -> Vec<String> {
    if lanes <= 1 {
        return vec![base.to_string()];
    }
    (1..=lanes).map(|n| format!("{base}-{n}")).collect()
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

struct WorkContext<'a> {
    pool: &'a sqlx::PgPool,
    config: &'a AppConfig,
    deps: &'a Collaborators,
    settings: PipelineSettings,
    resolver: OfficialityResolver,
    once: bool,
    budget: RowBudget,
    shutdown: watch::Receiver<bool>,
}

/// Run the worker loop until shutdown, `--max-rows`, or (with `--once`) an
/// empty backlog.
///
/// # Errors
///
/// Returns an error only for configuration mistakes detected up front;
/// per-row failures are released as `error` and counted.
pub(crate) async fn run_work(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    deps: &Collaborators,
    opts: WorkOptions,
) -> anyhow::Result<WorkTally> {
    if let Some(bad) = config.worker.retry_statuses.iter().find(|s| !s.is_terminal()) {
        anyhow::bail!("retry status {bad} is not a terminal status");
    }
    let lanes = opts.concurrency.unwrap_or(config.worker.concurrency).max(1);
    let base_id = opts
        .worker_id
        .clone()
        .unwrap_or_else(|| config.worker.worker_id.clone());

    let (stop_tx, stop_rx) = watch::channel(false);
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    let ctx = WorkContext {
        pool,
        config,
        deps,
        settings: PipelineSettings::from_app_config(config),
        resolver: OfficialityResolver::new(
            config.officiality.clone(),
            config.judge.hint_min_confidence,
        ),
        once: opts.once,
        budget: RowBudget::new(opts.max_rows),
        shutdown: stop_rx,
    };

    tracing::info!(
        worker_id = %base_id,
        lanes,
        once = opts.once,
        max_rows = ?opts.max_rows,
        "worker starting"
    );

    let tallies: Vec<WorkTally> = stream::iter(lane_ids(&base_id, lanes))
        .map(|worker_id| run_lane(&ctx, worker_id))
        .buffer_unordered(lanes)
        .collect()
        .await;
    signal_task.abort();

    let tally = tallies
        .into_iter()
        .fold(WorkTally::default(), WorkTally::merge);
    tracing::info!(
        worker_id = %base_id,
        processed = tally.total(),
        done = tally.done,
        review = tally.review,
        no_homepage = tally.no_homepage,
        error = tally.error,
        lock_lost = tally.lock_lost,
        "worker stopped"
    );
    Ok(tally)
}

async fn run_lane(ctx: &WorkContext<'_>, worker_id: String) -> WorkTally {
    let mut tally = WorkTally::default();
    let mut shutdown = ctx.shutdown.clone();
    let worker = &ctx.config.worker;

    loop {
        if *shutdown.borrow() {
            tracing::info!(worker_id = %worker_id, "shutdown requested");
            break;
        }
        if !ctx.budget.take() {
            break;
        }

        let claimed = corpenrich_db::claim_next(
            ctx.pool,
            &worker_id,
            worker.claim_order,
            &worker.retry_statuses,
            worker.stale_lock_ttl_minutes,
        )
        .await;
        let record = match claimed {
            Ok(Some(record)) => record,
            Ok(None) => {
                ctx.budget.give_back();
                if ctx.once {
                    tracing::info!(worker_id = %worker_id, "no claimable rows left");
                    break;
                }
                idle(&mut shutdown, worker.idle_sleep_secs).await;
                continue;
            }
            Err(e) => {
                ctx.budget.give_back();
                tracing::error!(worker_id = %worker_id, error = %e, "claim failed");
                if ctx.once {
                    break;
                }
                idle(&mut shutdown, worker.idle_sleep_secs).await;
                continue;
            }
        };

        tally.record(process_claimed(ctx, &worker_id, &record).await);
    }
    tally
}

async fn process_claimed(
    ctx: &WorkContext<'_>,
    worker_id: &str,
    record: &CompanyRecord,
) -> RowOutcome {
    let started = Instant::now();
    tracing::debug!(company_id = record.id, worker_id, company = %record.company_name, "claimed");

    let pipeline = process_company(record, ctx.deps, &ctx.settings, &ctx.resolver);
    let Ok(result) = AssertUnwindSafe(pipeline).catch_unwind().await else {
        tracing::error!(company_id = record.id, worker_id, "row pipeline panicked");
        return release_as_error(ctx.pool, record.id, worker_id, "panic").await;
    };

    let update = reconcile(record, &result, &ctx.config.reconcile);
    match corpenrich_db::save_result(ctx.pool, record.id, worker_id, &update).await {
        Ok(SaveOutcome::Saved) => {
            tracing::info!(
                company_id = record.id,
                worker_id,
                status = update.status.as_str(),
                homepage = update.homepage.as_deref().unwrap_or(""),
                timeout_stage = update.timeout_stage.as_deref().unwrap_or(""),
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "row finished"
            );
            RowOutcome::Saved(update.status)
        }
        Ok(SaveOutcome::LockMismatch) => RowOutcome::LockLost,
        Err(e) => {
            tracing::error!(company_id = record.id, worker_id, error = %e, "save failed");
            release_as_error(ctx.pool, record.id, worker_id, "db_error").await
        }
    }
}

async fn release_as_error(
    pool: &sqlx::PgPool,
    id: i64,
    worker_id: &str,
    error_code: &str,
) -> RowOutcome {
    match corpenrich_db::mark_error(pool, id, worker_id, error_code).await {
        Ok(SaveOutcome::Saved) => RowOutcome::Failed,
        Ok(SaveOutcome::LockMismatch) => RowOutcome::LockLost,
        Err(e) => {
            // The stale sweep will return the row to pending.
            tracing::error!(company_id = id, worker_id, error = %e, "mark_error failed");
            RowOutcome::Failed
        }
    }
}

/// Sleep `idle_sleep_secs` plus up to 20% jitter, or until shutdown.
async fn idle(shutdown: &mut watch::Receiver<bool>, idle_sleep_secs: u64) {
    let base_ms = idle_sleep_secs.saturating_mul(1000);
    let jitter_ms = rand::rng().random_range(0..=base_ms / 5);
    let pause = Duration::from_millis(base_ms + jitter_ms);
    tokio::select! {
        () = tokio::time::sleep(pause) => {}
        _ = shutdown.changed() => {}
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, finishing current rows");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_lane_keeps_the_base_id() {
        assert_eq!(lane_ids("host-42", 1), vec!["host-42".to_string()]);
        assert_eq!(
            lane_ids("host-42", 3),
            vec!["host-42-1", "host-42-2", "host-42-3"]
        );
    }

    #[test]
    fn row_budget_counts_down_and_refunds() {
        let budget = RowBudget::new(Some(2));
        assert!(budget.take());
        assert!(budget.take());
        assert!(!budget.take());
        budget.give_back();
        assert!(budget.take());

        let unlimited = RowBudget::new(None);
        assert!((0..100).all(|_| unlimited.take()));
    }

    #[test]
    fn tally_buckets_outcomes() {
        let mut tally = WorkTally::default();
        tally.record(RowOutcome::Saved(CompanyStatus::Done));
        tally.record(RowOutcome::Saved(CompanyStatus::Review));
        tally.record(RowOutcome::Saved(CompanyStatus::NoHomepage));
        tally.record(RowOutcome::Failed);
        tally.record(RowOutcome::LockLost);

        let merged = tally.merge(WorkTally {
            done: 2,
            ..WorkTally::default()
        });
        assert_eq!(merged.done, 3);
        assert_eq!(merged.review, 1);
        assert_eq!(merged.no_homepage, 1);
        assert_eq!(merged.error, 1);
        assert_eq!(merged.lock_lost, 1);
        assert_eq!(merged.total(), 7);
    }
}
