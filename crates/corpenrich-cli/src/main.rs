mod inspect;
mod work;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "corpenrich-cli")]
#[command(about = "Company record enrichment worker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance.
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Claim and enrich rows from the backlog.
    Work {
        /// Exit when no claimable row is left instead of idling.
        #[arg(long)]
        once: bool,
        /// Stop after this many rows.
        #[arg(long)]
        max_rows: Option<usize>,
        /// Rows processed concurrently by this process.
        #[arg(long)]
        concurrency: Option<usize>,
        /// Overrides `CORPENRICH_WORKER_ID`.
        #[arg(long)]
        worker_id: Option<String>,
    },
    /// Print row counts per status.
    Status,
    /// Return rows with expired locks to `pending`.
    RecoverStale,
    /// Fetch one page and print classification and extraction as JSON.
    Inspect {
        url: String,
        /// Company name to resolve officiality against.
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("corpenrich-cli: no command given (try --help)");
        return Ok(());
    };

    let config = corpenrich_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let Commands::Inspect { url, name } = &command {
        return inspect::run_inspect(&config, url, name.as_deref()).await;
    }

    let pool_config = corpenrich_db::PoolConfig::from_app_config(&config);
    let pool = corpenrich_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                corpenrich_db::health_check(&pool).await?;
                println!("database ok");
            }
            DbCommands::Migrate => {
                let applied = corpenrich_db::run_migrations(&pool).await?;
                println!("applied {applied} migration(s)");
            }
        },
        Commands::Work {
            once,
            max_rows,
            concurrency,
            worker_id,
        } => {
            let deps = work::build_collaborators(&pool, &config)?;
            let opts = work::WorkOptions {
                once,
                max_rows,
                concurrency,
                worker_id,
            };
            let tally = work::run_work(&pool, &config, &deps, opts).await?;
            println!(
                "processed {} row(s): done={} review={} no_homepage={} error={} lock_lost={}",
                tally.total(),
                tally.done,
                tally.review,
                tally.no_homepage,
                tally.error,
                tally.lock_lost
            );
        }
        Commands::Status => {
            for (status, count) in corpenrich_db::status_counts(&pool).await? {
                println!("{status:<12} {count}");
            }
        }
        Commands::RecoverStale => {
            let recovered =
                corpenrich_db::recover_stale(&pool, config.worker.stale_lock_ttl_minutes).await?;
            println!("recovered {recovered} stale lock(s)");
        }
        Commands::Inspect { .. } => {}
    }

    Ok(())
}
