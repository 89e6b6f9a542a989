//! Publish Entitlements server and job runner.
//!
//! # Usage
//!
//! ```bash
//! publish-entitlements serve
//! publish-entitlements job expire-sweep
//! publish-entitlements job reset-weekly
//! publish-entitlements job reset-monthly
//! ```
//!
//! Jobs run once and exit; the schedule belongs to an external cron-like
//! trigger.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use sqlx::PgPool;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use publish_entitlements::adapters::http::{entitlement_router, EntitlementAppState};
use publish_entitlements::adapters::{PostgresGrantStore, PostgresPlanCatalog};
use publish_entitlements::application::handlers::{JobReport, JobRun, ReconcilerJob, ReconcilerJobs};
use publish_entitlements::config::AppConfig;
use publish_entitlements::telemetry;

// =============================================================================
// CLI
// =============================================================================

/// Subscription and credit entitlement engine
#[derive(Parser, Debug)]
#[command(name = "publish-entitlements")]
#[command(about = "Subscription and credit entitlement engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Subcommand to execute (defaults to `serve`)
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Run one reconciler job and exit
    Job {
        /// expire-sweep, reset-weekly or reset-monthly
        job: ReconcilerJob,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let command = Cli::parse().command.unwrap_or(Command::Serve);

    let config = AppConfig::load()?;
    config.validate()?;
    telemetry::init(&config.server)?;

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Migrations applied");
    }

    match command {
        Command::Serve => serve(&config, pool).await,
        Command::Job { job } => run_job(&config, pool, job).await,
    }
}

async fn serve(config: &AppConfig, pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
    let grants = Arc::new(PostgresGrantStore::new(pool.clone()));
    let state = EntitlementAppState::new(
        Arc::new(PostgresPlanCatalog::new(pool)),
        grants.clone(),
        grants,
    );

    let app = entitlement_router()
        .with_state(state)
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, environment = ?config.server.environment, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

async fn run_job(
    config: &AppConfig,
    pool: PgPool,
    job: ReconcilerJob,
) -> Result<(), Box<dyn std::error::Error>> {
    let schedule = config.reconciler.schedule()?;
    let jobs = ReconcilerJobs::new(Arc::new(PostgresGrantStore::new(pool)), schedule);

    match jobs.run(job).await? {
        JobRun::Completed(JobReport::Expired(result)) => {
            info!(job = %job, expired = result.expired.len(), "Job completed")
        }
        JobRun::Completed(JobReport::Reset(result)) => {
            info!(job = %job, boundary = %result.boundary.key, outcome = ?result.outcome, "Job completed")
        }
        JobRun::Skipped => info!(job = %job, "Job skipped"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_serves() {
        let cli = Cli::try_parse_from(["publish-entitlements"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["publish-entitlements", "serve"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Serve)));
    }

    #[test]
    fn job_names_are_parsed() {
        let cli = Cli::try_parse_from(["publish-entitlements", "job", "reset-weekly"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Job {
                job: ReconcilerJob::ResetWeekly
            })
        ));
    }

    #[test]
    fn bad_invocations_are_rejected() {
        assert!(Cli::try_parse_from(["publish-entitlements", "job"]).is_err());
        assert!(Cli::try_parse_from(["publish-entitlements", "job", "compact"]).is_err());
        assert!(Cli::try_parse_from(["publish-entitlements", "migrate"]).is_err());
    }
}
