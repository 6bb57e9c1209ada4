use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use odk_config::Config;
use odk_schemas::Sport;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "odk")]
#[command(about = "odds-data-kit operations CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Manually trigger a job through the same runtime the scheduler uses.
    Trigger {
        #[command(subcommand)]
        cmd: TriggerCmd,
    },

    /// Inspect job_run history and job_key format rules.
    Jobs {
        #[command(subcommand)]
        cmd: JobsCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    Migrate,
}

#[derive(Subcommand)]
enum TriggerCmd {
    /// Pull odds for every active sport (same job as the hourly scheduler tick).
    PullOdds,

    /// Run the per-sport driver fan-out for every upcoming game of a sport.
    RunModel {
        #[arg(value_parser = parse_sport)]
        sport: Sport,
    },

    /// Settle final game results against the configured results provider.
    SettleGames,

    /// Grade every pending card whose game has a final result.
    SettleCards,
}

#[derive(Subcommand)]
enum JobsCmd {
    /// Print the most recent job_run rows.
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Print the last successful run of a given job_name, if any.
    LastSuccess {
        job_name: String,
    },

    /// Validate a job_key against the documented per-job-name format.
    CheckKey {
        job_name: String,
        job_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => run_db(cmd).await?,
        Commands::Trigger { cmd } => run_trigger(cmd).await?,
        Commands::Jobs { cmd } => run_jobs(cmd).await?,
    }

    Ok(())
}

async fn run_db(cmd: DbCmd) -> Result<()> {
    let pool = odk_db::connect_from_env().await?;
    match cmd {
        DbCmd::Status => {
            let s = odk_db::status(&pool).await?;
            println!("db_ok={} has_games_table={}", s.ok, s.has_games_table);
        }
        DbCmd::Migrate => {
            odk_db::migrate(&pool).await?;
            println!("migrations_applied=true");
        }
    }
    Ok(())
}

/// Manual triggers bypass the scheduler's recency windows by passing
/// `job_key = None`: every invocation runs, recorded in job_runs like any
/// other job, single-flight guarded against a concurrent scheduled run.
async fn run_trigger(cmd: TriggerCmd) -> Result<()> {
    let pool = odk_db::connect_from_env().await?;
    let config = Config::from_env()?;

    match cmd {
        TriggerCmd::PullOdds => {
            let odds_base_url =
                std::env::var("ODDS_API_BASE_URL").unwrap_or_else(|_| "https://api.the-odds-api.com".to_string());
            let provider: Arc<dyn odk_odds::provider::OddsProvider> =
                Arc::new(odk_odds::provider::HttpOddsProvider::new(odds_base_url, config.odds_api_key.clone()));

            let outcome = odk_jobs::execute_job(&pool, "pull_odds_hourly", None, odk_jobs::NO_RECENCY_WINDOW, |run_id| {
                let pool = pool.clone();
                let config = config.clone();
                let provider = provider.clone();
                async move { odk_pipeline::run_ingest_tick(&pool, &config, provider.as_ref(), run_id).await }
            })
            .await?;

            match outcome {
                odk_jobs::JobOutcome::Completed(summary) => {
                    for r in summary.per_sport {
                        println!(
                            "sport={} games_upserted={} snapshots_inserted={} skipped_missing_fields={}",
                            r.sport.slug(),
                            r.games_upserted,
                            r.snapshots_inserted,
                            r.skipped_missing_fields
                        );
                    }
                }
                odk_jobs::JobOutcome::Skipped(reason) => println!("skipped={}", reason.as_str()),
            }
        }

        TriggerCmd::RunModel { sport } => {
            let job_name = format!("run_{}_model", sport.slug());
            let outcome = odk_jobs::execute_job(&pool, &job_name, None, odk_jobs::NO_RECENCY_WINDOW, |_run_id| {
                let pool = pool.clone();
                async move { odk_pipeline::run_fanout_for_sport(&pool, sport, odk_pipeline::ingest::INGEST_HOURS_AHEAD).await }
            })
            .await?;

            match outcome {
                odk_jobs::JobOutcome::Completed(summary) => println!(
                    "cards_written={} card_errors={} games_skipped_no_snapshot={} games_skipped_all_drivers_missing={}",
                    summary.cards_written,
                    summary.card_errors,
                    summary.games_skipped_no_snapshot,
                    summary.games_skipped_all_drivers_missing
                ),
                odk_jobs::JobOutcome::Skipped(reason) => println!("skipped={}", reason.as_str()),
            }
        }

        TriggerCmd::SettleGames => {
            let results_base_url = std::env::var("RESULTS_API_BASE_URL")
                .unwrap_or_else(|_| "https://site.api.espn.com/apis/site/v2/sports".to_string());
            let provider = odk_pipeline::HttpResultsProvider::new(results_base_url);

            let outcome = odk_jobs::execute_job(&pool, "settle_game_results", None, odk_jobs::NO_RECENCY_WINDOW, |_run_id| {
                let pool = pool.clone();
                let provider = &provider;
                async move { odk_pipeline::run_settle_game_results(&pool, provider).await }
            })
            .await?;

            match outcome {
                odk_jobs::JobOutcome::Completed(summary) => println!(
                    "games_considered={} games_settled={} games_unmatched={}",
                    summary.games_considered, summary.games_settled, summary.games_unmatched
                ),
                odk_jobs::JobOutcome::Skipped(reason) => println!("skipped={}", reason.as_str()),
            }
        }

        TriggerCmd::SettleCards => {
            let outcome = odk_jobs::execute_job(&pool, "settle_pending_cards", None, odk_jobs::NO_RECENCY_WINDOW, |_run_id| {
                let pool = pool.clone();
                async move { odk_pipeline::run_settle_pending_cards(&pool).await }
            })
            .await?;

            match outcome {
                odk_jobs::JobOutcome::Completed(summary) => println!(
                    "cards_considered={} cards_settled={} cards_skipped_no_payload={} cards_skipped_unrecognized={} stats_recomputed={}",
                    summary.cards_considered,
                    summary.cards_settled,
                    summary.cards_skipped_no_payload,
                    summary.cards_skipped_unrecognized,
                    summary.stats_recomputed
                ),
                odk_jobs::JobOutcome::Skipped(reason) => println!("skipped={}", reason.as_str()),
            }
        }
    }

    Ok(())
}

async fn run_jobs(cmd: JobsCmd) -> Result<()> {
    match cmd {
        JobsCmd::Recent { limit } => {
            let pool = odk_db::connect_from_env().await?;
            let runs = odk_db::recent_job_runs(&pool, limit).await?;
            for r in runs {
                println!(
                    "{} job_name={} job_key={:?} status={} started_at={} ended_at={:?}",
                    r.id,
                    r.job_name,
                    r.job_key,
                    r.status.as_str(),
                    r.started_at,
                    r.ended_at
                );
            }
        }
        JobsCmd::LastSuccess { job_name } => {
            let pool = odk_db::connect_from_env().await?;
            match odk_db::last_successful_run(&pool, &job_name).await? {
                Some(r) => println!("last_success_at={:?} run_id={}", r.ended_at, r.id),
                None => println!("last_success_at=none"),
            }
        }
        JobsCmd::CheckKey { job_name, job_key } => {
            let ok = odk_jobs::is_valid_job_key(&job_name, Some(&job_key));
            println!("valid={ok}");
            if !ok {
                bail!("job_key does not match the documented format for job_name={job_name}");
            }
        }
    }
    Ok(())
}

fn parse_sport(s: &str) -> Result<Sport, String> {
    Sport::parse(s).ok_or_else(|| format!("unrecognized sport: {s}"))
}
