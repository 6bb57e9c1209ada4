//! Ingest pipeline (spec §4.D): per tick, for each active sport, fetch odds,
//! apply the normalization contract guard, and upsert games + snapshots.

use anyhow::Result;
use odk_config::Config;
use odk_odds::provider::{FetchRequest, OddsProvider};
use odk_schemas::Sport;
use serde_json::Value;
use uuid::Uuid;

/// Below this survival rate, normalization is treated as a shape break
/// rather than ordinary missing-field noise.
pub const CONTRACT_GUARD_MIN_SURVIVAL: f64 = 0.6;

/// Adapter lookahead for the hourly pull.
pub const INGEST_HOURS_AHEAD: i64 = 36;

#[derive(Debug, Clone)]
pub struct SportIngestResult {
    pub sport: Sport,
    pub games_upserted: usize,
    pub snapshots_inserted: usize,
    pub skipped_missing_fields: usize,
    pub contract_violation: bool,
}

#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub per_sport: Vec<SportIngestResult>,
    pub contract_violation: bool,
}

/// Runs one ingest tick across every active sport. A per-sport contract
/// violation stops writes for that sport only; other sports still proceed.
/// If any sport violated the guard, the whole tick returns `Err` so the job
/// runtime marks the run `failed` (spec §4.D step 2b).
pub async fn run_ingest_tick(
    pool: &sqlx::PgPool,
    config: &Config,
    provider: &dyn OddsProvider,
    job_run_id: Uuid,
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    for sport_cfg in config.active_sports() {
        let req = FetchRequest {
            sport: sport_cfg.sport,
            markets: sport_cfg.markets.clone(),
            hours_ahead: INGEST_HOURS_AHEAD,
        };
        let fetch = odk_odds::fetch_games(provider, &req).await;
        let raw_count = fetch.raw_count;
        let normalized_count = fetch.games.len();

        if raw_count > 0 && (normalized_count as f64) < (raw_count as f64) * CONTRACT_GUARD_MIN_SURVIVAL {
            tracing::error!(
                sport = %sport_cfg.sport,
                raw_count,
                normalized_count,
                "contract violation: normalization dropped too many games"
            );
            summary.contract_violation = true;
            summary.per_sport.push(SportIngestResult {
                sport: sport_cfg.sport,
                games_upserted: 0,
                snapshots_inserted: 0,
                skipped_missing_fields: raw_count - normalized_count,
                contract_violation: true,
            });
            continue;
        }

        let mut games_upserted = 0usize;
        let mut rows = Vec::with_capacity(fetch.games.len());
        for g in &fetch.games {
            odk_db::upsert_game(pool, &g.game_id, g.sport, &g.home_team, &g.away_team, g.game_time_utc).await?;
            games_upserted += 1;
            rows.push(odk_db::NewOddsSnapshot {
                game_id: g.game_id.clone(),
                captured_at: g.captured_at_utc,
                moneyline_home: g.moneyline_home,
                moneyline_away: g.moneyline_away,
                total: g.total,
                spread_home: g.spread_home,
                spread_home_odds: g.spread_home_odds,
                spread_away_odds: g.spread_away_odds,
                raw_payload: Value::Null,
                job_run_id,
            });
        }

        let snapshots_inserted = if rows.is_empty() {
            0
        } else {
            odk_db::insert_odds_snapshots(pool, &rows).await?.len()
        };

        summary.per_sport.push(SportIngestResult {
            sport: sport_cfg.sport,
            games_upserted,
            snapshots_inserted,
            skipped_missing_fields: raw_count - normalized_count,
            contract_violation: false,
        });
    }

    if summary.contract_violation {
        anyhow::bail!("normalization contract violation on at least one active sport");
    }

    Ok(summary)
}
