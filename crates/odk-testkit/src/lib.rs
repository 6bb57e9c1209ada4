//! Shared scaffolding for integration tests that need a real Postgres
//! instance: a skip-if-unconfigured pool helper plus seed-data builders for
//! the handful of rows most scenario tests start from (a game, an odds
//! snapshot, a card).
//!
//! Nothing here talks to a broker or a backtest engine; it only knows about
//! the store's own tables, so it stays usable from any crate in the
//! workspace without pulling in the pipeline or scheduler.

use anyhow::Result;
use chrono::{DateTime, Utc};
use odk_db::{NewCardPayload, NewOddsSnapshot};
use odk_schemas::Sport;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

/// Connects via `ODK_DATABASE_URL` and runs migrations, or returns `Ok(None)`
/// if the env var isn't set. Scenario tests that need a real database should
/// call this first and return early on `None` rather than failing the whole
/// suite when no Postgres instance is reachable:
///
/// ```ignore
/// let Some(pool) = odk_testkit::db_pool_or_skip().await? else { return Ok(()) };
/// ```
pub async fn db_pool_or_skip() -> Result<Option<PgPool>> {
    if std::env::var(odk_db::ENV_DB_URL).is_err() {
        eprintln!("skipping: {} not set", odk_db::ENV_DB_URL);
        return Ok(None);
    }
    Ok(Some(odk_db::testkit_db_pool().await?))
}

/// A deterministic but unique game_id, so repeated test runs against a
/// shared database don't collide on the `games.game_id` unique key.
pub fn unique_game_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

#[derive(Debug, Clone)]
pub struct SeedGame {
    pub game_id: String,
    pub sport: Sport,
    pub home_team: String,
    pub away_team: String,
    pub game_time_utc: DateTime<Utc>,
}

impl SeedGame {
    pub fn new(sport: Sport, home_team: &str, away_team: &str, game_time_utc: DateTime<Utc>) -> Self {
        Self {
            game_id: unique_game_id(sport.slug()),
            sport,
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            game_time_utc,
        }
    }
}

/// Inserts a game row and returns its `game_id`.
pub async fn seed_game(pool: &PgPool, game: &SeedGame) -> Result<String> {
    odk_db::upsert_game(pool, &game.game_id, game.sport, &game.home_team, &game.away_team, game.game_time_utc).await?;
    Ok(game.game_id.clone())
}

/// Inserts a single odds snapshot for `game_id` with plausible moneyline,
/// spread, and total values, captured "now". Returns the inserted row.
pub async fn seed_odds_snapshot(pool: &PgPool, game_id: &str, job_run_id: Uuid) -> Result<odk_schemas::OddsSnapshot> {
    let rows = odk_db::insert_odds_snapshots(
        pool,
        &[NewOddsSnapshot {
            game_id: game_id.to_string(),
            captured_at: Utc::now(),
            moneyline_home: Some(-120),
            moneyline_away: Some(105),
            total: Some(47.5),
            spread_home: Some(-2.5),
            spread_home_odds: Some(-110),
            spread_away_odds: Some(-110),
            raw_payload: json!({"source": "testkit"}),
            job_run_id,
        }],
    )
    .await?;
    Ok(rows.into_iter().next().expect("insert_odds_snapshots returns one row per input row"))
}

/// Inserts a moneyline-recommendation card for `game_id`. `side` must be
/// `"HOME"` or `"AWAY"`; the stored payload is the shape
/// `extract_actual_play`/`pick_bet_odds` read directly.
pub async fn seed_moneyline_card(pool: &PgPool, game_id: &str, sport: Sport, side: &str) -> Result<Uuid> {
    let rec_type = format!("ML_{side}");
    let payload_data = json!({
        "prediction": side,
        "confidence": 0.6,
        "reasoning": "testkit seed card",
        "recommendation": {"type": rec_type},
        "odds_context": {"h2h_home": -120, "h2h_away": 105},
    });
    let card_id = odk_db::insert_card_payload(
        pool,
        &NewCardPayload {
            game_id: game_id.to_string(),
            sport,
            card_type: "pregame_moneyline".to_string(),
            card_title: format!("{side} to win"),
            expires_at: None,
            payload_data,
            model_output_ids: Vec::new(),
            recommended_bet_type: rec_type,
        },
    )
    .await?;
    Ok(card_id)
}
