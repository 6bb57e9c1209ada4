//! Driver → card fan-out (spec §4.E): for each eligible game, compute the
//! sport's driver set from the latest odds snapshot and upsert one card per
//! surviving driver.

use anyhow::Result;
use chrono::{Duration, Utc};
use odk_drivers::DriverInputContext;
use odk_schemas::{Game, OddsSnapshot, Sport};
use serde_json::json;

#[derive(Debug, Clone, Default)]
pub struct FanoutSummary {
    pub games_considered: usize,
    pub games_skipped_no_snapshot: usize,
    pub games_skipped_all_drivers_missing: usize,
    pub cards_written: usize,
    pub card_errors: usize,
}

/// Runs the fan-out for one sport over games inside `lookahead_hours` of the
/// sport model's horizon. Used by fixed-window dispatch, which targets a
/// whole sport at once rather than one game.
pub async fn run_fanout_for_sport(pool: &sqlx::PgPool, sport: Sport, lookahead_hours: i64) -> Result<FanoutSummary> {
    let now = Utc::now();
    let horizon = now + Duration::hours(lookahead_hours);
    let mut summary = FanoutSummary::default();

    let games = odk_db::list_games_from(pool, now - Duration::hours(1)).await?;

    for game in games.into_iter().filter(|g| g.sport == sport && g.game_time_utc <= horizon) {
        fanout_one_game(pool, sport, &game, &mut summary).await?;
    }

    Ok(summary)
}

/// Runs the fan-out for a single game. Used by T-minus dispatch, which
/// targets exactly the game whose window just opened (`job_key` carries the
/// `game_id`, not the whole sport).
pub async fn run_fanout_for_game(pool: &sqlx::PgPool, sport: Sport, game_id: &str) -> Result<FanoutSummary> {
    let mut summary = FanoutSummary::default();
    let Some(game) = odk_db::get_game(pool, game_id).await? else {
        return Ok(summary);
    };
    fanout_one_game(pool, sport, &game, &mut summary).await?;
    Ok(summary)
}

async fn fanout_one_game(pool: &sqlx::PgPool, sport: Sport, game: &Game, summary: &mut FanoutSummary) -> Result<()> {
    summary.games_considered += 1;

    let Some(snapshot) = odk_db::latest_odds_snapshot(pool, &game.game_id).await? else {
        summary.games_skipped_no_snapshot += 1;
        return Ok(());
    };

    let ctx = DriverInputContext::from_snapshot(&game.home_team, &game.away_team, &snapshot);
    let drivers = odk_drivers::compute_drivers(sport, &ctx);

    if drivers.is_empty() {
        summary.games_skipped_all_drivers_missing += 1;
        tracing::info!(game_id = %game.game_id, "all drivers missing, skipping fan-out for this game");
        return Ok(());
    }

    for driver in &drivers {
        match write_driver_card(pool, game, &snapshot, driver).await {
            Ok(()) => summary.cards_written += 1,
            Err(e) => {
                summary.card_errors += 1;
                tracing::warn!(
                    game_id = %game.game_id,
                    card_type = %driver.card_type,
                    error = %e,
                    "card write failed, siblings still proceed"
                );
            }
        }
    }

    Ok(())
}

async fn write_driver_card(
    pool: &sqlx::PgPool,
    game: &Game,
    snapshot: &OddsSnapshot,
    driver: &odk_drivers::DriverDescriptor,
) -> Result<()> {
    odk_db::prepare_model_and_card_write(pool, &game.game_id, &driver.key, &driver.card_type).await?;

    let model_output_id = odk_db::insert_model_output(
        pool,
        &odk_db::NewModelOutput {
            game_id: game.game_id.clone(),
            odds_snapshot_id: snapshot.id,
            driver_key: driver.key.clone(),
            score: driver.score,
        },
    )
    .await?;

    let recommendation = odk_drivers::recommendation_for_driver(&driver.key, driver.prediction);

    let odds_context = json!({
        "h2h_home": snapshot.moneyline_home,
        "h2h_away": snapshot.moneyline_away,
        "spread_home": snapshot.spread_home,
        "spread_home_odds": snapshot.spread_home_odds,
        "spread_away_odds": snapshot.spread_away_odds,
        "total": snapshot.total,
    });

    let payload_data = json!({
        "prediction": driver.prediction,
        "confidence": driver.confidence,
        "reasoning": driver.reasoning,
        "odds_context": odds_context,
        "driver": {
            "key": driver.key,
            "score": driver.score,
            "ev_threshold_passed": driver.ev_threshold_passed,
            "inputs": driver.inputs,
        },
        "recommendation": {"type": recommendation},
        "meta": {"inference_source": "internal-driver-engine", "is_mock": false},
    });

    odk_db::insert_card_payload(
        pool,
        &odk_db::NewCardPayload {
            game_id: game.game_id.clone(),
            sport: game.sport,
            card_type: driver.card_type.clone(),
            card_title: driver.card_title.clone(),
            expires_at: Some(game.game_time_utc - Duration::hours(1)),
            payload_data,
            model_output_ids: vec![model_output_id],
            recommended_bet_type: recommendation.as_str().to_string(),
        },
    )
    .await?;

    Ok(())
}
