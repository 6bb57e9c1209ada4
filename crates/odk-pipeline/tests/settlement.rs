//! Settlement roundtrip scenario: seed a game with its final result and a
//! handful of pending cards, run the two settlement jobs, and check the
//! grading/tracking-stat outcomes. Skips cleanly if `ODK_DATABASE_URL` isn't
//! set, since this exercises the real store.

use chrono::{Duration, Utc};
use odk_db::NewCardPayload;
use odk_schemas::Sport;
use serde_json::json;

/// Seeds a finished game plus one moneyline card carrying an explicit
/// `h2h_home`/`h2h_away` price, so the resulting pnl is pinned rather than
/// riding on `seed_moneyline_card`'s hardcoded -120/105 juice.
async fn seed_final_game_with_card(
    pool: &sqlx::PgPool,
    home: &str,
    away: &str,
    final_home: i32,
    final_away: i32,
    rec_type: &str,
    h2h_home: i32,
    h2h_away: i32,
) -> anyhow::Result<String> {
    let game = odk_testkit::SeedGame::new(Sport::Nhl, home, away, Utc::now() - Duration::hours(3));
    let game_id = odk_testkit::seed_game(pool, &game).await?;
    odk_db::upsert_game_result(pool, &game_id, final_home, final_away, "testkit", Utc::now()).await?;

    let payload_data = json!({
        "prediction": if rec_type == "ML_AWAY" { "AWAY" } else { "HOME" },
        "confidence": 0.6,
        "reasoning": "scenario seed card",
        "recommendation": {"type": rec_type},
        "odds_context": {"h2h_home": h2h_home, "h2h_away": h2h_away},
    });
    odk_db::insert_card_payload(
        pool,
        &NewCardPayload {
            game_id: game_id.clone(),
            sport: Sport::Nhl,
            card_type: "pregame_moneyline".to_string(),
            card_title: format!("{rec_type} scenario card"),
            expires_at: None,
            payload_data,
            model_output_ids: Vec::new(),
            recommended_bet_type: rec_type.to_string(),
        },
    )
    .await?;

    Ok(game_id)
}

#[tokio::test]
async fn settle_pending_cards_grades_win_loss_push_and_skips_neutral() -> anyhow::Result<()> {
    let Some(pool) = odk_testkit::db_pool_or_skip().await? else {
        return Ok(());
    };

    // cr-home-win: ML_HOME on a 4-2 home win, standard -110 juice.
    seed_final_game_with_card(&pool, "Toronto Maple Leafs", "Montreal Canadiens", 4, 2, "ML_HOME", -110, -110)
        .await?;
    // cr-home-loss: ML_HOME on a 1-3 home loss, same juice.
    seed_final_game_with_card(&pool, "Ottawa Senators", "Buffalo Sabres", 1, 3, "ML_HOME", -110, -110).await?;
    // cr-away-win: ML_AWAY on a blowout away win — its own tracking-stats row.
    seed_final_game_with_card(&pool, "Seattle Kraken", "Vegas Golden Knights", 88, 99, "ML_AWAY", -110, -110)
        .await?;
    // cr-push: ML_HOME on a tie.
    seed_final_game_with_card(&pool, "Calgary Flames", "Edmonton Oilers", 3, 3, "ML_HOME", -110, -110).await?;
    // cr-neutral: no actionable play, must stay pending.
    seed_final_game_with_card(&pool, "New Jersey Devils", "New York Islanders", 5, 1, "NEUTRAL", -110, -110).await?;

    let summary = odk_pipeline::run_settle_pending_cards(&pool).await?;

    assert_eq!(summary.cards_considered, 5);
    assert_eq!(summary.cards_settled, 4, "the NEUTRAL card never constitutes a play and stays pending");

    let stats = odk_db::list_tracking_stats(&pool).await?;
    let ml_home = stats
        .iter()
        .find(|s| s.sport == Sport::Nhl && s.card_category == "pregame_moneyline" && s.recommended_bet_type == "ML_HOME")
        .expect("ML_HOME tracking row must exist after settlement");

    assert_eq!(ml_home.wins, 1);
    assert_eq!(ml_home.losses, 1);
    assert_eq!(ml_home.pushes, 1);
    assert!(
        (ml_home.total_pnl_units - (-0.0909)).abs() < 1e-3,
        "expected ~-0.091 pnl units (win 0.909 - loss 1.0 + push 0.0), got {}",
        ml_home.total_pnl_units
    );

    let ml_away = stats
        .iter()
        .find(|s| s.sport == Sport::Nhl && s.card_category == "pregame_moneyline" && s.recommended_bet_type == "ML_AWAY")
        .expect("ML_AWAY tracking row must exist after settlement");
    assert_eq!(ml_away.wins, 1);
    assert_eq!(ml_away.losses, 0);

    let rerun = odk_pipeline::run_settle_pending_cards(&pool).await?;
    assert_eq!(rerun.cards_considered, 0, "already-settled cards must not be considered again");

    Ok(())
}

#[tokio::test]
async fn settle_game_results_is_idempotent_on_rerun() -> anyhow::Result<()> {
    let Some(pool) = odk_testkit::db_pool_or_skip().await? else {
        return Ok(());
    };

    let game = odk_testkit::SeedGame::new(
        Sport::Nba,
        "Los Angeles Lakers",
        "Boston Celtics",
        Utc::now() - Duration::hours(5),
    );
    let game_id = odk_testkit::seed_game(&pool, &game).await?;
    odk_db::upsert_game_result(&pool, &game_id, 110, 101, "testkit", Utc::now()).await?;

    let provider = odk_pipeline::HttpResultsProvider::new("https://example.invalid".to_string());
    let summary = odk_pipeline::run_settle_game_results(&pool, &provider).await?;

    // The game is already final, so list_unsettled_past_games should not
    // surface it a second time regardless of what the provider returns.
    assert_eq!(summary.games_considered, 0);

    Ok(())
}
