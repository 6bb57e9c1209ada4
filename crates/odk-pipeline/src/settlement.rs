//! Settlement (spec §4.F): resolve final scores for past games, then grade
//! every pending card against them.

use crate::results::ResultsProvider;
use anyhow::Result;
use chrono::Utc;
use odk_schemas::Sport;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct SettleGamesSummary {
    pub games_considered: usize,
    pub games_settled: usize,
    pub games_unmatched: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SettleCardsSummary {
    pub cards_considered: usize,
    pub cards_settled: usize,
    pub cards_skipped_no_payload: usize,
    pub cards_skipped_unrecognized: usize,
    pub stats_recomputed: usize,
}

/// Resolves final scores for every unsettled past game. Caches one
/// `fetch_final_scores` call per sport per run since several games usually
/// share a sport.
pub async fn run_settle_game_results(
    pool: &sqlx::PgPool,
    provider: &dyn ResultsProvider,
) -> Result<SettleGamesSummary> {
    let mut summary = SettleGamesSummary::default();
    let games = odk_db::list_unsettled_past_games(pool, Utc::now()).await?;

    let mut by_sport: HashMap<Sport, Vec<crate::results::RawGameResult>> = HashMap::new();

    for game in &games {
        summary.games_considered += 1;

        let results = match by_sport.get(&game.sport) {
            Some(r) => r,
            None => {
                let fetched = provider.fetch_final_scores(game.sport).await?;
                by_sport.entry(game.sport).or_insert(fetched)
            }
        };

        let matched = results.iter().find(|r| {
            odk_settlement::names_match(&r.home_team, &game.home_team)
                && odk_settlement::names_match(&r.away_team, &game.away_team)
        });

        let Some(result) = matched else {
            summary.games_unmatched += 1;
            continue;
        };

        odk_db::upsert_game_result(
            pool,
            &game.game_id,
            result.final_score_home,
            result.final_score_away,
            &result.source,
            Utc::now(),
        )
        .await?;
        summary.games_settled += 1;
    }

    Ok(summary)
}

/// Grades every pending `CardResult` whose game is now `final`, then
/// recomputes `tracking_stats` for every `(sport, card_category,
/// recommended_bet_type)` key touched this pass.
pub async fn run_settle_pending_cards(pool: &sqlx::PgPool) -> Result<SettleCardsSummary> {
    let mut summary = SettleCardsSummary::default();
    let pending = odk_db::pending_card_results_for_final_games(pool).await?;
    let mut touched: std::collections::HashSet<(Sport, String, String)> = std::collections::HashSet::new();

    for card_result in &pending {
        summary.cards_considered += 1;

        let Some(payload) = odk_db::get_card_payload_by_id(pool, card_result.card_id).await? else {
            summary.cards_skipped_no_payload += 1;
            continue;
        };

        let Some(game_result) = odk_db::get_game_result(pool, &card_result.game_id).await? else {
            summary.cards_skipped_no_payload += 1;
            continue;
        };

        let Some(play) = odk_settlement::extract_actual_play(&payload.payload_data) else {
            summary.cards_skipped_unrecognized += 1;
            continue;
        };

        let odds = odk_settlement::pick_bet_odds(&payload.payload_data, &play);
        let graded = odk_settlement::grade(
            &play,
            &odds,
            game_result.final_score_home,
            game_result.final_score_away,
        );

        let settled = odk_db::mark_card_result(
            pool,
            card_result.id,
            graded.outcome,
            graded.pnl_units,
            Utc::now(),
        )
        .await?;

        if settled {
            summary.cards_settled += 1;
            touched.insert((
                card_result.sport,
                card_result.card_category.clone(),
                card_result.recommended_bet_type.clone(),
            ));
        }
    }

    for (sport, card_category, recommended_bet_type) in touched {
        odk_db::upsert_tracking_stat(pool, sport, &card_category, &recommended_bet_type).await?;
        summary.stats_recomputed += 1;
    }

    Ok(summary)
}
