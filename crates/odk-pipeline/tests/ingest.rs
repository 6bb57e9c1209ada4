//! Ingest-tick scenarios against the real store: a contract violation must
//! leave the sport's games/snapshots untouched, and a healthy tick upserts
//! both.

use async_trait::async_trait;
use chrono_tz::America::New_York;
use odk_config::{Config, SportConfig};
use odk_odds::provider::{FetchRequest, OddsProvider, ProviderError, RawBookmaker, RawGame, RawMarket, RawOutcome};
use odk_schemas::{Market, Sport};
use std::collections::HashMap;
use uuid::Uuid;

struct MockProvider {
    games: Vec<RawGame>,
}

#[async_trait]
impl OddsProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }
    async fn fetch(&self, _req: &FetchRequest) -> Result<Vec<RawGame>, ProviderError> {
        Ok(self.games.clone())
    }
}

fn raw(home: &str, away: &str, id: &str) -> RawGame {
    RawGame {
        provider_id: Some(id.to_string()),
        home_team: Some(home.to_string()),
        away_team: Some(away.to_string()),
        commence_time: Some("2026-03-01T00:00:00Z".to_string()),
        bookmakers: vec![RawBookmaker {
            key: "draftkings".to_string(),
            markets: vec![RawMarket {
                key: "h2h".to_string(),
                outcomes: vec![
                    RawOutcome { name: home.to_string(), price: Some(-150.0), point: None },
                    RawOutcome { name: away.to_string(), price: Some(130.0), point: None },
                ],
            }],
        }],
    }
}

fn single_sport_config(sport: Sport) -> Config {
    let mut sports = HashMap::new();
    sports.insert(
        sport,
        SportConfig { sport, active: true, markets: vec![Market::Moneyline, Market::Totals, Market::Spreads], model_enabled: true },
    );
    Config {
        database_path: "unused-in-this-test".to_string(),
        odds_api_key: "unused".to_string(),
        tz: New_York,
        tick_ms: 60_000,
        enable_odds_pull: true,
        fixed_catchup: true,
        dry_run: false,
        sports,
    }
}

#[tokio::test]
async fn contract_violation_writes_nothing_for_that_sport() -> anyhow::Result<()> {
    let Some(pool) = odk_testkit::db_pool_or_skip().await? else {
        return Ok(());
    };

    let mut games = vec![raw("A", "B", "keep-1")];
    for i in 0..9 {
        let mut g = raw("H", "A", &format!("drop-{i}"));
        if i < 6 {
            g.home_team = None;
        }
        games.push(g);
    }
    let provider = MockProvider { games };
    let config = single_sport_config(Sport::Nhl);

    let result = odk_pipeline::run_ingest_tick(&pool, &config, &provider, Uuid::new_v4()).await;
    assert!(result.is_err(), "a survival rate below 60% must fail the tick");

    let upserted = odk_db::list_games_from(&pool, chrono::Utc::now() - chrono::Duration::days(1)).await?;
    assert!(
        upserted.iter().all(|g| !g.game_id.starts_with("game-nhl-keep-1") && !g.game_id.contains("drop-")),
        "no games from the violating sport's fetch should have been upserted"
    );

    Ok(())
}

#[tokio::test]
async fn healthy_tick_upserts_games_and_snapshots() -> anyhow::Result<()> {
    let Some(pool) = odk_testkit::db_pool_or_skip().await? else {
        return Ok(());
    };

    let provider = MockProvider {
        games: vec![raw("Toronto Maple Leafs", "Montreal Canadiens", &format!("ok-{}", Uuid::new_v4()))],
    };
    let config = single_sport_config(Sport::Nhl);
    let job_run_id = Uuid::new_v4();

    let summary = odk_pipeline::run_ingest_tick(&pool, &config, &provider, job_run_id).await?;
    assert_eq!(summary.per_sport.len(), 1);
    assert_eq!(summary.per_sport[0].games_upserted, 1);
    assert_eq!(summary.per_sport[0].snapshots_inserted, 1);
    assert!(!summary.contract_violation);

    Ok(())
}
