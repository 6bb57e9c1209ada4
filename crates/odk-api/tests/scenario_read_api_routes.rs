//! Scenario: the read API's HTTP surface against a real store.
//!
//! In-process router tests via `tower::ServiceExt::oneshot` — no bound
//! socket, no network. Skips cleanly if `ODK_DATABASE_URL` isn't set.

use std::collections::HashMap;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use odk_api::{routes, state::AppState};
use odk_config::Config;
use odk_schemas::Sport;
use tower::ServiceExt;

fn test_config() -> Config {
    Config {
        database_path: "unused-in-this-test".to_string(),
        odds_api_key: "unused".to_string(),
        tz: chrono_tz::America::New_York,
        tick_ms: 60_000,
        enable_odds_pull: false,
        fixed_catchup: true,
        dry_run: false,
        sports: HashMap::new(),
    }
}

async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, serde_json::Value) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp.into_body().collect().await.expect("body collect failed").to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_reports_db_reachable_and_tracked_job_names() -> anyhow::Result<()> {
    let Some(pool) = odk_testkit::db_pool_or_skip().await? else {
        return Ok(());
    };

    let router = routes::build_router(AppState::new(pool, test_config()));
    let req = Request::builder().method("GET").uri("/api/health").body(axum::body::Body::empty())?;
    let (status, json) = call(router, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["db_reachable"], true);
    assert!(json["jobs"].as_array().unwrap().iter().any(|j| j["job_name"] == "pull_odds_hourly"));
    assert!(json["jobs"].as_array().unwrap().iter().any(|j| j["job_name"] == "run_nhl_model"));

    Ok(())
}

#[tokio::test]
async fn games_today_forward_filter_excludes_yesterdays_game() -> anyhow::Result<()> {
    let Some(pool) = odk_testkit::db_pool_or_skip().await? else {
        return Ok(());
    };

    let yesterday = odk_testkit::SeedGame::new(Sport::Nhl, "Yesterday Home", "Yesterday Away", chrono::Utc::now() - chrono::Duration::hours(30));
    odk_testkit::seed_game(&pool, &yesterday).await?;
    let later_today = odk_testkit::SeedGame::new(Sport::Nhl, "Today Home", "Today Away", chrono::Utc::now() + chrono::Duration::hours(4));
    odk_testkit::seed_game(&pool, &later_today).await?;

    let router = routes::build_router(AppState::new(pool, test_config()));
    let req = Request::builder().method("GET").uri("/api/games").body(axum::body::Body::empty())?;
    let (status, json) = call(router, req).await;

    assert_eq!(status, StatusCode::OK);
    let game_ids: Vec<String> = json["games"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["game_id"].as_str().unwrap().to_string())
        .collect();
    assert!(!game_ids.contains(&yesterday.game_id));

    Ok(())
}

#[tokio::test]
async fn cards_rejects_unrecognized_dedupe_value() -> anyhow::Result<()> {
    let Some(pool) = odk_testkit::db_pool_or_skip().await? else {
        return Ok(());
    };

    let router = routes::build_router(AppState::new(pool, test_config()));
    let req = Request::builder().method("GET").uri("/api/cards?dedupe=bogus").body(axum::body::Body::empty())?;
    let (status, json) = call(router, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "validation_failure");

    Ok(())
}

#[tokio::test]
async fn results_rejects_unrecognized_sport() -> anyhow::Result<()> {
    let Some(pool) = odk_testkit::db_pool_or_skip().await? else {
        return Ok(());
    };

    let router = routes::build_router(AppState::new(pool, test_config()));
    let req = Request::builder().method("GET").uri("/api/results?sport=curling").body(axum::body::Body::empty())?;
    let (status, json) = call(router, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "validation_failure");

    Ok(())
}
