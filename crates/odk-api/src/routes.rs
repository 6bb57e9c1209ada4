//! Axum router and all HTTP/WebSocket handlers for the read API.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are `pub(crate)` so integration tests can
//! compose the router directly.

use std::borrow::Cow;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{TimeZone, Utc};
use odk_schemas::{Market, StreamMessage};
use tracing::warn;

use crate::{
    api_types::{
        CardsQuery, CardsResponse, ErrorResponse, GamesResponse, HealthResponse, JobHealthEntry,
        ResultsQuery, ResultsResponse,
    },
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/games", get(games))
        .route("/api/cards", get(cards))
        .route("/api/results", get(results))
        .route("/api/health", get(health))
        .route("/api/analyze/{id}/stream", get(analyze_stream))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /api/games
// ---------------------------------------------------------------------------

pub(crate) async fn games(State(st): State<AppState>) -> Response {
    let local_now = Utc::now().with_timezone(&st.config.tz);
    let midnight_local = local_now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time");
    let boundary = match st.config.tz.from_local_datetime(&midnight_local).single() {
        Some(dt) => dt.with_timezone(&Utc),
        None => return store_error_response(anyhow::anyhow!("ambiguous local midnight for configured TZ")),
    };

    match odk_db::list_games_from(&st.pool, boundary).await {
        Ok(games) => (StatusCode::OK, Json(GamesResponse { games })).into_response(),
        Err(e) => store_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// GET /api/cards
// ---------------------------------------------------------------------------

pub(crate) async fn cards(State(st): State<AppState>, Query(q): Query<CardsQuery>) -> Response {
    let dedupe = match q.dedupe.as_deref() {
        None | Some("latest_per_game_type") => true,
        Some("none") => false,
        Some(other) => {
            return validation_error_response(format!("unrecognized dedupe value: {other}"));
        }
    };

    match odk_db::list_cards(&st.pool, q.game_id.as_deref(), dedupe).await {
        Ok(cards) => (StatusCode::OK, Json(CardsResponse { cards })).into_response(),
        Err(e) => store_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// GET /api/results
// ---------------------------------------------------------------------------

pub(crate) async fn results(State(st): State<AppState>, Query(q): Query<ResultsQuery>) -> Response {
    let sport = match q.sport.as_deref().map(odk_schemas::Sport::parse) {
        None => None,
        Some(Some(s)) => Some(s),
        Some(None) => return validation_error_response(format!("unrecognized sport: {:?}", q.sport)),
    };
    let market = match q.market.as_deref().map(parse_market_query) {
        None => None,
        Some(Some(m)) => Some(m),
        Some(None) => return validation_error_response(format!("unrecognized market: {:?}", q.market)),
    };

    let ledger = match odk_db::list_settled_card_results(&st.pool, sport, market, q.card_category.as_deref()).await {
        Ok(rows) => rows,
        Err(e) => return store_error_response(e),
    };

    let segments = match odk_db::list_tracking_stats(&st.pool).await {
        Ok(rows) => rows
            .into_iter()
            .filter(|s| sport.map_or(true, |sp| sp == s.sport))
            .filter(|s| q.card_category.as_deref().map_or(true, |c| c == s.card_category))
            .filter(|s| market.map_or(true, |m| s.recommended_bet_type.starts_with(market_prefix(m))))
            .collect(),
        Err(e) => return store_error_response(e),
    };

    (StatusCode::OK, Json(ResultsResponse { ledger, segments })).into_response()
}

fn parse_market_query(s: &str) -> Option<Market> {
    match s {
        "moneyline" => Some(Market::Moneyline),
        "spread" => Some(Market::Spreads),
        "total" => Some(Market::Totals),
        _ => None,
    }
}

fn market_prefix(market: Market) -> &'static str {
    match market {
        Market::Moneyline => "ML_",
        Market::Spreads => "SPREAD_",
        Market::Totals => "TOTAL_",
    }
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

const TRACKED_JOB_NAMES: &[&str] = &["pull_odds_hourly", "settle_game_results", "settle_pending_cards"];

pub(crate) async fn health(State(st): State<AppState>) -> Response {
    let db_status = odk_db::status(&st.pool).await;
    let db_reachable = db_status.as_ref().map(|s| s.ok).unwrap_or(false);

    let mut jobs = Vec::new();
    let mut job_names: Vec<String> = TRACKED_JOB_NAMES.iter().map(|s| s.to_string()).collect();
    for sport in odk_schemas::Sport::all() {
        job_names.push(format!("run_{}_model", sport.slug()));
    }

    for job_name in job_names {
        let last_success = match odk_db::last_successful_run(&st.pool, &job_name).await {
            Ok(run) => run.and_then(|r| r.ended_at),
            Err(e) => {
                warn!(job_name, error = %e, "health check: last_successful_run failed");
                None
            }
        };
        jobs.push(JobHealthEntry { job_name, last_success });
    }

    (
        StatusCode::OK,
        Json(HealthResponse { ok: db_reachable, db_reachable, jobs }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// WS /api/analyze/{id}/stream
// ---------------------------------------------------------------------------

pub(crate) async fn analyze_stream(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(st): State<AppState>,
) -> Response {
    match odk_db::get_game(&st.pool, &id).await {
        Ok(Some(game)) => ws.on_upgrade(move |socket| run_analysis(socket, st, game)),
        Ok(None) => ws.on_upgrade(|socket| close_immediately(socket, 4004, "game not found".to_string())),
        Err(e) => ws.on_upgrade(move |socket| close_immediately(socket, 4000, e.to_string())),
    }
}

async fn close_immediately(mut socket: WebSocket, code: u16, reason: String) {
    send_close(&mut socket, code, &reason).await;
}

async fn send_close(socket: &mut WebSocket, code: u16, reason: &str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame { code, reason: Cow::Owned(reason.to_string()) })))
        .await;
}

async fn send_msg(socket: &mut WebSocket, msg: &StreamMessage) -> bool {
    let Ok(text) = serde_json::to_string(msg) else { return false };
    socket.send(Message::Text(text)).await.is_ok()
}

async fn run_analysis(mut socket: WebSocket, st: AppState, game: odk_schemas::Game) {
    if !send_msg(
        &mut socket,
        &StreamMessage::Progress { progress: 0, phase: "starting".to_string(), timestamp: Utc::now() },
    )
    .await
    {
        return;
    }

    let pool = st.pool.clone();
    let sport = game.sport;
    let game_id = game.game_id.clone();
    let mut work = tokio::spawn(async move { odk_pipeline::run_fanout_for_game(&pool, sport, &game_id).await });

    let mut heartbeat = tokio::time::interval(std::time::Duration::from_secs(2));
    heartbeat.tick().await;

    let outcome = loop {
        tokio::select! {
            res = &mut work => break res,
            _ = heartbeat.tick() => {
                if !send_msg(&mut socket, &StreamMessage::Heartbeat { timestamp: Utc::now() }).await {
                    return;
                }
            }
        }
    };

    match outcome {
        Ok(Ok(summary)) => {
            let results = serde_json::json!({
                "cardsWritten": summary.cards_written,
                "cardErrors": summary.card_errors,
                "gamesSkippedNoSnapshot": summary.games_skipped_no_snapshot,
                "gamesSkippedAllDriversMissing": summary.games_skipped_all_drivers_missing,
            });
            let _ = send_msg(&mut socket, &StreamMessage::Complete { results, timestamp: Utc::now() }).await;
            let _ = socket.close().await;
        }
        Ok(Err(e)) => {
            let _ = send_msg(&mut socket, &StreamMessage::Error { message: e.to_string(), timestamp: Utc::now() }).await;
            send_close(&mut socket, 4000, "analysis failed").await;
        }
        Err(join_err) => {
            let _ = send_msg(&mut socket, &StreamMessage::Error { message: join_err.to_string(), timestamp: Utc::now() }).await;
            send_close(&mut socket, 4000, "analysis task panicked").await;
        }
    }
}

// ---------------------------------------------------------------------------
// Error mapping (spec §7: store errors -> 5xx, validation errors -> 4xx)
// ---------------------------------------------------------------------------

fn store_error_response(e: anyhow::Error) -> Response {
    warn!(error = %e, "read API store error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: e.to_string(), code: "store_failure" }),
    )
        .into_response()
}

fn validation_error_response(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message, code: "validation_failure" })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_query_accepts_spec_spellings() {
        assert_eq!(parse_market_query("moneyline"), Some(Market::Moneyline));
        assert_eq!(parse_market_query("spread"), Some(Market::Spreads));
        assert_eq!(parse_market_query("total"), Some(Market::Totals));
        assert_eq!(parse_market_query("totals"), None);
    }

    #[test]
    fn market_prefix_matches_recommendation_type_naming() {
        assert_eq!(market_prefix(Market::Moneyline), "ML_");
        assert_eq!(market_prefix(Market::Spreads), "SPREAD_");
        assert_eq!(market_prefix(Market::Totals), "TOTAL_");
    }
}
