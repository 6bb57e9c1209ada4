//! Wire types for the read API's JSON responses. Kept distinct from the
//! store's domain types so a response shape can evolve without touching
//! `odk-schemas`.

use chrono::{DateTime, Utc};
use odk_schemas::{CardPayload, CardResult, Game, TrackingStat};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct GamesResponse {
    pub games: Vec<Game>,
}

#[derive(Debug, Deserialize)]
pub struct CardsQuery {
    pub game_id: Option<String>,
    pub dedupe: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CardsResponse {
    pub cards: Vec<CardPayload>,
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    pub sport: Option<String>,
    pub market: Option<String>,
    pub card_category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub ledger: Vec<CardResult>,
    pub segments: Vec<TrackingStat>,
}

#[derive(Debug, Serialize)]
pub struct JobHealthEntry {
    pub job_name: String,
    pub last_success: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub db_reachable: bool,
    pub jobs: Vec<JobHealthEntry>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}
