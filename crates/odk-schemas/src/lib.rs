//! Shared wire/domain types for the pipeline.
//!
//! This crate owns no behavior: every type here is a plain data shape shared
//! between the store, the adapters, the driver engine, settlement, and the
//! read API so none of them need to depend on each other just to pass a
//! `Game` around.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sports the pipeline knows how to ingest and model. The lower-case variant
/// name is also the slug used in `game_id` and `job_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sport {
    Nhl,
    Nba,
    Nfl,
    Mlb,
}

impl Sport {
    pub fn slug(&self) -> &'static str {
        match self {
            Sport::Nhl => "nhl",
            Sport::Nba => "nba",
            Sport::Nfl => "nfl",
            Sport::Mlb => "mlb",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nhl" => Some(Sport::Nhl),
            "nba" => Some(Sport::Nba),
            "nfl" => Some(Sport::Nfl),
            "mlb" => Some(Sport::Mlb),
            _ => None,
        }
    }

    pub fn all() -> [Sport; 4] {
        [Sport::Nhl, Sport::Nba, Sport::Nfl, Sport::Mlb]
    }
}

impl std::fmt::Display for Sport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// Odds markets an adapter may be asked to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Market {
    Moneyline,
    Totals,
    Spreads,
}

impl Market {
    pub fn slug(&self) -> &'static str {
        match self {
            Market::Moneyline => "moneyline",
            Market::Totals => "totals",
            Market::Spreads => "spreads",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Scheduled,
    Live,
    Final,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::Live => "live",
            GameStatus::Final => "final",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(GameStatus::Scheduled),
            "live" => Some(GameStatus::Live),
            "final" => Some(GameStatus::Final),
            _ => None,
        }
    }
}

/// Deterministic game identity: `game-<sport>-<provider_id>`.
pub fn make_game_id(sport: Sport, provider_id: &str) -> String {
    format!("game-{}-{}", sport.slug(), provider_id)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub game_id: String,
    pub sport: Sport,
    pub home_team: String,
    pub away_team: String,
    pub game_time_utc: DateTime<Utc>,
    pub status: GameStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub id: Uuid,
    pub game_id: String,
    pub captured_at: DateTime<Utc>,
    pub moneyline_home: Option<i32>,
    pub moneyline_away: Option<i32>,
    pub total: Option<f64>,
    pub spread_home: Option<f64>,
    pub spread_home_odds: Option<i32>,
    pub spread_away_odds: Option<i32>,
    pub raw_payload: serde_json::Value,
    pub job_run_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    pub id: Uuid,
    pub job_name: String,
    pub job_key: Option<String>,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOutput {
    pub id: Uuid,
    pub game_id: String,
    pub odds_snapshot_id: Uuid,
    pub driver_key: String,
    pub score: f64,
    pub computed_at: DateTime<Utc>,
}

/// The driver's raw directional call. `Neutral` and `Pass` both mean "no
/// play", but `Neutral` is emitted by drivers that always describe state
/// (e.g. total-fragility), while `Pass` is an explicit recommendation value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Prediction {
    Home,
    Away,
    Over,
    Under,
    Neutral,
    Pass,
}

/// The authoritative bet direction on a card. Settlement reads this, never
/// the raw `Prediction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationType {
    MlHome,
    MlAway,
    SpreadHome,
    SpreadAway,
    TotalOver,
    TotalUnder,
    Pass,
}

impl RecommendationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationType::MlHome => "ML_HOME",
            RecommendationType::MlAway => "ML_AWAY",
            RecommendationType::SpreadHome => "SPREAD_HOME",
            RecommendationType::SpreadAway => "SPREAD_AWAY",
            RecommendationType::TotalOver => "TOTAL_OVER",
            RecommendationType::TotalUnder => "TOTAL_UNDER",
            RecommendationType::Pass => "PASS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ML_HOME" => Some(RecommendationType::MlHome),
            "ML_AWAY" => Some(RecommendationType::MlAway),
            "SPREAD_HOME" => Some(RecommendationType::SpreadHome),
            "SPREAD_AWAY" => Some(RecommendationType::SpreadAway),
            "TOTAL_OVER" => Some(RecommendationType::TotalOver),
            "TOTAL_UNDER" => Some(RecommendationType::TotalUnder),
            "PASS" => Some(RecommendationType::Pass),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardPayload {
    pub id: Uuid,
    pub game_id: String,
    pub sport: Sport,
    pub card_type: String,
    pub card_title: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub payload_data: serde_json::Value,
    pub model_output_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardResultStatus {
    Pending,
    Settled,
    Void,
}

impl CardResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardResultStatus::Pending => "pending",
            CardResultStatus::Settled => "settled",
            CardResultStatus::Void => "void",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardOutcome {
    Win,
    Loss,
    Push,
}

impl CardOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardOutcome::Win => "win",
            CardOutcome::Loss => "loss",
            CardOutcome::Push => "push",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardResult {
    pub id: Uuid,
    pub card_id: Uuid,
    pub game_id: String,
    pub sport: Sport,
    pub card_category: String,
    pub recommended_bet_type: String,
    pub status: CardResultStatus,
    pub result: Option<CardOutcome>,
    pub pnl_units: Option<f64>,
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameResult {
    pub game_id: String,
    pub final_score_home: i32,
    pub final_score_away: i32,
    pub status: GameStatus,
    pub result_source: String,
    pub settled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingStat {
    pub sport: Sport,
    pub card_category: String,
    pub recommended_bet_type: String,
    pub wins: i32,
    pub losses: i32,
    pub pushes: i32,
    pub total_pnl_units: f64,
    pub last_updated: DateTime<Utc>,
}

/// `/api/analyze/{id}/stream` protocol messages (see `odk-api`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamMessage {
    Progress {
        progress: u8,
        phase: String,
        timestamp: DateTime<Utc>,
    },
    Heartbeat {
        timestamp: DateTime<Utc>,
    },
    Complete {
        results: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
}
