use odk_schemas::Prediction;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    Ok,
    Missing,
}

/// One analytic component's read on a game: a direction, a confidence, and
/// the inputs it used. Drivers never see raw provider odds directly — the
/// caller projects an `OddsSnapshot` into a `DriverInputContext` first.
#[derive(Debug, Clone)]
pub struct DriverDescriptor {
    pub key: String,
    pub card_type: String,
    pub card_title: String,
    pub confidence: f64,
    pub prediction: Prediction,
    pub reasoning: String,
    pub ev_threshold_passed: bool,
    pub inputs: Value,
    pub score: f64,
    pub status: DriverStatus,
}

/// Market fields a driver is allowed to read. Built once per `(game,
/// snapshot)` pair and handed to every driver function for that sport.
#[derive(Debug, Clone)]
pub struct DriverInputContext {
    pub home_team: String,
    pub away_team: String,
    pub moneyline_home: Option<i32>,
    pub moneyline_away: Option<i32>,
    pub total: Option<f64>,
    pub spread_home: Option<f64>,
    pub spread_home_odds: Option<i32>,
    pub spread_away_odds: Option<i32>,
}
