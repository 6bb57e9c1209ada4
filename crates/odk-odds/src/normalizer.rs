//! Normalizes raw provider games into the internal game + odds shape.
//!
//! This module does not fetch data and does not write to the store — see
//! `provider.rs` and `lib.rs::fetch_games`.

use std::fmt;

use crate::provider::RawGame;
use chrono::{DateTime, Utc};
use odk_schemas::{make_game_id, Sport};

/// Standard juice used when the provider omits explicit spread prices
/// (spec §4.B).
pub const DEFAULT_SPREAD_ODDS: i32 = -110;

/// Bookmakers preferred for pricing, sharpest first. The first bookmaker in
/// this list that carries the market wins; if none of them do, the first
/// bookmaker in the provider's own order is used.
const BOOKMAKER_PRIORITY: &[&str] = &["pinnacle", "circa", "draftkings", "fanduel", "betmgm"];

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedGame {
    pub game_id: String,
    pub sport: Sport,
    pub home_team: String,
    pub away_team: String,
    pub game_time_utc: DateTime<Utc>,
    pub captured_at_utc: DateTime<Utc>,
    pub moneyline_home: Option<i32>,
    pub moneyline_away: Option<i32>,
    pub total: Option<f64>,
    pub spread_home: Option<f64>,
    pub spread_home_odds: Option<i32>,
    pub spread_away_odds: Option<i32>,
}

#[derive(Debug, PartialEq)]
pub enum NormalizerError {
    MissingHomeTeam,
    MissingAwayTeam,
    MissingCommenceTime,
    InvalidCommenceTime(String),
}

impl fmt::Display for NormalizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizerError::MissingHomeTeam => write!(f, "missing home_team"),
            NormalizerError::MissingAwayTeam => write!(f, "missing away_team"),
            NormalizerError::MissingCommenceTime => write!(f, "missing commence_time"),
            NormalizerError::InvalidCommenceTime(raw) => {
                write!(f, "commence_time could not be parsed: '{raw}'")
            }
        }
    }
}

impl std::error::Error for NormalizerError {}

/// Normalize one raw game. Fails if any of the absolutely-required fields
/// (home team, away team, commence_time) is missing or malformed.
pub fn normalize(
    raw: &RawGame,
    sport: Sport,
    captured_at_utc: DateTime<Utc>,
) -> Result<NormalizedGame, NormalizerError> {
    let home_team = raw
        .home_team
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or(NormalizerError::MissingHomeTeam)?
        .to_string();
    let away_team = raw
        .away_team
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or(NormalizerError::MissingAwayTeam)?
        .to_string();
    let commence_raw = raw
        .commence_time
        .as_deref()
        .ok_or(NormalizerError::MissingCommenceTime)?;
    let game_time_utc: DateTime<Utc> = commence_raw
        .parse()
        .map_err(|_| NormalizerError::InvalidCommenceTime(commence_raw.to_string()))?;

    let provider_id = raw
        .provider_id
        .clone()
        .unwrap_or_else(|| format!("{home_team}-{away_team}-{commence_raw}"));
    let game_id = make_game_id(sport, &provider_id);

    let bookmaker = pick_bookmaker(raw);

    let (moneyline_home, moneyline_away) = bookmaker
        .and_then(|bm| bm.markets.iter().find(|m| m.key == "h2h"))
        .map(|m| {
            let home = m
                .outcomes
                .iter()
                .find(|o| o.name == home_team)
                .and_then(|o| o.price)
                .map(|p| p as i32);
            let away = m
                .outcomes
                .iter()
                .find(|o| o.name == away_team)
                .and_then(|o| o.price)
                .map(|p| p as i32);
            (home, away)
        })
        .unwrap_or((None, None));

    let total = bookmaker
        .and_then(|bm| bm.markets.iter().find(|m| m.key == "totals"))
        .and_then(|m| m.outcomes.first())
        .and_then(|o| o.point);

    let spread_market = bookmaker.and_then(|bm| bm.markets.iter().find(|m| m.key == "spreads"));
    let spread_home = spread_market
        .and_then(|m| m.outcomes.iter().find(|o| o.name == home_team))
        .and_then(|o| o.point);
    let spread_home_odds = spread_market
        .and_then(|m| m.outcomes.iter().find(|o| o.name == home_team))
        .and_then(|o| o.price)
        .map(|p| p as i32)
        .or(Some(DEFAULT_SPREAD_ODDS));
    let spread_away_odds = spread_market
        .and_then(|m| m.outcomes.iter().find(|o| o.name == away_team))
        .and_then(|o| o.price)
        .map(|p| p as i32)
        .or(Some(DEFAULT_SPREAD_ODDS));

    Ok(NormalizedGame {
        game_id,
        sport,
        home_team,
        away_team,
        game_time_utc,
        captured_at_utc,
        moneyline_home,
        moneyline_away,
        total,
        spread_home,
        spread_home_odds,
        spread_away_odds,
    })
}

fn pick_bookmaker(raw: &RawGame) -> Option<&crate::provider::RawBookmaker> {
    for key in BOOKMAKER_PRIORITY {
        if let Some(bm) = raw.bookmakers.iter().find(|b| b.key == *key) {
            return Some(bm);
        }
    }
    raw.bookmakers.first()
}

/// Normalizes every raw game, dropping (not failing) any that error.
/// Returns the normalized games plus the count of dropped games so the
/// caller can evaluate the contract guard.
pub fn normalize_all(
    raw_games: &[RawGame],
    sport: Sport,
    captured_at_utc: DateTime<Utc>,
) -> (Vec<NormalizedGame>, usize) {
    let mut out = Vec::with_capacity(raw_games.len());
    let mut dropped = 0usize;
    for raw in raw_games {
        match normalize(raw, sport, captured_at_utc) {
            Ok(g) => out.push(g),
            Err(_) => dropped += 1,
        }
    }
    (out, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{RawBookmaker, RawMarket, RawOutcome};

    fn sample_raw(home: &str, away: &str, commence: &str) -> RawGame {
        RawGame {
            provider_id: Some("fixed-game-001".to_string()),
            home_team: Some(home.to_string()),
            away_team: Some(away.to_string()),
            commence_time: Some(commence.to_string()),
            bookmakers: vec![RawBookmaker {
                key: "draftkings".to_string(),
                markets: vec![
                    RawMarket {
                        key: "h2h".to_string(),
                        outcomes: vec![
                            RawOutcome { name: home.to_string(), price: Some(-150.0), point: None },
                            RawOutcome { name: away.to_string(), price: Some(130.0), point: None },
                        ],
                    },
                    RawMarket {
                        key: "totals".to_string(),
                        outcomes: vec![RawOutcome { name: "Over".to_string(), price: Some(-110.0), point: Some(6.0) }],
                    },
                ],
            }],
        }
    }

    #[test]
    fn normalize_happy_path() {
        let raw = sample_raw("Toronto Maple Leafs", "Montreal Canadiens", "2026-03-01T00:00:00Z");
        let g = normalize(&raw, Sport::Nhl, Utc::now()).unwrap();
        assert_eq!(g.game_id, "game-nhl-fixed-game-001");
        assert_eq!(g.moneyline_home, Some(-150));
        assert_eq!(g.moneyline_away, Some(130));
        assert_eq!(g.total, Some(6.0));
    }

    #[test]
    fn normalize_missing_home_team_errors() {
        let mut raw = sample_raw("Toronto Maple Leafs", "Montreal Canadiens", "2026-03-01T00:00:00Z");
        raw.home_team = None;
        let err = normalize(&raw, Sport::Nhl, Utc::now()).unwrap_err();
        assert_eq!(err, NormalizerError::MissingHomeTeam);
    }

    #[test]
    fn normalize_missing_commence_time_errors() {
        let mut raw = sample_raw("Toronto Maple Leafs", "Montreal Canadiens", "2026-03-01T00:00:00Z");
        raw.commence_time = None;
        let err = normalize(&raw, Sport::Nhl, Utc::now()).unwrap_err();
        assert_eq!(err, NormalizerError::MissingCommenceTime);
    }

    #[test]
    fn spread_defaults_to_standard_juice_when_absent() {
        let raw = sample_raw("Toronto Maple Leafs", "Montreal Canadiens", "2026-03-01T00:00:00Z");
        let g = normalize(&raw, Sport::Nhl, Utc::now()).unwrap();
        assert_eq!(g.spread_home_odds, Some(DEFAULT_SPREAD_ODDS));
        assert_eq!(g.spread_away_odds, Some(DEFAULT_SPREAD_ODDS));
    }

    #[test]
    fn normalize_all_drops_bad_games_and_counts_them() {
        let good = sample_raw("Toronto Maple Leafs", "Montreal Canadiens", "2026-03-01T00:00:00Z");
        let mut bad = sample_raw("X", "Y", "2026-03-01T00:00:00Z");
        bad.home_team = None;
        let (games, dropped) = normalize_all(&[good, bad], Sport::Nhl, Utc::now());
        assert_eq!(games.len(), 1);
        assert_eq!(dropped, 1);
    }
}
