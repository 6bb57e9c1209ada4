use crate::types::{ActualPlay, BetOdds, Direction, GradeResult, DEFAULT_ODDS, TEAM_ALIASES};
use odk_schemas::{CardOutcome, Market};
use serde_json::Value;
use std::collections::HashSet;

fn normalize_team_name(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let stripped = lower
        .replace(" fc", "")
        .replace("fc ", "")
        .replace('.', "")
        .replace('-', " ");
    let collapsed: String = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    for (alias, canonical) in TEAM_ALIASES {
        if collapsed == *alias || collapsed == *canonical {
            return canonical.to_string();
        }
    }
    collapsed
}

/// Fuzzy team-name match: normalize both sides then compare exact,
/// substring-both-ways, or shared-token (results-source feeds spell teams
/// inconsistently; raw odds providers rarely match verbatim).
pub fn names_match(a: &str, b: &str) -> bool {
    let a = normalize_team_name(a);
    let b = normalize_team_name(b);
    if a == b || a.contains(&b) || b.contains(&a) {
        return true;
    }
    let a_tokens: HashSet<&str> = a.split_whitespace().collect();
    b.split_whitespace().any(|t| t.len() > 2 && a_tokens.contains(t))
}

fn recommendation_to_play(rec_type: &str) -> Option<ActualPlay> {
    match rec_type {
        "ML_HOME" => Some(ActualPlay { direction: Direction::Home, market: Market::Moneyline }),
        "ML_AWAY" => Some(ActualPlay { direction: Direction::Away, market: Market::Moneyline }),
        "SPREAD_HOME" => Some(ActualPlay { direction: Direction::Home, market: Market::Spreads }),
        "SPREAD_AWAY" => Some(ActualPlay { direction: Direction::Away, market: Market::Spreads }),
        "TOTAL_OVER" => Some(ActualPlay { direction: Direction::Over, market: Market::Totals }),
        "TOTAL_UNDER" => Some(ActualPlay { direction: Direction::Under, market: Market::Totals }),
        _ => None,
    }
}

fn legacy_to_play(prediction: &str, bet_type: &str) -> Option<ActualPlay> {
    let market = match bet_type {
        "spread" => Market::Spreads,
        "total" | "totals" => Market::Totals,
        _ => Market::Moneyline,
    };
    match (prediction, market) {
        ("HOME", Market::Moneyline | Market::Spreads) => Some(ActualPlay { direction: Direction::Home, market }),
        ("AWAY", Market::Moneyline | Market::Spreads) => Some(ActualPlay { direction: Direction::Away, market }),
        ("OVER", Market::Totals) => Some(ActualPlay { direction: Direction::Over, market }),
        ("UNDER", Market::Totals) => Some(ActualPlay { direction: Direction::Under, market }),
        _ => None,
    }
}

/// Resolves the bet actually being graded. `recommendation.type` is
/// authoritative; older cards fall back to `prediction` + a top-level
/// `recommended_bet_type` string. `PASS`/`NEUTRAL` cards never constituted a
/// play and resolve to `None`.
pub fn extract_actual_play(payload_data: &Value) -> Option<ActualPlay> {
    if let Some(rec_type) = payload_data.pointer("/recommendation/type").and_then(Value::as_str) {
        return recommendation_to_play(rec_type);
    }
    let prediction = payload_data.get("prediction").and_then(Value::as_str)?;
    let bet_type = payload_data
        .get("recommended_bet_type")
        .and_then(Value::as_str)
        .unwrap_or("moneyline");
    legacy_to_play(prediction, bet_type)
}

/// Reads the market fields used to grade a card from its stored
/// `odds_context`, applying the documented defaults when a field is absent.
pub fn pick_bet_odds(payload_data: &Value, play: &ActualPlay) -> BetOdds {
    let ctx = payload_data.get("odds_context");
    let get_i32 = |key: &str| ctx.and_then(|c| c.get(key)).and_then(Value::as_i64).map(|v| v as i32);
    let get_f64 = |key: &str| ctx.and_then(|c| c.get(key)).and_then(Value::as_f64);

    match play.market {
        Market::Moneyline => {
            let key = match play.direction {
                Direction::Home => "h2h_home",
                _ => "h2h_away",
            };
            BetOdds { american_odds: Some(get_i32(key).unwrap_or(DEFAULT_ODDS)), line: None }
        }
        Market::Spreads => {
            let key = match play.direction {
                Direction::Home => "spread_home_odds",
                _ => "spread_away_odds",
            };
            BetOdds {
                american_odds: Some(get_i32(key).unwrap_or(DEFAULT_ODDS)),
                line: get_f64("spread_home"),
            }
        }
        Market::Totals => BetOdds {
            american_odds: Some(get_i32("total_odds").unwrap_or(DEFAULT_ODDS)),
            line: get_f64("total"),
        },
    }
}

/// American odds to decimal profit on a 1-unit stake (`-110` -> `0.909...`,
/// `+100` -> `1.0`).
pub fn to_units(american_odds: i32) -> f64 {
    if american_odds < 0 {
        100.0 / (american_odds.unsigned_abs() as f64)
    } else {
        american_odds as f64 / 100.0
    }
}

fn grade_moneyline(direction: Direction, home: i32, away: i32) -> CardOutcome {
    match home.cmp(&away) {
        std::cmp::Ordering::Equal => CardOutcome::Push,
        std::cmp::Ordering::Greater => win_if(direction == Direction::Home),
        std::cmp::Ordering::Less => win_if(direction == Direction::Away),
    }
}

fn grade_spread(direction: Direction, spread_home: f64, home: i32, away: i32) -> CardOutcome {
    let adjusted_home = home as f64 + spread_home;
    let away = away as f64;
    if (adjusted_home - away).abs() < f64::EPSILON {
        CardOutcome::Push
    } else if adjusted_home > away {
        win_if(direction == Direction::Home)
    } else {
        win_if(direction == Direction::Away)
    }
}

fn grade_total(direction: Direction, total_line: f64, home: i32, away: i32) -> CardOutcome {
    let sum = (home + away) as f64;
    if (sum - total_line).abs() < f64::EPSILON {
        CardOutcome::Push
    } else if sum > total_line {
        win_if(direction == Direction::Over)
    } else {
        win_if(direction == Direction::Under)
    }
}

fn win_if(cond: bool) -> CardOutcome {
    if cond {
        CardOutcome::Win
    } else {
        CardOutcome::Loss
    }
}

/// Grades one card against a final score and computes its `pnl_units` at a
/// 1-unit stake.
pub fn grade(play: &ActualPlay, odds: &BetOdds, final_score_home: i32, final_score_away: i32) -> GradeResult {
    let outcome = match play.market {
        Market::Moneyline => grade_moneyline(play.direction, final_score_home, final_score_away),
        Market::Spreads => grade_spread(play.direction, odds.line.unwrap_or(0.0), final_score_home, final_score_away),
        Market::Totals => grade_total(play.direction, odds.line.unwrap_or(0.0), final_score_home, final_score_away),
    };
    let pnl_units = match outcome {
        CardOutcome::Win => to_units(odds.american_odds.unwrap_or(DEFAULT_ODDS)),
        CardOutcome::Loss => -1.0,
        CardOutcome::Push => 0.0,
    };
    GradeResult { outcome, pnl_units }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names_match_aliases_la_kings() {
        assert!(names_match("LA Kings", "Los Angeles Kings"));
        assert!(names_match("NY Rangers", "New York Rangers"));
        assert!(!names_match("Los Angeles Kings", "Los Angeles Clippers"));
    }

    #[test]
    fn extract_actual_play_prefers_recommendation() {
        let payload = json!({"recommendation": {"type": "ML_HOME"}, "prediction": "AWAY"});
        let play = extract_actual_play(&payload).unwrap();
        assert_eq!(play.direction, Direction::Home);
        assert_eq!(play.market, Market::Moneyline);
    }

    #[test]
    fn extract_actual_play_pass_skips() {
        let payload = json!({"recommendation": {"type": "PASS"}});
        assert!(extract_actual_play(&payload).is_none());
    }

    #[test]
    fn extract_actual_play_falls_back_to_legacy() {
        let payload = json!({"prediction": "OVER", "recommended_bet_type": "total"});
        let play = extract_actual_play(&payload).unwrap();
        assert_eq!(play.direction, Direction::Over);
        assert_eq!(play.market, Market::Totals);
    }

    #[test]
    fn extract_actual_play_neutral_skips() {
        let payload = json!({"prediction": "NEUTRAL", "recommended_bet_type": "moneyline"});
        assert!(extract_actual_play(&payload).is_none());
    }

    #[test]
    fn moneyline_home_win_grades_correctly() {
        let play = ActualPlay { direction: Direction::Home, market: Market::Moneyline };
        let payload = json!({"odds_context": {"h2h_home": -110, "h2h_away": 130}});
        let odds = pick_bet_odds(&payload, &play);
        let result = grade(&play, &odds, 4, 2);
        assert_eq!(result.outcome, CardOutcome::Win);
        assert!((result.pnl_units - 0.909_090_9).abs() < 1e-4);
    }

    #[test]
    fn moneyline_home_loss_grades_correctly() {
        let play = ActualPlay { direction: Direction::Home, market: Market::Moneyline };
        let payload = json!({"odds_context": {"h2h_home": -110, "h2h_away": 130}});
        let odds = pick_bet_odds(&payload, &play);
        let result = grade(&play, &odds, 1, 3);
        assert_eq!(result.outcome, CardOutcome::Loss);
        assert_eq!(result.pnl_units, -1.0);
    }

    #[test]
    fn moneyline_tie_is_push() {
        let play = ActualPlay { direction: Direction::Home, market: Market::Moneyline };
        let payload = json!({"odds_context": {"h2h_home": -110, "h2h_away": 130}});
        let odds = pick_bet_odds(&payload, &play);
        let result = grade(&play, &odds, 3, 3);
        assert_eq!(result.outcome, CardOutcome::Push);
        assert_eq!(result.pnl_units, 0.0);
    }

    #[test]
    fn spread_missing_price_defaults_to_standard_juice() {
        let play = ActualPlay { direction: Direction::Home, market: Market::Spreads };
        let payload = json!({"odds_context": {"spread_home": -1.5}});
        let odds = pick_bet_odds(&payload, &play);
        assert_eq!(odds.american_odds, Some(DEFAULT_ODDS));
        let result = grade(&play, &odds, 4, 2);
        assert_eq!(result.outcome, CardOutcome::Win);
    }

    #[test]
    fn total_exact_landing_is_push() {
        let play = ActualPlay { direction: Direction::Over, market: Market::Totals };
        let payload = json!({"odds_context": {"total": 6.0}});
        let odds = pick_bet_odds(&payload, &play);
        let result = grade(&play, &odds, 3, 3);
        assert_eq!(result.outcome, CardOutcome::Push);
    }

    #[test]
    fn to_units_matches_spec_examples() {
        assert!((to_units(-110) - 0.909_090_9).abs() < 1e-4);
        assert_eq!(to_units(100), 1.0);
    }
}
