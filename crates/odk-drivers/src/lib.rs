//! Driver → card fan-out engine.
//!
//! Pure compute: given a game's latest `OddsSnapshot` projected into a
//! `DriverInputContext`, produce the sport's driver set. No IO, no store
//! access, no async — `odk-pipeline` owns dispatch and persistence.

mod engine;
mod types;

pub use engine::{
    composite_direction, generic_drivers, generic_line_value, generic_total_fragility,
    nhl_drivers, nhl_empty_net, nhl_goalie, nhl_shot_environment, nhl_special_teams,
    nhl_total_fragility, recommendation_for_driver,
};
pub use types::{DriverDescriptor, DriverInputContext, DriverStatus};

use odk_schemas::{OddsSnapshot, Sport};

impl DriverInputContext {
    pub fn from_snapshot(home_team: &str, away_team: &str, snapshot: &OddsSnapshot) -> Self {
        Self {
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            moneyline_home: snapshot.moneyline_home,
            moneyline_away: snapshot.moneyline_away,
            total: snapshot.total,
            spread_home: snapshot.spread_home,
            spread_home_odds: snapshot.spread_home_odds,
            spread_away_odds: snapshot.spread_away_odds,
        }
    }
}

/// Computes the full driver set for a sport and filters out any driver whose
/// required inputs were missing. Skipped drivers never become cards.
pub fn compute_drivers(sport: Sport, ctx: &DriverInputContext) -> Vec<DriverDescriptor> {
    let all = match sport {
        Sport::Nhl => nhl_drivers(ctx),
        Sport::Nba | Sport::Nfl | Sport::Mlb => generic_drivers(sport.slug(), ctx),
    };
    all.into_iter().filter(|d| d.status == DriverStatus::Ok).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use odk_schemas::OddsSnapshot;
    use uuid::Uuid;

    fn snapshot() -> OddsSnapshot {
        OddsSnapshot {
            id: Uuid::new_v4(),
            game_id: "game-nhl-1".to_string(),
            captured_at: Utc::now(),
            moneyline_home: Some(-150),
            moneyline_away: Some(130),
            total: Some(6.5),
            spread_home: Some(-1.5),
            spread_home_odds: Some(-110),
            spread_away_odds: Some(-110),
            raw_payload: serde_json::Value::Null,
            job_run_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn compute_drivers_skips_missing_for_partial_snapshot() {
        let mut s = snapshot();
        s.spread_home = None;
        let ctx = DriverInputContext::from_snapshot("Toronto", "Montreal", &s);
        let drivers = compute_drivers(Sport::Nhl, &ctx);
        assert!(drivers.iter().all(|d| d.card_type != "nhl-empty-net"));
        assert!(!drivers.is_empty());
    }

    #[test]
    fn compute_drivers_generic_for_other_sports() {
        let s = snapshot();
        let ctx = DriverInputContext::from_snapshot("Lakers", "Celtics", &s);
        let drivers = compute_drivers(Sport::Nba, &ctx);
        assert_eq!(drivers.len(), 2);
    }

    #[test]
    fn all_drivers_missing_yields_empty_set() {
        let mut s = snapshot();
        s.moneyline_home = None;
        s.moneyline_away = None;
        s.total = None;
        s.spread_home = None;
        s.spread_home_odds = None;
        s.spread_away_odds = None;
        let ctx = DriverInputContext::from_snapshot("A", "B", &s);
        let drivers = compute_drivers(Sport::Nhl, &ctx);
        assert!(drivers.is_empty());
    }
}
