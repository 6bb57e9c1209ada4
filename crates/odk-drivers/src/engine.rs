use crate::types::{DriverDescriptor, DriverInputContext, DriverStatus};
use odk_schemas::{Prediction, RecommendationType};
use serde_json::json;

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

fn implied_prob(american_odds: i32) -> f64 {
    if american_odds < 0 {
        let a = american_odds.unsigned_abs() as f64;
        a / (a + 100.0)
    } else {
        100.0 / (american_odds as f64 + 100.0)
    }
}

fn side_score(home_odds: i32, away_odds: i32) -> f64 {
    let home_prob = implied_prob(home_odds);
    let away_prob = implied_prob(away_odds);
    let total = home_prob + away_prob;
    if total > 0.0 {
        home_prob / total
    } else {
        0.5
    }
}

fn score_to_side(score: f64) -> Prediction {
    if score > 0.5 {
        Prediction::Home
    } else if score < 0.5 {
        Prediction::Away
    } else {
        Prediction::Neutral
    }
}

fn score_to_total(score: f64) -> Prediction {
    if score > 0.5 {
        Prediction::Over
    } else if score < 0.5 {
        Prediction::Under
    } else {
        Prediction::Neutral
    }
}

/// Per-sport composite direction from a weighted blend of sub-scores. Never
/// reads raw provider odds directly — callers pass driver scores that were
/// themselves already derived from the market.
pub fn composite_direction(components: &[(f64, f64)]) -> Prediction {
    let total_weight: f64 = components.iter().map(|(_, w)| w).sum();
    if total_weight <= 0.0 {
        return Prediction::Neutral;
    }
    let weighted_sum: f64 = components.iter().map(|(s, w)| s * w).sum::<f64>() / total_weight;
    score_to_side(weighted_sum)
}

fn title_for(label: &str, prediction: Prediction, home: &str, away: &str) -> String {
    match prediction {
        Prediction::Home => format!("{label}: lean {home}"),
        Prediction::Away => format!("{label}: lean {away}"),
        Prediction::Over => format!("{label}: lean Over"),
        Prediction::Under => format!("{label}: lean Under"),
        Prediction::Neutral => format!("{label}: neutral read"),
        Prediction::Pass => format!("{label}: pass"),
    }
}

fn missing(key: &str, card_type: &str, card_title: &str) -> DriverDescriptor {
    DriverDescriptor {
        key: key.to_string(),
        card_type: card_type.to_string(),
        card_title: card_title.to_string(),
        confidence: 0.0,
        prediction: Prediction::Pass,
        reasoning: String::new(),
        ev_threshold_passed: false,
        inputs: json!({}),
        score: 0.5,
        status: DriverStatus::Missing,
    }
}

/// Maps a driver's own call into the authoritative bet direction settlement
/// reads (spec: the recommendation, not the raw prediction, is graded).
pub fn recommendation_for_driver(key: &str, prediction: Prediction) -> RecommendationType {
    let is_total_driver = matches!(key, "shot_environment" | "total_fragility");
    match (is_total_driver, prediction) {
        (true, Prediction::Over) => RecommendationType::TotalOver,
        (true, Prediction::Under) => RecommendationType::TotalUnder,
        (false, Prediction::Home) => RecommendationType::MlHome,
        (false, Prediction::Away) => RecommendationType::MlAway,
        _ => RecommendationType::Pass,
    }
}

// ---------------------------------------------------------------------------
// NHL driver set
// ---------------------------------------------------------------------------

pub fn nhl_goalie(ctx: &DriverInputContext) -> DriverDescriptor {
    const KEY: &str = "goalie";
    const CARD_TYPE: &str = "nhl-goalie";
    let (Some(ml_home), Some(ml_away)) = (ctx.moneyline_home, ctx.moneyline_away) else {
        return missing(KEY, CARD_TYPE, "NHL Goalie Matchup");
    };
    let score = side_score(ml_home, ml_away);
    let prediction = score_to_side(score);
    let confidence = clamp((score - 0.5).abs() * 1.4, 0.05, 0.35);
    DriverDescriptor {
        key: KEY.to_string(),
        card_type: CARD_TYPE.to_string(),
        card_title: title_for("NHL Goalie Matchup", prediction, &ctx.home_team, &ctx.away_team),
        confidence,
        prediction,
        reasoning: format!(
            "market-implied goalie matchup edge: home win prob {:.1}%",
            score * 100.0
        ),
        ev_threshold_passed: confidence >= 0.2,
        inputs: json!({"moneyline_home": ml_home, "moneyline_away": ml_away}),
        score,
        status: DriverStatus::Ok,
    }
}

pub fn nhl_special_teams(ctx: &DriverInputContext) -> DriverDescriptor {
    const KEY: &str = "special_teams";
    const CARD_TYPE: &str = "nhl-special-teams";
    let (Some(home_odds), Some(away_odds)) = (ctx.spread_home_odds, ctx.spread_away_odds) else {
        return missing(KEY, CARD_TYPE, "NHL Special Teams Mismatch");
    };
    let score = side_score(home_odds, away_odds);
    let prediction = score_to_side(score);
    let confidence = clamp((score - 0.5).abs() * 1.2, 0.05, 0.3);
    DriverDescriptor {
        key: KEY.to_string(),
        card_type: CARD_TYPE.to_string(),
        card_title: title_for("NHL Special Teams Mismatch", prediction, &ctx.home_team, &ctx.away_team),
        confidence,
        prediction,
        reasoning: "derived from spread-side juice skew".to_string(),
        ev_threshold_passed: confidence >= 0.18,
        inputs: json!({"spread_home_odds": home_odds, "spread_away_odds": away_odds}),
        score,
        status: DriverStatus::Ok,
    }
}

pub fn nhl_shot_environment(ctx: &DriverInputContext) -> DriverDescriptor {
    const KEY: &str = "shot_environment";
    const CARD_TYPE: &str = "nhl-shot-environment";
    const BASELINE: f64 = 6.0;
    let Some(total) = ctx.total else {
        return missing(KEY, CARD_TYPE, "NHL Shot Environment");
    };
    let score = clamp(0.5 + (total - BASELINE) / BASELINE * 0.5, 0.0, 1.0);
    let prediction = score_to_total(score);
    let confidence = clamp((score - 0.5).abs() * 1.6, 0.05, 0.4);
    DriverDescriptor {
        key: KEY.to_string(),
        card_type: CARD_TYPE.to_string(),
        card_title: title_for("NHL Shot Environment", prediction, &ctx.home_team, &ctx.away_team),
        confidence,
        prediction,
        reasoning: format!("market total {total} vs baseline {BASELINE}"),
        ev_threshold_passed: confidence >= 0.22,
        inputs: json!({"total": total, "baseline": BASELINE}),
        score,
        status: DriverStatus::Ok,
    }
}

pub fn nhl_empty_net(ctx: &DriverInputContext) -> DriverDescriptor {
    const KEY: &str = "empty_net";
    const CARD_TYPE: &str = "nhl-empty-net";
    let (Some(spread_home), Some(total)) = (ctx.spread_home, ctx.total) else {
        return missing(KEY, CARD_TYPE, "NHL Empty Net Spots");
    };
    let closeness = 1.0 - clamp(spread_home.abs() / 3.0, 0.0, 1.0);
    let favorite_sign = if spread_home < 0.0 { 1.0 } else { -1.0 };
    let score = clamp(0.5 + closeness * 0.2 * favorite_sign, 0.0, 1.0);
    let prediction = score_to_side(score);
    let confidence = clamp((score - 0.5).abs() * 1.5, 0.05, 0.3);
    DriverDescriptor {
        key: KEY.to_string(),
        card_type: CARD_TYPE.to_string(),
        card_title: title_for("NHL Empty Net Spots", prediction, &ctx.home_team, &ctx.away_team),
        confidence,
        prediction,
        reasoning: format!("spread {spread_home:+.1}, total {total}, closeness {closeness:.2}"),
        ev_threshold_passed: confidence >= 0.18,
        inputs: json!({"spread_home": spread_home, "total": total}),
        score,
        status: DriverStatus::Ok,
    }
}

pub fn nhl_total_fragility(ctx: &DriverInputContext) -> DriverDescriptor {
    const KEY: &str = "total_fragility";
    const CARD_TYPE: &str = "nhl-total-fragility";
    const BASELINE: f64 = 6.0;
    let Some(total) = ctx.total else {
        return missing(KEY, CARD_TYPE, "NHL Total Fragility");
    };
    let fragility = clamp((total - BASELINE).abs() / 2.0, 0.0, 1.0);
    DriverDescriptor {
        key: KEY.to_string(),
        card_type: CARD_TYPE.to_string(),
        card_title: "NHL Total Fragility: neutral read".to_string(),
        confidence: fragility,
        prediction: Prediction::Neutral,
        reasoning: format!("total {total} sits {:.2} units from baseline {BASELINE}", total - BASELINE),
        ev_threshold_passed: fragility >= 0.3,
        inputs: json!({"total": total, "baseline": BASELINE}),
        score: fragility,
        status: DriverStatus::Ok,
    }
}

pub fn nhl_drivers(ctx: &DriverInputContext) -> Vec<DriverDescriptor> {
    vec![
        nhl_goalie(ctx),
        nhl_special_teams(ctx),
        nhl_shot_environment(ctx),
        nhl_empty_net(ctx),
        nhl_total_fragility(ctx),
    ]
}

// ---------------------------------------------------------------------------
// Generic driver set for sports without a bespoke model (NBA/NFL/MLB)
// ---------------------------------------------------------------------------

pub fn generic_line_value(sport_slug: &str, ctx: &DriverInputContext) -> DriverDescriptor {
    let key = "line_value";
    let card_type = format!("{sport_slug}-line-value");
    let (Some(ml_home), Some(ml_away)) = (ctx.moneyline_home, ctx.moneyline_away) else {
        return missing(key, &card_type, "Line Value");
    };
    let score = side_score(ml_home, ml_away);
    let prediction = score_to_side(score);
    let confidence = clamp((score - 0.5).abs() * 1.3, 0.05, 0.35);
    DriverDescriptor {
        key: key.to_string(),
        card_type,
        card_title: title_for("Line Value", prediction, &ctx.home_team, &ctx.away_team),
        confidence,
        prediction,
        reasoning: format!("market-implied moneyline edge: home win prob {:.1}%", score * 100.0),
        ev_threshold_passed: confidence >= 0.2,
        inputs: json!({"moneyline_home": ml_home, "moneyline_away": ml_away}),
        score,
        status: DriverStatus::Ok,
    }
}

pub fn generic_total_fragility(sport_slug: &str, ctx: &DriverInputContext, baseline: f64) -> DriverDescriptor {
    let key = "total_fragility";
    let card_type = format!("{sport_slug}-total-fragility");
    let Some(total) = ctx.total else {
        return missing(key, &card_type, "Total Fragility");
    };
    let fragility = clamp((total - baseline).abs() / baseline.max(1.0), 0.0, 1.0);
    DriverDescriptor {
        key: key.to_string(),
        card_type,
        card_title: "Total Fragility: neutral read".to_string(),
        confidence: fragility,
        prediction: Prediction::Neutral,
        reasoning: format!("total {total} sits {:.2} units from baseline {baseline}", total - baseline),
        ev_threshold_passed: fragility >= 0.3,
        inputs: json!({"total": total, "baseline": baseline}),
        score: fragility,
        status: DriverStatus::Ok,
    }
}

fn generic_total_baseline(sport_slug: &str) -> f64 {
    match sport_slug {
        "nba" => 220.0,
        "nfl" => 44.0,
        "mlb" => 8.5,
        _ => 1.0,
    }
}

pub fn generic_drivers(sport_slug: &str, ctx: &DriverInputContext) -> Vec<DriverDescriptor> {
    vec![
        generic_line_value(sport_slug, ctx),
        generic_total_fragility(sport_slug, ctx, generic_total_baseline(sport_slug)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DriverInputContext {
        DriverInputContext {
            home_team: "Toronto Maple Leafs".to_string(),
            away_team: "Montreal Canadiens".to_string(),
            moneyline_home: Some(-150),
            moneyline_away: Some(130),
            total: Some(6.5),
            spread_home: Some(-1.5),
            spread_home_odds: Some(-110),
            spread_away_odds: Some(-110),
        }
    }

    #[test]
    fn empty_net_missing_when_spread_absent() {
        let mut c = ctx();
        c.spread_home = None;
        let d = nhl_empty_net(&c);
        assert_eq!(d.status, DriverStatus::Missing);
    }

    #[test]
    fn missing_driver_skipped_not_neutral() {
        let mut c = ctx();
        c.moneyline_home = None;
        let d = nhl_goalie(&c);
        assert_eq!(d.status, DriverStatus::Missing);
        assert_ne!(d.prediction, Prediction::Neutral);
    }

    #[test]
    fn total_fragility_is_always_neutral() {
        let c = ctx();
        let d = nhl_total_fragility(&c);
        assert_eq!(d.prediction, Prediction::Neutral);
        let mut c2 = ctx();
        c2.total = Some(3.0);
        let d2 = nhl_total_fragility(&c2);
        assert_eq!(d2.prediction, Prediction::Neutral);
    }

    #[test]
    fn differentiated_confidence_across_snapshots() {
        let mut low = ctx();
        low.total = Some(6.1);
        let mut high = ctx();
        high.total = Some(8.0);

        let shot_low = nhl_shot_environment(&low);
        let shot_high = nhl_shot_environment(&high);
        assert_ne!(shot_low.confidence, shot_high.confidence);

        let frag_low = nhl_total_fragility(&low);
        let frag_high = nhl_total_fragility(&high);
        assert_ne!(frag_low.confidence, frag_high.confidence);

        let mut close = ctx();
        close.spread_home = Some(-0.5);
        let mut wide = ctx();
        wide.spread_home = Some(-2.5);
        let en_close = nhl_empty_net(&close);
        let en_wide = nhl_empty_net(&wide);
        assert_ne!(en_close.confidence, en_wide.confidence);
    }

    #[test]
    fn nhl_drivers_all_emit_when_fully_populated() {
        let c = ctx();
        let ds = nhl_drivers(&c);
        assert_eq!(ds.len(), 5);
        assert!(ds.iter().all(|d| d.status == DriverStatus::Ok));
    }

    #[test]
    fn recommendation_maps_moneyline_and_totals() {
        assert_eq!(recommendation_for_driver("goalie", Prediction::Home), RecommendationType::MlHome);
        assert_eq!(recommendation_for_driver("goalie", Prediction::Away), RecommendationType::MlAway);
        assert_eq!(recommendation_for_driver("shot_environment", Prediction::Over), RecommendationType::TotalOver);
        assert_eq!(recommendation_for_driver("shot_environment", Prediction::Under), RecommendationType::TotalUnder);
        assert_eq!(recommendation_for_driver("total_fragility", Prediction::Neutral), RecommendationType::Pass);
    }

    #[test]
    fn composite_direction_weighted_threshold() {
        assert_eq!(composite_direction(&[(0.7, 1.0), (0.6, 1.0)]), Prediction::Home);
        assert_eq!(composite_direction(&[(0.3, 1.0), (0.4, 1.0)]), Prediction::Away);
        assert_eq!(composite_direction(&[(0.5, 1.0)]), Prediction::Neutral);
    }
}
