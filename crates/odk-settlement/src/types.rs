use odk_schemas::Market;

/// Standard juice assumed when a card's `odds_context` doesn't carry an
/// explicit price for the side being graded.
pub const DEFAULT_ODDS: i32 = -110;

/// The authoritative direction extracted from a card's recommendation (or,
/// for older cards, the legacy prediction + bet-type pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Home,
    Away,
    Over,
    Under,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActualPlay {
    pub direction: Direction,
    pub market: Market,
}

/// The price (and, for totals/spreads, the line) used to grade one card.
#[derive(Debug, Clone, Copy, Default)]
pub struct BetOdds {
    pub american_odds: Option<i32>,
    pub line: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeResult {
    pub outcome: odk_schemas::CardOutcome,
    pub pnl_units: f64,
}

/// Aliases between our display names and common results-source spellings.
/// Both directions are matched — the table only needs one entry per pair.
pub const TEAM_ALIASES: &[(&str, &str)] = &[
    ("la kings", "los angeles kings"),
    ("ny rangers", "new york rangers"),
    ("ny islanders", "new york islanders"),
    ("nj devils", "new jersey devils"),
    ("sj sharks", "san jose sharks"),
    ("tb lightning", "tampa bay lightning"),
    ("la lakers", "los angeles lakers"),
    ("la clippers", "los angeles clippers"),
    ("ny knicks", "new york knicks"),
    ("sa spurs", "san antonio spurs"),
    ("kc chiefs", "kansas city chiefs"),
    ("ny giants", "new york giants"),
    ("ny jets", "new york jets"),
    ("sf 49ers", "san francisco 49ers"),
];
