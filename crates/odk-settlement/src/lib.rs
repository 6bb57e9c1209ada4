//! Settlement engine: grades pending card results against final scores and
//! reconciles our display names against an external results source's names.
//!
//! Deterministic, pure logic. No IO, no store access — `odk-pipeline` owns
//! fetching results and persisting grades.

mod engine;
mod types;

pub use engine::{extract_actual_play, grade, names_match, pick_bet_odds, to_units};
pub use types::{ActualPlay, BetOdds, Direction, GradeResult, DEFAULT_ODDS};
