//! Odds adapter: pure function of `(sport, hoursAhead)` -> normalized games.
//!
//! This crate owns the provider abstraction and normalization. It never
//! writes to the store — callers (`odk-pipeline`) apply the contract guard
//! and hand normalized games to `odk-db`.

pub mod normalizer;
pub mod provider;

use chrono::Utc;
use odk_schemas::Sport;
use provider::{FetchRequest, OddsProvider, ProviderError};

pub use normalizer::NormalizedGame;

/// Result of one adapter fetch. `raw_count` is the number of games the
/// provider returned before normalization; `games` is the survivors.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub games: Vec<NormalizedGame>,
    pub errors: Vec<String>,
    pub raw_count: usize,
}

/// Fetch and normalize one sport's odds. Never writes; on provider error or
/// a non-array payload returns an empty result with the error recorded
/// (spec §4.B).
pub async fn fetch_games(
    provider: &dyn OddsProvider,
    req: &FetchRequest,
) -> FetchResult {
    match provider.fetch(req).await {
        Ok(raw_games) => {
            let raw_count = raw_games.len();
            let (games, _dropped) = normalizer::normalize_all(&raw_games, req.sport, Utc::now());
            FetchResult {
                games,
                errors: Vec::new(),
                raw_count,
            }
        }
        Err(e) => FetchResult {
            games: Vec::new(),
            errors: vec![provider_error_message(&e)],
            raw_count: 0,
        },
    }
}

fn provider_error_message(e: &ProviderError) -> String {
    e.to_string()
}

/// Pure helper used only for logging/budget checks in the scheduler — the
/// number of provider requests one fetch tick will make across the active
/// sport set.
pub fn tokens_for_fetch(active_sports: &[Sport]) -> usize {
    active_sports.len()
}
