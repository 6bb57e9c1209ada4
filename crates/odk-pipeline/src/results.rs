//! External results-source boundary. Mirrors `odk-odds::provider` — a thin
//! trait over whatever feed supplies final scores, kept out of
//! `odk-settlement` so that crate stays pure compute.

use async_trait::async_trait;
use odk_schemas::Sport;
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone)]
pub struct RawGameResult {
    pub home_team: String,
    pub away_team: String,
    pub final_score_home: i32,
    pub final_score_away: i32,
    pub source: String,
}

#[derive(Debug)]
pub enum ResultsError {
    Transport(String),
    Decode(String),
}

impl fmt::Display for ResultsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultsError::Transport(msg) => write!(f, "results source transport error: {msg}"),
            ResultsError::Decode(msg) => write!(f, "results source decode error: {msg}"),
        }
    }
}

impl std::error::Error for ResultsError {}

/// Upstream final-scores feed. Returns every final game the source currently
/// knows about for a sport — matching against our own unsettled games is the
/// caller's job (fuzzy team-name compare lives in `odk-settlement`).
#[async_trait]
pub trait ResultsProvider: Send + Sync {
    async fn fetch_final_scores(&self, sport: Sport) -> Result<Vec<RawGameResult>, ResultsError>;
}

// ---------------------------------------------------------------------------
// HTTP scoreboard client
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawScoreboard {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    status: RawStatus,
    competitors: Vec<RawCompetitor>,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    completed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCompetitor {
    home_away: String,
    score: Option<String>,
    team: RawTeam,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTeam {
    display_name: String,
}

/// HTTP client against a scoreboard feed shaped like spec §6's results
/// source: `{event_id, status.completed, competitors[{homeAway, score,
/// team.displayName}]}`.
pub struct HttpResultsProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpResultsProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn sport_path(sport: Sport) -> &'static str {
        match sport {
            Sport::Nhl => "hockey/nhl",
            Sport::Nba => "basketball/nba",
            Sport::Nfl => "football/nfl",
            Sport::Mlb => "baseball/mlb",
        }
    }
}

#[async_trait]
impl ResultsProvider for HttpResultsProvider {
    async fn fetch_final_scores(&self, sport: Sport) -> Result<Vec<RawGameResult>, ResultsError> {
        let url = format!("{}/{}/scoreboard", self.base_url, Self::sport_path(sport));

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ResultsError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ResultsError::Transport(format!("status {}", resp.status())));
        }

        let board: RawScoreboard = resp
            .json()
            .await
            .map_err(|e| ResultsError::Decode(e.to_string()))?;

        let mut out = Vec::new();
        for event in board.events.into_iter().filter(|e| e.status.completed) {
            let home = event.competitors.iter().find(|c| c.home_away == "home");
            let away = event.competitors.iter().find(|c| c.home_away == "away");
            let (Some(home), Some(away)) = (home, away) else {
                tracing::warn!(event_id = %event.id, "scoreboard event missing a home or away competitor, skipping");
                continue;
            };
            let (Some(home_score), Some(away_score)) = (
                home.score.as_deref().and_then(|s| s.parse::<i32>().ok()),
                away.score.as_deref().and_then(|s| s.parse::<i32>().ok()),
            ) else {
                tracing::warn!(event_id = %event.id, "scoreboard event has unparseable scores, skipping");
                continue;
            };

            out.push(RawGameResult {
                home_team: home.team.display_name.clone(),
                away_team: away.team.display_name.clone(),
                final_score_home: home_score,
                final_score_away: away_score,
                source: "scoreboard".to_string(),
            });
        }

        Ok(out)
    }
}
