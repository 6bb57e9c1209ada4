//! Provider boundary for odds ingestion.
//!
//! This module defines only the raw wire shape and the provider trait.
//! No normalization, no DB logic, no contract-guard logic belong here —
//! that lives in `normalizer.rs` and `lib.rs`.

use async_trait::async_trait;
use odk_schemas::{Market, Sport};
use serde::Deserialize;
use std::fmt;

// ---------------------------------------------------------------------------
// Raw provider response shapes
// ---------------------------------------------------------------------------

/// One outcome line inside a market (e.g. a moneyline price on one team).
#[derive(Debug, Clone, Deserialize)]
pub struct RawOutcome {
    pub name: String,
    pub price: Option<f64>,
    pub point: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMarket {
    pub key: String,
    pub outcomes: Vec<RawOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBookmaker {
    pub key: String,
    pub markets: Vec<RawMarket>,
}

/// A single game exactly as the provider returns it, before any field
/// presence/shape checks. Fields that the provider may omit are `Option`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGame {
    #[serde(rename = "id")]
    pub provider_id: Option<String>,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub commence_time: Option<String>,
    #[serde(default)]
    pub bookmakers: Vec<RawBookmaker>,
}

// ---------------------------------------------------------------------------
// Fetch request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub sport: Sport,
    pub markets: Vec<Market>,
    pub hours_ahead: i64,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ProviderError {
    Transport(String),
    Api { code: Option<i64>, message: String },
    Decode(String),
    Config(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Transport(msg) => write!(f, "transport error: {msg}"),
            ProviderError::Api { code: Some(c), message } => {
                write!(f, "provider api error code={c}: {message}")
            }
            ProviderError::Api { code: None, message } => {
                write!(f, "provider api error: {message}")
            }
            ProviderError::Decode(msg) => write!(f, "decode error: {msg}"),
            ProviderError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Upstream odds-provider contract. Object-safe via `async-trait` so callers
/// can hold a `Box<dyn OddsProvider>` without knowing the concrete type.
#[async_trait]
pub trait OddsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the raw, un-normalized response. Never returns `Ok` with a
    /// non-array upstream payload — that case is `Err(ProviderError::Decode)`.
    async fn fetch(&self, req: &FetchRequest) -> Result<Vec<RawGame>, ProviderError>;
}

/// HTTP client against a TheOddsAPI-shaped provider.
pub struct HttpOddsProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpOddsProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn sport_key(sport: Sport) -> &'static str {
        match sport {
            Sport::Nhl => "icehockey_nhl",
            Sport::Nba => "basketball_nba",
            Sport::Nfl => "americanfootball_nfl",
            Sport::Mlb => "baseball_mlb",
        }
    }

    fn markets_param(markets: &[Market]) -> String {
        markets
            .iter()
            .map(|m| match m {
                Market::Moneyline => "h2h",
                Market::Totals => "totals",
                Market::Spreads => "spreads",
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[async_trait]
impl OddsProvider for HttpOddsProvider {
    fn name(&self) -> &'static str {
        "the-odds-api"
    }

    async fn fetch(&self, req: &FetchRequest) -> Result<Vec<RawGame>, ProviderError> {
        let url = format!(
            "{}/v4/sports/{}/odds",
            self.base_url,
            Self::sport_key(req.sport)
        );

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("markets", &Self::markets_param(&req.markets)),
                ("dateFormat", "iso"),
                ("oddsFormat", "american"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Config("invalid ODDS_API_KEY".to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                code: Some(status.as_u16() as i64),
                message: body,
            });
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        match body {
            serde_json::Value::Array(_) => {
                serde_json::from_value(body).map_err(|e| ProviderError::Decode(e.to_string()))
            }
            _ => Err(ProviderError::Decode("response is not a JSON array".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProvider {
        games: Vec<RawGame>,
    }

    #[async_trait]
    impl OddsProvider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn fetch(&self, _req: &FetchRequest) -> Result<Vec<RawGame>, ProviderError> {
            Ok(self.games.clone())
        }
    }

    #[tokio::test]
    async fn provider_is_object_safe_via_box() {
        let p: Box<dyn OddsProvider> = Box::new(MockProvider { games: vec![] });
        let req = FetchRequest {
            sport: Sport::Nhl,
            markets: vec![Market::Moneyline],
            hours_ahead: 36,
        };
        assert!(p.fetch(&req).await.unwrap().is_empty());
    }

    #[test]
    fn provider_error_display_api_with_code() {
        let err = ProviderError::Api { code: Some(401), message: "bad key".to_string() };
        assert_eq!(err.to_string(), "provider api error code=401: bad key");
    }

    #[test]
    fn sport_key_mapping() {
        assert_eq!(HttpOddsProvider::sport_key(Sport::Nhl), "icehockey_nhl");
        assert_eq!(HttpOddsProvider::sport_key(Sport::Mlb), "baseball_mlb");
    }

    #[test]
    fn markets_param_joins_with_comma() {
        let s = HttpOddsProvider::markets_param(&[Market::Moneyline, Market::Totals]);
        assert_eq!(s, "h2h,totals");
    }
}
