//! Environment-variable configuration. Every key here is contract (spec §6):
//! callers read it once at startup and pass the resulting `Config` down,
//! nothing re-reads the environment after boot.

use anyhow::{Context, Result};
use chrono_tz::Tz;
use odk_schemas::{Market, Sport};
use std::collections::HashMap;
use std::env;

#[derive(Debug, Clone)]
pub struct SportConfig {
    pub sport: Sport,
    pub active: bool,
    pub markets: Vec<Market>,
    pub model_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub odds_api_key: String,
    pub tz: Tz,
    pub tick_ms: u64,
    pub enable_odds_pull: bool,
    pub fixed_catchup: bool,
    pub dry_run: bool,
    pub sports: HashMap<Sport, SportConfig>,
}

impl Config {
    /// Reads the contract env vars documented in spec §6. Missing optional
    /// keys fall back to the documented defaults.
    pub fn from_env() -> Result<Self> {
        let database_path = env::var("ODK_DATABASE_URL").context("ODK_DATABASE_URL is required")?;
        let odds_api_key = env::var("ODDS_API_KEY").context("ODDS_API_KEY is required")?;

        let tz_name = env::var("SCHEDULER_TZ").unwrap_or_else(|_| "America/New_York".to_string());
        let tz: Tz = tz_name
            .parse()
            .with_context(|| format!("invalid SCHEDULER_TZ value: {tz_name}"))?;

        let tick_ms = env_u64("SCHEDULER_TICK_MS", 60_000)?;
        let enable_odds_pull = env_bool("ENABLE_ODDS_PULL", true)?;
        let fixed_catchup = env_bool("FIXED_CATCHUP", true)?;
        let dry_run = env_bool("DRY_RUN", false)?;

        let mut sports = HashMap::new();
        for sport in Sport::all() {
            let model_enabled = env_bool(&format!("ENABLE_{}_MODEL", sport.slug().to_ascii_uppercase()), true)?;
            sports.insert(
                sport,
                SportConfig {
                    sport,
                    active: true,
                    markets: vec![Market::Moneyline, Market::Totals, Market::Spreads],
                    model_enabled,
                },
            );
        }

        Ok(Config {
            database_path,
            odds_api_key,
            tz,
            tick_ms,
            enable_odds_pull,
            fixed_catchup,
            dry_run,
            sports,
        })
    }

    pub fn active_sports(&self) -> Vec<&SportConfig> {
        self.sports
            .values()
            .filter(|s| s.active)
            .collect()
    }

    pub fn is_sport_model_enabled(&self, sport: Sport) -> bool {
        self.sports
            .get(&sport)
            .map(|s| s.model_enabled)
            .unwrap_or(false)
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(v) => v.parse().with_context(|| format!("{key} must be an integer")),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("{key} has unrecognized boolean value {other:?}"),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        std::env::set_var("ODK_CFG_TEST_BOOL", "yes");
        assert!(env_bool("ODK_CFG_TEST_BOOL", false).unwrap());
        std::env::set_var("ODK_CFG_TEST_BOOL", "0");
        assert!(!env_bool("ODK_CFG_TEST_BOOL", true).unwrap());
        std::env::remove_var("ODK_CFG_TEST_BOOL");
        assert!(env_bool("ODK_CFG_TEST_BOOL", true).unwrap());
    }

    #[test]
    fn bool_parsing_rejects_garbage() {
        std::env::set_var("ODK_CFG_TEST_BOOL2", "maybe");
        assert!(env_bool("ODK_CFG_TEST_BOOL2", true).is_err());
        std::env::remove_var("ODK_CFG_TEST_BOOL2");
    }
}
