//! Job runtime: wraps every scheduled or manual job execution with
//! idempotency, single-flight, and the JobRun audit trail (spec §4.C).
//!
//! Prefer deterministic `job_key` plus a cheap existence check over
//! distributed locks — works for a single process and upgrades cleanly to
//! multi-process by backing the check with a unique row and a conditional
//! insert.

use anyhow::Result;
use chrono::Duration;
use odk_db::StoreError;
use sqlx::PgPool;
use std::future::Future;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyRunning,
    Idempotent,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AlreadyRunning => "already_running",
            SkipReason::Idempotent => "idempotent",
        }
    }
}

#[derive(Debug)]
pub enum JobOutcome<T> {
    Skipped(SkipReason),
    Completed(T),
}

impl<T> JobOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            JobOutcome::Completed(v) => Some(v),
            JobOutcome::Skipped(_) => None,
        }
    }
}

/// Default window `was_job_key_recently_successful` uses for jobs that opt
/// into idempotency-by-recency rather than idempotency-by-exact-key-match.
/// Most jobs here rely purely on the `(job_name, job_key)` key being unique
/// per bucket, so this is only consulted when the caller passes `Some`.
pub const NO_RECENCY_WINDOW: Option<Duration> = None;

/// Runs `f` under the job runtime contract: checks single-flight and
/// (optionally) recent-success idempotency, records a `running` JobRun,
/// then marks it `success` or `failed` based on the outcome.
pub async fn execute_job<F, Fut, T>(
    pool: &PgPool,
    job_name: &str,
    job_key: Option<&str>,
    idempotent_window: Option<Duration>,
    f: F,
) -> Result<JobOutcome<T>>
where
    F: FnOnce(Uuid) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if odk_db::has_running_job(pool, job_name, job_key).await? {
        tracing::info!(job_name, job_key, "skipped: already_running");
        return Ok(JobOutcome::Skipped(SkipReason::AlreadyRunning));
    }

    if let Some(window) = idempotent_window {
        if odk_db::was_job_key_recently_successful(pool, job_name, job_key, window).await? {
            tracing::info!(job_name, job_key, "skipped: idempotent");
            return Ok(JobOutcome::Skipped(SkipReason::Idempotent));
        }
    }

    let run_id = odk_db::insert_job_run_running(pool, job_name, job_key).await?;
    tracing::info!(job_name, job_key, run_id = %run_id, "job started");

    match f(run_id).await {
        Ok(value) => {
            odk_db::mark_job_run_success(pool, run_id).await?;
            tracing::info!(job_name, run_id = %run_id, "job succeeded");
            Ok(JobOutcome::Completed(value))
        }
        Err(e) => {
            odk_db::mark_job_run_failed(pool, run_id, &e.to_string()).await?;
            tracing::warn!(job_name, run_id = %run_id, error = %e, "job failed");
            Err(e)
        }
    }
}

/// Startup sweep for JobRuns abandoned by a process that died mid-job.
pub async fn sweep_orphaned(pool: &PgPool, max_age: Duration) -> Result<u64> {
    Ok(odk_db::sweep_orphaned_job_runs(pool, max_age).await?)
}

pub fn store_error_is_duplicate(e: &StoreError) -> bool {
    matches!(e, StoreError::Duplicate(_))
}

// ---------------------------------------------------------------------------
// job_key format audit (spec §4.C, testable property 8)
// ---------------------------------------------------------------------------

/// Checks a `job_key` against the documented patterns. `None` (manual runs)
/// always passes. Ad-hoc/dev keys (`odds|hourly|test*`) are allowed but are
/// excluded from the strict production-format checks that follow.
pub fn is_valid_job_key(job_name: &str, job_key: Option<&str>) -> bool {
    let Some(key) = job_key else { return true };
    let parts: Vec<&str> = key.split('|').collect();

    if parts.first() == Some(&"odds") && key.starts_with("odds|hourly|test") {
        return true;
    }

    match job_name {
        "pull_odds_hourly" => matches_pattern(&parts, &["odds", "hourly", DATE, HOUR]),
        "fpl_daily" => matches_pattern(&parts, &["fpl", "daily", DATE]),
        "fpl_deadline" => {
            parts.len() == 3
                && parts[0] == "fpl"
                && parts[1] == "deadline"
                && parts[2].starts_with("GW")
                && key.contains("|T-")
                && key.ends_with('h')
        }
        _ => {
            // Per-sport fixed/tminus model jobs: "<sport>|fixed|YYYY-MM-DD|HHmm"
            // or "<sport>|tminus|<game_id>|<minutes>".
            if parts.len() != 4 {
                return false;
            }
            match parts[1] {
                "fixed" => is_date(parts[2]) && is_hhmm(parts[3]),
                "tminus" => !parts[2].is_empty() && parts[3].parse::<i64>().is_ok(),
                _ => false,
            }
        }
    }
}

const DATE: &str = "DATE";
const HOUR: &str = "HOUR";

fn matches_pattern(parts: &[&str], pattern: &[&str]) -> bool {
    if parts.len() != pattern.len() {
        return false;
    }
    parts.iter().zip(pattern.iter()).all(|(p, expected)| match *expected {
        DATE => is_date(p),
        HOUR => p.len() == 2 && p.chars().all(|c| c.is_ascii_digit()),
        literal => p == &literal,
    })
}

fn is_date(s: &str) -> bool {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn is_hhmm(s: &str) -> bool {
    s.len() == 4 && s.chars().all(|c| c.is_ascii_digit())
}

/// Builds the `job_key` for the hourly odds pull given an ET-based calendar
/// date and hour bucket.
pub fn odds_hourly_job_key(date: chrono::NaiveDate, hour: u32) -> String {
    format!("odds|hourly|{}|{:02}", date.format("%Y-%m-%d"), hour)
}

pub fn sport_fixed_job_key(sport: odk_schemas::Sport, date: chrono::NaiveDate, hhmm: &str) -> String {
    format!("{}|fixed|{}|{}", sport.slug(), date.format("%Y-%m-%d"), hhmm)
}

pub fn sport_tminus_job_key(sport: odk_schemas::Sport, game_id: &str, minutes: i64) -> String {
    format!("{}|tminus|{}|{}", sport.slug(), game_id, minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use odk_schemas::Sport;

    #[test]
    fn hourly_odds_key_is_valid() {
        let key = odds_hourly_job_key(chrono::NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(), 15);
        assert_eq!(key, "odds|hourly|2026-02-28|15");
        assert!(is_valid_job_key("pull_odds_hourly", Some(&key)));
    }

    #[test]
    fn fixed_sport_key_is_valid() {
        let key = sport_fixed_job_key(Sport::Nhl, chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), "0900");
        assert!(is_valid_job_key("run_nhl_model", Some(&key)));
    }

    #[test]
    fn tminus_sport_key_is_valid() {
        let key = sport_tminus_job_key(Sport::Nba, "game-nba-abc123", 120);
        assert!(is_valid_job_key("run_nba_model", Some(&key)));
    }

    #[test]
    fn adhoc_test_key_is_allowed() {
        assert!(is_valid_job_key("pull_odds_hourly", Some("odds|hourly|testbatch-7")));
    }

    #[test]
    fn null_key_is_always_valid() {
        assert!(is_valid_job_key("manual_run", None));
    }

    #[test]
    fn malformed_key_is_rejected() {
        assert!(!is_valid_job_key("pull_odds_hourly", Some("odds|hourly|not-a-date|15")));
        assert!(!is_valid_job_key("run_nhl_model", Some("nhl|fixed|2026-03-01")));
    }

    #[test]
    fn fpl_deadline_key_is_valid() {
        assert!(is_valid_job_key("fpl_deadline", Some("fpl|deadline|GW12|T-2h")));
    }
}
