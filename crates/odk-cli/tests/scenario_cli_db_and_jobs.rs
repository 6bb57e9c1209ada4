//! Scenario: the `odk db` and `odk jobs check-key` subcommands against a
//! real binary invocation.
//!
//! DB-backed tests are skipped if `ODK_DATABASE_URL` is not set (local +
//! CI friendly).

use assert_cmd::prelude::*;
use predicates::prelude::*;

#[tokio::test]
async fn db_status_and_migrate_succeed_against_a_real_database() -> anyhow::Result<()> {
    let url = match std::env::var(odk_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: {} not set", odk_db::ENV_DB_URL);
            return Ok(());
        }
    };

    let mut migrate = assert_cmd::Command::cargo_bin("odk")?;
    migrate.env(odk_db::ENV_DB_URL, &url).args(["db", "migrate"]);
    migrate.assert().success().stdout(predicate::str::contains("migrations_applied=true"));

    let mut status = assert_cmd::Command::cargo_bin("odk")?;
    status.env(odk_db::ENV_DB_URL, &url).args(["db", "status"]);
    status.assert().success().stdout(predicate::str::contains("db_ok=true"));

    Ok(())
}

#[test]
fn jobs_check_key_accepts_a_well_formed_hourly_key() -> anyhow::Result<()> {
    let mut cmd = assert_cmd::Command::cargo_bin("odk")?;
    cmd.args(["jobs", "check-key", "pull_odds_hourly", "odds|hourly|2026-03-01|09"]);
    cmd.assert().success().stdout(predicate::str::contains("valid=true"));
    Ok(())
}

#[test]
fn jobs_check_key_rejects_a_malformed_key() -> anyhow::Result<()> {
    let mut cmd = assert_cmd::Command::cargo_bin("odk")?;
    cmd.args(["jobs", "check-key", "pull_odds_hourly", "not-even-close"]);
    cmd.assert().failure().stderr(predicate::str::contains("does not match"));
    Ok(())
}

#[test]
fn jobs_check_key_accepts_sport_tminus_pattern() -> anyhow::Result<()> {
    let mut cmd = assert_cmd::Command::cargo_bin("odk")?;
    cmd.args(["jobs", "check-key", "run_nhl_model", "nhl|tminus|game-nhl-abc123|60"]);
    cmd.assert().success().stdout(predicate::str::contains("valid=true"));
    Ok(())
}
