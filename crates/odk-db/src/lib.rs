//! Transactional store for games, odds, cards, results, and job runs.
//!
//! Every write here goes through a typed `StoreError` so callers can tell a
//! constraint violation (duplicate row) from an invalid payload from an
//! actual connection failure, rather than pattern-matching on error strings.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use odk_schemas::{
    CardOutcome, CardPayload, CardResult, CardResultStatus, Game, GameResult, GameStatus, JobRun,
    JobStatus, OddsSnapshot, Sport, TrackingStat,
};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Row, Transaction};
use std::fmt;
use uuid::Uuid;

pub const ENV_DB_URL: &str = "ODK_DATABASE_URL";

/// Typed store failures so callers can distinguish "duplicate" from "invalid"
/// per the store's failure-model contract.
#[derive(Debug)]
pub enum StoreError {
    Duplicate(String),
    Invalid(String),
    Other(anyhow::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Duplicate(msg) => write!(f, "duplicate: {msg}"),
            StoreError::Invalid(msg) => write!(f, "invalid: {msg}"),
            StoreError::Other(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        StoreError::Other(e)
    }
}

fn map_sqlx_err(e: sqlx::Error, context: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23505") {
            return StoreError::Duplicate(format!("{context}: {db_err}"));
        }
    }
    StoreError::Other(anyhow::Error::new(e).context(context.to_string()))
}

pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Test helper: connect via `ODK_DATABASE_URL` and run migrations.
pub async fn testkit_db_pool() -> Result<PgPool> {
    let pool = connect_from_env().await?;
    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_games_table: bool,
}

pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1 from information_schema.tables
            where table_schema = 'public' and table_name = 'games'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_games_table: exists,
    })
}

// ---------------------------------------------------------------------------
// Games
// ---------------------------------------------------------------------------

/// Insert-or-update on `game_id`. Re-ingesting the same provider game never
/// produces a duplicate row.
pub async fn upsert_game(
    pool: &PgPool,
    game_id: &str,
    sport: Sport,
    home_team: &str,
    away_team: &str,
    game_time_utc: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        insert into games (game_id, sport, home_team, away_team, game_time_utc, status)
        values ($1, $2, $3, $4, $5, 'scheduled')
        on conflict (game_id) do update
            set home_team = excluded.home_team,
                away_team = excluded.away_team,
                game_time_utc = excluded.game_time_utc
        "#,
    )
    .bind(game_id)
    .bind(sport.slug())
    .bind(home_team)
    .bind(away_team)
    .bind(game_time_utc)
    .execute(pool)
    .await
    .map_err(|e| map_sqlx_err(e, "upsert_game"))?;

    Ok(())
}

pub async fn get_game(pool: &PgPool, game_id: &str) -> Result<Option<Game>> {
    let row = sqlx::query(
        r#"select game_id, sport, home_team, away_team, game_time_utc, status
           from games where game_id = $1"#,
    )
    .bind(game_id)
    .fetch_optional(pool)
    .await
    .context("get_game failed")?;

    let Some(row) = row else { return Ok(None) };
    Ok(Some(row_to_game(&row)?))
}

/// Games whose start is at or after `since_utc` (the "today-forward" filter,
/// spec §4.H / S5). The boundary is passed in, not recomputed here, so the
/// comparison stays deterministic across callers.
pub async fn list_games_from(pool: &PgPool, since_utc: DateTime<Utc>) -> Result<Vec<Game>> {
    let rows = sqlx::query(
        r#"select game_id, sport, home_team, away_team, game_time_utc, status
           from games
           where game_time_utc >= $1
           order by game_time_utc asc"#,
    )
    .bind(since_utc)
    .fetch_all(pool)
    .await
    .context("list_games_from failed")?;

    rows.iter().map(row_to_game).collect()
}

fn row_to_game(row: &sqlx::postgres::PgRow) -> Result<Game> {
    let sport_slug: String = row.try_get("sport")?;
    let status_str: String = row.try_get("status")?;
    Ok(Game {
        game_id: row.try_get("game_id")?,
        sport: Sport::parse(&sport_slug).context("corrupt sport slug in games row")?,
        home_team: row.try_get("home_team")?,
        away_team: row.try_get("away_team")?,
        game_time_utc: row.try_get("game_time_utc")?,
        status: GameStatus::parse(&status_str).context("corrupt status in games row")?,
    })
}

// ---------------------------------------------------------------------------
// Odds snapshots
// ---------------------------------------------------------------------------

pub struct NewOddsSnapshot {
    pub game_id: String,
    pub captured_at: DateTime<Utc>,
    pub moneyline_home: Option<i32>,
    pub moneyline_away: Option<i32>,
    pub total: Option<f64>,
    pub spread_home: Option<f64>,
    pub spread_home_odds: Option<i32>,
    pub spread_away_odds: Option<i32>,
    pub raw_payload: Value,
    pub job_run_id: Uuid,
}

/// Batch append. Any row conflicting on `(game_id, captured_at)` fails the
/// whole batch — the transaction rolls back, so partial ingest never happens.
pub async fn insert_odds_snapshots(
    pool: &PgPool,
    rows: &[NewOddsSnapshot],
) -> Result<Vec<OddsSnapshot>, StoreError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| map_sqlx_err(e, "insert_odds_snapshots begin"))?;

    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            insert into odds_snapshots (
                id, game_id, captured_at, moneyline_home, moneyline_away,
                total, spread_home, spread_home_odds, spread_away_odds,
                raw_payload, job_run_id
            ) values ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
            "#,
        )
        .bind(id)
        .bind(&r.game_id)
        .bind(r.captured_at)
        .bind(r.moneyline_home)
        .bind(r.moneyline_away)
        .bind(r.total)
        .bind(r.spread_home)
        .bind(r.spread_home_odds)
        .bind(r.spread_away_odds)
        .bind(&r.raw_payload)
        .bind(r.job_run_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_err(e, "insert_odds_snapshots"))?;

        out.push(OddsSnapshot {
            id,
            game_id: r.game_id.clone(),
            captured_at: r.captured_at,
            moneyline_home: r.moneyline_home,
            moneyline_away: r.moneyline_away,
            total: r.total,
            spread_home: r.spread_home,
            spread_home_odds: r.spread_home_odds,
            spread_away_odds: r.spread_away_odds,
            raw_payload: r.raw_payload.clone(),
            job_run_id: r.job_run_id,
        });
    }

    tx.commit()
        .await
        .map_err(|e| map_sqlx_err(e, "insert_odds_snapshots commit"))?;

    Ok(out)
}

pub async fn latest_odds_snapshot(pool: &PgPool, game_id: &str) -> Result<Option<OddsSnapshot>> {
    let row = sqlx::query(
        r#"
        select id, game_id, captured_at, moneyline_home, moneyline_away, total,
               spread_home, spread_home_odds, spread_away_odds, raw_payload, job_run_id
        from odds_snapshots
        where game_id = $1
        order by captured_at desc
        limit 1
        "#,
    )
    .bind(game_id)
    .fetch_optional(pool)
    .await
    .context("latest_odds_snapshot failed")?;

    let Some(row) = row else { return Ok(None) };
    Ok(Some(OddsSnapshot {
        id: row.try_get("id")?,
        game_id: row.try_get("game_id")?,
        captured_at: row.try_get("captured_at")?,
        moneyline_home: row.try_get("moneyline_home")?,
        moneyline_away: row.try_get("moneyline_away")?,
        total: row.try_get("total")?,
        spread_home: row.try_get("spread_home")?,
        spread_home_odds: row.try_get("spread_home_odds")?,
        spread_away_odds: row.try_get("spread_away_odds")?,
        raw_payload: row.try_get("raw_payload")?,
        job_run_id: row.try_get("job_run_id")?,
    }))
}

// ---------------------------------------------------------------------------
// Model outputs + card payloads (card-type validator registry)
// ---------------------------------------------------------------------------

pub struct NewModelOutput {
    pub game_id: String,
    pub odds_snapshot_id: Uuid,
    pub driver_key: String,
    pub score: f64,
}

pub struct NewCardPayload {
    pub game_id: String,
    pub sport: Sport,
    pub card_type: String,
    pub card_title: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub payload_data: Value,
    pub model_output_ids: Vec<Uuid>,
    /// The bet type to seed the generated `CardResult` row with; extracted by
    /// the caller from `payload_data.recommendation.type`.
    pub recommended_bet_type: String,
}

/// Required top-level `payload_data` keys, the same set for every
/// `card_type`: every driver's card carries a prediction, a confidence, a
/// reasoning string, the odds it was graded against, and an authoritative
/// recommendation (spec §4.E step 3). A thin stand-in for a full JSON-schema
/// registry: fast to check, fails insertion before any row is written.
const REQUIRED_PAYLOAD_FIELDS: &[&str] = &["prediction", "confidence", "reasoning", "odds_context", "recommendation"];

fn validate_card_payload(card_type: &str, payload_data: &Value) -> Result<(), StoreError> {
    let obj = payload_data
        .as_object()
        .ok_or_else(|| StoreError::Invalid(format!("{card_type}: payload_data is not an object")))?;

    for field in REQUIRED_PAYLOAD_FIELDS {
        if !obj.contains_key(*field) {
            return Err(StoreError::Invalid(format!(
                "{card_type}: missing required field {field}"
            )));
        }
    }
    Ok(())
}

/// Clears prior model_outputs and card_payloads of a `(game_id, card_type)`
/// pair so a fan-out re-run is effectively a rewrite, not an accumulation.
pub async fn prepare_model_and_card_write(
    pool: &PgPool,
    game_id: &str,
    driver_key: &str,
    card_type: &str,
) -> Result<(), StoreError> {
    sqlx::query("delete from model_outputs where game_id = $1 and driver_key = $2")
        .bind(game_id)
        .bind(driver_key)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_err(e, "prepare_model_and_card_write: model_outputs"))?;

    sqlx::query("delete from card_payloads where game_id = $1 and card_type = $2")
        .bind(game_id)
        .bind(card_type)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_err(e, "prepare_model_and_card_write: card_payloads"))?;

    Ok(())
}

pub async fn insert_model_output(pool: &PgPool, mo: &NewModelOutput) -> Result<Uuid, StoreError> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        insert into model_outputs (id, game_id, odds_snapshot_id, driver_key, score, computed_at)
        values ($1, $2, $3, $4, $5, now())
        "#,
    )
    .bind(id)
    .bind(&mo.game_id)
    .bind(mo.odds_snapshot_id)
    .bind(&mo.driver_key)
    .bind(mo.score)
    .execute(pool)
    .await
    .map_err(|e| map_sqlx_err(e, "insert_model_output"))?;

    Ok(id)
}

/// Validates via the card-type registry, writes the card, and in the same
/// transaction creates the associated pending `CardResult`.
pub async fn insert_card_payload(pool: &PgPool, card: &NewCardPayload) -> Result<Uuid, StoreError> {
    validate_card_payload(&card.card_type, &card.payload_data)?;

    let card_id = Uuid::new_v4();
    let model_output_ids_json = serde_json::to_value(&card.model_output_ids)
        .map_err(|e| StoreError::Other(anyhow::Error::new(e)))?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| map_sqlx_err(e, "insert_card_payload begin"))?;

    sqlx::query(
        r#"
        insert into card_payloads (
            id, game_id, sport, card_type, card_title, created_at, expires_at,
            payload_data, model_output_ids
        ) values ($1,$2,$3,$4,$5, now(), $6, $7, $8)
        "#,
    )
    .bind(card_id)
    .bind(&card.game_id)
    .bind(card.sport.slug())
    .bind(&card.card_type)
    .bind(&card.card_title)
    .bind(card.expires_at)
    .bind(&card.payload_data)
    .bind(&model_output_ids_json)
    .execute(&mut *tx)
    .await
    .map_err(|e| map_sqlx_err(e, "insert_card_payload: card_payloads"))?;

    let result_id = Uuid::new_v4();
    sqlx::query(
        r#"
        insert into card_results (
            id, card_id, game_id, sport, card_category, recommended_bet_type, status
        ) values ($1,$2,$3,$4,$5,$6,'pending')
        "#,
    )
    .bind(result_id)
    .bind(card_id)
    .bind(&card.game_id)
    .bind(card.sport.slug())
    .bind(&card.card_type)
    .bind(&card.recommended_bet_type)
    .execute(&mut *tx)
    .await
    .map_err(|e| map_sqlx_err(e, "insert_card_payload: card_results"))?;

    tx.commit()
        .await
        .map_err(|e| map_sqlx_err(e, "insert_card_payload commit"))?;

    Ok(card_id)
}

/// Cards deduped to the latest per `(game_id, card_type)`, or every row when
/// `dedupe` is false (spec §4.H, S6).
pub async fn list_cards(
    pool: &PgPool,
    game_id: Option<&str>,
    dedupe: bool,
) -> Result<Vec<CardPayload>> {
    let rows = if dedupe {
        sqlx::query(
            r#"
            select id, game_id, sport, card_type, card_title, created_at, expires_at,
                   payload_data, model_output_ids
            from (
                select *,
                       row_number() over (
                           partition by game_id, card_type order by created_at desc
                       ) as rn
                from card_payloads
                where $1::text is null or game_id = $1
            ) ranked
            where rn = 1
            order by created_at desc
            "#,
        )
        .bind(game_id)
        .fetch_all(pool)
        .await
    } else {
        sqlx::query(
            r#"
            select id, game_id, sport, card_type, card_title, created_at, expires_at,
                   payload_data, model_output_ids
            from card_payloads
            where $1::text is null or game_id = $1
            order by created_at desc
            "#,
        )
        .bind(game_id)
        .fetch_all(pool)
        .await
    }
    .context("list_cards failed")?;

    rows.iter().map(row_to_card).collect()
}

/// Single card lookup by id, used by settlement to read `payload_data` when
/// grading (`pending_card_results_for_final_games` only returns the
/// `card_results` row, not the payload it was built from).
pub async fn get_card_payload_by_id(pool: &PgPool, card_id: Uuid) -> Result<Option<CardPayload>> {
    let row = sqlx::query(
        r#"
        select id, game_id, sport, card_type, card_title, created_at, expires_at,
               payload_data, model_output_ids
        from card_payloads
        where id = $1
        "#,
    )
    .bind(card_id)
    .fetch_optional(pool)
    .await
    .context("get_card_payload_by_id failed")?;

    row.as_ref().map(row_to_card).transpose()
}

fn row_to_card(row: &sqlx::postgres::PgRow) -> Result<CardPayload> {
    let sport_slug: String = row.try_get("sport")?;
    let model_output_ids_json: Value = row.try_get("model_output_ids")?;
    let model_output_ids: Vec<Uuid> =
        serde_json::from_value(model_output_ids_json).unwrap_or_default();

    Ok(CardPayload {
        id: row.try_get("id")?,
        game_id: row.try_get("game_id")?,
        sport: Sport::parse(&sport_slug).context("corrupt sport slug in card_payloads row")?,
        card_type: row.try_get("card_type")?,
        card_title: row.try_get("card_title")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        payload_data: row.try_get("payload_data")?,
        model_output_ids,
    })
}

// ---------------------------------------------------------------------------
// Card results + tracking stats
// ---------------------------------------------------------------------------

pub async fn pending_card_results_for_final_games(pool: &PgPool) -> Result<Vec<CardResult>> {
    let rows = sqlx::query(
        r#"
        select cr.id, cr.card_id, cr.game_id, cr.sport, cr.card_category,
               cr.recommended_bet_type, cr.status, cr.result, cr.pnl_units, cr.settled_at
        from card_results cr
        join games g on g.game_id = cr.game_id
        where cr.status = 'pending' and g.status = 'final'
        "#,
    )
    .fetch_all(pool)
    .await
    .context("pending_card_results_for_final_games failed")?;

    rows.iter().map(row_to_card_result).collect()
}

fn row_to_card_result(row: &sqlx::postgres::PgRow) -> Result<CardResult> {
    let sport_slug: String = row.try_get("sport")?;
    let status_str: String = row.try_get("status")?;
    let result_str: Option<String> = row.try_get("result")?;
    Ok(CardResult {
        id: row.try_get("id")?,
        card_id: row.try_get("card_id")?,
        game_id: row.try_get("game_id")?,
        sport: Sport::parse(&sport_slug).context("corrupt sport slug in card_results row")?,
        card_category: row.try_get("card_category")?,
        recommended_bet_type: row.try_get("recommended_bet_type")?,
        status: match status_str.as_str() {
            "pending" => CardResultStatus::Pending,
            "settled" => CardResultStatus::Settled,
            "void" => CardResultStatus::Void,
            other => anyhow::bail!("corrupt card_results.status: {other}"),
        },
        result: result_str
            .map(|s| match s.as_str() {
                "win" => Ok(CardOutcome::Win),
                "loss" => Ok(CardOutcome::Loss),
                "push" => Ok(CardOutcome::Push),
                other => Err(anyhow::anyhow!("corrupt card_results.result: {other}")),
            })
            .transpose()?,
        pnl_units: row.try_get("pnl_units")?,
        settled_at: row.try_get("settled_at")?,
    })
}

/// Gated by `WHERE status = 'pending'` so a second run against an
/// already-settled row is a no-op (the double-settle guard, S7).
pub async fn mark_card_result(
    pool: &PgPool,
    card_result_id: Uuid,
    result: CardOutcome,
    pnl_units: f64,
    settled_at: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let updated: Option<(Uuid,)> = sqlx::query_as(
        r#"
        update card_results
        set status = 'settled', result = $2, pnl_units = $3, settled_at = $4
        where id = $1 and status = 'pending'
        returning id
        "#,
    )
    .bind(card_result_id)
    .bind(result.as_str())
    .bind(pnl_units)
    .bind(settled_at)
    .fetch_optional(pool)
    .await
    .map_err(|e| map_sqlx_err(e, "mark_card_result"))?;

    Ok(updated.is_some())
}

/// `recommended_bet_type` prefix each `Market` maps to, for the results
/// ledger's market filter.
fn market_prefix(market: odk_schemas::Market) -> &'static str {
    match market {
        odk_schemas::Market::Moneyline => "ML_",
        odk_schemas::Market::Spreads => "SPREAD_",
        odk_schemas::Market::Totals => "TOTAL_",
    }
}

/// The settled play ledger behind `/api/results`. Dedupes to the latest card
/// per `(game_id, card_type)` (a card re-run by a later fan-out tick replaces
/// its predecessor in the ledger), then applies the optional filters.
pub async fn list_settled_card_results(
    pool: &PgPool,
    sport: Option<Sport>,
    market: Option<odk_schemas::Market>,
    card_category: Option<&str>,
) -> Result<Vec<CardResult>> {
    let sport_slug = sport.map(|s| s.slug());
    let market_prefix = market.map(market_prefix);

    let rows = sqlx::query(
        r#"
        with ranked as (
            select cr.id, cr.card_id, cr.game_id, cr.sport, cr.card_category,
                   cr.recommended_bet_type, cr.status, cr.result, cr.pnl_units, cr.settled_at,
                   row_number() over (
                       partition by cr.game_id, cp.card_type order by cp.created_at desc
                   ) as rn
            from card_results cr
            join card_payloads cp on cp.id = cr.card_id
            where cr.status = 'settled'
              and ($1::text is null or cr.sport = $1)
              and ($2::text is null or cr.card_category = $2)
              and ($3::text is null or cr.recommended_bet_type like $3 || '%')
        )
        select id, card_id, game_id, sport, card_category, recommended_bet_type,
               status, result, pnl_units, settled_at
        from ranked
        where rn = 1
          and ($1::text is null or sport = $1)
          and ($2::text is null or card_category = $2)
          and ($3::text is null or recommended_bet_type like $3 || '%')
        order by settled_at desc
        "#,
    )
    .bind(sport_slug)
    .bind(card_category)
    .bind(market_prefix)
    .fetch_all(pool)
    .await
    .context("list_settled_card_results failed")?;

    rows.iter().map(row_to_card_result).collect()
}

/// Recomputes a tracking_stats row from scratch by aggregating every settled
/// `CardResult` matching the key, rather than incrementing — cheap at this
/// scale and immune to double-counting bugs.
pub async fn upsert_tracking_stat(
    pool: &PgPool,
    sport: Sport,
    card_category: &str,
    recommended_bet_type: &str,
) -> Result<TrackingStat, StoreError> {
    let row = sqlx::query(
        r#"
        with agg as (
            select
                count(*) filter (where result = 'win') as wins,
                count(*) filter (where result = 'loss') as losses,
                count(*) filter (where result = 'push') as pushes,
                coalesce(sum(pnl_units), 0.0) as total_pnl_units
            from card_results
            where sport = $1 and card_category = $2 and recommended_bet_type = $3
              and status = 'settled'
        )
        insert into tracking_stats (
            sport, card_category, recommended_bet_type, wins, losses, pushes,
            total_pnl_units, last_updated
        )
        select $1, $2, $3, wins, losses, pushes, total_pnl_units, now() from agg
        on conflict (sport, card_category, recommended_bet_type) do update
            set wins = excluded.wins,
                losses = excluded.losses,
                pushes = excluded.pushes,
                total_pnl_units = excluded.total_pnl_units,
                last_updated = excluded.last_updated
        returning sport, card_category, recommended_bet_type, wins, losses, pushes,
                  total_pnl_units, last_updated
        "#,
    )
    .bind(sport.slug())
    .bind(card_category)
    .bind(recommended_bet_type)
    .fetch_one(pool)
    .await
    .map_err(|e| map_sqlx_err(e, "upsert_tracking_stat"))?;

    let sport_slug: String = row.try_get("sport").map_err(|e| map_sqlx_err(e, "upsert_tracking_stat row"))?;
    Ok(TrackingStat {
        sport: Sport::parse(&sport_slug).unwrap_or(sport),
        card_category: row.try_get("card_category").map_err(|e| map_sqlx_err(e, "row"))?,
        recommended_bet_type: row.try_get("recommended_bet_type").map_err(|e| map_sqlx_err(e, "row"))?,
        wins: row.try_get("wins").map_err(|e| map_sqlx_err(e, "row"))?,
        losses: row.try_get("losses").map_err(|e| map_sqlx_err(e, "row"))?,
        pushes: row.try_get("pushes").map_err(|e| map_sqlx_err(e, "row"))?,
        total_pnl_units: row.try_get("total_pnl_units").map_err(|e| map_sqlx_err(e, "row"))?,
        last_updated: row.try_get("last_updated").map_err(|e| map_sqlx_err(e, "row"))?,
    })
}

pub async fn list_tracking_stats(pool: &PgPool) -> Result<Vec<TrackingStat>> {
    let rows = sqlx::query(
        r#"select sport, card_category, recommended_bet_type, wins, losses, pushes,
                  total_pnl_units, last_updated
           from tracking_stats"#,
    )
    .fetch_all(pool)
    .await
    .context("list_tracking_stats failed")?;

    rows.iter()
        .map(|row| {
            let sport_slug: String = row.try_get("sport")?;
            Ok(TrackingStat {
                sport: Sport::parse(&sport_slug).context("corrupt sport slug in tracking_stats")?,
                card_category: row.try_get("card_category")?,
                recommended_bet_type: row.try_get("recommended_bet_type")?,
                wins: row.try_get("wins")?,
                losses: row.try_get("losses")?,
                pushes: row.try_get("pushes")?,
                total_pnl_units: row.try_get("total_pnl_units")?,
                last_updated: row.try_get("last_updated")?,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Game results
// ---------------------------------------------------------------------------

/// Idempotent: re-running on an already-`final` game is a caller-side no-op
/// (callers should check `get_game` status before calling this).
pub async fn upsert_game_result(
    pool: &PgPool,
    game_id: &str,
    final_score_home: i32,
    final_score_away: i32,
    result_source: &str,
    settled_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| map_sqlx_err(e, "upsert_game_result begin"))?;

    sqlx::query(
        r#"
        insert into game_results (
            game_id, final_score_home, final_score_away, status, result_source, settled_at
        ) values ($1, $2, $3, 'final', $4, $5)
        on conflict (game_id) do update
            set final_score_home = excluded.final_score_home,
                final_score_away = excluded.final_score_away,
                status = excluded.status,
                result_source = excluded.result_source,
                settled_at = excluded.settled_at
        "#,
    )
    .bind(game_id)
    .bind(final_score_home)
    .bind(final_score_away)
    .bind(result_source)
    .bind(settled_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| map_sqlx_err(e, "upsert_game_result: game_results"))?;

    sqlx::query("update games set status = 'final' where game_id = $1")
        .bind(game_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_err(e, "upsert_game_result: games"))?;

    tx.commit()
        .await
        .map_err(|e| map_sqlx_err(e, "upsert_game_result commit"))?;

    Ok(())
}

pub async fn get_game_result(pool: &PgPool, game_id: &str) -> Result<Option<GameResult>> {
    let row = sqlx::query(
        r#"select game_id, final_score_home, final_score_away, status, result_source, settled_at
           from game_results where game_id = $1"#,
    )
    .bind(game_id)
    .fetch_optional(pool)
    .await
    .context("get_game_result failed")?;

    let Some(row) = row else { return Ok(None) };
    let status_str: String = row.try_get("status")?;
    Ok(Some(GameResult {
        game_id: row.try_get("game_id")?,
        final_score_home: row.try_get("final_score_home")?,
        final_score_away: row.try_get("final_score_away")?,
        status: GameStatus::parse(&status_str).context("corrupt status in game_results row")?,
        result_source: row.try_get("result_source")?,
        settled_at: row.try_get("settled_at")?,
    }))
}

/// Games whose start has passed and which are not yet `final` — the input
/// set for `settle_game_results`.
pub async fn list_unsettled_past_games(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<Game>> {
    let rows = sqlx::query(
        r#"select game_id, sport, home_team, away_team, game_time_utc, status
           from games
           where game_time_utc < $1 and status <> 'final'
           order by game_time_utc asc"#,
    )
    .bind(now)
    .fetch_all(pool)
    .await
    .context("list_unsettled_past_games failed")?;

    rows.iter().map(row_to_game).collect()
}

// ---------------------------------------------------------------------------
// Job runtime: idempotency + lifecycle (spec §4.C)
// ---------------------------------------------------------------------------

pub async fn has_running_job(pool: &PgPool, job_name: &str, job_key: Option<&str>) -> Result<bool> {
    let (exists,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1 from job_runs
            where job_name = $1
              and status = 'running'
              and job_key is not distinct from $2
        )
        "#,
    )
    .bind(job_name)
    .bind(job_key)
    .fetch_one(pool)
    .await
    .context("has_running_job failed")?;

    Ok(exists)
}

pub async fn was_job_key_recently_successful(
    pool: &PgPool,
    job_name: &str,
    job_key: Option<&str>,
    window: chrono::Duration,
) -> Result<bool> {
    let cutoff = Utc::now() - window;
    let (exists,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1 from job_runs
            where job_name = $1
              and job_key is not distinct from $2
              and status = 'success'
              and ended_at >= $3
        )
        "#,
    )
    .bind(job_name)
    .bind(job_key)
    .bind(cutoff)
    .fetch_one(pool)
    .await
    .context("was_job_key_recently_successful failed")?;

    Ok(exists)
}

pub async fn insert_job_run_running(
    pool: &PgPool,
    job_name: &str,
    job_key: Option<&str>,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        insert into job_runs (id, job_name, job_key, status, started_at)
        values ($1, $2, $3, 'running', now())
        "#,
    )
    .bind(id)
    .bind(job_name)
    .bind(job_key)
    .execute(pool)
    .await
    .context("insert_job_run_running failed")?;

    Ok(id)
}

pub async fn mark_job_run_success(pool: &PgPool, job_run_id: Uuid) -> Result<()> {
    sqlx::query("update job_runs set status = 'success', ended_at = now() where id = $1")
        .bind(job_run_id)
        .execute(pool)
        .await
        .context("mark_job_run_success failed")?;
    Ok(())
}

pub async fn mark_job_run_failed(pool: &PgPool, job_run_id: Uuid, error_message: &str) -> Result<()> {
    sqlx::query(
        "update job_runs set status = 'failed', ended_at = now(), error_message = $2 where id = $1",
    )
    .bind(job_run_id)
    .bind(error_message)
    .execute(pool)
    .await
    .context("mark_job_run_failed failed")?;
    Ok(())
}

/// Startup sweep: any `running` row older than `max_age` is orphaned — the
/// process that owned it died without marking it terminal.
pub async fn sweep_orphaned_job_runs(pool: &PgPool, max_age: chrono::Duration) -> Result<u64> {
    let cutoff = Utc::now() - max_age;
    let result = sqlx::query(
        r#"
        update job_runs
        set status = 'failed', ended_at = now(), error_message = 'orphaned'
        where status = 'running' and started_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await
    .context("sweep_orphaned_job_runs failed")?;

    Ok(result.rows_affected())
}

pub async fn last_successful_run(pool: &PgPool, job_name: &str) -> Result<Option<JobRun>> {
    let row = sqlx::query(
        r#"
        select id, job_name, job_key, status, started_at, ended_at, error_message
        from job_runs
        where job_name = $1 and status = 'success'
        order by ended_at desc
        limit 1
        "#,
    )
    .bind(job_name)
    .fetch_optional(pool)
    .await
    .context("last_successful_run failed")?;

    let Some(row) = row else { return Ok(None) };
    Ok(Some(row_to_job_run(&row)?))
}

pub async fn recent_job_runs(pool: &PgPool, limit: i64) -> Result<Vec<JobRun>> {
    let rows = sqlx::query(
        r#"
        select id, job_name, job_key, status, started_at, ended_at, error_message
        from job_runs
        order by started_at desc
        limit $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("recent_job_runs failed")?;

    rows.iter().map(row_to_job_run).collect()
}

fn row_to_job_run(row: &sqlx::postgres::PgRow) -> Result<JobRun> {
    let status_str: String = row.try_get("status")?;
    Ok(JobRun {
        id: row.try_get("id")?,
        job_name: row.try_get("job_name")?,
        job_key: row.try_get("job_key")?,
        status: match status_str.as_str() {
            "running" => JobStatus::Running,
            "success" => JobStatus::Success,
            "failed" => JobStatus::Failed,
            other => anyhow::bail!("corrupt job_runs.status: {other}"),
        },
        started_at: row.try_get("started_at")?,
        ended_at: row.try_get("ended_at")?,
        error_message: row.try_get("error_message")?,
    })
}

/// Exposed so the caller (odk-jobs) can run both the job-key check and the
/// JobRun insert inside one transaction when it wants stronger exclusion
/// than the read-then-write default provides.
pub async fn begin_tx(pool: &PgPool) -> Result<Transaction<'_, Postgres>, StoreError> {
    pool.begin().await.map_err(|e| map_sqlx_err(e, "begin_tx"))
}
