//! Shared runtime state for the read API.
//!
//! `AppState` is `Clone`-able (via `Arc`/`PgPool`'s internal `Arc`). Handlers
//! receive `State<AppState>` from Axum.

use odk_config::Config;
use sqlx::PgPool;

/// Cloneable handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self { pool, config }
    }
}
