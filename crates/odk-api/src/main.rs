//! odk-api entry point.
//!
//! This file is intentionally thin: it loads config, runs migrations, spawns
//! the scheduler, wires middleware, and starts the HTTP server. All route
//! handlers live in `routes.rs`; all shared state lives in `state.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use odk_api::{routes, state};
use odk_config::Config;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience: load .env.local if present. Silent if absent —
    // production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config = Config::from_env().context("failed to load configuration")?;
    let pool = odk_db::connect(&config.database_path)
        .await
        .context("failed to connect to database")?;
    odk_db::migrate(&pool).await.context("failed to run migrations")?;

    let orphaned = odk_jobs::sweep_orphaned(&pool, chrono::Duration::hours(6)).await?;
    if orphaned > 0 {
        info!(orphaned, "swept orphaned job runs from a previous process");
    }

    let odds_base_url =
        std::env::var("ODDS_API_BASE_URL").unwrap_or_else(|_| "https://api.the-odds-api.com".to_string());
    let results_base_url = std::env::var("RESULTS_API_BASE_URL")
        .unwrap_or_else(|_| "https://site.api.espn.com/apis/site/v2/sports".to_string());

    let odds_provider: Arc<dyn odk_odds::provider::OddsProvider> = Arc::new(odk_odds::provider::HttpOddsProvider::new(
        odds_base_url,
        config.odds_api_key.clone(),
    ));
    let results_provider: Arc<dyn odk_pipeline::ResultsProvider> =
        Arc::new(odk_pipeline::HttpResultsProvider::new(results_base_url));

    odk_scheduler::spawn_loop(pool.clone(), config.clone(), odds_provider, results_provider);

    let shared = state::AppState::new(pool, config);

    let app = routes::build_router(shared)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8900)));
    info!("odk-api listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("ODK_API_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_headers(tower_http::cors::Any)
}
