//! Odds comparison service
//!
//! Serves prop comparisons and EV drill-downs from cached Redis blobs, and
//! prices betslips live against The Odds API.

use anyhow::{Context, Result};
use odds_comparison::cache::OddsCache;
use odds_comparison::odds_api::OddsApiClient;
use odds_comparison::server::{router, AppState, HealthState};
use odds_comparison::Config;
use std::future::IntoFuture;
use std::sync::Arc;
use tracing::{error, info};

const REDIS_CONNECT_RETRIES: u32 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    // Local development only; deployed secrets come from the environment or /run/secrets
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("odds_comparison=info".parse()?),
        )
        .init();

    info!("Odds Comparison Service v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!("Loaded config: {:?}", config);

    let cache = OddsCache::connect(&config.redis_url, REDIS_CONNECT_RETRIES).await?;
    let odds_api = OddsApiClient::new(
        config.odds_api_key.clone(),
        config.odds_api_base_url.clone(),
        config.regions.clone(),
        config.active_sportsbooks.clone(),
        config.rate_per_minute,
    )
    .context("Failed to build Odds API client")?;

    let addr = format!("0.0.0.0:{}", config.http_port);
    let app = router(AppState {
        config: Arc::new(config),
        cache,
        odds_api: Arc::new(odds_api),
        health: HealthState::new(),
    });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            if let Err(e) = result {
                error!("Server error: {:?}", e);
                return Err(e.into());
            }
        }
        _ = &mut ctrl_c => {
            info!("Shutting down...");
        }
    }

    Ok(())
}
