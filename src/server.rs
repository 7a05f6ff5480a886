//! HTTP surface: health, prop comparison, betslip lookup/refresh and EV
//! expansion.

use crate::betslip::{lookup_odds, refresh_betslip, LookupRequest, LookupResponse, RefreshRequest, RefreshResponse};
use crate::cache::{ev_key, OddsCache};
use crate::config::Config;
use crate::error::{OddsError, OddsResult};
use crate::ev_expansion::{build_expansion, find_play, parse_ev_plays, EvPlay, ExpansionData, ExpansionQuery};
use crate::odds_api::OddsApiClient;
use crate::prop_comparison::{comparison_from_json, PropComparisonResponse, PropQuery};
use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Consecutive failed requests before health reports degraded
const DEGRADED_AFTER: usize = 5;
/// Consecutive failed requests before health answers 503
const UNAVAILABLE_AFTER: usize = 10;

/// Service health state
#[derive(Clone, Default)]
pub struct HealthState {
    pub last_success: Arc<RwLock<Option<DateTime<Utc>>>>,
    pub requests_served: Arc<RwLock<usize>>,
    pub error_count: Arc<RwLock<usize>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_success(&self) {
        *self.last_success.write().await = Some(Utc::now());
        *self.requests_served.write().await += 1;
        *self.error_count.write().await = 0;
    }

    pub async fn record_error(&self) {
        *self.error_count.write().await += 1;
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: OddsCache,
    pub odds_api: Arc<OddsApiClient>,
    pub health: HealthState,
}

impl FromRef<AppState> for HealthState {
    fn from_ref(state: &AppState) -> Self {
        state.health.clone()
    }
}

/// Error wrapper rendered as `{ "success": false, "error": ... }`
#[derive(Debug)]
pub struct ApiError(pub OddsError);

impl From<OddsError> for ApiError {
    fn from(err: OddsError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.0.is_client_error() {
            debug!("Rejected request: {}", self.0);
        } else {
            error!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "success": false, "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn track<T>(health: &HealthState, result: OddsResult<T>) -> ApiResult<T> {
    match result {
        Ok(value) => {
            health.record_success().await;
            Ok(Json(value))
        }
        Err(e) => {
            if !e.is_client_error() {
                health.record_error().await;
            }
            Err(ApiError(e))
        }
    }
}

/// Health check handler
pub async fn health_handler(State(health): State<HealthState>) -> (StatusCode, Json<Value>) {
    let last_success = health.last_success.read().await;
    let served = health.requests_served.read().await;
    let errors = health.error_count.read().await;

    let status = if *errors > DEGRADED_AFTER { "degraded" } else { "ok" };
    let http_status = if *errors > UNAVAILABLE_AFTER {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        http_status,
        Json(json!({
            "service": "odds-comparison",
            "version": env!("CARGO_PKG_VERSION"),
            "status": status,
            "last_success": last_success.map(|t| t.to_rfc3339()),
            "requests_served": *served,
            "consecutive_errors": *errors
        })),
    )
}

async fn prop_comparison_handler(
    State(state): State<AppState>,
    Query(query): Query<PropQuery>,
) -> ApiResult<PropComparisonResponse> {
    let result = prop_comparison(&state.cache, &query).await;
    track(&state.health, result).await
}

async fn prop_comparison(cache: &OddsCache, query: &PropQuery) -> OddsResult<PropComparisonResponse> {
    let key = query.cache_key();
    match cache.get_string(&key).await? {
        Some(raw) => Ok(comparison_from_json(&raw, query)),
        None => {
            info!("No cached market data at {}", key);
            Ok(PropComparisonResponse::empty(query, None))
        }
    }
}

async fn lookup_odds_handler(
    State(state): State<AppState>,
    Json(request): Json<LookupRequest>,
) -> ApiResult<LookupResponse> {
    let result = lookup_odds(&state.odds_api, &state.config.engine, request).await;
    track(&state.health, result).await
}

async fn refresh_betslip_handler(
    State(state): State<AppState>,
    Path(betslip_id): Path<String>,
    Json(request): Json<RefreshRequest>,
) -> ApiResult<RefreshResponse> {
    let result = refresh_betslip(&state.odds_api, &state.config.engine, &betslip_id, request).await;
    track(&state.health, result).await
}

async fn ev_expansion_handler(
    State(state): State<AppState>,
    Query(mut query): Query<ExpansionQuery>,
) -> ApiResult<Value> {
    query.player_id = query.player_id.filter(|p| !p.is_empty());
    let result = ev_expansion(&state.cache, &query, state.config.expansion_cache_ttl_seconds).await;
    track(&state.health, result).await
}

async fn cached_json(cache: &OddsCache, key: &str) -> OddsResult<Option<Value>> {
    match cache.get_string(key).await? {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Ignoring malformed JSON at {}: {}", key, e);
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

/// Stored play for a player query, searched across pregame then live
async fn stored_play(cache: &OddsCache, query: &ExpansionQuery) -> OddsResult<Option<EvPlay>> {
    for scope in ["pregame", "live"] {
        if let Some(value) = cached_json(cache, &ev_key(&query.sport, scope)).await? {
            let plays = parse_ev_plays(&value);
            if let Some(play) = find_play(&plays, query) {
                return Ok(Some(play.clone()));
            }
        }
    }
    Ok(None)
}

async fn ev_expansion(cache: &OddsCache, query: &ExpansionQuery, ttl_seconds: u64) -> OddsResult<Value> {
    let key = query.cache_key();
    if let Some(cached) = cached_json(cache, &key).await? {
        debug!("Expansion cache hit {}", key);
        return Ok(json!({ "success": true, "data": cached, "cached": true }));
    }

    let play = match query.player_id {
        Some(_) => stored_play(cache, query).await?,
        None => None,
    };
    let pointer = play
        .as_ref()
        .and_then(|p| p.pointer.clone())
        .unwrap_or_else(|| query.market_key.clone());

    let blob = cached_json(cache, &pointer).await?;
    let expansion: ExpansionData = build_expansion(blob.as_ref(), query, play);

    if expansion.is_complete() {
        let serialized = serde_json::to_string(&expansion)?;
        if let Err(e) = cache.set_ex(&key, &serialized, ttl_seconds).await {
            warn!("Failed to cache expansion {}: {}", key, e);
        }
    }

    Ok(json!({ "success": true, "data": expansion, "cached": false }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/prop-comparison", get(prop_comparison_handler))
        .route("/api/betslip/lookup-odds", post(lookup_odds_handler))
        .route("/api/betslip/:id/refresh", post(refresh_betslip_handler))
        .route("/api/ev-expansion", get(ev_expansion_handler))
        .with_state(state)
}
