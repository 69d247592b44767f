//!
//! attribute aggregation HTTP server
//! ---------------------------------
//! Axum routes in front of the orchestrator. Authentication of callers is left to a fronting proxy.
//!
//! Routes:
//! - `GET  /health`
//! - `POST /aa/api/internal/attribute/aggregation`
//! - `GET  /aa/api/internal/attribute/authorities`

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::aggregators::AggregatorRegistry;
use crate::config::{AuthoritiesConfig, AuthoritySummary, ServerConfig};
use crate::error::{AppError, AppResult};
use crate::model::{ArpAggregationRequest, UserAttribute};
use crate::orchestrator::AggregationOrchestrator;

pub const AGGREGATION_PATH: &str = "/aa/api/internal/attribute/aggregation";
pub const AUTHORITIES_PATH: &str = "/aa/api/internal/attribute/authorities";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AggregationOrchestrator>,
    pub authorities: Arc<AuthoritiesConfig>,
}

impl AppState {
    pub fn new(authorities: AuthoritiesConfig, registry: &AggregatorRegistry) -> AppResult<Self> {
        let orchestrator = AggregationOrchestrator::from_config(&authorities, registry)?;
        Ok(Self { orchestrator: Arc::new(orchestrator), authorities: Arc::new(authorities) })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(AGGREGATION_PATH, post(aggregate))
        .route(AUTHORITIES_PATH, get(authorities))
        .with_state(state)
}

async fn health() -> Json<Value> { Json(json!({"status": "UP"})) }

async fn aggregate(State(state): State<AppState>, Json(request): Json<ArpAggregationRequest>) -> AppResult<Json<Vec<UserAttribute>>> {
    if let Some(bad) = request.user_attributes.iter().find(|a| a.name.trim().is_empty()) {
        return Err(AppError::user("invalid_attribute".to_string(), format!("attribute name must not be empty (values: {:?})", bad.values)));
    }
    if request.arp_attributes.keys().any(|k| k.trim().is_empty()) {
        return Err(AppError::user("invalid_arp", "ARP attribute name must not be empty"));
    }
    debug!(
        target: "aggregation",
        sp = request.service_provider_entity_id.as_deref().unwrap_or("<unspecified>"),
        inputs = request.user_attributes.len(),
        arp = request.arp_attributes.len(),
        "aggregation request"
    );
    let attributes = state.orchestrator.aggregate(&request).await?;
    Ok(Json(attributes))
}

async fn authorities(State(state): State<AppState>) -> Json<Vec<AuthoritySummary>> {
    Json(state.authorities.summaries())
}

/// Load the authority table, build the orchestrator, and serve until the listener fails.
pub async fn run(cfg: ServerConfig) -> anyhow::Result<()> {
    info!(target: "startup", authorities = %cfg.authorities_path.display(), port = cfg.http_port, "starting attribute aggregation server");
    let authorities = AuthoritiesConfig::load(&cfg.authorities_path)?;
    for a in &authorities.authorities {
        info!(target: "startup", authority = %a.id, endpoint = %a.endpoint, timeout_ms = a.timeout_ms, "configured authority");
    }
    let state = AppState::new(authorities, &AggregatorRegistry::with_defaults())
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| format!("While building aggregators from {}", cfg.authorities_path.display()))?;

    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", addr))?;
    info!(target: "startup", "Starting server on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
