//! HTTP API for intent submission and status
//!
//! `POST /intents` validates and submits an intent, responding with the
//! tracking handle immediately; settlement progress is observed through
//! `GET /intents/{handle}` while a background task follows the transitions.

use crate::account::OwnerSet;
use crate::bundle::{self, RawAction, RawTokenRequirement};
use crate::config::ApiConfig;
use crate::engine::{IntentEngine, IntentRecord};
use crate::error::{EngineError, EngineResult};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<IntentEngine>,
    pub owners: Arc<OwnerSet>,
}

/// Run the HTTP API server
pub async fn run_server(
    config: ApiConfig,
    engine: Arc<IntentEngine>,
    owners: Arc<OwnerSet>,
) -> EngineResult<()> {
    let state = AppState { engine, owners };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/status", get(get_status))
        .route("/intents", get(list_intents).post(submit_intent))
        .route("/intents/:handle", get(get_intent))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| EngineError::Internal(format!("API bind failed: {}", e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| EngineError::Internal(format!("API server failed: {}", e)))?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get engine status
async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let intents = state.engine.intents();
    let in_flight = intents.iter().filter(|r| !r.status.is_terminal()).count();

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        configured_chains: state
            .engine
            .settings()
            .enabled_chains()
            .iter()
            .map(|(_, c)| c.chain_id)
            .collect(),
        in_flight,
        tracked: intents.len(),
    })
}

/// List every tracked intent
async fn list_intents(State(state): State<AppState>) -> impl IntoResponse {
    Json(IntentsResponse {
        intents: state.engine.intents(),
    })
}

/// Get a single intent by handle
async fn get_intent(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> impl IntoResponse {
    match state.engine.lookup(&handle) {
        Some(record) => (StatusCode::OK, Json(record)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: format!("no tracked intent with handle {}", handle),
            }),
        )
            .into_response(),
    }
}

/// Submit a new intent and start tracking it
async fn submit_intent(
    State(state): State<AppState>,
    Json(request): Json<SubmitIntentRequest>,
) -> impl IntoResponse {
    let requirements = match bundle::resolve_requirements(
        state.engine.settings(),
        request.target_chain,
        &request.token_requirements,
    ) {
        Ok(reqs) => reqs,
        Err(e) => return error_response(e),
    };

    let result = state
        .engine
        .clone()
        .execute_detached(
            &state.owners,
            request.source_chain,
            request.target_chain,
            &request.actions,
            requirements,
        )
        .await;

    match result {
        Ok(handle) => (
            StatusCode::ACCEPTED,
            Json(SubmitIntentResponse {
                handle: handle.to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(e: EngineError) -> axum::response::Response {
    let status = match &e {
        EngineError::MalformedAction(_)
        | EngineError::InvalidCredential(_)
        | EngineError::ChainNotFound { .. }
        | EngineError::TokenNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::SubmissionRejected(_) => {
            crate::metrics::record_submission_rejected();
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorBody { error: e.to_string() })).into_response()
}

// Request/response types

#[derive(Debug, Deserialize)]
struct SubmitIntentRequest {
    source_chain: u64,
    target_chain: u64,
    actions: Vec<RawAction>,
    #[serde(default)]
    token_requirements: Vec<RawTokenRequirement>,
}

#[derive(Serialize)]
struct SubmitIntentResponse {
    handle: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    configured_chains: Vec<u64>,
    in_flight: usize,
    tracked: usize,
}

#[derive(Serialize)]
struct IntentsResponse {
    intents: Vec<IntentRecord>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}
