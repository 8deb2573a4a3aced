//! JSON HTTP API for the triage dashboard.
//!
//! Exposes the correlation pipeline over HTTP for browser-based dashboards
//! and other clients. The server is stateless: every request fetches, scores,
//! and returns fresh data.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/bugs` | Triage recent defects (`?bugId=N` for a single one) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `upstream_error` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a locally served
//! dashboard can call the API from any port.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::analysis::create_analyzer;
use crate::commits::GithubRepo;
use crate::config::Config;
use crate::pipeline::{run_triage, TriageOptions, TriageOutcome};
use crate::tracker::AdoTracker;
use crate::traits::DefectFilter;

/// Shared application state passed to route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

/// Starts the triage API server.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/bugs", get(handle_bugs))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    tracing::info!(%bind_addr, "triage API listening");
    println!("Triage API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Collaborator (tracker / source-control) failures surface as 502; the
/// request was valid but an upstream dependency was not.
fn upstream_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream_error".to_string(),
        message: message.into(),
    }
}

/// Server-side misconfiguration (for example a missing secret in the
/// environment). The client's request was fine.
fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/bugs ============

#[derive(Deserialize)]
struct BugsQuery {
    #[serde(rename = "bugId")]
    bug_id: Option<u32>,
}

/// Handler for `GET /api/bugs`.
///
/// Without `bugId`, sweeps recent defects per the configured filter. With
/// `bugId`, triages that single defect and, when analysis is configured,
/// includes the model's view. The response body is the serialized
/// [`TriageOutcome`].
async fn handle_bugs(
    State(state): State<AppState>,
    Query(query): Query<BugsQuery>,
) -> Result<Json<TriageOutcome>, AppError> {
    if query.bug_id == Some(0) {
        return Err(bad_request("bugId must be a positive integer"));
    }

    // Constructor failures are missing secrets or bad configuration on the
    // server side, not client input.
    let config = &state.config;
    let tracker = AdoTracker::new(&config.tracker).map_err(|e| internal_error(e.to_string()))?;
    let source_control =
        GithubRepo::new(&config.repo).map_err(|e| internal_error(e.to_string()))?;
    let analyzer = create_analyzer(&config.analysis).map_err(|e| internal_error(e.to_string()))?;

    let options = TriageOptions {
        defect_id: query.bug_id,
        filter: DefectFilter {
            created_in_last_days: config.tracker.days,
            top: config.tracker.top,
            states: config.tracker.states.clone(),
            area_path: config.tracker.area_path.clone(),
        },
        commit_count: config.repo.commit_count,
        min_score: config.ranking.min_score,
        max_results: config.ranking.max_results,
    };

    // Dropping the request future (client disconnect) drops the token and
    // the in-flight fetches with it.
    let cancel = CancellationToken::new();
    let outcome = run_triage(
        &tracker,
        &source_control,
        analyzer.as_deref(),
        &options,
        &cancel,
    )
    .await
    .map_err(|e| upstream_error(format!("{e:#}")))?;

    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn error_parts(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_bad_request_envelope() {
        let (status, body) = error_parts(bad_request("bugId must be a positive integer")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
        assert_eq!(body["error"]["message"], "bugId must be a positive integer");
    }

    #[tokio::test]
    async fn test_upstream_error_envelope() {
        let (status, body) = error_parts(upstream_error("tracker unavailable")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "upstream_error");
    }

    #[tokio::test]
    async fn test_internal_error_envelope() {
        // Missing secrets and other server-side misconfiguration map here,
        // not to bad_request.
        let (status, body) =
            error_parts(internal_error("AZURE_DEVOPS_PAT environment variable not set")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "internal");
    }
}
