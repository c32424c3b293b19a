//! # HTTP API
//!
//! Axum router over a shared `Coordinator`. Session routes live in
//! `sessions`; this module holds state, error mapping and the OpenAPI doc.

pub mod sessions;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use beacon_core::Coordinator;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

/// Application state
pub struct AppState {
    pub coordinator: Coordinator,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn shared(coordinator: Coordinator) -> SharedState {
        Arc::new(Self { coordinator })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WorkerSummary {
    pub name: String,
    pub role: String,
    pub goal: String,
}

/// Error rendered as `{"error": ...}` with a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn session_not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "Session not found".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Beacon API",
        version = "1.0.0",
        description = "Disaster-response coordinator: submit a request, poll or stream worker progress"
    ),
    paths(
        health,
        list_workers,
        sessions::submit_request,
        sessions::get_status,
        sessions::get_messages,
        sessions::session_events
    ),
    components(
        schemas(
            HealthResponse,
            MessageResponse,
            ErrorResponse,
            WorkerSummary,
            sessions::SubmitRequest
        )
    ),
    tags(
        (name = "sessions", description = "Request submission and progress"),
        (name = "system", description = "Health and discovery")
    )
)]
pub struct ApiDoc;

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    )
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Worker descriptors in pipeline order
#[utoipa::path(
    get,
    path = "/api/v1/workers",
    tag = "system",
    responses(
        (status = 200, description = "Configured workers", body = [WorkerSummary])
    )
)]
async fn list_workers(State(state): State<SharedState>) -> Json<Vec<WorkerSummary>> {
    let workers = state
        .coordinator
        .workers()
        .iter()
        .map(|w| WorkerSummary {
            name: w.name.clone(),
            role: w.role.clone(),
            goal: w.goal.clone(),
        })
        .collect();
    Json(workers)
}

async fn serve_openapi() -> impl IntoResponse {
    match ApiDoc::openapi().to_json() {
        Ok(doc) => ([(header::CONTENT_TYPE, "application/json")], doc).into_response(),
        Err(e) => {
            tracing::error!("Failed to render OpenAPI document: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Full application router
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/sessions", sessions::session_routes())
        .route("/api/v1/workers", get(list_workers))
        .route("/api/v1/openapi.json", get(serve_openapi))
        // Legacy paths
        .route("/disaster-response", post(sessions::submit_request))
        .route("/status/:id", get(sessions::get_status))
        .with_state(state)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::{router, AppState};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let app = router(AppState::shared(coordinator()));
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_workers_listed_in_order() {
        let app = router(AppState::shared(coordinator()));
        let response = app.oneshot(get("/api/v1/workers")).await.unwrap();
        let body = body_json(response).await;
        let names: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["planner", "researcher", "logistics", "communicator"]);
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let app = router(AppState::shared(coordinator()));
        let response = app.oneshot(get("/api/v1/openapi.json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let doc = body_json(response).await;
        assert!(doc["paths"]["/api/v1/sessions"].is_object());
    }
}
