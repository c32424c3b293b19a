//! # Session API
//!
//! Submit a request, poll its snapshot, read the composite response and
//! stream progress as server-sent events.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use beacon_core::session::ChatMessage;
use beacon_core::SessionSnapshot;
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use utoipa::ToSchema;

use super::{ApiError, MessageResponse, SharedState};

/// Request body for starting a session
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRequest {
    pub session_id: String,
    /// Dataset category, e.g. "flood"
    #[serde(alias = "category")]
    pub disaster_type: String,
    pub query: String,
}

pub fn session_routes() -> Router<SharedState> {
    Router::new()
        .route("/", post(submit_request))
        .route("/:id", get(get_status))
        .route("/:id/messages", get(get_messages))
        .route("/:id/events", get(session_events))
}

/// Start processing a request in the background
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "sessions",
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "Processing started", body = MessageResponse),
        (status = 400, description = "Invalid category or session id", body = super::ErrorResponse)
    )
)]
pub async fn submit_request(
    State(state): State<SharedState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .coordinator
        .submit(&req.session_id, &req.disaster_type, &req.query)
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    Ok(Json(MessageResponse {
        message: "Processing started".to_string(),
    }))
}

/// Current snapshot of a session
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session snapshot", content_type = "application/json"),
        (status = 404, description = "Unknown session", body = super::ErrorResponse)
    )
)]
pub async fn get_status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    state
        .coordinator
        .get_status(&id)
        .await
        .map(Json)
        .ok_or_else(ApiError::session_not_found)
}

/// Composite response: one message per completed worker
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/messages",
    tag = "sessions",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Worker messages in pipeline order", content_type = "application/json"),
        (status = 404, description = "Unknown session", body = super::ErrorResponse)
    )
)]
pub async fn get_messages(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let snapshot = state
        .coordinator
        .get_status(&id)
        .await
        .ok_or_else(ApiError::session_not_found)?;
    Ok(Json(snapshot.messages()))
}

/// Progress stream; ends after the terminal event
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/events",
    tag = "sessions",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Server-sent progress events", content_type = "text/event-stream")
    )
)]
pub async fn session_events(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(session_id = %id, "Stream subscriber attached");
    let stream = state.coordinator.subscribe(&id).map(|event| {
        let json = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().event(event.event_name()).data(json))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{router, AppState};
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    fn submit_body(session_id: &str, category: &str) -> serde_json::Value {
        json!({
            "session_id": session_id,
            "disaster_type": category,
            "query": "Where can families shelter tonight?"
        })
    }

    #[tokio::test]
    async fn test_submit_then_poll() {
        let app = router(AppState::shared(coordinator()));
        let response = app
            .clone()
            .oneshot(post_json("/api/v1/sessions", submit_body("s1", "flood")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "Processing started");

        let response = app.oneshot(get("/api/v1/sessions/s1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot = body_json(response).await;
        assert_eq!(snapshot["session_id"], "s1");
        assert_eq!(snapshot["workers"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_legacy_paths() {
        let app = router(AppState::shared(coordinator()));
        let response = app
            .clone()
            .oneshot(post_json("/disaster-response", submit_body("legacy", "wildfire")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/status/legacy")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let app = router(AppState::shared(coordinator()));
        let response = app.oneshot(get("/api/v1/sessions/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Session not found");
    }

    #[tokio::test]
    async fn test_invalid_category_is_400_and_recorded() {
        let app = router(AppState::shared(coordinator()));
        let response = app
            .clone()
            .oneshot(post_json("/api/v1/sessions", submit_body("bad", "tsunami")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains("invalid category"));

        let response = app.oneshot(get("/api/v1/sessions/bad")).await.unwrap();
        assert_eq!(body_json(response).await["status"], "failed");
    }

    #[tokio::test]
    async fn test_blank_session_id_is_400() {
        let app = router(AppState::shared(coordinator()));
        let response = app
            .oneshot(post_json("/api/v1/sessions", submit_body(" ", "flood")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_messages_after_completion() {
        let coordinator = coordinator();
        coordinator
            .submit("done", "flood", "help")
            .await
            .unwrap()
            .wait()
            .await;
        let app = router(AppState::shared(coordinator));

        let response = app.oneshot(get("/api/v1/sessions/done/messages")).await.unwrap();
        let messages = body_json(response).await;
        let messages = messages.as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["sender"], "planner");
    }

    #[tokio::test]
    async fn test_events_for_unknown_session() {
        let app = router(AppState::shared(coordinator()));
        let response = app.oneshot(get("/api/v1/sessions/ghost/events")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        assert_eq!(body.matches("event: error").count(), 1);
        assert!(body.contains("Session not found: ghost"));
    }

    #[tokio::test]
    async fn test_events_end_with_terminal() {
        let coordinator = coordinator();
        coordinator
            .submit("streamed", "flood", "help")
            .await
            .unwrap()
            .wait()
            .await;
        let app = router(AppState::shared(coordinator));

        let response = app
            .oneshot(get("/api/v1/sessions/streamed/events"))
            .await
            .unwrap();
        let body = body_text(response).await;
        assert!(body.contains("event: worker"));
        assert_eq!(body.matches("event: terminal").count(), 1);
        let last_event = body.rfind("event: ").unwrap();
        assert!(body[last_event..].starts_with("event: terminal"));
        assert!(body.contains(r#""status":"completed""#));
    }
}
