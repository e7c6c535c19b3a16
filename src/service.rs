//! HTTP boundary around the moderator.
//!
//! Scoring runs on the blocking pool under a deadline. Any failure is
//! reported as a 500 and never turned into an `allow`.

use crate::decision::{Decision, ModerationRequest};
use crate::error::{ClassifierError, ModerationError};
use crate::moderator::Moderator;
use crate::statistics::{ModerationStats, StatEvent};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    moderator: Arc<Moderator>,
    classifier_timeout: Duration,
}

impl AppState {
    pub fn new(moderator: Arc<Moderator>, classifier_timeout: Duration) -> Self {
        Self {
            moderator,
            classifier_timeout,
        }
    }

    /// Failures detected here never reach the moderator's own accounting.
    fn record_event(&self, event: StatEvent) {
        self.moderator.statistics().record_event(event);
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
}

/// Error surfaced to the caller, body `{ "detail": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<ModerationError> for ApiError {
    fn from(err: ModerationError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log::error!("Moderation request failed: {}", self.detail);
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/moderate", post(moderate))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(state)
}

pub async fn moderate(
    State(state): State<AppState>,
    Json(request): Json<ModerationRequest>,
) -> Result<Json<Decision>, ApiError> {
    let request = Arc::new(request);

    let scoring = {
        let moderator = state.moderator.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || moderator.evaluate(&request))
    };

    // An expired deadline abandons the result; nothing has been logged yet.
    let decision = match tokio::time::timeout(state.classifier_timeout, scoring).await {
        Ok(Ok(result)) => result.map_err(ModerationError::from)?,
        Ok(Err(join_err)) => {
            state.record_event(StatEvent::ClassifierFailure);
            return Err(ModerationError::from(ClassifierError::Task(join_err.to_string())).into());
        }
        Err(_) => {
            state.record_event(StatEvent::ClassifierFailure);
            return Err(
                ModerationError::from(ClassifierError::Timeout(state.classifier_timeout)).into(),
            );
        }
    };

    let recording = {
        let moderator = state.moderator.clone();
        let decision = decision.clone();
        tokio::task::spawn_blocking(move || moderator.record(&decision, &request.metadata()))
    };

    match recording.await {
        Ok(result) => result.map_err(ModerationError::from)?,
        Err(join_err) => {
            state.record_event(StatEvent::StorageFailure);
            return Err(ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: format!("recording task failed: {join_err}"),
            })
        }
    }

    Ok(Json(decision))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model_loaded: state.moderator.has_model(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<ModerationStats> {
    Json(state.moderator.statistics().snapshot())
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("Moderation API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Moderation API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Received shutdown signal, draining requests...");
}
