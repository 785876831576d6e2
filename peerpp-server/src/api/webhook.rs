//! Intra scale-team webhook handlers.
//!
//! # Endpoints
//!
//! - `POST /create` – an evaluation was booked; may book a placeholder
//! - `POST /delete` – an evaluation was cancelled; a cancelled placeholder is re-booked
//! - `POST /update` – an evaluation was marked; may release the team's placeholder
//!
//! Admission happens in [`AdmittedHook`]; handlers only see fresh deliveries.

use std::future::Future;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use peerpp_core::processors::{CoordinatorError, CreateOutcome};

use crate::api::extractors::{AdmittedHook, OnCreate, OnDelete, OnUpdate};
use crate::state::AppState;

/// Errors that can occur in webhook handlers.
#[derive(Debug)]
pub enum WebhookError {
    /// The coordinator failed; the delivery is not retried with the same id.
    Coordinator(CoordinatorError),
    /// The handler ran past `server.handler_timeout_secs`.
    TimedOut,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> axum::response::Response {
        match self {
            WebhookError::Coordinator(e) => {
                tracing::error!(error = %e, "Webhook handler failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            WebhookError::TimedOut => {
                tracing::warn!("Webhook handler timed out");
                (StatusCode::SERVICE_UNAVAILABLE, "timed out").into_response()
            }
        }
    }
}

/// Run a coordinator call under the configured handler timeout.
async fn bounded<T>(
    state: &AppState,
    work: impl Future<Output = Result<T, CoordinatorError>>,
) -> Result<T, WebhookError> {
    let limit = state.config.server.read().await.handler_timeout;
    tokio::time::timeout(limit, work)
        .await
        .map_err(|_| WebhookError::TimedOut)?
        .map_err(WebhookError::Coordinator)
}

/// `POST /create`
pub async fn on_create(
    State(state): State<AppState>,
    admitted: AdmittedHook<OnCreate>,
) -> Result<StatusCode, WebhookError> {
    let outcome = bounded(&state, state.coordinator.handle_create(&admitted.hook)).await;
    match outcome {
        Ok(CreateOutcome::Booked) => Ok(StatusCode::CREATED),
        Ok(CreateOutcome::Skipped(reason)) => {
            tracing::debug!(delivery_id = %admitted.delivery_id, reason = %reason, "No placeholder booked");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(WebhookError::Coordinator(
            CoordinatorError::NothingToDo(reason) | CoordinatorError::NotEligible(reason),
        )) => {
            tracing::info!(delivery_id = %admitted.delivery_id, reason = %reason, "No placeholder booked");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => Err(e),
    }
}

/// `POST /delete`
pub async fn on_delete(
    State(state): State<AppState>,
    admitted: AdmittedHook<OnDelete>,
) -> Result<StatusCode, WebhookError> {
    let outcome = bounded(&state, state.coordinator.handle_delete(&admitted.hook)).await?;
    tracing::debug!(delivery_id = %admitted.delivery_id, ?outcome, "Handled delete hook");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /update`
pub async fn on_update(
    State(state): State<AppState>,
    admitted: AdmittedHook<OnUpdate>,
) -> Result<StatusCode, WebhookError> {
    let outcome = bounded(&state, state.coordinator.handle_update(&admitted.hook)).await?;
    tracing::debug!(delivery_id = %admitted.delivery_id, ?outcome, "Handled update hook");
    Ok(StatusCode::NO_CONTENT)
}
