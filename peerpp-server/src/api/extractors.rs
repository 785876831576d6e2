//! Custom Axum extractors for request authentication.
//!
//! Provides:
//! - `AdmittedHook<E>`: runs webhook admission for the endpoint `E` (content
//!   type, `x-delivery`, `x-secret`, replay check) and parses the Intra hook body.
//! - `SlackCommandForm`: verifies the Slack request signature and parses the
//!   slash-command form.

use std::marker::PhantomData;

use axum::{
    Form,
    body::Body,
    extract::{FromRequest, Request},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use peerpp_core::admission::{self, Admission, DeliveryHeaders, Rejection};
use peerpp_core::registry::RegistryError;
use peerpp_sdk::objects::{HookKind, ScaleTeamHook, SlashCommand};
use peerpp_sdk::signature::{
    self, DELIVERY_HEADER, SECRET_HEADER, SLACK_SIGNATURE_HEADER, SLACK_TIMESTAMP_HEADER,
    SignatureError,
};
use time::OffsetDateTime;

use crate::state::AppState;

const MAX_BODY: usize = 1024 * 1024;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ---------------------------------------------------------------------------
// AdmittedHook: Intra scale-team webhooks
// ---------------------------------------------------------------------------

/// A webhook endpoint, selecting which secret the delivery must carry.
pub trait HookEndpoint: Send + Sync + 'static {
    const KIND: HookKind;
}

pub struct OnCreate;
pub struct OnDelete;
pub struct OnUpdate;

impl HookEndpoint for OnCreate {
    const KIND: HookKind = HookKind::Create;
}

impl HookEndpoint for OnDelete {
    const KIND: HookKind = HookKind::Delete;
}

impl HookEndpoint for OnUpdate {
    const KIND: HookKind = HookKind::Update;
}

/// An admitted delivery of a scale-team hook.
///
/// The delivery id is already recorded when the handler runs.
pub struct AdmittedHook<E: HookEndpoint> {
    pub hook: ScaleTeamHook,
    pub delivery_id: String,
    _endpoint: PhantomData<E>,
}

/// Why a delivery did not reach its handler.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("{}", .0.message())]
    Rejected(Rejection),
    #[error("duplicate delivery")]
    Duplicate,
    #[error("failed to read request body")]
    BodyReadError,
    #[error("invalid hook body: {0}")]
    JsonError(serde_json::Error),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        match self {
            AdmissionError::Rejected(rejection) => {
                let status = StatusCode::from_u16(rejection.status())
                    .unwrap_or(StatusCode::BAD_REQUEST);
                (status, rejection.message()).into_response()
            }
            AdmissionError::Duplicate => (StatusCode::OK, "duplicate").into_response(),
            AdmissionError::BodyReadError => {
                (StatusCode::BAD_REQUEST, "failed to read request body").into_response()
            }
            AdmissionError::JsonError(e) => {
                tracing::info!(error = %e, "Admitted delivery has an unreadable body");
                (StatusCode::BAD_REQUEST, "invalid hook body").into_response()
            }
            AdmissionError::Registry(e) => {
                tracing::error!(error = %e, "Failed to record webhook delivery");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}

impl<E: HookEndpoint> FromRequest<AppState> for AdmittedHook<E> {
    type Rejection = AdmissionError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let headers = req.headers();
        let delivery = DeliveryHeaders {
            content_type: header(headers, CONTENT_TYPE.as_str()),
            delivery_id: header(headers, DELIVERY_HEADER),
            secret: header(headers, SECRET_HEADER),
        };

        let expected = state.config.webhooks.read().await.for_kind(E::KIND).to_owned();
        let delivery_id =
            match admission::admit(delivery, &expected, state.registry.as_ref()).await? {
                Admission::Rejected(rejection) => return Err(AdmissionError::Rejected(rejection)),
                Admission::Duplicate => return Err(AdmissionError::Duplicate),
                Admission::Admitted { delivery_id } => delivery_id,
            };

        let body_bytes = axum::body::to_bytes(req.into_body(), MAX_BODY)
            .await
            .map_err(|_| AdmissionError::BodyReadError)?;
        let hook = serde_json::from_slice(&body_bytes).map_err(AdmissionError::JsonError)?;

        Ok(AdmittedHook {
            hook,
            delivery_id,
            _endpoint: PhantomData,
        })
    }
}

// ---------------------------------------------------------------------------
// SlackCommandForm: Slack slash commands
// ---------------------------------------------------------------------------

/// A slash command whose signature matched the Slack signing secret.
///
/// # Header format
///
/// ```text
/// X-Slack-Request-Timestamp: {unix_timestamp}
/// X-Slack-Signature:         v0={hex_hmac_sha256}
/// ```
pub struct SlackCommandForm(pub SlashCommand);

#[derive(Debug, thiserror::Error)]
pub enum SlackRequestError {
    #[error("missing Slack signature headers")]
    MissingHeader,
    #[error("failed to read request body")]
    BodyReadError,
    #[error("signature verification failed: {0}")]
    Signature(#[from] SignatureError),
    #[error("invalid slash command form")]
    InvalidForm,
}

impl IntoResponse for SlackRequestError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            SlackRequestError::MissingHeader => {
                (StatusCode::UNAUTHORIZED, "missing Slack signature headers")
            }
            SlackRequestError::BodyReadError => {
                (StatusCode::BAD_REQUEST, "failed to read request body")
            }
            SlackRequestError::Signature(SignatureError::Expired) => {
                (StatusCode::UNAUTHORIZED, "signature expired")
            }
            SlackRequestError::Signature(_) => {
                (StatusCode::UNAUTHORIZED, "signature verification failed")
            }
            SlackRequestError::InvalidForm => {
                (StatusCode::BAD_REQUEST, "invalid slash command form")
            }
        };
        (status, message).into_response()
    }
}

impl FromRequest<AppState> for SlackCommandForm {
    type Rejection = SlackRequestError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let sig = header(&parts.headers, SLACK_SIGNATURE_HEADER)
            .ok_or(SlackRequestError::MissingHeader)?
            .to_owned();
        let ts = header(&parts.headers, SLACK_TIMESTAMP_HEADER)
            .ok_or(SlackRequestError::MissingHeader)?
            .to_owned();

        let body_bytes = axum::body::to_bytes(body, MAX_BODY)
            .await
            .map_err(|_| SlackRequestError::BodyReadError)?;
        let text =
            std::str::from_utf8(&body_bytes).map_err(|_| SlackRequestError::BodyReadError)?;

        signature::verify_slack_request(
            &sig,
            &ts,
            text,
            state.slack_signing_secret.as_bytes(),
            OffsetDateTime::now_utc().unix_timestamp(),
        )?;

        let req = Request::from_parts(parts, Body::from(body_bytes));
        let Form(command) = Form::<SlashCommand>::from_request(req, state)
            .await
            .map_err(|_| SlackRequestError::InvalidForm)?;
        Ok(SlackCommandForm(command))
    }
}
