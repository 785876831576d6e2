//! Admission of Intra webhook deliveries.
//!
//! A delivery is rejected, recognised as a replay, or admitted. The
//! delivery id is recorded as part of admission, before any business logic
//! runs, so a retried delivery never reaches the coordinator twice.

use peerpp_sdk::signature::secrets_match;
use tracing::{debug, info};

use crate::registry::{LockRegistry, RegistryError};

/// The headers admission looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryHeaders<'a> {
    pub content_type: Option<&'a str>,
    pub delivery_id: Option<&'a str>,
    pub secret: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotJson,
    MissingDelivery,
    MissingSecret,
    SecretMismatch,
}

impl Rejection {
    /// HTTP status answered for this rejection.
    pub fn status(self) -> u16 {
        match self {
            Rejection::SecretMismatch => 412,
            _ => 400,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Rejection::NotJson => "content type must be application/json",
            Rejection::MissingDelivery => "missing x-delivery header",
            Rejection::MissingSecret => "missing x-secret header",
            Rejection::SecretMismatch => "x-secret does not match",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Rejected(Rejection),
    Duplicate,
    Admitted { delivery_id: String },
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

fn check(headers: &DeliveryHeaders<'_>, expected_secret: &str) -> Result<(), Rejection> {
    if !headers.content_type.is_some_and(is_json) {
        return Err(Rejection::NotJson);
    }
    if headers.delivery_id.is_none_or(str::is_empty) {
        return Err(Rejection::MissingDelivery);
    }
    let Some(secret) = headers.secret else {
        return Err(Rejection::MissingSecret);
    };
    if !secrets_match(secret, expected_secret) {
        return Err(Rejection::SecretMismatch);
    }
    Ok(())
}

/// Validate a delivery and claim its id.
pub async fn admit(
    headers: DeliveryHeaders<'_>,
    expected_secret: &str,
    registry: &dyn LockRegistry,
) -> Result<Admission, RegistryError> {
    if let Err(rejection) = check(&headers, expected_secret) {
        debug!(
            reason = rejection.message(),
            delivery_id = headers.delivery_id.unwrap_or_default(),
            "Rejected webhook delivery"
        );
        return Ok(Admission::Rejected(rejection));
    }

    let delivery_id = headers.delivery_id.unwrap_or_default();
    if !registry.claim_delivery(delivery_id).await? {
        info!(delivery_id, "Ignoring duplicate webhook delivery");
        return Ok(Admission::Duplicate);
    }
    Ok(Admission::Admitted {
        delivery_id: delivery_id.to_owned(),
    })
}
