//! Authentication of inbound requests.
//!
//! Two schemes are used:
//!
//! * **Intra webhooks** carry a shared secret in the `X-Secret` header,
//!   compared in constant time with [`secrets_match`].
//!
//! * **Slack requests** are signed with
//!   `v0=hex(HMAC-SHA256("v0:{timestamp}:{body}", signing_secret))` in the
//!   `X-Slack-Signature` header, with the timestamp in
//!   `X-Slack-Request-Timestamp`.

use subtle::ConstantTimeEq;

/// Unique id of one webhook delivery attempt.
pub const DELIVERY_HEADER: &str = "x-delivery";

/// Per-endpoint shared webhook secret.
pub const SECRET_HEADER: &str = "x-secret";

pub const SLACK_SIGNATURE_HEADER: &str = "x-slack-signature";
pub const SLACK_TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Maximum allowed age of a Slack request timestamp (in seconds).
pub const MAX_SIGNATURE_AGE: i64 = 5 * 60;

const SLACK_VERSION: &str = "v0";

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid header format")]
    InvalidFormat,
    #[error("invalid hex encoding")]
    InvalidHex,
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("signature expired")]
    Expired,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

/// Compare two secrets without short-circuiting on the first differing byte.
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}

// ---------------------------------------------------------------------------
// Slack request signing
// ---------------------------------------------------------------------------

/// Compute the `X-Slack-Signature` header value for a request body.
pub fn sign_slack_request(timestamp: i64, body: &str, signing_secret: &[u8]) -> String {
    let data = format!("{SLACK_VERSION}:{timestamp}:{body}");
    let tag = ring::hmac::sign(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, signing_secret),
        data.as_bytes(),
    );
    format!("{SLACK_VERSION}={}", hex::encode(tag.as_ref()))
}

/// Verify a Slack request against its signature and timestamp headers.
///
/// `now` is the current unix timestamp; requests older than
/// [`MAX_SIGNATURE_AGE`] are rejected to prevent replays.
pub fn verify_slack_request(
    signature_header: &str,
    timestamp_header: &str,
    body: &str,
    signing_secret: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let timestamp: i64 = timestamp_header
        .trim()
        .parse()
        .map_err(|_| SignatureError::InvalidFormat)?;
    let encoded = signature_header
        .strip_prefix("v0=")
        .ok_or(SignatureError::InvalidFormat)?;
    let signature = hex::decode(encoded).map_err(|_| SignatureError::InvalidHex)?;

    let data = format!("{SLACK_VERSION}:{timestamp}:{body}");
    ring::hmac::verify(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, signing_secret),
        data.as_bytes(),
        &signature,
    )?;

    if (now - timestamp).abs() > MAX_SIGNATURE_AGE {
        return Err(SignatureError::Expired);
    }
    Ok(())
}
