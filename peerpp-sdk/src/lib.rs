//! Wire types and HTTP clients shared by the Peer++ coordinator crates.
//!
//! - [`objects`]: JSON shapes of the 42 Intra v2 API, its webhooks, and the
//!   parts of the Slack Web API the coordinator talks to.
//! - [`signature`]: webhook secret comparison and Slack request signing.
//! - `client` (feature `client`): the rate-limited Intra client and a small
//!   Slack Web API client.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(unsafe_code)]

pub mod objects;
pub mod signature;

#[cfg(feature = "client")]
pub mod client;
