#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod admission;
pub mod chat;
pub mod config;
pub mod entities;
pub mod framework;
pub mod identity;
pub mod platform;
pub mod processors;
pub mod registry;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;
