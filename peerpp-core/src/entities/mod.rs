//! Durable coordinator state in Postgres.
//!
//! Every query is a [`kanau::processor::Processor`] on
//! [`DatabaseProcessor`](crate::framework::DatabaseProcessor).

pub mod expired_teams;
pub mod notification_preferences;
pub mod webhook_deliveries;
