//! HTTP handlers: Intra webhooks and Slack slash commands.

pub mod extractors;
pub mod slack;
pub mod webhook;
