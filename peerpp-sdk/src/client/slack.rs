//! Slack Web API client (bot token).

use std::time::Duration;

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::slack::SlackEnvelope;
use crate::objects::{CommandResponse, PostMessage, SlackUser};

const SLACK_API: &str = "https://slack.com/api/";

/// Typed HTTP client for the handful of Slack methods the coordinator uses.
#[derive(Debug, Clone)]
pub struct SlackClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            http: Client::builder().timeout(Duration::from_secs(30)).build()?,
            base_url: Url::parse(SLACK_API)?,
            token: token.into(),
        })
    }

    /// Point the client at another API root (used by tests).
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// `users.info`
    pub async fn user_info(&self, user_id: &str) -> Result<SlackUser, ClientError> {
        let url = self.base_url.join("users.info")?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("user", user_id)])
            .send()
            .await?;
        expect_user(parse_envelope(resp).await?)
    }

    /// `users.lookupByEmail`
    pub async fn lookup_by_email(&self, email: &str) -> Result<SlackUser, ClientError> {
        let url = self.base_url.join("users.lookupByEmail")?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("email", email)])
            .send()
            .await?;
        expect_user(parse_envelope(resp).await?)
    }

    /// `chat.postMessage`; a user id as `channel` opens a direct message.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<(), ClientError> {
        let url = self.base_url.join("chat.postMessage")?;
        let body = PostMessage {
            channel: channel.to_owned(),
            text: text.to_owned(),
        };
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        parse_envelope(resp).await.map(|_| ())
    }

    /// Deliver the final answer of a slash command to its `response_url`.
    pub async fn respond(
        &self,
        response_url: &str,
        message: &CommandResponse,
    ) -> Result<(), ClientError> {
        let url = Url::parse(response_url)?;
        let resp = self.http.post(url).json(message).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        Ok(())
    }
}

async fn parse_envelope(resp: reqwest::Response) -> Result<SlackEnvelope, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    let envelope: SlackEnvelope = serde_json::from_slice(&bytes)?;
    if !envelope.ok {
        return Err(ClientError::Slack(
            envelope.error.unwrap_or_else(|| "unknown_error".to_owned()),
        ));
    }
    Ok(envelope)
}

fn expect_user(envelope: SlackEnvelope) -> Result<SlackUser, ClientError> {
    envelope
        .user
        .ok_or_else(|| ClientError::Slack("response without user".to_owned()))
}
