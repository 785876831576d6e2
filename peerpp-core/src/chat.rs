//! The chat platform (Slack) as seen by the resolver and the notifier.

use async_trait::async_trait;
use peerpp_sdk::client::{ClientError, SlackClient};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat user not found: {0}")]
    NotFound(String),

    #[error("chat client error: {0}")]
    Client(#[from] ClientError),
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Display name of a chat member; members use their Intra login.
    async fn display_name(&self, chat_id: &str) -> Result<String, ChatError>;

    async fn chat_id_for_email(&self, email: &str) -> Result<String, ChatError>;

    /// Direct-message a chat member.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChatError>;
}

/// [`ChatApi`] over the Slack Web API.
pub struct SlackChat {
    client: SlackClient,
}

impl SlackChat {
    pub fn new(client: SlackClient) -> Self {
        Self { client }
    }
}

fn not_found(subject: &str, err: ClientError) -> ChatError {
    match &err {
        ClientError::Slack(code) if code == "users_not_found" || code == "user_not_found" => {
            ChatError::NotFound(subject.to_owned())
        }
        _ => ChatError::Client(err),
    }
}

#[async_trait]
impl ChatApi for SlackChat {
    async fn display_name(&self, chat_id: &str) -> Result<String, ChatError> {
        let user = self
            .client
            .user_info(chat_id)
            .await
            .map_err(|e| not_found(chat_id, e))?;
        if user.profile.display_name.is_empty() {
            return Err(ChatError::NotFound(chat_id.to_owned()));
        }
        Ok(user.profile.display_name)
    }

    async fn chat_id_for_email(&self, email: &str) -> Result<String, ChatError> {
        let user = self
            .client
            .lookup_by_email(email)
            .await
            .map_err(|e| not_found(email, e))?;
        Ok(user.id)
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChatError> {
        self.client.post_message(chat_id, text).await?;
        Ok(())
    }
}
