//! Slack slash-command endpoint.
//!
//! Slack wants an answer within three seconds, so the request is acknowledged
//! right away and the command's reply goes to its `response_url`.

use axum::{Json, extract::State, response::IntoResponse};
use kanau::processor::Processor;
use peerpp_core::processors::{ChatCommand, Command};
use peerpp_sdk::objects::CommandResponse;

use crate::api::extractors::SlackCommandForm;
use crate::state::AppState;

/// `POST /slack/commands`
pub async fn on_command(
    State(state): State<AppState>,
    SlackCommandForm(form): SlackCommandForm,
) -> impl IntoResponse {
    let command = ChatCommand {
        invoker_chat_id: form.user_id.clone(),
        command: Command::parse(&form.command, &form.text),
    };
    tracing::info!(
        command = %form.command,
        user = %form.user_name,
        "Received slash command"
    );

    tokio::spawn(async move {
        let reply = match state.desk.process(command).await {
            Ok(reply) => reply,
            Err(never) => match never {},
        };
        let response = CommandResponse::ephemeral(reply);
        if let Err(e) = state.slack.respond(&form.response_url, &response).await {
            tracing::warn!(error = %e, command = %form.command, "Failed to deliver command reply");
        }
    });

    Json(CommandResponse::ephemeral("Working on it..."))
}
