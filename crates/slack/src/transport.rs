//! Outbound side of the bot: posting replies and adding reactions.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::blocks::MessageTemplate;

pub const SLACK_API_BASE_URL: &str = "https://slack.com/api";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("{method} request failed: {message}")]
    Request { method: &'static str, message: String },
    #[error("{method} was rejected by slack: {error}")]
    Rejected { method: &'static str, error: String },
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), ChatError>;

    async fn add_reaction(
        &self,
        channel_id: &str,
        message_ts: &str,
        name: &str,
    ) -> Result<(), ChatError>;
}

/// Drops everything; used when no bot token is available.
#[derive(Default)]
pub struct NoopChatTransport;

#[async_trait]
impl ChatTransport for NoopChatTransport {
    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), ChatError> {
        debug!(channel_id, text = %message.fallback_text, "dropping outbound message");
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel_id: &str,
        message_ts: &str,
        name: &str,
    ) -> Result<(), ChatError> {
        debug!(channel_id, message_ts, name, "dropping outbound reaction");
        Ok(())
    }
}

/// Slack Web API client authenticated with the bot token.
pub struct WebApiChatTransport {
    client: Client,
    bot_token: SecretString,
    base_url: String,
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    #[serde(flatten)]
    message: &'a MessageTemplate,
}

#[derive(Serialize)]
struct AddReactionRequest<'a> {
    channel: &'a str,
    timestamp: &'a str,
    name: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl WebApiChatTransport {
    pub fn new(bot_token: SecretString) -> Self {
        Self::with_base_url(bot_token, SLACK_API_BASE_URL)
    }

    pub fn with_base_url(bot_token: SecretString, base_url: impl Into<String>) -> Self {
        Self { client: Client::new(), bot_token, base_url: base_url.into() }
    }

    async fn call<B>(&self, method: &'static str, body: &B) -> Result<(), ChatError>
    where
        B: Serialize + Sync,
    {
        let url = format!("{}/{method}", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|error| ChatError::Request { method, message: error.to_string() })?;

        if !response.status().is_success() {
            return Err(ChatError::Request {
                method,
                message: format!("slack returned {}", response.status()),
            });
        }

        let payload: ApiResponse = response.json().await.map_err(|error| ChatError::Request {
            method,
            message: format!("failed to decode response: {error}"),
        })?;
        check_api_response(method, payload)
    }
}

fn check_api_response(method: &'static str, payload: ApiResponse) -> Result<(), ChatError> {
    if payload.ok {
        return Ok(());
    }
    Err(ChatError::Rejected {
        method,
        error: payload.error.unwrap_or_else(|| "unknown_error".to_owned()),
    })
}

#[async_trait]
impl ChatTransport for WebApiChatTransport {
    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), ChatError> {
        self.call("chat.postMessage", &PostMessageRequest { channel: channel_id, message }).await
    }

    async fn add_reaction(
        &self,
        channel_id: &str,
        message_ts: &str,
        name: &str,
    ) -> Result<(), ChatError> {
        let body = AddReactionRequest { channel: channel_id, timestamp: message_ts, name };
        self.call("reactions.add", &body).await
    }
}
