use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use helsesjekk_core::errors::ApplicationError;

use crate::blocks::{MessageTemplate, ModalView};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlackApiError {
    /// The request never produced a usable response: connection, HTTP status or JSON decoding.
    #[error("slack {method} transport failure: {detail}")]
    Transport { method: &'static str, detail: String },
    /// Slack answered with `ok: false`.
    #[error("slack {method} returned error: {error}")]
    Platform { method: &'static str, error: String },
}

impl From<SlackApiError> for ApplicationError {
    fn from(error: SlackApiError) -> Self {
        ApplicationError::Integration(error.to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ChannelInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub is_member: Option<bool>,
    #[serde(default)]
    pub is_private: Option<bool>,
}

/// `conversations.info` is the one call whose `ok: false` result is data, not an error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ConversationsInfoResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub channel: Option<ChannelInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

#[async_trait]
pub trait SlackWebApi: Send + Sync {
    async fn conversations_info(
        &self,
        channel_id: &str,
    ) -> Result<ConversationsInfoResponse, SlackApiError>;

    async fn views_open(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError>;

    async fn chat_post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<PostedMessage, SlackApiError>;

    async fn chat_update(
        &self,
        channel: &str,
        ts: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError>;
}

pub struct HttpSlackWebApi {
    client: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
}

impl HttpSlackWebApi {
    pub fn new(base_url: impl Into<String>, bot_token: SecretString) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client: reqwest::Client::new(), base_url, bot_token }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn read_json(
        method: &'static str,
        response: reqwest::Response,
    ) -> Result<Value, SlackApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(SlackApiError::Transport { method, detail: format!("HTTP {status}") });
        }

        response
            .json::<Value>()
            .await
            .map_err(|error| SlackApiError::Transport { method, detail: error.to_string() })
    }

    async fn post_json<T>(&self, method: &'static str, body: Value) -> Result<T, SlackApiError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.endpoint(method))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| SlackApiError::Transport { method, detail: error.to_string() })?;

        let payload = Self::read_json(method, response).await?;
        if payload.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = payload.get("error").and_then(Value::as_str).unwrap_or("unknown");
            return Err(SlackApiError::Platform { method, error: error.to_owned() });
        }

        serde_json::from_value(payload)
            .map_err(|error| SlackApiError::Transport { method, detail: error.to_string() })
    }
}

fn message_body(channel: &str, message: &MessageTemplate) -> Value {
    let mut body = json!({ "channel": channel, "text": message.fallback_text });
    if !message.blocks.is_empty() {
        body["blocks"] = json!(message.blocks);
    }
    body
}

#[derive(Deserialize)]
struct Acknowledged {}

#[async_trait]
impl SlackWebApi for HttpSlackWebApi {
    async fn conversations_info(
        &self,
        channel_id: &str,
    ) -> Result<ConversationsInfoResponse, SlackApiError> {
        const METHOD: &str = "conversations.info";

        let response = self
            .client
            .get(self.endpoint(METHOD))
            .bearer_auth(self.bot_token.expose_secret())
            .query(&[("channel", channel_id)])
            .send()
            .await
            .map_err(|error| SlackApiError::Transport {
                method: METHOD,
                detail: error.to_string(),
            })?;

        let payload = Self::read_json(METHOD, response).await?;
        serde_json::from_value(payload)
            .map_err(|error| SlackApiError::Transport { method: METHOD, detail: error.to_string() })
    }

    async fn views_open(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        let _: Acknowledged =
            self.post_json("views.open", json!({ "trigger_id": trigger_id, "view": view })).await?;
        Ok(())
    }

    async fn chat_post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<PostedMessage, SlackApiError> {
        self.post_json("chat.postMessage", message_body(channel, message)).await
    }

    async fn chat_update(
        &self,
        channel: &str,
        ts: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        let mut body = message_body(channel, message);
        body["ts"] = json!(ts);
        let _: Acknowledged = self.post_json("chat.update", body).await?;
        Ok(())
    }
}
