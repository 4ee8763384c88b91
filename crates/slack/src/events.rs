use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use helsesjekk_db::RepositoryError;

use crate::api::SlackApiError;
use crate::membership::Eligibility;
use crate::socket::TransportError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    AppMention(AppMentionEvent),
    BlockAction(BlockActionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::AppMention(_) => SlackEventType::AppMention,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    pub fn channel_id(&self) -> Option<&str> {
        match self {
            Self::SlashCommand(payload) => Some(&payload.channel_id),
            Self::AppMention(event) => Some(&event.channel),
            Self::BlockAction(event) => Some(&event.channel_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    AppMention,
    BlockAction,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub trigger_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AppMentionEvent {
    pub channel: String,
    #[serde(default, rename = "user")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub channel_id: String,
    pub user_id: String,
    pub action_id: String,
    pub value: Option<String>,
}

#[derive(Deserialize)]
struct RawEnvelope {
    envelope_id: String,
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct RawBlockActions {
    user: RawId,
    #[serde(default)]
    channel: Option<RawId>,
    #[serde(default)]
    actions: Vec<RawAction>,
}

#[derive(Deserialize)]
struct RawId {
    id: String,
}

#[derive(Deserialize)]
struct RawAction {
    action_id: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed socket mode envelope: {0}")]
pub struct EnvelopeParseError(String);

impl SlackEnvelope {
    /// Builds a typed envelope from a Socket Mode frame that carries an `envelope_id`.
    ///
    /// Frames of known type with payloads we cannot read become `Unsupported` so they still
    /// get acknowledged.
    pub fn from_socket_frame(frame: Value) -> Result<Self, EnvelopeParseError> {
        let raw: RawEnvelope =
            serde_json::from_value(frame).map_err(|error| EnvelopeParseError(error.to_string()))?;

        let event = match raw.envelope_type.as_str() {
            "slash_commands" => serde_json::from_value::<SlashCommandPayload>(raw.payload)
                .map(SlackEvent::SlashCommand)
                .unwrap_or_else(|_| unsupported("slash_commands")),
            "events_api" => parse_events_api(raw.payload),
            "interactive" => parse_interactive(raw.payload),
            other => unsupported(other),
        };

        Ok(Self { envelope_id: raw.envelope_id, event })
    }
}

fn unsupported(event_type: &str) -> SlackEvent {
    SlackEvent::Unsupported { event_type: event_type.to_owned() }
}

fn parse_events_api(payload: Value) -> SlackEvent {
    let event = payload.get("event").cloned().unwrap_or(Value::Null);
    let event_type = event.get("type").and_then(Value::as_str).unwrap_or("unknown").to_owned();

    if event_type != "app_mention" {
        return SlackEvent::Unsupported { event_type };
    }
    serde_json::from_value::<AppMentionEvent>(event)
        .map(SlackEvent::AppMention)
        .unwrap_or(SlackEvent::Unsupported { event_type })
}

fn parse_interactive(payload: Value) -> SlackEvent {
    let interaction_type =
        payload.get("type").and_then(Value::as_str).unwrap_or("interactive").to_owned();
    if interaction_type != "block_actions" {
        return SlackEvent::Unsupported { event_type: interaction_type };
    }

    let Ok(raw) = serde_json::from_value::<RawBlockActions>(payload) else {
        return SlackEvent::Unsupported { event_type: interaction_type };
    };
    let (Some(channel), Some(action)) = (raw.channel, raw.actions.into_iter().next()) else {
        return SlackEvent::Unsupported { event_type: interaction_type };
    };

    SlackEvent::BlockAction(BlockActionEvent {
        channel_id: channel.id,
        user_id: raw.user.id,
        action_id: action.action_id,
        value: action.value,
    })
}

/// Sends the Socket Mode acknowledgement for the envelope being handled.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn acknowledge(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopAcknowledger;

#[async_trait]
impl Acknowledger for NoopAcknowledger {
    async fn acknowledge(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct EventContext {
    pub correlation_id: String,
    pub acknowledger: Arc<dyn Acknowledger>,
}

impl std::fmt::Debug for EventContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventContext").field("correlation_id", &self.correlation_id).finish()
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self {
            correlation_id: "unknown-correlation-id".to_owned(),
            acknowledger: Arc::new(NoopAcknowledger),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    /// The command was acknowledged and dropped because the bot cannot act in the channel.
    Declined(Eligibility),
    /// A failure was logged and answered with the support apology.
    Contained,
    Ignored,
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    SlackApi(#[from] SlackApiError),
    #[error(transparent)]
    Acknowledge(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}
