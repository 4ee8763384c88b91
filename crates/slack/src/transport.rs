use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::events::SlackEnvelope;
use crate::socket::{SocketTransport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What a single Socket Mode text frame means to the transport.
#[derive(Debug, PartialEq, Eq)]
pub enum SocketFrame {
    Hello,
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
    Ignored(String),
}

pub fn decode_frame(text: &str) -> SocketFrame {
    let raw: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(error) => return SocketFrame::Ignored(format!("unparseable frame: {error}")),
    };

    match raw.get("type").and_then(Value::as_str).unwrap_or_default() {
        "hello" => return SocketFrame::Hello,
        "disconnect" => {
            let reason = raw.get("reason").and_then(Value::as_str).unwrap_or("unknown");
            return SocketFrame::Disconnect { reason: reason.to_owned() };
        }
        _ => {}
    }

    match SlackEnvelope::from_socket_frame(raw) {
        Ok(envelope) => SocketFrame::Envelope(envelope),
        Err(error) => SocketFrame::Ignored(error.to_string()),
    }
}

/// Socket Mode URLs must be `wss://` on a Slack host.
pub fn validate_wss_url(url: &str) -> Result<(), TransportError> {
    let Some(rest) = url.strip_prefix("wss://") else {
        return Err(TransportError::Connect(format!(
            "socket mode url must use wss://, got {}",
            url.split("://").next().unwrap_or("unknown")
        )));
    };
    let host = rest.split('/').next().and_then(|host| host.split(':').next()).unwrap_or_default();
    if host != "slack.com" && !host.ends_with(".slack.com") {
        return Err(TransportError::Connect(format!(
            "socket mode host must be *.slack.com, got {host}"
        )));
    }
    Ok(())
}

/// Slack Socket Mode over a WebSocket opened through `apps.connections.open`.
pub struct WebSocketTransport {
    client: reqwest::Client,
    api_base_url: String,
    app_token: SecretString,
    writer: Mutex<Option<SplitSink<WsStream, Message>>>,
    reader: Mutex<Option<SplitStream<WsStream>>>,
}

impl WebSocketTransport {
    pub fn new(api_base_url: impl Into<String>, app_token: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
            app_token,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    async fn open_connection_url(&self) -> Result<String, TransportError> {
        let response: Value = self
            .client
            .post(format!("{}/apps.connections.open", self.api_base_url))
            .bearer_auth(self.app_token.expose_secret())
            .send()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?
            .json()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        if response.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = response.get("error").and_then(Value::as_str).unwrap_or("unknown");
            return Err(TransportError::Connect(format!("apps.connections.open failed: {error}")));
        }

        let url = response.get("url").and_then(Value::as_str).ok_or_else(|| {
            TransportError::Connect("apps.connections.open returned no url".to_owned())
        })?;
        validate_wss_url(url)?;
        Ok(url.to_owned())
    }

    async fn send(&self, message: Message) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        let sink = writer
            .as_mut()
            .ok_or_else(|| TransportError::Acknowledge("socket is not connected".to_owned()))?;
        sink.send(message).await.map_err(|error| TransportError::Acknowledge(error.to_string()))
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self.open_connection_url().await?;
        let (stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (sink, source) = stream.split();

        *self.writer.lock().await = Some(sink);
        *self.reader.lock().await = Some(source);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut reader = self.reader.lock().await;
        let source = reader
            .as_mut()
            .ok_or_else(|| TransportError::Receive("socket is not connected".to_owned()))?;

        loop {
            let message = match source.next().await {
                Some(Ok(message)) => message,
                Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
                None => return Err(TransportError::Receive("socket stream ended".to_owned())),
            };

            match message {
                Message::Text(text) => match decode_frame(text.as_str()) {
                    SocketFrame::Hello => info!("socket mode hello received"),
                    SocketFrame::Disconnect { reason } => {
                        info!(reason = %reason, "socket mode disconnect requested");
                        return Err(TransportError::Receive(format!(
                            "disconnect requested: {reason}"
                        )));
                    }
                    SocketFrame::Envelope(envelope) => return Ok(Some(envelope)),
                    SocketFrame::Ignored(detail) => {
                        warn!(detail = %detail, "ignoring socket frame")
                    }
                },
                Message::Ping(payload) => {
                    if let Err(error) = self.send(Message::Pong(payload)).await {
                        debug!(error = %error, "failed to answer ping");
                    }
                }
                Message::Close(_) => {
                    return Err(TransportError::Receive("socket closed by server".to_owned()));
                }
                _ => {}
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let ack = json!({ "envelope_id": envelope_id });
        self.send(Message::Text(ack.to_string().into())).await
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.reader.lock().await.take();
        let Some(mut sink) = self.writer.lock().await.take() else {
            return Ok(());
        };
        sink.close().await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}
