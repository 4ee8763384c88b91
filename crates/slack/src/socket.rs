use std::sync::atomic::{AtomicBool, Ordering};
use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::events::{
    Acknowledger, EventContext, EventDispatcher, SlackEnvelope, SlackEvent, SlackEventType,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// A Socket Mode connection. `next_envelope` yields `None` only when the transport is done for
/// good; server-side disconnects surface as errors so the runner reconnects.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Acknowledges one envelope at most once, whoever asks first.
struct EnvelopeAcknowledger {
    transport: Arc<dyn SocketTransport>,
    envelope_id: String,
    sent: AtomicBool,
}

impl EnvelopeAcknowledger {
    fn new(transport: Arc<dyn SocketTransport>, envelope_id: String) -> Self {
        Self { transport, envelope_id, sent: AtomicBool::new(false) }
    }
}

#[async_trait]
impl Acknowledger for EnvelopeAcknowledger {
    async fn acknowledge(&self) -> Result<(), TransportError> {
        if self.sent.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        match self.transport.acknowledge(&self.envelope_id).await {
            Ok(()) => {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %self.envelope_id,
                    "acknowledged slack envelope"
                );
                Ok(())
            }
            Err(error) => {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %self.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
                Err(error)
            }
        }
    }
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), reconnect_policy }
    }

    /// Pumps envelopes until the transport closes or retries run out.
    ///
    /// The retry budget resets after every successful connection.
    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(PumpFailure { error, connected }) => {
                    if connected {
                        attempt = 0;
                    }
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), PumpFailure> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await.map_err(|error| PumpFailure { error, connected: false })?;
        info!(attempt, "socket mode transport connected");

        let mut in_flight = JoinSet::new();
        let outcome = self.pump(&mut in_flight).await;

        while in_flight.join_next().await.is_some() {}
        outcome.map_err(|error| PumpFailure { error, connected: true })
    }

    async fn pump(&self, in_flight: &mut JoinSet<()>) -> Result<(), TransportError> {
        loop {
            while in_flight.try_join_next().is_some() {}

            let Some(envelope) = self.transport.next_envelope().await? else {
                info!("socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                channel_id = envelope.event.channel_id().unwrap_or("unknown"),
                "received slack envelope"
            );

            let acknowledger = Arc::new(EnvelopeAcknowledger::new(
                self.transport.clone(),
                envelope.envelope_id.clone(),
            ));
            if !defers_ack(&envelope.event) {
                let _ = acknowledger.acknowledge().await;
            }

            let dispatcher = self.dispatcher.clone();
            in_flight.spawn(async move {
                let context = EventContext {
                    correlation_id: envelope.envelope_id.clone(),
                    acknowledger: acknowledger.clone(),
                };
                if let Err(error) = dispatcher.dispatch(&envelope, &context).await {
                    warn!(
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        channel_id = envelope.event.channel_id().unwrap_or("unknown"),
                        error = %error,
                        "event dispatch failed; continuing socket loop"
                    );
                }
                let _ = acknowledger.acknowledge().await;
            });
        }
    }
}

struct PumpFailure {
    error: TransportError,
    connected: bool,
}

/// Slash commands are acknowledged by their handler once it knows what to do.
fn defers_ack(event: &SlackEvent) -> bool {
    event.event_type() == SlackEventType::SlashCommand
}
