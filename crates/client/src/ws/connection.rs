//! One push session over tokio-tungstenite, plus the state and retry types the
//! manager reports through.

use std::time::Duration;

use futures_util::StreamExt;
use inventory_shared::InventoryUpdateEvent;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;
use uuid::Uuid;

use crate::auth_session::Credential;
use crate::config::{redacted, with_token};

/// Detailed connection state of the event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed { reason: String },
}

/// The three-valued status consumers usually want.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }

    pub fn status(&self) -> ChannelStatus {
        match self {
            ConnectionState::Connected => ChannelStatus::Connected,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. } => {
                ChannelStatus::Connecting
            }
            ConnectionState::Disconnected | ConnectionState::Failed { .. } => {
                ChannelStatus::Disconnected
            }
        }
    }
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts (0 = infinite)
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// A session that stays open this long (or delivers an event) resets the
    /// attempt counter. Shorter sessions count as failed attempts.
    pub stable_after: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30000),
            backoff_multiplier: 1.5,
            stable_after: Duration::from_secs(5),
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if secs.is_finite() && secs >= 0.0 {
            Duration::from_secs_f64(secs).min(self.max_delay)
        } else {
            self.max_delay
        }
    }

    /// Whether a session that ran for `uptime` earned a fresh retry budget.
    pub fn is_stable(&self, uptime: Duration, delivered: bool) -> bool {
        delivered || uptime >= self.stable_after
    }

    /// Whether `attempt` failed retries exhaust the budget.
    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt >= self.max_attempts
    }
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Transport(#[from] tungstenite::Error),
}

/// What one read from the session produced.
#[derive(Debug)]
pub(crate) enum Inbound {
    Event(InventoryUpdateEvent),
    /// Control frame, or a payload that failed to decode.
    Skipped,
    Closed(Option<String>),
}

type ChannelStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A single live push session bound to one credential.
pub(crate) struct ChannelConnection {
    id: Uuid,
    credential: Credential,
    stream: ChannelStream,
}

impl std::fmt::Debug for ChannelConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConnection")
            .field("id", &self.id)
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl ChannelConnection {
    /// Open a session on `endpoint` with the credential attached as `token`.
    pub(crate) async fn open(
        endpoint: &Url,
        credential: Credential,
        timeout: Duration,
    ) -> Result<Self, ConnectError> {
        let url = with_token(endpoint.clone(), &credential);
        tracing::debug!(url = %redacted(&url), "opening inventory channel");

        let (stream, _response) = tokio::time::timeout(timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| ConnectError::Timeout(timeout))??;

        Ok(Self {
            id: Uuid::new_v4(),
            credential,
            stream,
        })
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Read the next frame. Cancel safe.
    pub(crate) async fn next_inbound(&mut self) -> Inbound {
        match self.stream.next().await {
            Some(Ok(Message::Text(text))) => self.decode(text.as_str()),
            Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                Ok(text) => self.decode(text),
                Err(e) => {
                    tracing::warn!(connection_id = %self.id, error = %e, "dropping non UTF-8 frame");
                    Inbound::Skipped
                }
            },
            Some(Ok(Message::Close(frame))) => {
                Inbound::Closed(frame.map(|f| f.reason.as_str().to_owned()))
            }
            // Pong is handled automatically by tungstenite
            Some(Ok(_)) => Inbound::Skipped,
            Some(Err(e)) => Inbound::Closed(Some(e.to_string())),
            None => Inbound::Closed(None),
        }
    }

    fn decode(&self, payload: &str) -> Inbound {
        match InventoryUpdateEvent::from_frame(payload) {
            Ok(event) => Inbound::Event(event),
            Err(e) => {
                tracing::warn!(connection_id = %self.id, error = %e, "failed to parse inventory update");
                Inbound::Skipped
            }
        }
    }

    /// Send a close frame and wait up to `grace` for the server to finish the
    /// handshake. The socket is dropped either way.
    pub(crate) async fn close(mut self, grace: Duration) {
        let id = self.id;
        let handshake = async {
            self.stream.close(None).await?;
            while let Some(msg) = self.stream.next().await {
                msg?;
            }
            Ok::<(), tungstenite::Error>(())
        };

        match tokio::time::timeout(grace, handshake).await {
            Ok(Ok(())) => tracing::debug!(connection_id = %id, "inventory channel closed"),
            Ok(Err(e)) => tracing::debug!(connection_id = %id, error = %e, "inventory channel closed uncleanly"),
            Err(_) => tracing::debug!(connection_id = %id, "close handshake timed out"),
        }
    }
}
