//! WebSocket client for the status service.
//!
//! [`LiveClient`] owns at most one connection. After [`LiveClient::connect`]
//! succeeds, [`LiveClient::listen`] consumes frames until the server closes
//! the socket or the transport fails, then the client is disconnected again.
//! Nothing reconnects automatically; callers call `connect` again.

use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::LiveError;
use crate::messages::{normalize_channels, parse_server_message, Channel, ClientMessage, ServerMessage};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8765;

/// Upper bound on the opening handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Invoked for every parsed server message.
pub type MessageCallback = Box<dyn Fn(&ServerMessage) + Send + Sync>;

/// Invoked for connection-level failures.
pub type ErrorCallback = Box<dyn Fn(&LiveError) + Send + Sync>;

/// Side-effect-free snapshot of the client's connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub url: String,
    pub subscriptions: Vec<Channel>,
    pub host: String,
    pub port: u16,
}

pub struct LiveClient {
    host: String,
    port: u16,
    url: String,
    connect_timeout: Duration,
    stream: Option<WsStream>,
    subscriptions: BTreeSet<Channel>,
    message_callbacks: Vec<MessageCallback>,
    error_callbacks: Vec<ErrorCallback>,
}

impl Default for LiveClient {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl LiveClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let url = format!("ws://{host}:{port}/ws");
        Self {
            host,
            port,
            url,
            connect_timeout: CONNECT_TIMEOUT,
            stream: None,
            subscriptions: BTreeSet::new(),
            message_callbacks: Vec::new(),
            error_callbacks: Vec::new(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Register a message callback. Callbacks run in registration order.
    pub fn on_message<F>(&mut self, callback: F)
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        self.message_callbacks.push(Box::new(callback));
    }

    pub fn on_error<F>(&mut self, callback: F)
    where
        F: Fn(&LiveError) + Send + Sync + 'static,
    {
        self.error_callbacks.push(Box::new(callback));
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.is_connected(),
            url: self.url.clone(),
            subscriptions: self.subscriptions.iter().copied().collect(),
            host: self.host.clone(),
            port: self.port,
        }
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// Open the WebSocket. Failures go to the error callbacks and yield
    /// `false`; an existing connection is kept as-is.
    pub async fn connect(&mut self) -> bool {
        if self.stream.is_some() {
            return true;
        }

        tracing::info!(url = %self.url, "Connecting to status service");

        let outcome = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str())).await;
        let error = match outcome {
            Ok(Ok((stream, _response))) => {
                self.stream = Some(stream);
                tracing::info!(url = %self.url, "Connected to status service");
                return true;
            }
            Ok(Err(tungstenite::Error::Io(e))) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                LiveError::Connection(format!(
                    "Connection refused. Is the status service running at {}?",
                    self.url
                ))
            }
            Ok(Err(e)) => LiveError::Connection(format!("Failed to connect to {}: {e}", self.url)),
            Err(_) => LiveError::Connection(format!(
                "Timed out after {}s connecting to {}",
                self.connect_timeout.as_secs_f64(),
                self.url
            )),
        };

        tracing::error!(url = %self.url, error = %error, "Connection failed");
        self.notify_error(&error);
        false
    }

    /// Close the connection if there is one. Always ends disconnected.
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                tracing::debug!(error = %e, "Error while closing WebSocket");
            }
            tracing::info!(url = %self.url, "Disconnected from status service");
        }
    }

    /// Connect and immediately disconnect.
    pub async fn test_connection(&mut self) -> bool {
        if self.connect().await {
            self.disconnect().await;
            true
        } else {
            false
        }
    }

    // -----------------------------------------------------------------------
    // Outgoing frames
    // -----------------------------------------------------------------------

    pub async fn subscribe<S: AsRef<str>>(&mut self, channels: &[S]) -> Result<(), LiveError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(LiveError::Subscription(
                "Not connected to status service".into(),
            ));
        };

        let channels = normalize_channels(channels);
        self.subscriptions.extend(channels.iter().copied());

        let frame = ClientMessage::subscribe(channels.clone())
            .to_json()
            .map_err(|e| LiveError::Subscription(format!("Failed to encode subscription: {e}")))?;
        stream
            .send(Message::Text(frame))
            .await
            .map_err(|e| LiveError::Subscription(format!("Failed to subscribe to channels: {e}")))?;

        tracing::info!(channels = ?channels, "Subscribed");
        Ok(())
    }

    /// Drop channels from the subscription. Does nothing when disconnected.
    pub async fn unsubscribe<S: AsRef<str>>(&mut self, channels: &[S]) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };

        let channels = normalize_channels(channels);
        for ch in &channels {
            self.subscriptions.remove(ch);
        }

        let result = match ClientMessage::unsubscribe(channels.clone()).to_json() {
            Ok(frame) => stream.send(Message::Text(frame)).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match result {
            Ok(()) => tracing::info!(channels = ?channels, "Unsubscribed"),
            Err(e) => tracing::warn!(error = %e, "Failed to unsubscribe from channels"),
        }
    }

    /// Best-effort keepalive. Does nothing when disconnected.
    pub async fn ping(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        let result = match ClientMessage::ping().to_json() {
            Ok(frame) => stream.send(Message::Text(frame)).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to send ping");
        }
    }

    // -----------------------------------------------------------------------
    // Receive loop
    // -----------------------------------------------------------------------

    /// Receive frames until the connection ends.
    ///
    /// Malformed, unknown and schema-violating frames are logged and
    /// skipped. Returns `Ok` on a clean close; transport failures go to
    /// the error callbacks. The client is disconnected afterwards either way.
    ///
    /// The connection stays owned by the client while listening, so a
    /// caller that drops this future (for example on cancellation) can
    /// still [`disconnect`](Self::disconnect) cleanly.
    pub async fn listen(&mut self) -> Result<(), LiveError> {
        if self.stream.is_none() {
            return Err(LiveError::Connection(
                "Not connected to status service".into(),
            ));
        }

        tracing::info!(url = %self.url, "Listening for status messages");

        loop {
            let Some(stream) = self.stream.as_mut() else {
                break;
            };
            let Some(frame) = stream.next().await else {
                break;
            };
            match frame {
                Ok(Message::Text(text)) => self.handle_text(&text),
                Ok(Message::Binary(_)) => {
                    tracing::trace!("Ignoring binary frame");
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    // Handled automatically by tungstenite.
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!(?frame, "Status service closed the connection");
                    break;
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    let error = LiveError::Connection(format!("WebSocket error: {e}"));
                    tracing::error!(error = %error, "WebSocket receive error");
                    self.notify_error(&error);
                    break;
                }
            }
        }

        self.stream = None;
        Ok(())
    }

    fn handle_text(&self, text: &str) {
        match parse_server_message(text) {
            Ok(message) => {
                tracing::debug!(kind = %message.message_type(), "Status message received");
                self.notify_message(&message);
            }
            Err(e) => {
                tracing::warn!(error = %e, raw_message = %text, "Dropping status message");
            }
        }
    }

    fn notify_message(&self, message: &ServerMessage) {
        for callback in &self.message_callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(message))).is_err() {
                tracing::warn!(kind = %message.message_type(), "Message callback panicked");
            }
        }
    }

    fn notify_error(&self, error: &LiveError) {
        for callback in &self.error_callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(error))).is_err() {
                tracing::warn!("Error callback panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_localhost() {
        let client = LiveClient::default();
        assert_eq!(client.url(), "ws://localhost:8765/ws");
        assert!(!client.is_connected());
    }

    #[test]
    fn status_snapshot_when_idle() {
        let client = LiveClient::new("plotter.local", 9000);
        let status = client.connection_status();
        assert!(!status.connected);
        assert_eq!(status.url, "ws://plotter.local:9000/ws");
        assert_eq!(status.host, "plotter.local");
        assert_eq!(status.port, 9000);
        assert!(status.subscriptions.is_empty());

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["connected"], false);
    }
}
