//! Live-update client for a plotting status service.
//!
//! The service pushes JSON frames over a WebSocket at `ws://host:port/ws`.
//! [`messages`] defines the wire types and channel routing; [`client`]
//! holds the connection and dispatches parsed frames to callbacks.

pub mod client;
pub mod error;
pub mod messages;

pub use client::{ConnectionStatus, LiveClient, DEFAULT_HOST, DEFAULT_PORT};
pub use error::LiveError;
pub use messages::{normalize_channels, parse_server_message, Channel, ServerMessage};
