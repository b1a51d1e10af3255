//! Live-update wire messages and channel routing.
//!
//! Every frame is a JSON object with a mandatory `"type"` field. Server
//! frames are decoded into [`ServerMessage`] through
//! [`parse_server_message`], which also fills in a missing `timestamp`.
//! Client frames are built from [`ClientMessage`].

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use plotty_core::types::Timestamp;
use plotty_core::JobState;
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Named topic a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Jobs,
    Devices,
    System,
    All,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Jobs => "jobs",
            Channel::Devices => "devices",
            Channel::System => "system",
            Channel::All => "all",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jobs" => Ok(Channel::Jobs),
            "devices" => Ok(Channel::Devices),
            "system" => Ok(Channel::System),
            "all" => Ok(Channel::All),
            other => Err(format!("Unknown channel '{other}'")),
        }
    }
}

/// Turn user-supplied channel names into a subscription set.
///
/// Unknown names are dropped, duplicates collapse to their first
/// occurrence, and an empty result means [`Channel::All`].
pub fn normalize_channels<I, S>(names: I) -> Vec<Channel>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut channels = Vec::new();
    for name in names {
        match name.as_ref().parse::<Channel>() {
            Ok(ch) if !channels.contains(&ch) => channels.push(ch),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring channel"),
        }
    }
    if channels.is_empty() {
        channels.push(Channel::All);
    }
    channels
}

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

/// Every `"type"` value the protocol defines, in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Subscribe,
    Unsubscribe,
    Ping,
    Pong,
    JobStateChange,
    JobProgress,
    DeviceStatus,
    SystemAlert,
    Error,
}

impl MessageType {
    /// Types a server may send.
    pub const SERVER: [MessageType; 6] = [
        MessageType::JobStateChange,
        MessageType::JobProgress,
        MessageType::DeviceStatus,
        MessageType::SystemAlert,
        MessageType::Pong,
        MessageType::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Subscribe => "subscribe",
            MessageType::Unsubscribe => "unsubscribe",
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::JobStateChange => "job_state_change",
            MessageType::JobProgress => "job_progress",
            MessageType::DeviceStatus => "device_status",
            MessageType::SystemAlert => "system_alert",
            MessageType::Error => "error",
        }
    }

    /// Look up a server-sent type by its wire name.
    pub fn server_type(name: &str) -> Option<MessageType> {
        Self::SERVER.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// A decoded frame pushed by the status service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    JobStateChange(JobStateChange),
    JobProgress(JobProgress),
    DeviceStatus(DeviceStatus),
    SystemAlert(SystemAlert),
    Pong(Pong),
    Error(ErrorMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStateChange {
    pub job_id: String,
    #[serde(deserialize_with = "job_state_any_case")]
    pub from_state: JobState,
    #[serde(deserialize_with = "job_state_any_case")]
    pub to_state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: String,
    pub progress_percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_layer: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_layers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_plotted: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_points: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pen_down_time_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time_seconds: Option<f64>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub device_id: String,
    pub device_type: String,
    /// Free-form, e.g. `connected`, `busy`, `offline`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<Timestamp>,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemAlert {
    pub severity: Severity,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pong {
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
    pub timestamp: Timestamp,
}

fn job_state_any_case<'de, D>(deserializer: D) -> Result<JobState, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            ServerMessage::JobStateChange(_) => MessageType::JobStateChange,
            ServerMessage::JobProgress(_) => MessageType::JobProgress,
            ServerMessage::DeviceStatus(_) => MessageType::DeviceStatus,
            ServerMessage::SystemAlert(_) => MessageType::SystemAlert,
            ServerMessage::Pong(_) => MessageType::Pong,
            ServerMessage::Error(_) => MessageType::Error,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            ServerMessage::JobStateChange(m) => m.timestamp,
            ServerMessage::JobProgress(m) => m.timestamp,
            ServerMessage::DeviceStatus(m) => m.timestamp,
            ServerMessage::SystemAlert(m) => m.timestamp,
            ServerMessage::Pong(m) => m.timestamp,
            ServerMessage::Error(m) => m.timestamp,
        }
    }

    /// Channels on which this message is delivered.
    pub fn channels(&self) -> &'static [Channel] {
        channels_for(self.message_type())
    }
}

/// Routing table from message type to the channels that carry it.
pub fn channels_for(kind: MessageType) -> &'static [Channel] {
    match kind {
        MessageType::JobStateChange | MessageType::JobProgress => &[Channel::Jobs, Channel::All],
        MessageType::DeviceStatus => &[Channel::Devices, Channel::All],
        MessageType::SystemAlert => &[Channel::System, Channel::All],
        _ => &[Channel::All],
    }
}

/// Why an incoming frame was dropped.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Message has no 'type' field")]
    MissingType,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Invalid {kind} message: {source}")]
    Schema {
        kind: MessageType,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode one server text frame.
///
/// A missing `timestamp` is filled with the current time before the
/// payload is validated against its type's schema.
pub fn parse_server_message(text: &str) -> Result<ServerMessage, ParseError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let serde_json::Value::Object(mut object) = value else {
        return Err(ParseError::InvalidJson("frame is not a JSON object".into()));
    };

    let kind = match object.get("type") {
        Some(serde_json::Value::String(name)) => MessageType::server_type(name)
            .ok_or_else(|| ParseError::UnknownType(name.clone()))?,
        Some(other) => return Err(ParseError::UnknownType(other.to_string())),
        None => return Err(ParseError::MissingType),
    };

    object
        .entry("timestamp")
        .or_insert_with(|| serde_json::Value::String(Utc::now().to_rfc3339()));

    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|source| ParseError::Schema { kind, source })
}

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        channels: Vec<Channel>,
        timestamp: Timestamp,
    },
    Unsubscribe {
        channels: Vec<Channel>,
        timestamp: Timestamp,
    },
    Ping {
        timestamp: Timestamp,
    },
}

impl ClientMessage {
    pub fn subscribe(channels: Vec<Channel>) -> Self {
        Self::Subscribe {
            channels,
            timestamp: Utc::now(),
        }
    }

    pub fn unsubscribe(channels: Vec<Channel>) -> Self {
        Self::Unsubscribe {
            channels,
            timestamp: Utc::now(),
        }
    }

    pub fn ping() -> Self {
        Self::Ping {
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // -----------------------------------------------------------------------
    // Channel normalization
    // -----------------------------------------------------------------------

    #[test]
    fn empty_channel_list_means_all() {
        let none: [&str; 0] = [];
        assert_eq!(normalize_channels(none), vec![Channel::All]);
    }

    #[test]
    fn unknown_channels_are_dropped() {
        assert_eq!(normalize_channels(["jobs", "printers"]), vec![Channel::Jobs]);
        assert_eq!(normalize_channels(["printers"]), vec![Channel::All]);
    }

    #[test]
    fn duplicate_channels_collapse() {
        assert_eq!(
            normalize_channels(["jobs", "JOBS", "system", "jobs"]),
            vec![Channel::Jobs, Channel::System]
        );
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    #[test]
    fn routing_table() {
        assert_eq!(
            channels_for(MessageType::JobStateChange),
            &[Channel::Jobs, Channel::All]
        );
        assert_eq!(
            channels_for(MessageType::JobProgress),
            &[Channel::Jobs, Channel::All]
        );
        assert_eq!(
            channels_for(MessageType::DeviceStatus),
            &[Channel::Devices, Channel::All]
        );
        assert_eq!(
            channels_for(MessageType::SystemAlert),
            &[Channel::System, Channel::All]
        );
        assert_eq!(channels_for(MessageType::Pong), &[Channel::All]);
        assert_eq!(channels_for(MessageType::Error), &[Channel::All]);
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    #[test]
    fn parse_job_state_change() {
        let json = r#"{"type":"job_state_change","job_id":"demo","from_state":"queued",
            "to_state":"RUNNING","reason":"operator","timestamp":"2025-01-01T10:00:00Z"}"#;
        let msg = parse_server_message(json).unwrap();
        match msg {
            ServerMessage::JobStateChange(data) => {
                assert_eq!(data.job_id, "demo");
                assert_eq!(data.from_state, JobState::Queued);
                assert_eq!(data.to_state, JobState::Running);
                assert_eq!(data.reason.as_deref(), Some("operator"));
            }
            other => panic!("Expected JobStateChange, got {other:?}"),
        }
    }

    #[test]
    fn parse_job_progress_with_optional_fields() {
        let json = r#"{"type":"job_progress","job_id":"demo","progress_percentage":42.5,
            "current_layer":2,"total_layers":4,"pen_down_time_seconds":12.0}"#;
        let msg = parse_server_message(json).unwrap();
        match msg {
            ServerMessage::JobProgress(data) => {
                assert_eq!(data.progress_percentage, 42.5);
                assert_eq!(data.current_layer, Some(2));
                assert_eq!(data.pen_down_time_seconds, Some(12.0));
                assert!(data.eta_seconds.is_none());
            }
            other => panic!("Expected JobProgress, got {other:?}"),
        }
    }

    #[test]
    fn parse_device_status_defaults_error_count() {
        let json = r#"{"type":"device_status","device_id":"axidraw:1","device_type":"AxiDraw",
            "status":"busy"}"#;
        let msg = parse_server_message(json).unwrap();
        match msg {
            ServerMessage::DeviceStatus(data) => {
                assert_eq!(data.error_count, 0);
                assert_eq!(data.status, "busy");
            }
            other => panic!("Expected DeviceStatus, got {other:?}"),
        }
    }

    #[test]
    fn parse_system_alert() {
        let json = r#"{"type":"system_alert","severity":"critical","title":"Pen jam",
            "message":"Pen 2 stuck","source":"axidraw:1"}"#;
        let msg = parse_server_message(json).unwrap();
        assert_eq!(msg.channels(), &[Channel::System, Channel::All]);
        assert_matches!(
            msg,
            ServerMessage::SystemAlert(SystemAlert {
                severity: Severity::Critical,
                ..
            })
        );
    }

    #[test]
    fn missing_timestamp_is_filled_in() {
        let before = Utc::now();
        let msg = parse_server_message(r#"{"type":"pong"}"#).unwrap();
        assert!(msg.timestamp() >= before);
    }

    #[test]
    fn existing_timestamp_is_kept() {
        let msg =
            parse_server_message(r#"{"type":"error","message":"x","timestamp":"2024-05-01T00:00:00Z"}"#)
                .unwrap();
        assert_eq!(msg.timestamp().to_rfc3339(), "2024-05-01T00:00:00+00:00");
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert_matches!(
            parse_server_message("{oops"),
            Err(ParseError::InvalidJson(_))
        );
        assert_matches!(
            parse_server_message("[1,2]"),
            Err(ParseError::InvalidJson(_))
        );
    }

    #[test]
    fn missing_and_unknown_types_are_rejected() {
        assert_matches!(
            parse_server_message(r#"{"job_id":"x"}"#),
            Err(ParseError::MissingType)
        );
        assert_matches!(
            parse_server_message(r#"{"type":"telemetry"}"#),
            Err(ParseError::UnknownType(ref t)) if t == "telemetry"
        );
        // Client-only types are not valid from the server.
        assert_matches!(
            parse_server_message(r#"{"type":"subscribe","channels":[]}"#),
            Err(ParseError::UnknownType(_))
        );
    }

    #[test]
    fn schema_violation_is_rejected() {
        assert_matches!(
            parse_server_message(r#"{"type":"job_progress","job_id":"x"}"#),
            Err(ParseError::Schema {
                kind: MessageType::JobProgress,
                ..
            })
        );
    }

    // -----------------------------------------------------------------------
    // Client frames
    // -----------------------------------------------------------------------

    #[test]
    fn subscribe_frame_shape() {
        let frame = ClientMessage::subscribe(vec![Channel::Jobs, Channel::System]);
        let value: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "subscribe");
        assert_eq!(value["channels"], serde_json::json!(["jobs", "system"]));
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn ping_frame_shape() {
        let value = serde_json::to_value(ClientMessage::ping()).unwrap();
        assert_eq!(value["type"], "ping");
    }
}
