//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::engine;
use crate::events::EngineEvent;
use crate::recognizer::{RecognizerCommand, TranscriptFragment};

/// Current capture mode of the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Waiting for a wake word
    #[default]
    Standby,
    /// Capturing a command
    Active,
}

/// Requests from the UI client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to push notifications
    Subscribe,

    /// Switch the master listener on
    Start,

    /// Switch the master listener off
    Stop,

    /// Gate fragment processing while the client plays the assistant's voice
    SetMuted { muted: bool },

    /// One batch of transcript fragments from the client's recognizer
    Fragments { fragments: Vec<TranscriptFragment> },

    /// The client's recognition stream went live
    StreamStarted,

    /// The client's recognition stream terminated
    StreamEnded,

    /// The client's recognition stream reported a transient error
    StreamError { reason: String },
}

/// Responses from daemon to the UI client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Request accepted and forwarded to the engine
    Ack,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification to subscribed clients.
/// Payloads are nested fields so the inner tagged enums cannot collide
/// with the outer `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// An engine event occurred
    Engine { event: EngineEvent },

    /// The engine wants the client's recognition stream started or stopped
    Recognizer { command: RecognizerCommand },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Current capture mode
    pub mode: Mode,

    /// Whether the master listener is on
    pub master_active: bool,

    /// Whether fragment processing is muted
    pub muted: bool,

    /// Language hint for the client's recognizer
    pub language: String,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: Mode::default(),
            master_active: false,
            muted: false,
            language: String::new(),
            uptime_secs: 0,
        }
    }
}

/// Convert internal engine mode to IPC mode
impl From<engine::Mode> for Mode {
    fn from(mode: engine::Mode) -> Self {
        match mode {
            engine::Mode::Standby => Mode::Standby,
            engine::Mode::Active => Mode::Active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::Fragments {
            fragments: vec![TranscriptFragment::partial("hey vyom")],
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("fragments"));
        assert!(json.contains("hey vyom"));
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"type":"set_muted","muted":true}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert!(matches!(req, Request::SetMuted { muted: true }));
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
        assert!(json.contains("standby"));
    }

    #[test]
    fn test_notification_round_trip() {
        let note = Notification::Engine {
            event: EngineEvent::CommandReady {
                text: "play music".to_string(),
            },
        };
        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("command_ready"));
        assert!(json.contains("play music"));

        let parsed: Notification = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            parsed,
            Notification::Engine {
                event: EngineEvent::CommandReady { .. }
            }
        ));

        let note = Notification::Recognizer {
            command: RecognizerCommand::Start,
        };
        let json = serde_json::to_string(&note).unwrap();
        let parsed: Notification = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            parsed,
            Notification::Recognizer {
                command: RecognizerCommand::Start
            }
        ));
    }

    #[test]
    fn test_mode_conversion() {
        assert_eq!(Mode::from(engine::Mode::Standby), Mode::Standby);
        assert_eq!(Mode::from(engine::Mode::Active), Mode::Active);
    }
}
