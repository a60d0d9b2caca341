//! Control handle for the external recognition stream
//!
//! The engine never touches the stream directly; it issues start/stop
//! commands through this handle and the IPC layer relays them to the
//! client that owns the recognizer.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Commands relayed to the recognizer peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecognizerCommand {
    /// Begin (or resume) continuous recognition
    Start,
    /// Stop recognition, discarding buffered audio context
    Stop,
}

/// Errors from the recognizer control path
#[derive(Debug, thiserror::Error)]
pub enum RecognizerError {
    #[error("no recognizer peer is connected")]
    NoPeer,

    #[error("recognition capability is unavailable")]
    Unavailable,
}

/// Handle the engine uses to drive the recognition stream
pub trait RecognizerControl: Send {
    /// Whether the recognition capability exists at all.
    /// When false the engine degrades to a permanently inert instance.
    fn is_available(&self) -> bool {
        true
    }

    /// Ask the stream to start listening
    fn start(&self) -> Result<(), RecognizerError>;

    /// Ask the stream to stop
    fn stop(&self) -> Result<(), RecognizerError>;
}

/// Broadcast-backed control: commands fan out to subscribed IPC clients
pub struct ChannelControl {
    command_tx: broadcast::Sender<RecognizerCommand>,
}

impl ChannelControl {
    /// Create a control handle over the given command channel
    pub fn new(command_tx: broadcast::Sender<RecognizerCommand>) -> Self {
        Self { command_tx }
    }

    fn send(&self, command: RecognizerCommand) -> Result<(), RecognizerError> {
        debug!(?command, "relaying recognizer command");
        self.command_tx
            .send(command)
            .map(|_| ())
            .map_err(|_| RecognizerError::NoPeer)
    }
}

impl RecognizerControl for ChannelControl {
    fn start(&self) -> Result<(), RecognizerError> {
        self.send(RecognizerCommand::Start)
    }

    fn stop(&self) -> Result<(), RecognizerError> {
        self.send(RecognizerCommand::Stop)
    }
}

/// Stand-in control for hosts without any recognition capability
pub struct UnavailableRecognizer;

impl RecognizerControl for UnavailableRecognizer {
    fn is_available(&self) -> bool {
        false
    }

    fn start(&self) -> Result<(), RecognizerError> {
        Err(RecognizerError::Unavailable)
    }

    fn stop(&self) -> Result<(), RecognizerError> {
        Err(RecognizerError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_control_relays_commands() {
        let (tx, mut rx) = broadcast::channel(4);
        let control = ChannelControl::new(tx);

        control.start().unwrap();
        control.stop().unwrap();

        assert_eq!(rx.try_recv().unwrap(), RecognizerCommand::Start);
        assert_eq!(rx.try_recv().unwrap(), RecognizerCommand::Stop);
    }

    #[test]
    fn test_channel_control_without_peer() {
        let (tx, rx) = broadcast::channel(4);
        drop(rx);
        let control = ChannelControl::new(tx);

        assert!(matches!(control.start(), Err(RecognizerError::NoPeer)));
    }

    #[test]
    fn test_unavailable_recognizer() {
        let control = UnavailableRecognizer;
        assert!(!control.is_available());
        assert!(matches!(control.start(), Err(RecognizerError::Unavailable)));
    }

    #[test]
    fn test_command_serialization() {
        let json = serde_json::to_string(&RecognizerCommand::Start).unwrap();
        assert!(json.contains("start"));
    }
}
