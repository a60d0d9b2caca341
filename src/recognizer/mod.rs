//! Recognition adapter contract
//!
//! The speech-to-text engine itself runs in the UI client; this module
//! defines the event contract the engine consumes from it and the control
//! handle the engine uses to start, stop, and restart the stream.

mod control;
mod types;

pub use control::{ChannelControl, RecognizerCommand, RecognizerControl, RecognizerError, UnavailableRecognizer};
pub use types::{RecognizerEvent, TranscriptFragment};
