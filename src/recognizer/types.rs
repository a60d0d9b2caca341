//! Transcript fragment and stream event types
//!
//! These cross the IPC boundary, so everything here is serde-serializable.

use serde::{Deserialize, Serialize};

/// One unit of transcribed text delivered by the recognition stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptFragment {
    /// Transcribed text, raw as delivered by the recognizer
    pub text: String,

    /// Whether the recognizer considers this fragment final.
    /// Non-final (partial) fragments may be superseded by later fragments
    /// for the same utterance.
    pub is_final: bool,
}

impl TranscriptFragment {
    /// Create a partial (non-final) fragment
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    /// Create a final fragment
    pub fn finalized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Lifecycle and result events from the recognition stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecognizerEvent {
    /// The stream is live; informational only
    Started,

    /// One batch of transcript fragments, in arrival order.
    /// Later fragments in a batch may overwrite earlier partials.
    Results {
        fragments: Vec<TranscriptFragment>,
    },

    /// The stream terminated, normally or via platform timeout/quota
    Ended,

    /// A transient stream error (no-speech, network blip)
    Error {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_serialization() {
        let frag = TranscriptFragment::partial("hey vy");
        let json = serde_json::to_string(&frag).unwrap();
        assert!(json.contains("hey vy"));
        assert!(json.contains("\"is_final\":false"));
    }

    #[test]
    fn test_event_round_trip() {
        let json = r#"{"type":"results","fragments":[{"text":"hello","is_final":true}]}"#;
        let event: RecognizerEvent = serde_json::from_str(json).unwrap();
        match event {
            RecognizerEvent::Results { fragments } => {
                assert_eq!(fragments, vec![TranscriptFragment::finalized("hello")]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_error_event() {
        let event = RecognizerEvent::Error {
            reason: "no-speech".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("no-speech"));
    }
}
