//! Events emitted by the voice engine
//!
//! Provides structured event types for wake detection, live transcripts,
//! finalized commands, and listener status changes. Consumed by the IPC
//! layer for push notifications to subscribed UI clients.

use serde::{Deserialize, Serialize};

/// Events broadcast by the engine during operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A wake word was detected; the engine is now capturing a command
    WakeDetected,

    /// Live partial transcript while capturing, for UI echo
    Speech {
        /// Latest combined transcript of the in-progress command
        text: String,
    },

    /// A command was finalized by silence and is ready to dispatch
    CommandReady {
        /// The finalized, non-empty command text
        text: String,
    },

    /// The capture session ended (command emitted or aborted)
    StandbyResumed {
        /// Duration in milliseconds the engine spent in the active mode
        active_ms: u64,
    },

    /// The master listener was switched on
    ListenerStarted,

    /// The master listener was switched off
    ListenerStopped,

    /// Mute-while-speaking was toggled
    MutedChanged {
        /// True while the assistant's own voice output is playing
        muted: bool,
    },
}

impl std::fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEvent::WakeDetected => write!(f, "WAKE_DETECTED"),
            EngineEvent::Speech { text } => write!(f, "SPEECH ({text})"),
            EngineEvent::CommandReady { text } => write!(f, "COMMAND_READY ({text})"),
            EngineEvent::StandbyResumed { active_ms } => {
                write!(f, "STANDBY_RESUMED ({active_ms}ms)")
            }
            EngineEvent::ListenerStarted => write!(f, "LISTENER_STARTED"),
            EngineEvent::ListenerStopped => write!(f, "LISTENER_STOPPED"),
            EngineEvent::MutedChanged { muted } => write!(f, "MUTED_CHANGED ({muted})"),
        }
    }
}
