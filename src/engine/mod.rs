//! Voice command engine
//!
//! Turns the continuous, partial-result transcript stream into discrete
//! commands: wake word detection, silence-debounced finalization,
//! mute-while-speaking suppression, and stream recovery.

mod debounce;
mod machine;

pub use debounce::DebounceTimer;
pub use machine::{Engine, EngineCommand, EngineInput, Mode};
