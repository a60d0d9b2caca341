//! Core wake/command state machine
//!
//! Tracks Standby vs Active capture mode, matches transcript fragments
//! against the configured wake words, and finalizes a command when the
//! silence debouncer expires. All state lives in a single task; inputs
//! arrive over one mpsc channel and timer expiries through the owned
//! debounce timers, so mutation is never concurrent.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::events::EngineEvent;
use crate::recognizer::{RecognizerControl, RecognizerEvent, TranscriptFragment};

use super::debounce::DebounceTimer;

/// The two capture modes of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Listening only for a wake word
    #[default]
    Standby,
    /// Wake word heard, capturing a command
    Active,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Standby => write!(f, "Standby"),
            Mode::Active => write!(f, "Active"),
        }
    }
}

/// Control operations exposed to the surrounding application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    /// Switch the master listener on
    Start,
    /// Switch the master listener off, aborting any capture in progress
    Stop,
    /// Gate fragment processing while the assistant's own voice plays
    SetMuted(bool),
}

/// Everything the engine consumes, multiplexed onto one channel
#[derive(Debug, Clone)]
pub enum EngineInput {
    /// A control operation from the caller
    Command(EngineCommand),
    /// An event from the recognition stream
    Recognizer(RecognizerEvent),
}

/// What woke the engine's run loop
enum Step {
    Input(EngineInput),
    SilenceElapsed,
    RestartDue,
}

/// The voice command engine
pub struct Engine {
    mode: Mode,
    /// Master switch: is the whole system supposed to be listening
    master_active: bool,
    /// True while the assistant's own voice output is playing
    muted: bool,
    /// Set when the recognition capability is missing at construction;
    /// every operation becomes a no-op
    inert: bool,
    /// Normalized wake phrases
    wake_words: Vec<String>,
    silence_delay: Duration,
    restart_delay: Duration,
    /// Latest combined transcript of the in-progress command
    command_buffer: String,
    /// When the current Active session began
    active_since: Option<Instant>,
    /// Expiry finalizes the command; rearmed on every fragment
    silence: DebounceTimer,
    /// Flush pause between stop and start of the post-wake stream restart
    restart: DebounceTimer,
    event_tx: broadcast::Sender<EngineEvent>,
    recognizer: Box<dyn RecognizerControl>,
}

impl Engine {
    /// Create a new engine in standby
    pub fn new(
        config: &Config,
        event_tx: broadcast::Sender<EngineEvent>,
        recognizer: Box<dyn RecognizerControl>,
    ) -> Self {
        let inert = !recognizer.is_available();
        if inert {
            warn!("recognition capability unavailable, engine is inert");
        }

        let wake_words: Vec<String> = config
            .wake_words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        debug!(?wake_words, "engine configured");

        Self {
            mode: Mode::Standby,
            master_active: false,
            muted: false,
            inert,
            wake_words,
            silence_delay: config.silence_delay,
            restart_delay: config.restart_delay,
            command_buffer: String::new(),
            active_since: None,
            silence: DebounceTimer::new(),
            restart: DebounceTimer::new(),
            event_tx,
            recognizer,
        }
    }

    /// Run the engine, processing inputs and timer expiries until the
    /// input channel closes
    pub async fn run(mut self, mut input_rx: mpsc::Receiver<EngineInput>) {
        info!("voice engine started in standby");

        loop {
            // Biased toward inputs: a fragment queued in the same tick as a
            // pending expiry must rearm the timer before the expiry fires
            let step = tokio::select! {
                biased;

                input = input_rx.recv() => match input {
                    Some(input) => Step::Input(input),
                    None => break,
                },
                _ = self.silence.expired() => Step::SilenceElapsed,
                _ = self.restart.expired() => Step::RestartDue,
            };

            match step {
                Step::Input(EngineInput::Command(command)) => self.handle_command(command),
                Step::Input(EngineInput::Recognizer(event)) => self.handle_recognizer(event),
                Step::SilenceElapsed => self.finalize_command(),
                Step::RestartDue => self.resume_after_wake(),
            }
        }

        info!("voice engine stopped");
    }

    /// Handle a control operation
    fn handle_command(&mut self, command: EngineCommand) {
        if self.inert {
            debug!(?command, "inert engine, command ignored");
            return;
        }

        match command {
            EngineCommand::Start => self.start(),
            EngineCommand::Stop => self.stop(),
            EngineCommand::SetMuted(muted) => self.set_muted(muted),
        }
    }

    /// Switch the master listener on. Idempotent, but always kicks the
    /// stream so a failed auto-restart is retried on the next request.
    fn start(&mut self) {
        let newly_started = !self.master_active;
        self.master_active = true;

        if let Err(e) = self.recognizer.start() {
            warn!(error = %e, "failed to start recognition stream");
        }

        if newly_started {
            info!("listener started");
            let _ = self.event_tx.send(EngineEvent::ListenerStarted);
        }
    }

    /// Switch the master listener off, cancelling every pending timer so
    /// no deferred expiry can mutate a stopped engine
    fn stop(&mut self) {
        if !self.master_active {
            debug!("stop requested while already stopped");
            return;
        }

        self.master_active = false;
        self.silence.cancel();
        self.restart.cancel();

        if self.mode == Mode::Active {
            self.leave_active();
        }

        if let Err(e) = self.recognizer.stop() {
            warn!(error = %e, "failed to stop recognition stream");
        }

        info!("listener stopped");
        let _ = self.event_tx.send(EngineEvent::ListenerStopped);
    }

    /// Toggle mute-while-speaking. Muting during an Active session aborts
    /// the session: the capture predates our own speech and is stale.
    fn set_muted(&mut self, muted: bool) {
        if self.muted == muted {
            return;
        }

        self.muted = muted;
        info!(muted, "mute toggled");

        if muted && self.mode == Mode::Active {
            debug!("muted while capturing, aborting session");
            self.silence.cancel();
            self.leave_active();
        }

        let _ = self.event_tx.send(EngineEvent::MutedChanged { muted });
    }

    /// Handle an event from the recognition stream
    fn handle_recognizer(&mut self, event: RecognizerEvent) {
        if self.inert {
            return;
        }

        match event {
            RecognizerEvent::Started => debug!("recognition stream live"),
            RecognizerEvent::Results { fragments } => self.handle_results(&fragments),
            RecognizerEvent::Ended => self.handle_stream_end(),
            RecognizerEvent::Error { reason } => {
                // Transient errors (no-speech, network blips) are expected;
                // the stream self-heals via Ended -> restart
                warn!(%reason, "recognition stream error");
            }
        }
    }

    /// Process one batch of transcript fragments
    fn handle_results(&mut self, fragments: &[TranscriptFragment]) {
        if !self.master_active {
            trace!("results after stop, dropped");
            return;
        }
        if self.muted {
            trace!("muted, fragments dropped");
            return;
        }

        let transcript = combine_fragments(fragments);
        if transcript.is_empty() {
            return;
        }

        match self.mode {
            Mode::Standby => {
                if let Some(word) = self.match_wake_word(&transcript) {
                    info!(wake_word = %word, transcript = %transcript, "wake word detected");
                    self.enter_active();
                }
            }
            Mode::Active => {
                // Replace, not append: each batch carries the full utterance
                // so far, and the latest wins
                self.command_buffer = transcript.clone();
                trace!(transcript = %transcript, "command transcript updated");
                let _ = self.event_tx.send(EngineEvent::Speech { text: transcript });
                self.silence.arm(self.silence_delay);
            }
        }
    }

    /// Find the first configured wake word contained in the transcript
    fn match_wake_word(&self, transcript: &str) -> Option<&str> {
        self.wake_words
            .iter()
            .map(String::as_str)
            .find(|word| transcript.contains(word))
    }

    /// Enter Active mode: clear the buffer and restart the stream so the
    /// command capture starts without residual audio context
    fn enter_active(&mut self) {
        self.mode = Mode::Active;
        self.command_buffer.clear();
        self.active_since = Some(Instant::now());

        info!(from = %Mode::Standby, to = %Mode::Active, "mode transition");
        let _ = self.event_tx.send(EngineEvent::WakeDetected);

        if let Err(e) = self.recognizer.stop() {
            warn!(error = %e, "failed to stop stream for flush");
        }
        self.restart.arm(self.restart_delay);
    }

    /// Silence expired: the buffered transcript becomes the command.
    /// This is the only path that dispatches a command.
    fn finalize_command(&mut self) {
        if self.mode != Mode::Active {
            debug!("silence expiry outside active mode, ignored");
            return;
        }

        let buffer = std::mem::take(&mut self.command_buffer);
        let text = buffer.trim();

        if text.is_empty() {
            debug!("silence expired with empty buffer, no command emitted");
        } else {
            info!(command = %text, "command finalized");
            let _ = self.event_tx.send(EngineEvent::CommandReady {
                text: text.to_string(),
            });
        }

        self.leave_active();
    }

    /// Return to Standby, reporting how long the session lasted
    fn leave_active(&mut self) {
        let active_ms = self
            .active_since
            .take()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        self.mode = Mode::Standby;
        self.command_buffer.clear();

        info!(from = %Mode::Active, to = %Mode::Standby, active_ms, "mode transition");
        let _ = self.event_tx.send(EngineEvent::StandbyResumed { active_ms });
    }

    /// The stream terminated; restart it while the master switch is on
    fn handle_stream_end(&mut self) {
        if !self.master_active {
            debug!("stream ended while stopped");
            return;
        }
        if self.restart.is_armed() {
            // Our own post-wake stop provoked this end; the armed restart
            // timer will resume the stream after the flush pause
            debug!("stream ended during wake restart window");
            return;
        }

        debug!("stream ended unexpectedly, restarting");
        if let Err(e) = self.recognizer.start() {
            warn!(error = %e, "stream restart failed, awaiting next start request");
        }
    }

    /// Flush pause elapsed after a wake word; resume listening
    fn resume_after_wake(&mut self) {
        if !self.master_active {
            return;
        }
        if let Err(e) = self.recognizer.start() {
            warn!(error = %e, "failed to resume stream after wake");
        }
    }
}

/// Concatenate a fragment batch in arrival order and normalize it
fn combine_fragments(fragments: &[TranscriptFragment]) -> String {
    let mut combined = String::new();
    for fragment in fragments {
        combined.push_str(&fragment.text);
    }
    combined.trim().to_lowercase()
}
