//! vyom-voice-daemon: voice command dispatcher for the Vyom assistant
//!
//! The daemon turns a continuous, noisy, partial-result transcript stream
//! into discrete commands:
//! - Wake word detection over normalized transcript fragments
//! - Silence-debounced command finalization (silence is the only
//!   completion heuristic)
//! - Mute-while-speaking suppression so the assistant never hears itself
//! - Automatic recovery when the recognition stream terminates
//!
//! The speech recognizer itself lives in the UI client, which exchanges
//! fragments, engine events, and stream commands over a Unix socket.

mod config;
mod engine;
mod events;
mod ipc;
mod lifecycle;
mod recognizer;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::engine::{Engine, EngineInput};
use crate::events::EngineEvent;
use crate::ipc::{Notification, Server};
use crate::lifecycle::ShutdownSignal;
use crate::recognizer::{ChannelControl, RecognizerCommand};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "vyom-voice-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        wake_words = ?config.wake_words,
        silence_delay_ms = config.silence_delay.as_millis() as u64,
        "configuration loaded"
    );

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Channels for inter-component communication:
    // IPC clients and timers -> engine
    let (input_tx, input_rx) = mpsc::channel::<EngineInput>(64);
    // Engine -> IPC layer (events for subscribed clients and status)
    let (event_tx, _event_rx) = broadcast::channel::<EngineEvent>(64);
    // Engine -> recognizer peer (stream start/stop commands)
    let (command_tx, _command_rx) = broadcast::channel::<RecognizerCommand>(16);

    // Create the engine with a channel-backed recognizer control
    let control = ChannelControl::new(command_tx.clone());
    let engine = Engine::new(&config, event_tx.clone(), Box::new(control));

    // Create the IPC server
    let server = Server::new(&config.socket_path, &config.language, input_tx.clone())?;

    let mut engine_event_rx = event_tx.subscribe();
    let mut recognizer_command_rx = command_tx.subscribe();

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the engine (processes commands, fragments, timer expiries)
        _ = engine.run(input_rx) => {
            info!("engine exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Bridge engine events to the status snapshot and subscribed clients
        _ = async {
            loop {
                match engine_event_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "engine event");
                        server.apply_event(&event).await;
                        server.notify(Notification::Engine { event });
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "engine event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("engine event bridge exited");
        }

        // Relay recognizer commands to the client that owns the stream
        _ = async {
            loop {
                match recognizer_command_rx.recv().await {
                    Ok(command) => {
                        server.notify(Notification::Recognizer { command });
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "recognizer command receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("recognizer command bridge exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    server.shutdown().await;

    info!("vyom-voice-daemon stopped");

    Ok(())
}
