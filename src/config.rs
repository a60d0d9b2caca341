//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Default wake phrases, matched as case-insensitive substrings
const DEFAULT_WAKE_WORDS: &[&str] = &["hey vyom", "hello vyom", "vyom", "ok vyom"];

/// Silence after the last transcript fragment that finalizes a command
const DEFAULT_SILENCE_DELAY_MS: u64 = 1500;

/// Pause between stopping and restarting the recognition stream after a
/// wake word, letting the stream flush residual audio context
const DEFAULT_RESTART_DELAY_MS: u64 = 200;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Wake phrases, stored normalized (lowercased, trimmed)
    pub wake_words: Vec<String>,

    /// Debounce interval interpreted as "user finished speaking"
    pub silence_delay: Duration,

    /// Flush pause for the post-wake stream restart
    pub restart_delay: Duration,

    /// Language hint passed to the recognizer peer
    pub language: String,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("vyom");

        let socket_path = match std::env::var("VYOM_SOCKET_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => data_dir.join("voiced.sock"),
        };

        let wake_words = match std::env::var("VYOM_WAKE_WORDS") {
            Ok(raw) => parse_wake_words(&raw)
                .context("VYOM_WAKE_WORDS must contain at least one non-empty phrase")?,
            Err(_) => DEFAULT_WAKE_WORDS.iter().map(|w| (*w).to_string()).collect(),
        };

        let silence_delay = Duration::from_millis(parse_delay_ms(
            "VYOM_SILENCE_DELAY_MS",
            DEFAULT_SILENCE_DELAY_MS,
        )?);
        let restart_delay = Duration::from_millis(parse_delay_ms(
            "VYOM_RESTART_DELAY_MS",
            DEFAULT_RESTART_DELAY_MS,
        )?);

        Ok(Self {
            socket_path,
            data_dir,
            wake_words,
            silence_delay,
            restart_delay,
            language: "en-IN".to_string(),
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

/// Parse a comma-separated wake word list, normalizing each entry
fn parse_wake_words(raw: &str) -> Option<Vec<String>> {
    let words: Vec<String> = raw
        .split(',')
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words)
    }
}

/// Read a millisecond delay from the environment, falling back to a default
fn parse_delay_ms(var: &str, default: u64) -> Result<u64> {
    match std::env::var(var) {
        Ok(raw) => {
            let ms: u64 = raw
                .parse()
                .with_context(|| format!("{var} must be an integer millisecond count"))?;
            Ok(ms)
        }
        Err(_) => Ok(default),
    }
}
