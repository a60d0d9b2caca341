//! IPC module for daemon-UI communication
//!
//! The UI client hosts the actual speech recognizer; it pushes transcript
//! fragments and stream lifecycle events here, and subscribed clients get
//! engine events and recognizer commands pushed back.

mod protocol;
mod server;

pub use protocol::{DaemonStatus, Mode, Notification, Request, Response};
pub use server::Server;
