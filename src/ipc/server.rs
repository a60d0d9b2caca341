//! Unix domain socket server for IPC
//!
//! Request-response communication with the UI client, plus push delivery of
//! engine events and recognizer commands to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::engine::{EngineCommand, EngineInput};
use crate::events::EngineEvent;
use crate::recognizer::RecognizerEvent;

use super::protocol::{DaemonStatus, Mode, Notification, Request, Response};

/// Upper bound on a single IPC frame
const MAX_FRAME_LEN: usize = 1024 * 1024;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    /// Inputs forwarded to the engine task
    input_tx: mpsc::Sender<EngineInput>,
    /// Fan-out of push notifications to subscribed clients
    notify_tx: broadcast::Sender<Notification>,
}

/// Shared server state
struct ServerState {
    status: DaemonStatus,
    start_time: std::time::Instant,
}

impl Server {
    /// Create a new IPC server bound to the given socket
    pub fn new(
        socket_path: &Path,
        language: &str,
        input_tx: mpsc::Sender<EngineInput>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        let (notify_tx, _) = broadcast::channel(64);

        let state = Arc::new(RwLock::new(ServerState {
            status: DaemonStatus {
                language: language.to_string(),
                ..DaemonStatus::default()
            },
            start_time: std::time::Instant::now(),
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            shutdown_tx,
            input_tx,
            notify_tx,
        })
    }

    /// Push a notification to subscribed clients
    pub fn notify(&self, notification: Notification) {
        // No subscribers is fine; the daemon runs headless until a UI connects
        let _ = self.notify_tx.send(notification);
    }

    /// Fold an engine event into the status snapshot served by `GetStatus`
    pub async fn apply_event(&self, event: &EngineEvent) {
        let mut state = self.state.write().await;
        match event {
            EngineEvent::WakeDetected => state.status.mode = Mode::Active,
            EngineEvent::StandbyResumed { .. } => state.status.mode = Mode::Standby,
            EngineEvent::ListenerStarted => state.status.master_active = true,
            EngineEvent::ListenerStopped => {
                state.status.master_active = false;
                state.status.mode = Mode::Standby;
            }
            EngineEvent::MutedChanged { muted } => state.status.muted = *muted,
            EngineEvent::Speech { .. } | EngineEvent::CommandReady { .. } => {}
        }
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let input_tx = self.input_tx.clone();
                    let notify_rx = self.notify_tx.subscribe();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_client(stream, state, input_tx, notify_rx) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Handle a single client connection
async fn handle_client(
    stream: UnixStream,
    state: Arc<RwLock<ServerState>>,
    input_tx: mpsc::Sender<EngineInput>,
    mut notify_rx: broadcast::Receiver<Notification>,
) -> Result<()> {
    let (mut reader, write_half) = stream.into_split();
    let writer = Arc::new(Mutex::new(write_half));
    let subscribed = Arc::new(AtomicBool::new(false));

    // Push notifications on the shared write half; only after Subscribe
    let notify_writer = Arc::clone(&writer);
    let notify_gate = Arc::clone(&subscribed);
    let push_task = tokio::spawn(async move {
        loop {
            match notify_rx.recv().await {
                Ok(notification) => {
                    if !notify_gate.load(Ordering::SeqCst) {
                        continue;
                    }
                    let mut writer = notify_writer.lock().await;
                    if send_message(&mut *writer, &notification).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "notification receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let result = async {
        loop {
            let Some(request) = read_message::<Request, _>(&mut reader).await? else {
                debug!("client disconnected");
                return Ok(());
            };

            debug!(?request, "received request");

            let (response, subscribe) = process_request(request, &state, &input_tx).await;
            if subscribe {
                subscribed.store(true, Ordering::SeqCst);
                debug!("client subscribed to notifications");
            }

            let mut writer = writer.lock().await;
            send_message(&mut *writer, &response).await?;
        }
    }
    .await;

    push_task.abort();
    result
}

/// Read one length-prefixed JSON message; `None` on clean disconnect
async fn read_message<T, R>(reader: &mut R) -> Result<Option<T>>
where
    T: serde::de::DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        anyhow::bail!("message too large ({len} bytes)");
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;

    let message = serde_json::from_slice(&msg_buf).context("failed to parse message")?;
    Ok(Some(message))
}

/// Send a length-prefixed JSON message
async fn send_message<T, W>(writer: &mut W, msg: &T) -> Result<()>
where
    T: serde::Serialize,
    W: AsyncWrite + Unpin,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}

/// Process a request and return a response.
/// Returns (Response, should_subscribe)
async fn process_request(
    request: Request,
    state: &Arc<RwLock<ServerState>>,
    input_tx: &mpsc::Sender<EngineInput>,
) -> (Response, bool) {
    let input = match request {
        Request::Ping => return (Response::Pong, false),

        Request::GetStatus => {
            let mut state = state.write().await;
            state.status.uptime_secs = state.start_time.elapsed().as_secs();
            return (Response::Status(state.status.clone()), false);
        }

        Request::Subscribe => return (Response::Subscribed, true),

        Request::Start => EngineInput::Command(EngineCommand::Start),
        Request::Stop => EngineInput::Command(EngineCommand::Stop),
        Request::SetMuted { muted } => EngineInput::Command(EngineCommand::SetMuted(muted)),
        Request::Fragments { fragments } => {
            EngineInput::Recognizer(RecognizerEvent::Results { fragments })
        }
        Request::StreamStarted => EngineInput::Recognizer(RecognizerEvent::Started),
        Request::StreamEnded => EngineInput::Recognizer(RecognizerEvent::Ended),
        Request::StreamError { reason } => {
            EngineInput::Recognizer(RecognizerEvent::Error { reason })
        }
    };

    match input_tx.send(input).await {
        Ok(()) => (Response::Ack, false),
        Err(e) => {
            error!(?e, "engine input channel closed");
            (
                Response::Error {
                    code: "engine_unavailable".to_string(),
                    message: "engine is not running".to_string(),
                },
                false,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::{RecognizerCommand, TranscriptFragment};

    fn test_state() -> Arc<RwLock<ServerState>> {
        Arc::new(RwLock::new(ServerState {
            status: DaemonStatus::default(),
            start_time: std::time::Instant::now(),
        }))
    }

    async fn send_request(client: &mut UnixStream, request: &Request) {
        send_message(client, request).await.unwrap();
    }

    async fn recv_response(client: &mut UnixStream) -> Response {
        read_message(client).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_ping_pong_over_socket_pair() {
        let (mut client, server_end) = UnixStream::pair().unwrap();
        let (input_tx, _input_rx) = mpsc::channel(8);
        let (_notify_tx, notify_rx) = broadcast::channel::<Notification>(8);

        tokio::spawn(handle_client(server_end, test_state(), input_tx, notify_rx));

        send_request(&mut client, &Request::Ping).await;
        assert!(matches!(recv_response(&mut client).await, Response::Pong));
    }

    #[tokio::test]
    async fn test_fragments_are_forwarded_to_engine() {
        let (mut client, server_end) = UnixStream::pair().unwrap();
        let (input_tx, mut input_rx) = mpsc::channel(8);
        let (_notify_tx, notify_rx) = broadcast::channel::<Notification>(8);

        tokio::spawn(handle_client(server_end, test_state(), input_tx, notify_rx));

        let request = Request::Fragments {
            fragments: vec![TranscriptFragment::partial("hey vyom")],
        };
        send_request(&mut client, &request).await;
        assert!(matches!(recv_response(&mut client).await, Response::Ack));

        match input_rx.recv().await.unwrap() {
            EngineInput::Recognizer(RecognizerEvent::Results { fragments }) => {
                assert_eq!(fragments[0].text, "hey vyom");
            }
            other => panic!("unexpected input: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_notifications_only_after_subscribe() {
        let (mut client, server_end) = UnixStream::pair().unwrap();
        let (input_tx, _input_rx) = mpsc::channel(8);
        let (notify_tx, notify_rx) = broadcast::channel::<Notification>(8);

        tokio::spawn(handle_client(server_end, test_state(), input_tx, notify_rx));

        send_request(&mut client, &Request::Subscribe).await;
        assert!(matches!(
            recv_response(&mut client).await,
            Response::Subscribed
        ));

        notify_tx
            .send(Notification::Recognizer {
                command: RecognizerCommand::Start,
            })
            .unwrap();

        let pushed: Notification = read_message(&mut client).await.unwrap().unwrap();
        assert!(matches!(
            pushed,
            Notification::Recognizer {
                command: RecognizerCommand::Start
            }
        ));
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let state = test_state();
        let (input_tx, _input_rx) = mpsc::channel(8);

        let (response, subscribe) =
            process_request(Request::GetStatus, &state, &input_tx).await;
        assert!(!subscribe);
        match response {
            Response::Status(status) => {
                assert_eq!(status.mode, Mode::Standby);
                assert!(!status.master_active);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, server_end) = UnixStream::pair().unwrap();
        let (input_tx, _input_rx) = mpsc::channel(8);
        let (_notify_tx, notify_rx) = broadcast::channel::<Notification>(8);

        let handle = tokio::spawn(handle_client(server_end, test_state(), input_tx, notify_rx));

        let huge = ((MAX_FRAME_LEN + 1) as u32).to_le_bytes();
        client.write_all(&huge).await.unwrap();
        client.flush().await.unwrap();

        assert!(handle.await.unwrap().is_err());
    }
}
