//! `InterceptSession` (spec.md §4.4): one operator control channel and the
//! mutable intercept options shared by every `ConnectionHandler` it spawns.
//!
//! The demultiplexer here plays the role of the original's
//! `HandleProxy`/`proxy.New`/`prox.Spawn` trio
//! (`original_source/server/internal/api/get_project_proxy.go`,
//! `internal/proxy/command.go`): a dedicated reader validates each inbound
//! control frame and either mutates the shared `Options` (`Start`/`Stop`) or
//! routes it to whichever `ConnectionHandler` is currently stalled
//! (`Forward`/`Drop`).

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ProxyDefaults;
use crate::engine::control::{Command, StallDirection, StallNotification};
use crate::engine::errors::ProxyError;
use crate::store::RecordStore;

/// Mutable intercept options shared between the demultiplexer (writer) and
/// every `ConnectionHandler` spawned by this session (reader). Spec.md §5
/// notes that because handlers run strictly sequentially and the
/// demultiplexer is a single task, a plain flag with relaxed-but-monotonic
/// visibility suffices — `stall_enabled` is the only field the control
/// channel mutates after construction, so it alone needs to be atomic.
#[derive(Debug)]
pub struct Options {
    pub listen_port: u16,
    pub intercept_client: bool,
    pub intercept_server: bool,
    stall_enabled: AtomicBool,
}

impl Options {
    pub fn new(defaults: &ProxyDefaults) -> Self {
        Options {
            listen_port: defaults.listen_port,
            intercept_client: defaults.intercept_client,
            intercept_server: defaults.intercept_server,
            stall_enabled: AtomicBool::new(defaults.stall_enabled),
        }
    }

    pub fn stall_enabled(&self) -> bool {
        self.stall_enabled.load(Ordering::Acquire)
    }

    fn set_stall_enabled(&self, value: bool) {
        self.stall_enabled.store(value, Ordering::Release);
    }
}

/// One operator control channel and the transactions it authorizes
/// (spec.md §4.4). Shared via `Arc` between the control-channel tasks and
/// the sequential `Router` accept loop.
pub struct InterceptSession<S: RecordStore> {
    pub project_id: Uuid,
    pub store: Arc<S>,
    pub options: Arc<Options>,

    /// Single-slot rendezvous: the demultiplexer enqueues one `Forward`/`Drop`
    /// at a time, and at most one `ConnectionHandler` is ever waiting on it
    /// (spec.md §4.4's "never ambiguous" guarantee, backed by the Router's
    /// sequential dispatch contract in spec.md §5).
    intercept_rx: Mutex<mpsc::Receiver<Command>>,
    /// Outbound `Stall` notifications, drained by the control-channel sink task.
    stall_tx: mpsc::UnboundedSender<StallNotification>,
}

impl<S: RecordStore> InterceptSession<S> {
    /// Wraps an already-upgraded control WebSocket, spawning the
    /// demultiplexer (inbound reader) and the stall-notification sink as
    /// background tasks, and returns the shared session handle the `Router`
    /// dispatches `ConnectionHandler`s against.
    pub fn spawn<T>(
        project_id: Uuid,
        store: Arc<S>,
        defaults: &ProxyDefaults,
        socket: WebSocketStream<T>,
    ) -> Arc<Self>
    where
        T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let options = Arc::new(Options::new(defaults));
        let (intercept_tx, intercept_rx) = mpsc::channel(1);
        let (stall_tx, mut stall_rx) = mpsc::unbounded_channel::<StallNotification>();

        let session = Arc::new(InterceptSession {
            project_id,
            store,
            options: options.clone(),
            intercept_rx: Mutex::new(intercept_rx),
            stall_tx,
        });

        let (mut sink, mut stream) = socket.split();

        // Stall-notification sink: forwards queued `Stall` frames to the
        // operator as they're produced by `ConnectionHandler`s.
        tokio::spawn(async move {
            while let Some(notification) = stall_rx.recv().await {
                if sink.send(Message::Text(notification.to_json())).await.is_err() {
                    break;
                }
            }
        });

        // Demultiplexer: validates inbound frames, routes Start/Stop to
        // `options`, Forward/Drop to `intercept_tx` (spec.md §4.4).
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };

                match Command::parse(&text) {
                    Ok(Command::Start) => {
                        options.set_stall_enabled(true);
                        debug!(project_id = %project_id, "stalling enabled");
                    }
                    Ok(Command::Stop) => {
                        options.set_stall_enabled(false);
                        debug!(project_id = %project_id, "stalling disabled");
                    }
                    Ok(cmd @ (Command::Forward(_) | Command::Drop)) => {
                        if intercept_tx.send(cmd).await.is_err() {
                            break;
                        }
                    }
                    Ok(Command::Stall) => {
                        // Spec.md §4.3 lists `Stall` as outbound-only; an
                        // inbound one carries no actionable payload here.
                    }
                    Err(err) => {
                        warn!(project_id = %project_id, %err, "rejected control command");
                    }
                }
            }
            // Dropping `intercept_tx` here cancels any in-flight stall as a
            // `Drop` (spec.md §5: "Closure of the control channel...").
        });

        session
    }

    /// The stall step (spec.md §4.5, "the hardest single operation"): emits a
    /// `Stall` notification carrying `bytes` and blocks for the operator's
    /// `Forward`/`Drop`. Control-channel closure is indistinguishable from an
    /// explicit `Drop`.
    pub async fn stall(&self, direction: StallDirection, bytes: &[u8]) -> Result<Vec<u8>, ProxyError> {
        let notification = StallNotification::new(direction, bytes);
        // Send-before-await ordering guarantees the operator observes the
        // stalled bytes strictly before a Forward/Drop can be read back
        // (spec.md §5's ordering guarantee).
        self.stall_tx
            .send(notification)
            .map_err(|_| ProxyError::Dropped)?;

        let mut rx = self.intercept_rx.lock().await;
        match rx.recv().await {
            Some(Command::Forward(data)) => Ok(data),
            Some(Command::Drop) | None => Err(ProxyError::Dropped),
            Some(_) => Err(ProxyError::Dropped),
        }
    }
}

#[cfg(test)]
impl<S: RecordStore> InterceptSession<S> {
    /// Builds a session with its channels exposed directly, skipping the
    /// WebSocket upgrade entirely — used by this module's own tests and by
    /// `engine::connection`'s transaction tests, which only care about the
    /// stall rendezvous and never drive a real control socket.
    pub(crate) fn new_for_test(
        project_id: Uuid,
        store: Arc<S>,
        defaults: &ProxyDefaults,
    ) -> (Arc<Self>, mpsc::Sender<Command>, mpsc::UnboundedReceiver<StallNotification>) {
        let options = Arc::new(Options::new(defaults));
        let (intercept_tx, intercept_rx) = mpsc::channel(1);
        let (stall_tx, stall_rx) = mpsc::unbounded_channel();

        let session = Arc::new(InterceptSession {
            project_id,
            store,
            options,
            intercept_rx: Mutex::new(intercept_rx),
            stall_tx,
        });

        (session, intercept_tx, stall_rx)
    }
}
