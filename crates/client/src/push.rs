//! Hub WebSocket push channel.
//!
//! [`PushChannel`] owns one long-lived connection task (connect -> process
//! frames -> wait -> reconnect) driven by a [`ReconnectController`].
//! Inbound push frames are re-published as [`JobEvent`]s; completions of
//! hub invocations go to a separate broadcast so
//! [`HubTransport`](crate::hub::HubTransport) can correlate them.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use jobdeck_events::{parse_message, Completion, HubMessage, JobEvent};
use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, ClientResult};
use crate::reconnect::{ConnectionState, ReconnectController, ReconnectPolicy};

/// Broadcast capacity for inbound events and completions.
const CHANNEL_CAPACITY: usize = 256;

/// How long `disconnect` waits for the connection task to exit.
const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(5);

type HubStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// The running connection task and its cancellation token.
struct Session {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct PushChannel {
    url: String,
    controller: Mutex<ReconnectController>,
    state_rx: watch::Receiver<ConnectionState>,
    events_tx: broadcast::Sender<JobEvent>,
    completions_tx: broadcast::Sender<Completion>,
    /// Writer for the live socket; `None` while not connected.
    outbound: RwLock<Option<mpsc::UnboundedSender<String>>>,
    session: Mutex<Option<Session>>,
    /// Master token, cancelled on shutdown.
    cancel: CancellationToken,
}

impl PushChannel {
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy) -> Arc<Self> {
        let controller = ReconnectController::new(policy);
        let state_rx = controller.subscribe();
        let (events_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (completions_tx, _) = broadcast::channel(CHANNEL_CAPACITY);

        Arc::new(Self {
            url: url.into(),
            controller: Mutex::new(controller),
            state_rx,
            events_tx,
            completions_tx,
            outbound: RwLock::new(None),
            session: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Inbound `jobs_updated` / `update_job_progress` pushes.
    pub fn subscribe_events(&self) -> broadcast::Receiver<JobEvent> {
        self.events_tx.subscribe()
    }

    /// Inbound invocation completions.
    pub fn subscribe_completions(&self) -> broadcast::Receiver<Completion> {
        self.completions_tx.subscribe()
    }

    /// Start the connection task. No-op (returns `false`) when already
    /// connecting/connected or after `shutdown`. Also the manual recovery
    /// path once the reconnect budget is exhausted.
    pub async fn connect(self: &Arc<Self>) -> bool {
        if self.cancel.is_cancelled() {
            tracing::warn!(url = %self.url, "Connect requested after shutdown");
            return false;
        }

        let mut session = self.session.lock().await;
        if !self.controller.lock().await.connect() {
            return false;
        }
        if let Some(stale) = session.take() {
            stale.cancel.cancel();
        }

        let cancel = self.cancel.child_token();
        let task_cancel = cancel.clone();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tracing::info!(url = %this.url, "Starting hub connection task");
            this.run_connection_loop(&task_cancel).await;
            tracing::info!(url = %this.url, "Hub connection task exited");
        });

        *session = Some(Session { cancel, handle });
        true
    }

    /// Close the connection and stop retrying. Idempotent.
    pub async fn disconnect(&self) {
        let session = self.session.lock().await.take();
        self.controller.lock().await.disconnect();

        if let Some(session) = session {
            session.cancel.cancel();
            let _ = tokio::time::timeout(TASK_STOP_TIMEOUT, session.handle).await;
        }
        *self.outbound.write().await = None;
    }

    /// Permanent teardown: disconnect and refuse further `connect` calls.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.disconnect().await;
    }

    /// Send one frame over the live socket.
    pub async fn send(&self, message: &HubMessage) -> ClientResult<()> {
        if self.state() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let text = message.encode()?;
        match self.outbound.read().await.as_ref() {
            Some(tx) => tx.send(text).map_err(|_| ClientError::NotConnected),
            None => Err(ClientError::NotConnected),
        }
    }

    // ---- private helpers ----

    /// Connect -> process -> reconnect, until cancelled or out of attempts.
    async fn run_connection_loop(&self, cancel: &CancellationToken) {
        loop {
            let attempt = tokio::select! {
                _ = cancel.cancelled() => return,
                result = connect_async(self.url.as_str()) => result,
            };

            match attempt {
                Ok((ws_stream, _response)) => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    *self.outbound.write().await = Some(tx);
                    self.controller.lock().await.on_connected();
                    tracing::info!(url = %self.url, "Connected to hub");

                    let reason = self.process_frames(ws_stream, rx, cancel).await;

                    *self.outbound.write().await = None;
                    tracing::info!(url = %self.url, reason, "Hub connection closed");
                }
                Err(e) => {
                    tracing::warn!(url = %self.url, error = %e, "Hub connection attempt failed");
                }
            }

            if cancel.is_cancelled() {
                return;
            }

            let next = self.controller.lock().await.on_connection_lost();
            let Some(delay) = next else {
                return;
            };

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Pump frames both ways until the socket closes or `cancel` fires.
    /// Returns a short reason for the log.
    async fn process_frames(
        &self,
        ws_stream: HubStream,
        mut outbound_rx: mpsc::UnboundedReceiver<String>,
        cancel: &CancellationToken,
    ) -> &'static str {
        let (mut sink, mut stream) = ws_stream.split();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return "cancelled";
                }
                Some(text) = outbound_rx.recv() => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        tracing::warn!(error = %e, "Failed to send hub frame");
                        return "send failed";
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_text(&text),
                    Some(Ok(Message::Close(_))) | None => return "closed by server",
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Hub read error");
                        return "read error";
                    }
                },
            }
        }
    }

    fn handle_text(&self, text: &str) {
        match parse_message(text) {
            Ok(HubMessage::Completion(completion)) => {
                let _ = self.completions_tx.send(completion);
            }
            Ok(HubMessage::Invocation(inv)) => {
                tracing::debug!(invocation_id = inv.invocation_id, "Ignoring server-sent invocation");
            }
            Ok(msg) => {
                if let Some(event) = msg.into_event() {
                    tracing::debug!(kind = event.kind(), "Hub push received");
                    let _ = self.events_tx.send(event);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable hub frame");
            }
        }
    }
}
