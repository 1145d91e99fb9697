//! The client facade.
//!
//! [`JobDeck`] wires a transport, the optional hub push channel, the sync
//! layer and its background tasks together. Lifecycle:
//!
//! 1. [`JobDeck::new`] builds everything; no I/O, no tasks.
//! 2. [`JobDeck::connect`] starts the event pump, fallback poller and (in
//!    mock mode) the simulation, then opens the push channel or loads the
//!    first snapshot.
//! 3. [`JobDeck::subscribe`] hands out listing subscriptions.
//! 4. [`JobDeck::shutdown`] cancels every task and closes the connection.
//!    Mandatory before drop; idempotent.

use std::sync::Arc;
use std::time::Duration;

use jobdeck_core::job::Job;
use jobdeck_core::status::{JobPriority, JobStatus};
use jobdeck_events::JobEvent;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::RestTransport;
use crate::config::{ClientConfig, TransportMode};
use crate::error::ClientResult;
use crate::hub::HubTransport;
use crate::mock::MockTransport;
use crate::push::PushChannel;
use crate::reconnect::ConnectionState;
use crate::sync::{Listing, PollPolicy, Subscription, SyncLayer};
use crate::transport::TransportAdapter;

/// How long `shutdown` waits for each background task.
const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the connection state comes from.
enum StateSource {
    /// Owned by the push channel's reconnect controller.
    Push,
    /// Fixed for transports without a push channel.
    Fixed(watch::Sender<ConnectionState>),
}

pub struct JobDeck {
    config: ClientConfig,
    sync: Arc<SyncLayer>,
    /// Transport used for fallback polls (REST in hub mode).
    poll_transport: Arc<dyn TransportAdapter>,
    push: Option<Arc<PushChannel>>,
    mock: Option<Arc<MockTransport>>,
    state: StateSource,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl JobDeck {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let mut push = None;
        let mut mock = None;
        let transport: Arc<dyn TransportAdapter>;
        let poll_transport: Arc<dyn TransportAdapter>;

        match config.transport {
            TransportMode::Mock => {
                let m = Arc::new(MockTransport::new(config.mock_latency, config.echo_names));
                transport = m.clone();
                poll_transport = m.clone();
                mock = Some(m);
            }
            TransportMode::Rest => {
                let rest = Arc::new(RestTransport::new(
                    config.api_base_url.clone(),
                    config.request_timeout,
                )?);
                transport = rest.clone();
                poll_transport = rest;
            }
            TransportMode::Hub => {
                let channel = PushChannel::new(config.hub_url.clone(), config.reconnect.clone());
                transport = Arc::new(HubTransport::new(
                    Arc::clone(&channel),
                    config.request_timeout,
                ));
                poll_transport = Arc::new(RestTransport::new(
                    config.api_base_url.clone(),
                    config.request_timeout,
                )?);
                push = Some(channel);
            }
        }

        let (state, state_rx) = match &push {
            Some(push) => (StateSource::Push, push.watch_state()),
            None => {
                // Mock pushes arrive in-process; REST has no push at all.
                let initial = if mock.is_some() {
                    ConnectionState::Connected
                } else {
                    ConnectionState::Disconnected
                };
                let (tx, rx) = watch::channel(initial);
                (StateSource::Fixed(tx), rx)
            }
        };

        Ok(Self {
            sync: Arc::new(SyncLayer::new(transport)),
            poll_transport,
            push,
            mock,
            state,
            state_rx,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn sync(&self) -> &Arc<SyncLayer> {
        &self.sync
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn subscribe(&self) -> Subscription {
        self.sync.subscribe()
    }

    pub async fn listing(&self) -> Listing {
        self.sync.listing().await
    }

    /// Start background tasks and the connection. Calling it again after
    /// the push channel gave up reconnects it manually.
    pub async fn connect(&self) -> ClientResult<()> {
        let mut tasks = self.tasks.lock().await;
        if tasks.is_empty() {
            if self.cancel.is_cancelled() {
                tracing::warn!("Connect requested after shutdown");
                return Ok(());
            }
            self.spawn_tasks(&mut tasks);
        }
        drop(tasks);

        match &self.push {
            Some(push) => {
                // The hub sends a snapshot on connect.
                push.connect().await;
            }
            None => {
                self.sync.refresh().await?;
            }
        }
        Ok(())
    }

    /// Manual recovery: reconnect the push channel if it gave up, and
    /// resynchronize from a fresh snapshot.
    pub async fn reconnect(&self) -> ClientResult<Listing> {
        if let Some(push) = &self.push {
            push.connect().await;
        }
        self.refresh().await
    }

    /// Fetch a snapshot through the polling transport (REST in hub mode).
    pub async fn refresh(&self) -> ClientResult<Listing> {
        let jobs = self.poll_transport.fetch_all().await?;
        self.sync.apply_snapshot(jobs).await;
        Ok(self.sync.listing().await)
    }

    pub async fn create(&self, name: &str, priority: JobPriority) -> ClientResult<Job> {
        self.sync.create(name, priority).await
    }

    pub async fn stop(&self, id: &str) -> ClientResult<String> {
        self.sync.stop(id).await
    }

    pub async fn restart(&self, id: &str) -> ClientResult<String> {
        self.sync.restart(id).await
    }

    pub async fn delete(&self, id: &str) -> ClientResult<()> {
        self.sync.delete(id).await
    }

    pub async fn delete_by_status(&self, status: JobStatus) -> ClientResult<usize> {
        self.sync.delete_by_status(status).await
    }

    /// Stop every task and close the push connection. Idempotent.
    pub async fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        tracing::info!(transport = self.sync.transport().name(), "Shutting down jobdeck client");
        self.cancel.cancel();

        if let Some(push) = &self.push {
            push.shutdown().await;
        }
        if let StateSource::Fixed(tx) = &self.state {
            tx.send_replace(ConnectionState::Disconnected);
        }

        let handles: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            let _ = tokio::time::timeout(TASK_STOP_TIMEOUT, handle).await;
        }
        tracing::info!("Jobdeck client shut down");
    }

    // ---- private helpers ----

    fn spawn_tasks(&self, tasks: &mut Vec<JoinHandle<()>>) {
        // Subscribe before anything connects so the first snapshot is seen.
        let events: Option<broadcast::Receiver<JobEvent>> = match (&self.push, &self.mock) {
            (Some(push), _) => Some(push.subscribe_events()),
            (None, Some(mock)) => Some(mock.bus().subscribe()),
            (None, None) => None,
        };

        if let Some(events) = events {
            tasks.push(tokio::spawn(
                Arc::clone(&self.sync).run_event_pump(events, self.cancel.child_token()),
            ));
        }

        tasks.push(tokio::spawn(Arc::clone(&self.sync).run_fallback_poller(
            Arc::clone(&self.poll_transport),
            self.state_rx.clone(),
            PollPolicy {
                grace: self.config.poll_grace,
                interval: self.config.poll_interval,
            },
            self.cancel.child_token(),
        )));

        if let Some(mock) = &self.mock {
            if self.config.simulation_interval.is_zero() {
                tracing::info!("Mock progress simulation disabled");
            } else {
                tasks.push(tokio::spawn(Arc::clone(mock).run_simulation(
                    self.config.simulation_interval,
                    self.cancel.child_token(),
                )));
            }
        }

        tracing::info!(
            transport = self.sync.transport().name(),
            tasks = tasks.len(),
            "Jobdeck client background tasks started",
        );
    }
}
