//! Client-side synchronization layer.
//!
//! [`SyncLayer`] keeps a local [`JobStore`] in step with the backend:
//!
//! - full snapshots replace the store, deltas patch it;
//! - every applied change bumps a monotonic revision and notifies every
//!   [`Subscription`] with the full listing;
//! - commands are validated locally, sent through the transport, and on
//!   success reflected in the store;
//! - while the push channel is not Connected for longer than a grace
//!   period, a fallback poller refreshes the listing on an interval.
//!
//! Ordering is last-applied-wins by arrival order. A delta for an id the
//! store does not know (for example a job deleted locally a moment ago) is
//! dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jobdeck_core::job::{Job, SyncUpdate};
use jobdeck_core::status::{JobPriority, JobStatus};
use jobdeck_core::store::JobStore;
use jobdeck_core::transitions::{validate_bulk_delete, validate_transition, JobAction};
use jobdeck_core::validation::validate_job_name;
use jobdeck_events::JobEvent;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::ClientResult;
use crate::reconnect::ConnectionState;
use crate::transport::TransportAdapter;

/// Buffered notifications per subscriber before it starts lagging.
const LISTING_CHANNEL_CAPACITY: usize = 64;

/// A full job listing tagged with the revision it reflects.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub revision: u64,
    pub jobs: Arc<Vec<Job>>,
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Receives a [`Listing`] after every applied change. Dropping it
/// unsubscribes.
pub struct Subscription {
    rx: broadcast::Receiver<Listing>,
}

impl Subscription {
    /// Next listing, or `None` once the sync layer is gone. A subscriber
    /// that fell behind skips straight to the newer listings; each one is
    /// complete, so nothing is lost but intermediate states.
    pub async fn recv(&mut self) -> Option<Listing> {
        loop {
            match self.rx.recv().await {
                Ok(listing) => return Some(listing),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Listing subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Listing> {
        loop {
            match self.rx.try_recv() {
                Ok(listing) => return Some(listing),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Fallback polling
// ---------------------------------------------------------------------------

/// When and how often to poll while the push channel is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub grace: Duration,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            interval: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// SyncLayer
// ---------------------------------------------------------------------------

pub struct SyncLayer {
    transport: Arc<dyn TransportAdapter>,
    store: RwLock<JobStore>,
    revision: AtomicU64,
    listings: broadcast::Sender<Listing>,
}

impl SyncLayer {
    pub fn new(transport: Arc<dyn TransportAdapter>) -> Self {
        let (listings, _) = broadcast::channel(LISTING_CHANNEL_CAPACITY);
        Self {
            transport,
            store: RwLock::new(JobStore::new()),
            revision: AtomicU64::new(0),
            listings,
        }
    }

    pub fn transport(&self) -> &Arc<dyn TransportAdapter> {
        &self.transport
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.listings.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listings.receiver_count()
    }

    /// Number of changes applied so far.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    pub async fn listing(&self) -> Listing {
        let store = self.store.read().await;
        Listing {
            revision: self.revision(),
            jobs: Arc::new(store.snapshot()),
        }
    }

    pub async fn jobs(&self) -> Vec<Job> {
        self.store.read().await.snapshot()
    }

    pub async fn get(&self, id: &str) -> Option<Job> {
        self.store.read().await.get(id).cloned()
    }

    // ---- inbound updates ----

    /// Replace the local store with a full listing.
    pub async fn apply_snapshot(&self, jobs: Vec<Job>) {
        let mut store = self.store.write().await;
        store.replace_all(jobs);
        tracing::debug!(count = store.len(), "Snapshot applied");
        self.commit(&store);
    }

    /// Patch one job. Returns `false` when the id is unknown.
    pub async fn apply_delta(&self, update: &SyncUpdate) -> bool {
        let mut store = self.store.write().await;
        if !store.patch(update, Utc::now()) {
            tracing::debug!(job_id = %update.id, "Dropping delta for unknown job");
            return false;
        }
        self.commit(&store);
        true
    }

    pub async fn apply_event(&self, event: JobEvent) {
        match event {
            JobEvent::JobsUpdated(jobs) => self.apply_snapshot(jobs).await,
            JobEvent::JobProgress(update) => {
                self.apply_delta(&update).await;
            }
        }
    }

    /// Apply pushed events until the source closes or `cancel` fires.
    pub async fn run_event_pump(
        self: Arc<Self>,
        mut events: broadcast::Receiver<JobEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = events.recv() => match received {
                    Ok(event) => self.apply_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        // Deltas were lost; resynchronize from a snapshot.
                        tracing::warn!(skipped, "Event pump lagged, refreshing");
                        if let Err(e) = self.refresh().await {
                            tracing::warn!(error = %e, "Refresh after lag failed");
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        tracing::debug!("Event pump stopped");
    }

    /// Poll `fetcher` while `state` is not Connected.
    ///
    /// Polling starts once the channel has been down for `policy.grace` and
    /// repeats every `policy.interval` until it reports Connected again.
    /// Exits on cancel or when the state sender is dropped.
    pub async fn run_fallback_poller(
        self: Arc<Self>,
        fetcher: Arc<dyn TransportAdapter>,
        mut state: watch::Receiver<ConnectionState>,
        policy: PollPolicy,
        cancel: CancellationToken,
    ) {
        'outer: loop {
            // Wait for the channel to leave Connected.
            while *state.borrow_and_update() == ConnectionState::Connected {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    changed = state.changed() => if changed.is_err() { return },
                }
            }

            // Grace period; abandoned if the channel recovers meanwhile.
            let grace = tokio::time::sleep(policy.grace);
            tokio::pin!(grace);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = &mut grace => break,
                    changed = state.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if *state.borrow_and_update() == ConnectionState::Connected {
                            continue 'outer;
                        }
                    }
                }
            }

            tracing::info!(
                interval_secs = policy.interval.as_secs(),
                transport = fetcher.name(),
                "Push channel down, starting fallback polling",
            );
            let mut ticker = tokio::time::interval(policy.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        match fetcher.fetch_all().await {
                            Ok(jobs) => self.apply_snapshot(jobs).await,
                            Err(e) => tracing::warn!(error = %e, "Fallback poll failed"),
                        }
                    }
                    changed = state.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if *state.borrow_and_update() == ConnectionState::Connected {
                            tracing::info!("Push channel recovered, stopping fallback polling");
                            continue 'outer;
                        }
                    }
                }
            }
        }
    }

    // ---- commands ----

    /// Fetch the full listing through the transport and apply it.
    pub async fn refresh(&self) -> ClientResult<Listing> {
        let jobs = self.transport.fetch_all().await?;
        self.apply_snapshot(jobs).await;
        Ok(self.listing().await)
    }

    /// Validate the name locally, create remotely, then insert.
    pub async fn create(&self, name: &str, priority: JobPriority) -> ClientResult<Job> {
        let name = validate_job_name(name)?;
        let job = self.transport.create(&name, priority).await?;

        let mut store = self.store.write().await;
        store.insert(job.clone());
        self.commit(&store);
        tracing::info!(job_id = %job.id, name = %job.name, priority = %job.priority, "Job created");
        Ok(job)
    }

    pub async fn stop(&self, id: &str) -> ClientResult<String> {
        self.precheck(id, JobAction::Stop).await?;
        let result = self.transport.stop(id).await?;
        self.reflect(id, JobAction::Stop).await;
        Ok(result.message)
    }

    pub async fn restart(&self, id: &str) -> ClientResult<String> {
        self.precheck(id, JobAction::Restart).await?;
        let result = self.transport.restart(id).await?;
        self.reflect(id, JobAction::Restart).await;
        Ok(result.message)
    }

    pub async fn delete(&self, id: &str) -> ClientResult<()> {
        self.precheck(id, JobAction::Delete).await?;
        self.transport.delete(id).await?;
        self.reflect(id, JobAction::Delete).await;
        Ok(())
    }

    /// Returns the number of jobs the backend removed.
    pub async fn delete_by_status(&self, status: JobStatus) -> ClientResult<usize> {
        validate_bulk_delete(status)?;
        let deleted = self.transport.delete_by_status(status).await?;

        let mut store = self.store.write().await;
        let local = store.delete_by_status(status).unwrap_or(0);
        self.commit(&store);
        tracing::info!(status = %status, deleted, local, "Jobs deleted by status");
        Ok(deleted)
    }

    // ---- private helpers ----

    /// Reject an action the local copy already says is invalid. Unknown
    /// ids go to the backend, which has the final word.
    async fn precheck(&self, id: &str, action: JobAction) -> ClientResult<()> {
        if let Some(job) = self.store.read().await.get(id) {
            validate_transition(action, job.status)?;
        }
        Ok(())
    }

    /// Mirror a successful remote action locally.
    async fn reflect(&self, id: &str, action: JobAction) {
        let mut store = self.store.write().await;
        match store.apply_transition(id, action) {
            Ok(_) => {
                tracing::info!(job_id = %id, action = %action, "Job action applied");
                self.commit(&store);
            }
            Err(e) => {
                // The next snapshot reconciles.
                tracing::debug!(job_id = %id, action = %action, error = %e, "Local mirror skipped");
            }
        }
    }

    /// Bump the revision and notify subscribers. Called with the store
    /// lock held so revisions and listings are published in order.
    fn commit(&self, store: &JobStore) {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        let listing = Listing {
            revision,
            jobs: Arc::new(store.snapshot()),
        };
        // No receivers is fine.
        let _ = self.listings.send(listing);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use jobdeck_core::job::ActionResult;

    use super::*;
    use crate::error::ClientError;
    use crate::mock::MockTransport;

    fn job(name: &str, status: JobStatus, progress: i16) -> Job {
        let mut j = Job::new(name, JobPriority::Regular, Utc::now());
        j.status = status;
        j.progress = progress;
        j
    }

    fn layer_with(jobs: Vec<Job>) -> Arc<SyncLayer> {
        Arc::new(SyncLayer::new(Arc::new(MockTransport::with_jobs(
            jobs,
            Duration::ZERO,
            false,
        ))))
    }

    /// Transport that counts calls and serves an empty listing.
    #[derive(Default)]
    struct CountingTransport {
        fetches: AtomicUsize,
        mutations: AtomicUsize,
    }

    #[async_trait]
    impl TransportAdapter for CountingTransport {
        fn name(&self) -> &'static str {
            "counting"
        }
        async fn fetch_all(&self) -> ClientResult<Vec<Job>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
        async fn create(&self, name: &str, priority: JobPriority) -> ClientResult<Job> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            Ok(Job::new(name, priority, Utc::now()))
        }
        async fn stop(&self, _id: &str) -> ClientResult<ActionResult> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            Ok(ActionResult::ok("ok"))
        }
        async fn restart(&self, _id: &str) -> ClientResult<ActionResult> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            Ok(ActionResult::ok("ok"))
        }
        async fn delete(&self, _id: &str) -> ClientResult<()> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn delete_by_status(&self, _status: JobStatus) -> ClientResult<usize> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn snapshot_notifies_every_subscriber() {
        let layer = layer_with(Vec::new());
        let mut a = layer.subscribe();
        let mut b = layer.subscribe();

        layer
            .apply_snapshot(vec![job("one job", JobStatus::Pending, 0)])
            .await;

        let la = a.recv().await.unwrap();
        let lb = b.recv().await.unwrap();
        assert_eq!(la.revision, 1);
        assert_eq!(la.jobs.len(), 1);
        assert_eq!(la, lb);
    }

    #[tokio::test]
    async fn dropped_subscription_unsubscribes() {
        let layer = layer_with(Vec::new());
        let a = layer.subscribe();
        let _b = layer.subscribe();
        assert_eq!(layer.subscriber_count(), 2);

        drop(a);
        assert_eq!(layer.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn delta_for_unknown_id_changes_nothing() {
        let layer = layer_with(Vec::new());
        layer
            .apply_snapshot(vec![job("known", JobStatus::Running, 10)])
            .await;
        let mut sub = layer.subscribe();
        let before = layer.listing().await;

        let applied = layer
            .apply_delta(&SyncUpdate {
                id: "ghost".into(),
                status: JobStatus::Running,
                progress: 90,
                name: None,
            })
            .await;

        assert!(!applied);
        assert_eq!(layer.listing().await, before);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn report_delta_completes_job() {
        let report = job("Report X", JobStatus::Running, 30);
        let id = report.id.clone();
        let layer = layer_with(Vec::new());
        layer.apply_snapshot(vec![report]).await;
        let mut sub = layer.subscribe();

        layer
            .apply_event(JobEvent::JobProgress(SyncUpdate {
                id: id.clone(),
                status: JobStatus::Running,
                progress: 100,
                name: None,
            }))
            .await;

        let listing = sub.recv().await.unwrap();
        let j = listing.jobs.iter().find(|j| j.id == id).unwrap();
        assert_eq!(j.status, JobStatus::Completed);
        assert_eq!(j.progress, 100);
        assert!(j.completed_at.is_some());
    }

    #[tokio::test]
    async fn revision_is_monotonic() {
        let layer = layer_with(Vec::new());
        let r0 = layer.revision();
        layer.apply_snapshot(Vec::new()).await;
        layer.apply_snapshot(Vec::new()).await;
        assert_eq!(layer.revision(), r0 + 2);
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn invalid_name_rejected_before_network() {
        let transport = Arc::new(CountingTransport::default());
        let layer = SyncLayer::new(transport.clone());

        assert_matches!(
            layer.create("x!", JobPriority::Regular).await,
            Err(ClientError::Validation(_))
        );
        assert_eq!(transport.mutations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn known_invalid_transition_rejected_locally() {
        let transport = Arc::new(CountingTransport::default());
        let layer = SyncLayer::new(transport.clone());
        let done = job("done", JobStatus::Completed, 100);
        let id = done.id.clone();
        layer.apply_snapshot(vec![done]).await;

        assert_matches!(layer.stop(&id).await, Err(ClientError::NotAllowed(_)));
        assert_matches!(
            layer.delete_by_status(JobStatus::Running).await,
            Err(ClientError::NotAllowed(_))
        );
        assert_eq!(transport.mutations.load(Ordering::SeqCst), 0);
        assert_eq!(layer.get(&id).await.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn create_then_stop_pending_rejected() {
        let layer = layer_with(Vec::new());
        layer.refresh().await.unwrap();

        let created = layer.create("Nightly Backup", JobPriority::High).await.unwrap();
        let jobs = layer.jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Pending);
        assert_eq!(jobs[0].progress, 0);
        assert_eq!(jobs[0].priority, JobPriority::High);

        assert_matches!(layer.stop(&created.id).await, Err(ClientError::NotAllowed(_)));
        assert_eq!(layer.get(&created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn bulk_delete_completed_leaves_running() {
        let layer = layer_with(vec![
            job("c1 job", JobStatus::Completed, 100),
            job("c2 job", JobStatus::Completed, 100),
            job("c3 job", JobStatus::Completed, 100),
            job("r1 job", JobStatus::Running, 10),
            job("r2 job", JobStatus::Running, 20),
        ]);
        layer.refresh().await.unwrap();

        let deleted = layer.delete_by_status(JobStatus::Completed).await.unwrap();

        assert_eq!(deleted, 3);
        let jobs = layer.jobs().await;
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.status == JobStatus::Running));
    }

    #[tokio::test]
    async fn restart_failed_job_mirrors_locally() {
        let mut failed = job("Failed Job", JobStatus::Failed, 45);
        failed.error_message = Some("Connection timeout".into());
        let id = failed.id.clone();
        let layer = layer_with(vec![failed]);
        layer.refresh().await.unwrap();

        let message = layer.restart(&id).await.unwrap();

        assert_eq!(message, "Job restarted successfully");
        let j = layer.get(&id).await.unwrap();
        assert_eq!(j.status, JobStatus::Pending);
        assert_eq!(j.progress, 0);
        assert!(j.error_message.is_none());
    }

    #[tokio::test]
    async fn deleted_job_stays_gone_after_snapshot() {
        let done = job("Backup Job", JobStatus::Completed, 100);
        let id = done.id.clone();
        let layer = layer_with(vec![done, job("keep", JobStatus::Running, 5)]);
        layer.refresh().await.unwrap();

        layer.delete(&id).await.unwrap();
        layer.refresh().await.unwrap();

        assert!(layer.get(&id).await.is_none());
        assert_eq!(layer.jobs().await.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Fallback polling
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn polls_after_grace_until_connected() {
        let transport = Arc::new(CountingTransport::default());
        let layer = Arc::new(SyncLayer::new(transport.clone()));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Reconnecting);
        let cancel = CancellationToken::new();
        let policy = PollPolicy {
            grace: Duration::from_secs(5),
            interval: Duration::from_secs(10),
        };

        let handle = tokio::spawn(Arc::clone(&layer).run_fallback_poller(
            transport.clone(),
            state_rx,
            policy,
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(transport.fetches.load(Ordering::SeqCst), 0);

        // First poll fires right after the grace period, then every 10s.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(transport.fetches.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.fetches.load(Ordering::SeqCst), 2);

        state_tx.send_replace(ConnectionState::Connected);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.fetches.load(Ordering::SeqCst), 2);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn short_outage_within_grace_does_not_poll() {
        let transport = Arc::new(CountingTransport::default());
        let layer = Arc::new(SyncLayer::new(transport.clone()));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(Arc::clone(&layer).run_fallback_poller(
            transport.clone(),
            state_rx,
            PollPolicy {
                grace: Duration::from_secs(5),
                interval: Duration::from_secs(10),
            },
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        state_tx.send_replace(ConnectionState::Reconnecting);
        tokio::time::sleep(Duration::from_secs(3)).await;
        state_tx.send_replace(ConnectionState::Connected);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(transport.fetches.load(Ordering::SeqCst), 0);
        cancel.cancel();
        handle.await.unwrap();
    }
}
