//! The jobdeck client against a live server over both transports.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use assert_matches::assert_matches;
use jobdeck_client::api::RestTransport;
use jobdeck_client::{
    ClientConfig, ClientError, ConnectionState, JobDeck, Listing, Subscription, TransportAdapter,
    TransportMode,
};
use jobdeck_core::job::CreateJob;
use jobdeck_core::status::{JobPriority, JobStatus};

const WAIT: Duration = Duration::from_secs(5);

fn hub_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        transport: TransportMode::Hub,
        api_base_url: format!("http://{addr}/api/v1"),
        hub_url: format!("ws://{addr}/api/v1/hub"),
        request_timeout: WAIT,
        ..ClientConfig::default()
    }
}

/// Wait for the first listing that satisfies `pred`.
async fn wait_for_listing(sub: &mut Subscription, pred: impl Fn(&Listing) -> bool) -> Listing {
    tokio::time::timeout(WAIT, async {
        loop {
            let listing = sub.recv().await.expect("subscription closed");
            if pred(&listing) {
                return listing;
            }
        }
    })
    .await
    .expect("timed out waiting for listing")
}

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rest_transport_maps_server_errors() {
    let (addr, _state, cancel) = common::spawn_server().await;
    let rest = RestTransport::new(format!("http://{addr}/api/v1/"), WAIT).unwrap();

    assert_eq!(rest.fetch_all().await.unwrap().len(), 8);

    let job = rest.create("Nightly Backup", JobPriority::High).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);

    assert_matches!(
        rest.create("no", JobPriority::Regular).await,
        Err(ClientError::Validation(_))
    );
    assert_matches!(rest.stop(&job.id).await, Err(ClientError::NotAllowed(_)));
    assert_matches!(rest.delete("missing").await, Err(ClientError::NotFound(_)));

    assert_eq!(rest.stop("1").await.unwrap().message, "Job stopped successfully");
    assert_eq!(rest.delete_by_status(JobStatus::Completed).await.unwrap(), 2);

    cancel.cancel();
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hub_client_receives_snapshot_and_commands_roundtrip() {
    let (addr, _state, cancel) = common::spawn_server().await;
    let deck = JobDeck::new(hub_config(addr)).unwrap();
    let mut sub = deck.subscribe();

    deck.connect().await.unwrap();
    let first = wait_for_listing(&mut sub, |l| !l.jobs.is_empty()).await;
    assert_eq!(first.jobs.len(), 8);
    assert_eq!(deck.connection_state(), ConnectionState::Connected);

    let job = deck.create("Nightly Backup", JobPriority::High).await.unwrap();
    assert_eq!(deck.sync().get(&job.id).await.unwrap().priority, JobPriority::High);

    assert_eq!(deck.stop("1").await.unwrap(), "Job stopped successfully");
    assert_eq!(deck.sync().get("1").await.unwrap().status, JobStatus::Stopped);

    // Server-side rejection travels back as a typed error.
    assert_matches!(
        deck.sync().transport().delete("5").await,
        Err(ClientError::NotAllowed(_))
    );

    deck.shutdown().await;
    cancel.cancel();
}

#[tokio::test]
async fn hub_client_sees_changes_made_elsewhere() {
    let (addr, state, cancel) = common::spawn_server().await;
    let deck = JobDeck::new(hub_config(addr)).unwrap();
    let mut sub = deck.subscribe();

    deck.connect().await.unwrap();
    wait_for_listing(&mut sub, |l| l.jobs.len() == 8).await;

    // Another client creates a job; the hub pushes the new listing.
    state
        .jobs
        .create(CreateJob {
            name: "Report X".into(),
            priority: JobPriority::Regular,
        })
        .await
        .unwrap();
    let listing = wait_for_listing(&mut sub, |l| l.jobs.len() == 9).await;
    assert!(listing.jobs.iter().any(|j| j.name == "Report X"));

    // And a progress delta for a stop.
    state.jobs.stop("5").await.unwrap();
    wait_for_listing(&mut sub, |l| {
        l.jobs
            .iter()
            .any(|j| j.id == "5" && j.status == JobStatus::Stopped)
    })
    .await;

    deck.shutdown().await;
    cancel.cancel();
}
