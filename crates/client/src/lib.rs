//! Jobdeck client library.
//!
//! Keeps a local copy of the job list in sync with a jobdeck backend over
//! one of three interchangeable transports (REST, hub WebSocket, in-memory
//! mock), survives push-channel outages with scheduled reconnects and
//! fallback polling, and fans full listings out to any number of
//! subscribers. [`JobDeck`] is the entry point.

pub mod api;
pub mod config;
pub mod deck;
pub mod error;
pub mod hub;
pub mod mock;
pub mod push;
pub mod reconnect;
pub mod sync;
pub mod transport;

pub use config::{ClientConfig, TransportMode};
pub use deck::JobDeck;
pub use error::{ClientError, ClientResult};
pub use reconnect::{ConnectionState, ReconnectController, ReconnectPolicy};
pub use sync::{Listing, PollPolicy, Subscription, SyncLayer};
pub use transport::TransportAdapter;
