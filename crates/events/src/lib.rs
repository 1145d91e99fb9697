//! Jobdeck push events and hub wire protocol.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, carrying [`JobEvent`]s.
//! - [`HubMessage`]: the JSON frames exchanged over the hub WebSocket,
//!   including the invocation/completion pair used for remote commands.

pub mod bus;
pub mod messages;

pub use bus::{EventBus, JobEvent};
pub use messages::{parse_message, Completion, HubCommand, HubError, HubMessage, Invocation};
