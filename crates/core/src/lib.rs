//! Jobdeck domain crate.
//!
//! Pure logic shared by the server and the client: the job data model,
//! wire enums, transition rules, validation, the ordered job record store,
//! listing helpers, sample data and the progress simulation step. No I/O
//! and no async runtime.

pub mod error;
pub mod job;
pub mod listing;
pub mod sample;
pub mod simulation;
pub mod status;
pub mod store;
pub mod transitions;
pub mod types;
pub mod validation;
