//! Core library for the `spotcast` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - A client for the SeaLegs SpotCast REST API
//! - The bounded status poll and the end-to-end workflow built on it
//!
//! It is used by `spotcast-cli`, but can also be reused by other binaries or services.

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod poll;
pub mod workflow;

pub use api::{Operation, OperationKind, RetryPolicy, SpotCastApi, SpotCastClient};
pub use config::{Config, PollConfig, SavedConfig, Settings};
pub use error::{Error, Result};
pub use poll::{PollOutcome, poll_until_terminal};
pub use workflow::{Workflow, WorkflowSummary};
