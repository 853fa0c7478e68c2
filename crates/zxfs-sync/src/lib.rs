//! zxfs Sync - Background refresh of the host/rule model
//!
//! Provides:
//! - A single-pass refresh of one host against its device
//! - A poller that repeats it for every linked host on an interval
//!
//! ## Modules
//!
//! - [`refresh`] - List, reconcile and fetch for one host
//! - [`poller`] - Interval loop with on-demand wake-up and cancellation

pub mod poller;
pub mod refresh;

pub use poller::{PollSummary, Poller};
pub use refresh::{refresh_host, refresh_host_with, RefreshReport};

use thiserror::Error;

/// Errors that can abort a polling cycle
#[derive(Debug, Error)]
pub enum PollError {
    /// A refresh task panicked or was cancelled
    #[error("Refresh task failed: {0}")]
    Task(String),
}
