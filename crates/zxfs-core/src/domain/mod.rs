//! Domain entities and business logic
//!
//! This module contains the core domain types for zxfs:
//! - Newtypes for host keys, rule names and credentials
//! - The synchronization state machine shared by hosts and rules
//! - Listener fan-out for change notification
//! - The `Host`, `Rule` and `Controller` entities
//! - Domain-specific and remote error types

pub mod controller;
pub mod errors;
pub mod host;
pub mod listener;
pub mod newtypes;
pub mod rule;
pub mod sync_state;

// Re-export commonly used types
pub use controller::Controller;
pub use errors::{DomainError, RemoteError, RemoteErrorKind};
pub use host::{Host, ListingChanges};
pub use listener::{ListenerId, ListenerSet, ModelEvent, ModelListener, ModelObject};
pub use newtypes::*;
pub use rule::{Rule, RuleView};
pub use sync_state::{SyncState, SyncStatus};
