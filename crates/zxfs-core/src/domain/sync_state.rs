//! Synchronization state machine shared by hosts and rules
//!
//! ## State Machine
//!
//! ```text
//!   ┌────────────────────────┐  fetch ok   ┌────────────┐
//!   │ WaitingForFirstUpdate  │ ──────────► │  UpToDate  │ ◄──┐
//!   └────────────────────────┘             └────────────┘    │ fetch ok
//!        │ fetch failed                          │ fetch     │
//!        ▼                                       ▼ failed    │
//!   ┌────────────┐ ◄──────────────────────────────           │
//!   │ CannotSync │ ──────────────────────────────────────────┘
//!   └────────────┘
//!
//!   any ──user suspends──► Disconnected ──user resumes──► WaitingForFirstUpdate
//!   any ──removed────────► Deleted (terminal)
//! ```
//!
//! Entering `CannotSync` requires a cause; leaving it clears the cause.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{DomainError, RemoteError};

/// Synchronization state of a host or rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No data has been fetched yet
    #[default]
    WaitingForFirstUpdate,
    /// The last fetch succeeded
    UpToDate,
    /// The last fetch or write failed; a cause is recorded
    CannotSync,
    /// The object was removed remotely or locally
    Deleted,
    /// Polling was suspended by the user
    Disconnected,
}

impl SyncState {
    /// Returns the state name as a string
    pub fn name(&self) -> &'static str {
        match self {
            SyncState::WaitingForFirstUpdate => "waiting_for_first_update",
            SyncState::UpToDate => "up_to_date",
            SyncState::CannotSync => "cannot_sync",
            SyncState::Deleted => "deleted",
            SyncState::Disconnected => "disconnected",
        }
    }

    /// Returns true if no further transitions are allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Deleted)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State plus the data that travels with it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    state: SyncState,
    cause: Option<RemoteError>,
    last_synced: Option<DateTime<Utc>>,
}

impl SyncStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// The recorded failure; always `Some` in `CannotSync`, `None` otherwise
    pub fn cause(&self) -> Option<&RemoteError> {
        self.cause.as_ref()
    }

    /// When the object last reached `UpToDate`
    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.last_synced
    }

    /// Applies a transition.
    ///
    /// Returns `Ok(Some(previous))` when the state changed, `Ok(None)` when
    /// the state was already `state`. A repeated `CannotSync` refreshes the
    /// stored cause without counting as a change.
    ///
    /// # Errors
    /// - `CannotSync` without a cause
    /// - any transition out of `Deleted`
    pub fn transition(
        &mut self,
        state: SyncState,
        cause: Option<RemoteError>,
    ) -> Result<Option<SyncState>, DomainError> {
        if state == SyncState::CannotSync && cause.is_none() {
            return Err(DomainError::InvalidState {
                from: self.state.to_string(),
                to: format!("{state} (missing cause)"),
            });
        }
        if self.state == state {
            if state == SyncState::CannotSync {
                self.cause = cause;
            }
            return Ok(None);
        }
        if self.state.is_terminal() {
            return Err(DomainError::InvalidState {
                from: self.state.to_string(),
                to: state.to_string(),
            });
        }

        let previous = self.state;
        self.state = state;
        self.cause = if state == SyncState::CannotSync {
            cause
        } else {
            None
        };
        if state == SyncState::UpToDate {
            self.last_synced = Some(Utc::now());
        }
        Ok(Some(previous))
    }
}
