//! Rule domain entity
//!
//! A rule is a named script object stored on a host. Its state and content
//! are refreshed by the poller through [`Rule::apply_fetched`] and
//! [`Rule::mark_failed`]; user edits go through [`Rule::update_content`],
//! which talks to the device synchronously.
//!
//! Every local write bumps the rule's generation. The poller reads the
//! generation before fetching and hands it to [`Rule::apply_fetched_since`],
//! so content fetched before a local write never replaces it.
//!
//! Listeners of one rule see its events in transition order.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, info};

use super::errors::{DomainError, RemoteError};
use super::listener::{ListenerId, ListenerSet, ModelEvent, ModelListener, ModelObject};
use super::newtypes::{HostKey, RuleName};
use super::sync_state::{SyncState, SyncStatus};
use crate::ports::RemoteDevice;

#[derive(Debug, Default)]
struct RuleInner {
    status: SyncStatus,
    content: Option<Arc<[u8]>>,
    /// Number of local writes
    generation: u64,
}

/// Consistent snapshot of a rule's state and content
#[derive(Debug, Clone)]
pub struct RuleView {
    pub status: SyncStatus,
    pub content: Option<Arc<[u8]>>,
}

impl RuleView {
    pub fn state(&self) -> SyncState {
        self.status.state()
    }

    /// Content length in bytes, 0 if nothing was fetched yet
    pub fn len(&self) -> u64 {
        self.content.as_ref().map_or(0, |c| c.len() as u64)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named script object on a host
pub struct Rule {
    host: HostKey,
    name: RuleName,
    device: Arc<dyn RemoteDevice>,
    inner: Mutex<RuleInner>,
    /// Held from transition to notification
    delivery: ReentrantMutex<()>,
    listeners: ListenerSet,
}

impl Rule {
    /// Creates a rule discovered by the poller, waiting for its first fetch
    pub fn new(host: HostKey, name: RuleName, device: Arc<dyn RemoteDevice>) -> Self {
        Self {
            host,
            name,
            device,
            inner: Mutex::new(RuleInner::default()),
            delivery: ReentrantMutex::new(()),
            listeners: ListenerSet::new(),
        }
    }

    /// Creates a rule whose content is already known (e.g. just created)
    pub fn with_content(
        host: HostKey,
        name: RuleName,
        device: Arc<dyn RemoteDevice>,
        content: Vec<u8>,
    ) -> Self {
        let rule = Self::new(host, name, device);
        {
            let mut inner = rule.inner.lock();
            inner.content = Some(Arc::from(content));
            // A fresh status always accepts UpToDate.
            let _ = inner.status.transition(SyncState::UpToDate, None);
        }
        rule
    }

    pub fn name(&self) -> &RuleName {
        &self.name
    }

    pub fn host_key(&self) -> &HostKey {
        &self.host
    }

    pub fn object(&self) -> ModelObject {
        ModelObject::Rule(self.host.clone(), self.name.clone())
    }

    pub fn state(&self) -> SyncState {
        self.inner.lock().status.state()
    }

    pub fn last_error(&self) -> Option<RemoteError> {
        self.inner.lock().status.cause().cloned()
    }

    pub fn content(&self) -> Option<Arc<[u8]>> {
        self.inner.lock().content.clone()
    }

    /// Generation to pass to [`Rule::apply_fetched_since`]
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// State and content read under one lock
    pub fn view(&self) -> RuleView {
        let inner = self.inner.lock();
        RuleView {
            status: inner.status.clone(),
            content: inner.content.clone(),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn ModelListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Moves the rule to `state`, notifying listeners if it changed.
    ///
    /// Returns whether the state changed.
    pub fn set_state(
        &self,
        state: SyncState,
        cause: Option<RemoteError>,
    ) -> Result<bool, DomainError> {
        let _delivery = self.delivery.lock();
        let previous = self.inner.lock().status.transition(state, cause)?;
        match previous {
            Some(old) => {
                debug!(host = %self.host, rule = %self.name, %old, new = %state, "Rule state changed");
                self.listeners.notify(&ModelEvent::StateChanged {
                    object: self.object(),
                    old,
                    new: state,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn mark_failed(&self, cause: RemoteError) -> Result<bool, DomainError> {
        self.set_state(SyncState::CannotSync, Some(cause))
    }

    pub fn mark_deleted(&self) -> Result<bool, DomainError> {
        self.set_state(SyncState::Deleted, None)
    }

    /// Stores freshly fetched content and moves the rule to `UpToDate`.
    pub fn apply_fetched(&self, content: Vec<u8>) -> Result<(), DomainError> {
        self.store(content, Freshness::Any).map(|_| ())
    }

    /// Like [`Rule::apply_fetched`], but drops `content` if the rule was
    /// written locally after `generation` was read.
    ///
    /// Returns whether the content was stored.
    pub fn apply_fetched_since(
        &self,
        content: Vec<u8>,
        generation: u64,
    ) -> Result<bool, DomainError> {
        self.store(content, Freshness::Since(generation))
    }

    /// Replaces the rule's content on the device, then locally.
    ///
    /// # Errors
    /// Returns the device's failure unchanged; local state is untouched.
    pub fn update_content(&self, content: &[u8]) -> Result<(), RemoteError> {
        self.device.set_rule_content(&self.name, content)?;
        info!(host = %self.host, rule = %self.name, bytes = content.len(), "Rule content updated");
        self.record_local_write(content.to_vec());
        Ok(())
    }

    /// Stores content the device has just accepted from us.
    pub(crate) fn record_local_write(&self, content: Vec<u8>) {
        if let Err(e) = self.store(content, Freshness::Local) {
            debug!(rule = %self.name, error = %e, "Rule removed while updating");
        }
    }

    fn store(&self, content: Vec<u8>, freshness: Freshness) -> Result<bool, DomainError> {
        let _delivery = self.delivery.lock();
        let (content_changed, previous) = {
            let mut inner = self.inner.lock();
            if inner.status.state().is_terminal() {
                return Err(DomainError::InvalidState {
                    from: inner.status.state().to_string(),
                    to: SyncState::UpToDate.to_string(),
                });
            }
            match freshness {
                Freshness::Since(generation) if inner.generation != generation => {
                    debug!(host = %self.host, rule = %self.name, "Dropping content fetched before a local write");
                    return Ok(false);
                }
                Freshness::Local => inner.generation += 1,
                _ => {}
            }
            let changed = inner.content.as_deref() != Some(content.as_slice());
            if changed {
                inner.content = Some(Arc::from(content));
            }
            let previous = inner.status.transition(SyncState::UpToDate, None)?;
            (changed, previous)
        };

        if content_changed {
            self.listeners.notify(&ModelEvent::ContentChanged {
                object: self.object(),
            });
        }
        if let Some(old) = previous {
            debug!(host = %self.host, rule = %self.name, %old, "Rule up to date");
            self.listeners.notify(&ModelEvent::StateChanged {
                object: self.object(),
                old,
                new: SyncState::UpToDate,
            });
        }
        Ok(true)
    }
}

/// Which writes a content update may overwrite
#[derive(Debug, Clone, Copy)]
enum Freshness {
    Any,
    Since(u64),
    Local,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
