//! Controller: the canonical collection of linked hosts
//!
//! Nothing else in the system is authoritative about which hosts exist.
//! Mutations update the in-memory tree immediately; the poller confirms
//! them against the devices later.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::errors::DomainError;
use super::host::Host;
use super::listener::{ListenerId, ListenerSet, ModelEvent, ModelListener, ModelObject};
use super::newtypes::{Credentials, HostKey};
use crate::ports::DeviceConnector;

/// Owner of every [`Host`]
pub struct Controller {
    connector: Arc<dyn DeviceConnector>,
    hosts: RwLock<BTreeMap<HostKey, Arc<Host>>>,
    listeners: ListenerSet,
}

impl Controller {
    pub fn new(connector: Arc<dyn DeviceConnector>) -> Self {
        Self {
            connector,
            hosts: RwLock::new(BTreeMap::new()),
            listeners: ListenerSet::new(),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn ModelListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Links a new host. It starts waiting for its first update.
    ///
    /// # Errors
    /// `DomainError::HostAlreadyExists` if the same address and port are
    /// already linked.
    pub fn add_host(
        &self,
        key: HostKey,
        credentials: Credentials,
    ) -> Result<Arc<Host>, DomainError> {
        let host = {
            let mut hosts = self.hosts.write();
            if hosts.contains_key(&key) {
                return Err(DomainError::HostAlreadyExists(key.to_string()));
            }
            let device = self.connector.connect(&key, &credentials);
            let host = Arc::new(Host::new(key.clone(), credentials, device));
            hosts.insert(key.clone(), Arc::clone(&host));
            host
        };

        info!(host = %key, "Host linked");
        self.listeners.notify(&ModelEvent::ChildAdded {
            parent: ModelObject::Controller,
            child: ModelObject::Host(key),
        });
        Ok(host)
    }

    /// Unlinks a host and marks it deleted.
    pub fn remove_host(&self, key: &HostKey) -> Option<Arc<Host>> {
        let host = self.hosts.write().remove(key)?;
        if let Err(e) = host.set_state(super::SyncState::Deleted, None) {
            debug!(host = %key, error = %e, "Host already deleted");
        }
        info!(host = %key, "Host unlinked");
        self.listeners.notify(&ModelEvent::ChildRemoved {
            parent: ModelObject::Controller,
            child: ModelObject::Host(key.clone()),
        });
        Some(host)
    }

    /// Looks a host up by lexical address and port
    pub fn get_host(&self, key: &HostKey) -> Option<Arc<Host>> {
        self.hosts.read().get(key).cloned()
    }

    /// Looks a host up, falling back to resolved-address comparison.
    ///
    /// Performs DNS lookups when the lexical lookup misses.
    pub fn find_host_full(&self, key: &HostKey) -> Option<Arc<Host>> {
        if let Some(host) = self.get_host(key) {
            return Some(host);
        }
        self.hosts()
            .into_iter()
            .find(|host| host.key().resolves_to_same(key))
    }

    /// Every linked host, ordered by key
    pub fn hosts(&self) -> Vec<Arc<Host>> {
        self.hosts.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.hosts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.read().is_empty()
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("hosts", &self.hosts.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
