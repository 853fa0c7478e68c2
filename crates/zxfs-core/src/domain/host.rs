//! Host domain entity
//!
//! A host is one managed device. It owns its rules, ordered by name, and the
//! connection used to reach the device. Local collections are updated
//! immediately by user mutations; the poller reconciles them with the device
//! through [`Host::apply_listing_since`].
//!
//! Local creates, deletes and renames bump the host's mutation generation
//! and remember which names they touched. A listing taken before such a
//! mutation leaves those names alone, so a slow poll never undoes a change
//! the user has already committed.
//!
//! Listeners of one host see its state changes in transition order.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{debug, info};

use super::errors::{DomainError, RemoteError};
use super::listener::{ListenerId, ListenerSet, ModelEvent, ModelListener, ModelObject};
use super::newtypes::{Credentials, HostKey, RuleName};
use super::rule::Rule;
use super::sync_state::{SyncState, SyncStatus};
use crate::ports::RemoteDevice;

/// Rules added and removed by one reconciliation pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListingChanges {
    pub added: Vec<RuleName>,
    pub removed: Vec<RuleName>,
}

impl ListingChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A remote managed device and its rules
pub struct Host {
    key: HostKey,
    device: Arc<dyn RemoteDevice>,
    credentials: Mutex<Credentials>,
    status: Mutex<SyncStatus>,
    rules: RwLock<BTreeMap<RuleName, Arc<Rule>>>,
    /// Number of local collection mutations
    mutations: AtomicU64,
    /// Generation of the last local mutation of each name; guarded by `rules`
    touched: Mutex<HashMap<RuleName, u64>>,
    /// Held from transition to notification
    delivery: ReentrantMutex<()>,
    listeners: ListenerSet,
}

impl Host {
    pub fn new(key: HostKey, credentials: Credentials, device: Arc<dyn RemoteDevice>) -> Self {
        Self {
            key,
            device,
            credentials: Mutex::new(credentials),
            status: Mutex::new(SyncStatus::new()),
            rules: RwLock::new(BTreeMap::new()),
            mutations: AtomicU64::new(0),
            touched: Mutex::new(HashMap::new()),
            delivery: ReentrantMutex::new(()),
            listeners: ListenerSet::new(),
        }
    }

    pub fn key(&self) -> &HostKey {
        &self.key
    }

    pub fn object(&self) -> ModelObject {
        ModelObject::Host(self.key.clone())
    }

    /// The live connection to the device
    pub fn device(&self) -> Arc<dyn RemoteDevice> {
        Arc::clone(&self.device)
    }

    pub fn status(&self) -> SyncStatus {
        self.status.lock().clone()
    }

    pub fn state(&self) -> SyncState {
        self.status.lock().state()
    }

    pub fn last_error(&self) -> Option<RemoteError> {
        self.status.lock().cause().cloned()
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials.lock().clone()
    }

    /// Pushes new credentials to the device, then stores them locally.
    pub fn set_credentials(&self, credentials: Credentials) -> Result<(), RemoteError> {
        self.device.set_credentials(&credentials)?;
        *self.credentials.lock() = credentials;
        info!(host = %self.key, "Credentials updated");
        Ok(())
    }

    pub fn add_listener(&self, listener: Arc<dyn ModelListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    // ========================================================================
    // State machine
    // ========================================================================

    /// Moves the host to `state`, notifying listeners if it changed.
    pub fn set_state(
        &self,
        state: SyncState,
        cause: Option<RemoteError>,
    ) -> Result<bool, DomainError> {
        let _delivery = self.delivery.lock();
        let previous = self.status.lock().transition(state, cause)?;
        match previous {
            Some(old) => {
                debug!(host = %self.key, %old, new = %state, "Host state changed");
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

    pub fn mark_up_to_date(&self) -> Result<bool, DomainError> {
        self.set_state(SyncState::UpToDate, None)
    }

    pub fn mark_failed(&self, cause: RemoteError) -> Result<bool, DomainError> {
        self.set_state(SyncState::CannotSync, Some(cause))
    }

    /// Suspends polling of this host
    pub fn disconnect(&self) -> Result<bool, DomainError> {
        info!(host = %self.key, "Host disconnected by user");
        self.set_state(SyncState::Disconnected, None)
    }

    /// Resumes polling; the host waits for a fresh first update
    pub fn reconnect(&self) -> Result<bool, DomainError> {
        if self.state() != SyncState::Disconnected {
            return Ok(false);
        }
        info!(host = %self.key, "Host reconnected by user");
        self.set_state(SyncState::WaitingForFirstUpdate, None)
    }

    pub fn is_disconnected(&self) -> bool {
        self.state() == SyncState::Disconnected
    }

    // ========================================================================
    // Rule collection
    // ========================================================================

    /// Current rules, ordered by name
    pub fn rules(&self) -> Vec<Arc<Rule>> {
        self.rules.read().values().cloned().collect()
    }

    pub fn rule_names(&self) -> Vec<RuleName> {
        self.rules.read().keys().cloned().collect()
    }

    /// Looks a rule up by exact (case-sensitive) name
    pub fn rule(&self, name: &RuleName) -> Option<Arc<Rule>> {
        self.rules.read().get(name).cloned()
    }

    /// Generation to pass to [`Host::apply_listing_since`]
    pub fn mutation_generation(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Records a local mutation of `name`; call with `rules` write-locked.
    fn touch(&self, name: &RuleName) {
        let generation = self.mutations.fetch_add(1, Ordering::SeqCst) + 1;
        self.touched.lock().insert(name.clone(), generation);
    }

    fn rule_object(&self, name: &RuleName) -> ModelObject {
        ModelObject::Rule(self.key.clone(), name.clone())
    }

    fn notify_child_added(&self, name: &RuleName) {
        self.listeners.notify(&ModelEvent::ChildAdded {
            parent: self.object(),
            child: self.rule_object(name),
        });
    }

    fn notify_child_removed(&self, name: &RuleName) {
        self.listeners.notify(&ModelEvent::ChildRemoved {
            parent: self.object(),
            child: self.rule_object(name),
        });
    }

    /// Creates a rule on the device and inserts it locally.
    ///
    /// # Errors
    /// `NameAlreadyExists` if a rule with this name is already known, or any
    /// failure reported by the device.
    pub fn create_rule(&self, name: RuleName, content: Vec<u8>) -> Result<Arc<Rule>, RemoteError> {
        if self.rules.read().contains_key(&name) {
            return Err(RemoteError::name_already_exists(format!(
                "Rule '{}' already exists on {}",
                name, self.key
            )));
        }

        self.device.add_rule(&name, &content)?;
        info!(host = %self.key, rule = %name, bytes = content.len(), "Rule created");

        let (rule, inserted) = {
            let mut rules = self.rules.write();
            self.touch(&name);
            match rules.get(&name) {
                // The poller saw it first.
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let rule = Arc::new(Rule::with_content(
                        self.key.clone(),
                        name.clone(),
                        Arc::clone(&self.device),
                        content.clone(),
                    ));
                    rules.insert(name.clone(), Arc::clone(&rule));
                    (rule, true)
                }
            }
        };

        if inserted {
            self.notify_child_added(&name);
        } else {
            rule.record_local_write(content);
        }
        Ok(rule)
    }

    /// Deletes a rule on the device, then removes it locally.
    pub fn delete_rule(&self, name: &RuleName) -> Result<(), RemoteError> {
        self.device.delete_rule(name)?;
        info!(host = %self.key, rule = %name, "Rule deleted");
        self.remove_rule_local(name);
        Ok(())
    }

    /// Renames a rule on the device, then re-keys it locally.
    pub fn rename_rule(&self, old: &RuleName, new: RuleName) -> Result<Arc<Rule>, RemoteError> {
        if self.rules.read().contains_key(&new) {
            return Err(RemoteError::name_already_exists(format!(
                "Rule '{}' already exists on {}",
                new, self.key
            )));
        }

        self.device.rename_rule(old, &new)?;
        info!(host = %self.key, from = %old, to = %new, "Rule renamed");

        let content = self
            .remove_rule_local(old)
            .and_then(|rule| rule.content());
        let renamed = Arc::new(match content {
            Some(content) => Rule::with_content(
                self.key.clone(),
                new.clone(),
                Arc::clone(&self.device),
                content.to_vec(),
            ),
            None => Rule::new(self.key.clone(), new.clone(), Arc::clone(&self.device)),
        });
        {
            let mut rules = self.rules.write();
            self.touch(&new);
            rules.insert(new.clone(), Arc::clone(&renamed));
        }
        self.notify_child_added(&new);
        Ok(renamed)
    }

    /// Removes a rule from the local collection and marks it deleted.
    pub fn remove_rule_local(&self, name: &RuleName) -> Option<Arc<Rule>> {
        let removed = {
            let mut rules = self.rules.write();
            self.touch(name);
            rules.remove(name)?
        };
        if let Err(e) = removed.mark_deleted() {
            debug!(host = %self.key, rule = %name, error = %e, "Rule already deleted");
        }
        self.notify_child_removed(name);
        Some(removed)
    }

    /// Reconciles the local collection with a fresh listing from the device.
    ///
    /// New names are inserted waiting for their first update; names missing
    /// from `names` are marked deleted and dropped.
    pub fn apply_listing(&self, names: Vec<RuleName>) -> ListingChanges {
        self.reconcile(names, None)
    }

    /// Like [`Host::apply_listing`] for a listing requested when the
    /// mutation generation was `generation`: names mutated locally since
    /// then are neither added nor removed.
    pub fn apply_listing_since(&self, names: Vec<RuleName>, generation: u64) -> ListingChanges {
        self.reconcile(names, Some(generation))
    }

    fn reconcile(&self, names: Vec<RuleName>, since: Option<u64>) -> ListingChanges {
        let mut changes = ListingChanges::default();
        let mut removed_rules = Vec::new();
        {
            let mut rules = self.rules.write();
            let listed: BTreeSet<RuleName> = names.into_iter().collect();
            let mut touched = self.touched.lock();
            let fresh: BTreeSet<RuleName> = match since {
                Some(generation) => {
                    touched.retain(|_, g| *g > generation);
                    touched.keys().cloned().collect()
                }
                None => BTreeSet::new(),
            };
            drop(touched);
            if !fresh.is_empty() {
                debug!(host = %self.key, names = fresh.len(), "Keeping rules changed during listing");
            }

            let gone: Vec<RuleName> = rules
                .keys()
                .filter(|name| !listed.contains(*name) && !fresh.contains(*name))
                .cloned()
                .collect();
            for name in gone {
                if let Some(rule) = rules.remove(&name) {
                    removed_rules.push(rule);
                }
                changes.removed.push(name);
            }

            for name in listed {
                if !rules.contains_key(&name) && !fresh.contains(&name) {
                    rules.insert(
                        name.clone(),
                        Arc::new(Rule::new(
                            self.key.clone(),
                            name.clone(),
                            Arc::clone(&self.device),
                        )),
                    );
                    changes.added.push(name);
                }
            }
        }

        for rule in removed_rules {
            if let Err(e) = rule.mark_deleted() {
                debug!(host = %self.key, rule = %rule.name(), error = %e, "Rule already deleted");
            }
            self.notify_child_removed(rule.name());
        }
        for name in &changes.added {
            self.notify_child_added(name);
        }

        if !changes.is_empty() {
            debug!(
                host = %self.key,
                added = changes.added.len(),
                removed = changes.removed.len(),
                "Rule listing reconciled"
            );
        }
        changes
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("key", &self.key)
            .field("state", &self.state())
            .field("rules", &self.rules.read().len())
            .finish()
    }
}
