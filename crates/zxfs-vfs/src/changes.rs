//! Change feed keyed by host.
//!
//! [`ChangeFeed`] listens to the controller, every host and every rule, and
//! republishes what it sees as [`HostChange`]s on a broadcast channel. A
//! refresher only needs the host key to know which mirrored directory to
//! re-list.

use std::sync::{Arc, Weak};

use dashmap::DashSet;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;
use zxfs_core::domain::{
    Controller, Host, HostKey, ModelEvent, ModelListener, ModelObject, Rule, RuleName, SyncState,
};

/// Default capacity of the broadcast channel
pub const DEFAULT_CAPACITY: usize = 256;

/// What changed under a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeKind {
    HostAdded,
    HostRemoved,
    HostStateChanged { old: SyncState, new: SyncState },
    RuleAdded { rule: RuleName },
    RuleRemoved { rule: RuleName },
    RuleStateChanged {
        rule: RuleName,
        old: SyncState,
        new: SyncState,
    },
    RuleContentChanged { rule: RuleName },
}

/// One change, keyed by the affected host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostChange {
    pub host: HostKey,
    #[serde(flatten)]
    pub kind: ChangeKind,
}

/// Model listener that fans model events out to subscribers
pub struct ChangeFeed {
    controller: Weak<Controller>,
    this: Weak<ChangeFeed>,
    sender: broadcast::Sender<HostChange>,
    /// Objects this feed is registered with
    attached: DashSet<ModelObject>,
}

impl ChangeFeed {
    /// Creates a feed and registers it with `controller` and everything it
    /// currently holds.
    pub fn attach(controller: &Arc<Controller>, capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        let feed = Arc::new_cyclic(|this| Self {
            controller: Arc::downgrade(controller),
            this: this.clone(),
            sender,
            attached: DashSet::new(),
        });

        if let Some(listener) = feed.as_listener() {
            controller.add_listener(listener);
        }
        for host in controller.hosts() {
            feed.attach_host(&host);
        }
        feed
    }

    /// A new receiver for changes published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<HostChange> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn as_listener(&self) -> Option<Arc<dyn ModelListener>> {
        self.this
            .upgrade()
            .map(|feed| feed as Arc<dyn ModelListener>)
    }

    fn attach_host(&self, host: &Arc<Host>) {
        if self.attached.insert(host.object()) {
            if let Some(listener) = self.as_listener() {
                host.add_listener(listener);
            }
        }
        for rule in host.rules() {
            self.attach_rule(&rule);
        }
    }

    fn attach_rule(&self, rule: &Arc<Rule>) {
        if self.attached.insert(rule.object()) {
            if let Some(listener) = self.as_listener() {
                rule.add_listener(listener);
            }
        }
    }

    fn publish(&self, host: &HostKey, kind: ChangeKind) {
        trace!(host = %host, ?kind, "Publishing change");
        // No subscribers is fine.
        let _ = self.sender.send(HostChange {
            host: host.clone(),
            kind,
        });
    }

    fn child_added(&self, child: &ModelObject) {
        let Some(controller) = self.controller.upgrade() else {
            return;
        };
        match child {
            ModelObject::Host(key) => {
                if let Some(host) = controller.get_host(key) {
                    self.attach_host(&host);
                }
                self.publish(key, ChangeKind::HostAdded);
            }
            ModelObject::Rule(key, name) => {
                if let Some(rule) = controller.get_host(key).and_then(|h| h.rule(name)) {
                    self.attach_rule(&rule);
                }
                self.publish(key, ChangeKind::RuleAdded { rule: name.clone() });
            }
            ModelObject::Controller => {}
        }
    }

    fn child_removed(&self, child: &ModelObject) {
        self.attached.remove(child);
        match child {
            ModelObject::Host(key) => {
                self.attached
                    .retain(|object| !matches!(object, ModelObject::Rule(k, _) if k == key));
                self.publish(key, ChangeKind::HostRemoved);
            }
            ModelObject::Rule(key, name) => {
                self.publish(key, ChangeKind::RuleRemoved { rule: name.clone() });
            }
            ModelObject::Controller => {}
        }
    }
}

impl ModelListener for ChangeFeed {
    fn on_event(&self, event: &ModelEvent) -> anyhow::Result<()> {
        match event {
            ModelEvent::ChildAdded { child, .. } => self.child_added(child),
            ModelEvent::ChildRemoved { child, .. } => self.child_removed(child),
            ModelEvent::StateChanged { object, old, new } => match object {
                ModelObject::Host(key) => self.publish(
                    key,
                    ChangeKind::HostStateChanged {
                        old: *old,
                        new: *new,
                    },
                ),
                ModelObject::Rule(key, name) => self.publish(
                    key,
                    ChangeKind::RuleStateChanged {
                        rule: name.clone(),
                        old: *old,
                        new: *new,
                    },
                ),
                ModelObject::Controller => {}
            },
            ModelEvent::ContentChanged { object } => {
                if let ModelObject::Rule(key, name) = object {
                    self.publish(key, ChangeKind::RuleContentChanged { rule: name.clone() });
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("attached", &self.attached.len())
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
