//! Store handles: path-addressed views of model objects.
//!
//! One [`StoreHandle`] type covers the root, the rule collection, a rule
//! file and the not-found stub, distinguished by [`HandleKind`]. A handle
//! never holds on to a `Host` or `Rule`: every operation looks its backing
//! object up again by key, so a host or rule replaced after resolution is
//! observed as it is now.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use zxfs_core::domain::{Controller, Host, Rule, RuleName, SyncState};

use crate::error::VfsError;
use crate::naming::{rule_file_name, COLLECTION};
use crate::path::NamespacePath;
use crate::write_buffer::WriteBuffer;

/// Why a path resolved to a stub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// No host with this address and port is linked (yet)
    UnknownHost,
    /// The path has a shape that can never name an object
    BadShape,
}

/// Discriminates the handle variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleKind {
    Root,
    RuleCollection,
    /// A rule file; bound when the host currently has a rule of this name
    Rule { name: RuleName },
    NotFound { reason: NotFoundReason },
}

/// File metadata as seen through a handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub exists: bool,
    pub is_directory: bool,
    pub length: u64,
    /// Sync state of the backing host or rule, if there is one
    pub state: Option<SyncState>,
}

impl Metadata {
    fn missing() -> Self {
        Self {
            exists: false,
            is_directory: false,
            length: 0,
            state: None,
        }
    }
}

/// A resolved location in the namespace
pub struct StoreHandle {
    path: NamespacePath,
    kind: HandleKind,
    controller: Arc<Controller>,
    parent: Option<Arc<StoreHandle>>,
}

impl StoreHandle {
    pub(crate) fn new(
        path: NamespacePath,
        kind: HandleKind,
        controller: Arc<Controller>,
        parent: Option<Arc<StoreHandle>>,
    ) -> Self {
        Self {
            path,
            kind,
            controller,
            parent,
        }
    }

    pub fn path(&self) -> &NamespacePath {
        &self.path
    }

    pub fn uri(&self) -> String {
        self.path.to_uri()
    }

    pub fn kind(&self) -> &HandleKind {
        &self.kind
    }

    /// Last path segment; empty for the root
    pub fn name(&self) -> &str {
        self.path.name().unwrap_or("")
    }

    pub fn parent(&self) -> Option<Arc<StoreHandle>> {
        self.parent.clone()
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, HandleKind::Root | HandleKind::RuleCollection)
    }

    /// False only for stubs created while the host was unknown
    pub(crate) fn expects_host(&self) -> bool {
        !matches!(
            self.kind,
            HandleKind::NotFound {
                reason: NotFoundReason::UnknownHost
            }
        )
    }

    /// The host currently linked under this handle's address and port
    pub fn host(&self) -> Option<Arc<Host>> {
        self.controller.get_host(self.path.host())
    }

    /// The rule this handle is bound to right now, if any
    pub fn rule(&self) -> Option<Arc<Rule>> {
        match &self.kind {
            HandleKind::Rule { name } => self.host()?.rule(name),
            _ => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.rule().is_some()
    }

    // ========================================================================
    // Capabilities
    // ========================================================================

    /// Names of the children, re-derived from the model on every call
    pub fn list_children(&self) -> Vec<String> {
        match &self.kind {
            HandleKind::Root => vec![COLLECTION.to_string()],
            HandleKind::RuleCollection => match self.host() {
                Some(host) => host
                    .rules()
                    .iter()
                    .map(|rule| rule_file_name(rule.name()))
                    .collect(),
                None => Vec::new(),
            },
            HandleKind::Rule { .. } | HandleKind::NotFound { .. } => Vec::new(),
        }
    }

    pub fn metadata(&self) -> Metadata {
        match &self.kind {
            HandleKind::Root => Metadata {
                exists: true,
                is_directory: true,
                length: 0,
                state: self.host().map(|h| h.state()),
            },
            HandleKind::RuleCollection => match self.host() {
                Some(host) => Metadata {
                    exists: true,
                    is_directory: true,
                    length: 0,
                    state: Some(host.state()),
                },
                None => Metadata::missing(),
            },
            HandleKind::Rule { .. } => match self.rule() {
                Some(rule) => {
                    let view = rule.view();
                    Metadata {
                        exists: view.state() != SyncState::Deleted,
                        is_directory: false,
                        length: view.len(),
                        state: Some(view.state()),
                    }
                }
                None => Metadata::missing(),
            },
            HandleKind::NotFound { .. } => Metadata::missing(),
        }
    }

    /// Returns the rule's content if it is up to date.
    ///
    /// Never touches the network.
    ///
    /// # Errors
    /// - `IsDirectory` on the root or collection
    /// - `NotFound` on an unbound rule or a stub
    /// - `PendingFirstSync`, `Deleted` or the stored remote cause, depending
    ///   on the rule's state
    pub fn read(&self) -> Result<Vec<u8>, VfsError> {
        match &self.kind {
            HandleKind::Root | HandleKind::RuleCollection => {
                Err(VfsError::IsDirectory(self.uri()))
            }
            HandleKind::NotFound { .. } => Err(VfsError::NotFound(self.uri())),
            HandleKind::Rule { .. } => {
                let rule = self.rule().ok_or_else(|| VfsError::NotFound(self.uri()))?;
                let view = rule.view();
                match view.state() {
                    SyncState::UpToDate => Ok(view.content.map(|c| c.to_vec()).unwrap_or_default()),
                    SyncState::WaitingForFirstUpdate => {
                        Err(VfsError::PendingFirstSync(self.uri()))
                    }
                    SyncState::CannotSync => Err(match view.status.cause() {
                        Some(cause) => VfsError::from_remote(cause),
                        None => VfsError::RemoteInternal(format!(
                            "{}: synchronization failed",
                            self.uri()
                        )),
                    }),
                    SyncState::Deleted => Err(VfsError::Deleted(self.uri())),
                    SyncState::Disconnected => Err(VfsError::RemoteUnreachable(format!(
                        "{}: polling suspended",
                        self.uri()
                    ))),
                }
            }
        }
    }

    /// Opens a deferred-commit writer for this rule file.
    ///
    /// A bound handle updates its rule on close; an unbound one creates it.
    pub fn open_write(&self) -> Result<WriteBuffer, VfsError> {
        match &self.kind {
            HandleKind::Root | HandleKind::RuleCollection => {
                Err(VfsError::IsDirectory(self.uri()))
            }
            HandleKind::NotFound { .. } => Err(VfsError::NotFound(self.uri())),
            HandleKind::Rule { name } => {
                let host = self.host().ok_or_else(|| VfsError::NotFound(self.uri()))?;
                let target = host.rule(name);
                debug!(
                    path = %self.path,
                    bound = target.is_some(),
                    "Opened rule for writing"
                );
                Ok(WriteBuffer::new(
                    Arc::clone(&self.controller),
                    host.key().clone(),
                    name.clone(),
                    target,
                ))
            }
        }
    }

    /// Deletes the bound rule on the device and from the model.
    ///
    /// Unbound rules and stubs are a no-op.
    pub fn delete(&self) -> Result<(), VfsError> {
        match &self.kind {
            HandleKind::Root | HandleKind::RuleCollection => Err(VfsError::Unsupported(format!(
                "{}: directories cannot be deleted",
                self.uri()
            ))),
            HandleKind::NotFound { .. } => Ok(()),
            HandleKind::Rule { name } => {
                let Some(host) = self.host() else {
                    return Ok(());
                };
                if host.rule(name).is_none() {
                    return Ok(());
                }
                host.delete_rule(name)?;
                Ok(())
            }
        }
    }

    /// Succeeds on directories that already exist; nothing can be created.
    pub fn make_directory(&self) -> Result<(), VfsError> {
        match &self.kind {
            HandleKind::Root | HandleKind::RuleCollection if self.host().is_some() => Ok(()),
            _ => Err(VfsError::Unsupported(format!(
                "{}: cannot create directories",
                self.uri()
            ))),
        }
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("path", &self.path.to_uri())
            .field("kind", &self.kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use zxfs_core::domain::{Credentials, HostKey, RemoteError};
    use zxfs_core::ports::MemoryConnector;

    use super::*;

    fn setup() -> (Arc<Controller>, Arc<Host>) {
        let controller = Arc::new(Controller::new(Arc::new(MemoryConnector::new())));
        let host = controller
            .add_host(HostKey::new("h1", 9090).unwrap(), Credentials::default())
            .unwrap();
        (controller, host)
    }

    fn rule_handle(controller: &Arc<Controller>, name: &str) -> StoreHandle {
        let path = NamespacePath::parse(&format!("zxtm://h1:9090/Rules/{name}.zts")).unwrap();
        StoreHandle::new(
            path,
            HandleKind::Rule {
                name: RuleName::new(name).unwrap(),
            },
            Arc::clone(controller),
            None,
        )
    }

    #[test]
    fn test_rule_handle_rebinds_on_every_call() {
        let (controller, host) = setup();
        let handle = rule_handle(&controller, "Foo");
        assert!(!handle.metadata().exists);

        host.create_rule(RuleName::new("Foo").unwrap(), b"bar".to_vec())
            .unwrap();
        let meta = handle.metadata();
        assert!(meta.exists);
        assert_eq!(meta.length, 3);
        assert_eq!(handle.read().unwrap(), b"bar");
    }

    #[test]
    fn test_read_waiting_rule_is_pending() {
        let (controller, host) = setup();
        host.apply_listing(vec![RuleName::new("Foo").unwrap()]);
        let handle = rule_handle(&controller, "Foo");

        assert!(handle.metadata().exists);
        assert!(matches!(handle.read(), Err(VfsError::PendingFirstSync(_))));
    }

    #[test]
    fn test_read_failed_rule_carries_cause() {
        let (controller, host) = setup();
        host.apply_listing(vec![RuleName::new("Foo").unwrap()]);
        host.rule(&RuleName::new("Foo").unwrap())
            .unwrap()
            .mark_failed(RemoteError::connection_refused("port closed"))
            .unwrap();

        let err = rule_handle(&controller, "Foo").read().unwrap_err();
        assert!(matches!(err, VfsError::RemoteUnreachable(ref m) if m.contains("port closed")));
    }

    #[test]
    fn test_read_disconnected_rule_is_unreachable() {
        let (controller, host) = setup();
        host.create_rule(RuleName::new("Foo").unwrap(), b"bar".to_vec())
            .unwrap();
        host.rule(&RuleName::new("Foo").unwrap())
            .unwrap()
            .set_state(SyncState::Disconnected, None)
            .unwrap();

        let err = rule_handle(&controller, "Foo").read().unwrap_err();
        assert!(matches!(err, VfsError::RemoteUnreachable(ref m) if m.contains("polling suspended")));
    }

    #[test]
    fn test_read_deleted_rule_differs_from_missing() {
        let (controller, host) = setup();
        host.create_rule(RuleName::new("Foo").unwrap(), b"bar".to_vec())
            .unwrap();
        host.rule(&RuleName::new("Foo").unwrap())
            .unwrap()
            .set_state(SyncState::Deleted, None)
            .unwrap();

        let handle = rule_handle(&controller, "Foo");
        assert!(handle.is_bound());
        assert!(!handle.metadata().exists);
        assert!(matches!(handle.read(), Err(VfsError::Deleted(_))));
        assert!(matches!(
            rule_handle(&controller, "Never").read(),
            Err(VfsError::NotFound(_))
        ));
    }

    #[test]
    fn test_collection_lists_escaped_names() {
        let (controller, host) = setup();
        host.create_rule(RuleName::new("a:b").unwrap(), Vec::new())
            .unwrap();
        let handle = StoreHandle::new(
            NamespacePath::parse("zxtm://h1:9090/Rules").unwrap(),
            HandleKind::RuleCollection,
            controller,
            None,
        );
        assert_eq!(handle.list_children(), vec!["a~cb.zts"]);
        assert!(matches!(handle.read(), Err(VfsError::IsDirectory(_))));
        assert!(matches!(handle.delete(), Err(VfsError::Unsupported(_))));
        assert!(handle.make_directory().is_ok());
    }

    #[test]
    fn test_collection_of_removed_host_does_not_exist() {
        let (controller, _) = setup();
        let handle = StoreHandle::new(
            NamespacePath::parse("zxtm://h1:9090/Rules").unwrap(),
            HandleKind::RuleCollection,
            Arc::clone(&controller),
            None,
        );
        controller.remove_host(&HostKey::new("h1", 9090).unwrap());
        assert!(!handle.metadata().exists);
        assert!(handle.list_children().is_empty());
        assert!(handle.make_directory().is_err());
    }

    #[test]
    fn test_delete_unbound_is_noop() {
        let (controller, _) = setup();
        assert!(rule_handle(&controller, "Nope").delete().is_ok());
    }

    #[test]
    fn test_stub_capabilities() {
        let (controller, _) = setup();
        let stub = StoreHandle::new(
            NamespacePath::parse("zxtm://h1:9090/Other").unwrap(),
            HandleKind::NotFound {
                reason: NotFoundReason::BadShape,
            },
            controller,
            None,
        );
        assert!(!stub.metadata().exists);
        assert!(stub.list_children().is_empty());
        assert!(matches!(stub.read(), Err(VfsError::NotFound(_))));
        assert!(stub.open_write().is_err());
        assert!(stub.delete().is_ok());
    }
}
