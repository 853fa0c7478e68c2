//! `RuleFs`: the filesystem-facing entry point.
//!
//! Bundles a [`PathResolver`] and a [`ChangeFeed`] over one controller and
//! exposes the operations a file-editing front end needs. Everything here is
//! synchronous; only write commits, deletes and renames reach the device.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};
use zxfs_core::domain::Controller;

use crate::changes::{ChangeFeed, HostChange, DEFAULT_CAPACITY};
use crate::error::VfsError;
use crate::handle::{HandleKind, Metadata, StoreHandle};
use crate::resolver::PathResolver;
use crate::write_buffer::WriteBuffer;

/// Rule filesystem over one controller
pub struct RuleFs {
    resolver: PathResolver,
    feed: Arc<ChangeFeed>,
}

impl RuleFs {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self::with_capacity(controller, DEFAULT_CAPACITY)
    }

    /// Like [`RuleFs::new`] with a custom change channel capacity
    pub fn with_capacity(controller: Arc<Controller>, capacity: usize) -> Self {
        let feed = ChangeFeed::attach(&controller, capacity);
        debug!(hosts = controller.len(), "Rule filesystem created");
        Self {
            resolver: PathResolver::new(controller),
            feed,
        }
    }

    pub fn controller(&self) -> &Arc<Controller> {
        self.resolver.controller()
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Resolves a namespace URI such as `zxtm://h1:9090/Rules/Foo.zts`.
    pub fn resolve(&self, uri: &str) -> Result<Arc<StoreHandle>, VfsError> {
        self.resolver.resolve_uri(uri)
    }

    pub fn resolve_child(
        &self,
        handle: &StoreHandle,
        name: &str,
    ) -> Result<Arc<StoreHandle>, VfsError> {
        self.resolver.resolve_child(handle, name)
    }

    pub fn parent(&self, handle: &StoreHandle) -> Option<Arc<StoreHandle>> {
        handle.parent()
    }

    pub fn list_children(&self, handle: &StoreHandle) -> Vec<String> {
        handle.list_children()
    }

    pub fn metadata(&self, handle: &StoreHandle) -> Metadata {
        handle.metadata()
    }

    pub fn open_read(&self, handle: &StoreHandle) -> Result<Vec<u8>, VfsError> {
        handle.read()
    }

    pub fn open_write(&self, handle: &StoreHandle) -> Result<WriteBuffer, VfsError> {
        handle.open_write()
    }

    pub fn delete(&self, handle: &StoreHandle) -> Result<(), VfsError> {
        handle.delete()
    }

    pub fn make_directory(&self, handle: &StoreHandle) -> Result<(), VfsError> {
        handle.make_directory()
    }

    /// Renames a rule file within its host.
    ///
    /// Returns the handle of the new location.
    ///
    /// # Errors
    /// - `Unsupported` unless both handles are rule files on the same host
    /// - `NotFound` if the source rule does not exist
    /// - `RemoteConflict` if the target name is taken
    pub fn rename(
        &self,
        from: &StoreHandle,
        to: &StoreHandle,
    ) -> Result<Arc<StoreHandle>, VfsError> {
        let (HandleKind::Rule { name: old }, HandleKind::Rule { name: new }) =
            (from.kind(), to.kind())
        else {
            return Err(VfsError::Unsupported(format!(
                "cannot rename {} to {}",
                from.uri(),
                to.uri()
            )));
        };
        if from.path().host() != to.path().host() {
            return Err(VfsError::Unsupported(format!(
                "cannot move {} to another host",
                from.uri()
            )));
        }
        if old == new {
            return Ok(self.resolver.resolve(to.path()));
        }

        let host = from.host().ok_or_else(|| VfsError::NotFound(from.uri()))?;
        if host.rule(old).is_none() {
            return Err(VfsError::NotFound(from.uri()));
        }
        host.rename_rule(old, new.clone())?;
        info!(from = %from.path(), to = %to.path(), "Rule file renamed");
        Ok(self.resolver.resolve(to.path()))
    }

    /// Receiver for changes keyed by host
    pub fn subscribe(&self) -> broadcast::Receiver<HostChange> {
        self.feed.subscribe()
    }
}

impl std::fmt::Debug for RuleFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleFs")
            .field("controller", self.controller())
            .field("cached_handles", &self.resolver.cache().len())
            .finish()
    }
}
