//! Path resolution: namespace URI to exactly one [`StoreHandle`].
//!
//! Shape rules, after normalization:
//! - no segments: host root
//! - `Rules`: the rule collection
//! - `Rules/<escaped>.zts`: a rule file, bound or not
//! - anything else, or an unlinked host: a not-found stub
//!
//! Every handle is cached under its canonical URI. A cached handle is reused
//! only while its idea of the host (linked or not) still matches the model,
//! so a stub made before a host was linked re-resolves once it appears.

use std::sync::Arc;

use tracing::trace;
use zxfs_core::domain::Controller;

use crate::cache::HandleCache;
use crate::error::VfsError;
use crate::handle::{HandleKind, NotFoundReason, StoreHandle};
use crate::naming::{parse_rule_file_name, COLLECTION};
use crate::path::NamespacePath;

/// Resolves paths against one controller, memoizing the results
pub struct PathResolver {
    controller: Arc<Controller>,
    cache: HandleCache,
}

impl PathResolver {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self {
            controller,
            cache: HandleCache::new(),
        }
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    pub fn cache(&self) -> &HandleCache {
        &self.cache
    }

    /// Resolves a raw URI string.
    ///
    /// # Errors
    /// `VfsError::InvalidPath` if the string is not a namespace URI.
    pub fn resolve_uri(&self, uri: &str) -> Result<Arc<StoreHandle>, VfsError> {
        let path = match self.cache.alias(uri) {
            Some(path) => path,
            None => {
                let path = NamespacePath::parse(uri)?;
                if path.to_uri() != uri {
                    self.cache.add_alias(uri, path.clone());
                }
                path
            }
        };
        Ok(self.resolve(&path))
    }

    /// Resolves a parsed path. Never fails: unknown locations become stubs.
    pub fn resolve(&self, path: &NamespacePath) -> Arc<StoreHandle> {
        let key = path.to_uri();
        let host_linked = self.controller.get_host(path.host()).is_some();

        let stale = match self.cache.get(&key) {
            Some(handle) if handle.expects_host() == host_linked => return handle,
            Some(_) => true,
            None => false,
        };

        let handle = Arc::new(self.build(path, host_linked));
        trace!(path = %key, kind = ?handle.kind(), stale, "Resolved path");
        if stale {
            self.cache.replace(key, handle)
        } else {
            self.cache.insert(key, handle)
        }
    }

    /// Resolves `name` under `handle`.
    ///
    /// # Errors
    /// `VfsError::InvalidArgument` if `name` is not a single path segment.
    pub fn resolve_child(
        &self,
        handle: &StoreHandle,
        name: &str,
    ) -> Result<Arc<StoreHandle>, VfsError> {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(VfsError::InvalidArgument(format!(
                "'{name}' is not a file name"
            )));
        }
        Ok(self.resolve(&handle.path().child(name)))
    }

    fn build(&self, path: &NamespacePath, host_linked: bool) -> StoreHandle {
        let parent = path.parent().map(|p| self.resolve(&p));
        let kind = if !host_linked {
            HandleKind::NotFound {
                reason: NotFoundReason::UnknownHost,
            }
        } else {
            match path.segments() {
                [] => HandleKind::Root,
                [collection] if collection == COLLECTION => HandleKind::RuleCollection,
                [collection, file] if collection == COLLECTION => match parse_rule_file_name(file)
                {
                    Some(name) => HandleKind::Rule { name },
                    None => HandleKind::NotFound {
                        reason: NotFoundReason::BadShape,
                    },
                },
                _ => HandleKind::NotFound {
                    reason: NotFoundReason::BadShape,
                },
            }
        };
        StoreHandle::new(path.clone(), kind, Arc::clone(&self.controller), parent)
    }
}
