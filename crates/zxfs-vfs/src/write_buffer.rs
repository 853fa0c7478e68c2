//! Deferred-commit writer for rule files.
//!
//! Bytes are staged in memory and pushed to the device in a single call on
//! [`WriteBuffer::close`]. The device never sees a partially written rule.

use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::{debug, info, warn};
use zxfs_core::domain::{Controller, HostKey, Rule, RuleName, SyncState};

use crate::error::VfsError;

/// In-memory writer returned by `open_write`
pub struct WriteBuffer {
    controller: Arc<Controller>,
    host: HostKey,
    name: RuleName,
    target: Option<Arc<Rule>>,
    data: Vec<u8>,
    committed: bool,
}

impl WriteBuffer {
    pub(crate) fn new(
        controller: Arc<Controller>,
        host: HostKey,
        name: RuleName,
        target: Option<Arc<Rule>>,
    ) -> Self {
        Self {
            controller,
            host,
            name,
            target,
            data: Vec::new(),
            committed: false,
        }
    }

    pub fn rule_name(&self) -> &RuleName {
        &self.name
    }

    /// Bytes staged so far; kept after a failed commit
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Commits the staged bytes exactly once.
    ///
    /// Updates the rule the buffer was opened on; otherwise updates a rule
    /// of the same name created in the meantime; otherwise creates it.
    /// Calling again after a success does nothing. After a failure the
    /// buffer keeps its bytes and the commit may be retried.
    pub fn commit(&mut self) -> Result<(), VfsError> {
        if self.committed {
            return Ok(());
        }

        if let Some(rule) = &self.target {
            if rule.state() == SyncState::Deleted {
                return Err(VfsError::Deleted(format!("{} on {}", self.name, self.host)));
            }
            rule.update_content(&self.data)?;
        } else {
            let host = self
                .controller
                .get_host(&self.host)
                .ok_or_else(|| VfsError::NotFound(format!("host {}", self.host)))?;
            match host.rule(&self.name) {
                Some(rule) => {
                    debug!(host = %self.host, rule = %self.name, "Rule appeared while writing, updating it");
                    rule.update_content(&self.data)?;
                }
                None => {
                    host.create_rule(self.name.clone(), self.data.clone())?;
                }
            }
        }

        self.committed = true;
        info!(host = %self.host, rule = %self.name, bytes = self.data.len(), "Write committed");
        Ok(())
    }

    /// Commits and reports failures as I/O errors.
    pub fn close(&mut self) -> io::Result<()> {
        self.commit().map_err(|e| {
            warn!(host = %self.host, rule = %self.name, error = %e, "Write commit failed");
            io::Error::from(e)
        })
    }
}

impl io::Write for WriteBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.committed {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("write buffer for {} already closed", self.name),
            ));
        }
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    /// Staged bytes are only sent by `close`.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for WriteBuffer {
    fn drop(&mut self) {
        if !self.committed && !self.data.is_empty() {
            debug!(
                host = %self.host,
                rule = %self.name,
                bytes = self.data.len(),
                "Write buffer dropped without close, discarding"
            );
        }
    }
}

impl fmt::Debug for WriteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBuffer")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("bound", &self.target.is_some())
            .field("bytes", &self.data.len())
            .field("committed", &self.committed)
            .finish()
    }
}
