//! zxfs VFS - Rule filesystem projection
//!
//! Projects the rules of every linked host into a hierarchical namespace:
//!
//! ```text
//! zxtm://<address>:<port>/            host root
//! zxtm://<address>:<port>/Rules       rule collection
//! zxtm://<address>:<port>/Rules/N.zts rule N (':' written as "~c")
//! ```
//!
//! # Architecture
//!
//! - [`RuleFs`] is the entry point; it owns the resolver and change feed
//! - [`PathResolver`] turns URIs into [`StoreHandle`]s, memoized in a
//!   [`HandleCache`]
//! - [`StoreHandle`] re-reads its host or rule from the model on every
//!   operation and gates reads on the rule's sync state
//! - [`WriteBuffer`] stages writes and commits them once, on close
//! - [`ChangeFeed`] republishes model events keyed by host
//!
//! # Usage
//!
//! ```
//! use std::io::Write;
//! use std::sync::Arc;
//!
//! use zxfs_core::domain::{Controller, Credentials, HostKey};
//! use zxfs_core::ports::MemoryConnector;
//! use zxfs_vfs::RuleFs;
//!
//! let controller = Arc::new(Controller::new(Arc::new(MemoryConnector::new())));
//! controller
//!     .add_host(HostKey::new("h1", 9090).unwrap(), Credentials::default())
//!     .unwrap();
//! let fs = RuleFs::new(controller);
//!
//! let handle = fs.resolve("zxtm://h1:9090/Rules/Foo.zts").unwrap();
//! let mut writer = fs.open_write(&handle).unwrap();
//! writer.write_all(b"bar").unwrap();
//! writer.close().unwrap();
//! assert_eq!(fs.open_read(&handle).unwrap(), b"bar");
//! ```

pub mod cache;
pub mod changes;
pub mod error;
pub mod filesystem;
pub mod handle;
pub mod naming;
pub mod path;
pub mod resolver;
pub mod write_buffer;

pub use cache::HandleCache;
pub use changes::{ChangeFeed, ChangeKind, HostChange};
pub use error::VfsError;
pub use filesystem::RuleFs;
pub use handle::{HandleKind, Metadata, NotFoundReason, StoreHandle};
pub use path::NamespacePath;
pub use resolver::PathResolver;
pub use write_buffer::WriteBuffer;
