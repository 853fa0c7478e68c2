//! zxfs Core - Domain logic for remote rule projection
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Controller`, `Host`, `Rule`
//! - **State machine** - `SyncState` shared by hosts and rules, with
//!   listener fan-out on every transition
//! - **Port definitions** - `RemoteDevice` and `DeviceConnector`, plus an
//!   in-memory adapter
//! - **Configuration** - YAML-backed `Config`
//!
//! # Architecture
//!
//! The domain module holds the canonical tree of hosts and rules. It never
//! polls on its own: a poller (see `zxfs-sync`) drives state transitions,
//! and the filesystem projection (see `zxfs-vfs`) reads from it.

pub mod config;
pub mod domain;
pub mod ports;
