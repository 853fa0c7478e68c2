//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are interfaces the domain depends on but whose implementations
//! live elsewhere.
//!
//! ## Ports Overview
//!
//! - [`RemoteDevice`] - Rule operations on one live managed device
//! - [`DeviceConnector`] - Turns a host key and credentials into a device
//! - [`memory`] - In-memory adapter for tests and offline use

pub mod memory;
pub mod remote_device;

pub use memory::{MemoryConnector, MemoryDevice};
pub use remote_device::{DeviceConnector, RemoteDevice};
