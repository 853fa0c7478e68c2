//! In-memory remote device
//!
//! A [`RemoteDevice`] that keeps its rules in a map. Used by tests and by
//! the CLI's offline snapshot mode. Failures can be injected with
//! [`MemoryDevice::fail_with`] to exercise the `CannotSync` paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::remote_device::{DeviceConnector, RemoteDevice};
use crate::domain::{Credentials, HostKey, RemoteError, RuleName};

/// In-memory device holding rule contents by name
#[derive(Debug, Default)]
pub struct MemoryDevice {
    rules: Mutex<BTreeMap<RuleName, Vec<u8>>>,
    credentials: Mutex<Credentials>,
    failure: Mutex<Option<RemoteError>>,
    mutations: AtomicUsize,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a device pre-populated with `rules`
    pub fn with_rules<I>(rules: I) -> Self
    where
        I: IntoIterator<Item = (RuleName, Vec<u8>)>,
    {
        let device = Self::new();
        device.rules.lock().extend(rules);
        device
    }

    /// Makes every subsequent call fail with `error`
    pub fn fail_with(&self, error: RemoteError) {
        *self.failure.lock() = Some(error);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    /// Inserts or replaces a rule without counting it as a mutation
    pub fn put(&self, name: RuleName, content: impl Into<Vec<u8>>) {
        self.rules.lock().insert(name, content.into());
    }

    /// Removes a rule without counting it as a mutation
    pub fn remove(&self, name: &RuleName) -> Option<Vec<u8>> {
        self.rules.lock().remove(name)
    }

    /// Current rules, sorted by name
    pub fn snapshot(&self) -> BTreeMap<RuleName, Vec<u8>> {
        self.rules.lock().clone()
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials.lock().clone()
    }

    /// Number of successful add/update/delete/rename calls
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RemoteError> {
        match self.failure.lock().as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn mutated(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

fn no_such_rule(name: &RuleName) -> RemoteError {
    RemoteError::internal(format!("No such rule: {}", name))
}

impl RemoteDevice for MemoryDevice {
    fn list_rules(&self) -> Result<Vec<RuleName>, RemoteError> {
        self.check()?;
        Ok(self.rules.lock().keys().cloned().collect())
    }

    fn get_rule(&self, name: &RuleName) -> Result<Vec<u8>, RemoteError> {
        self.check()?;
        self.rules
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| no_such_rule(name))
    }

    fn add_rule(&self, name: &RuleName, content: &[u8]) -> Result<(), RemoteError> {
        self.check()?;
        let mut rules = self.rules.lock();
        if rules.contains_key(name) {
            return Err(RemoteError::name_already_exists(name.to_string()));
        }
        rules.insert(name.clone(), content.to_vec());
        self.mutated();
        Ok(())
    }

    fn set_rule_content(&self, name: &RuleName, content: &[u8]) -> Result<(), RemoteError> {
        self.check()?;
        let mut rules = self.rules.lock();
        let slot = rules.get_mut(name).ok_or_else(|| no_such_rule(name))?;
        *slot = content.to_vec();
        self.mutated();
        Ok(())
    }

    fn delete_rule(&self, name: &RuleName) -> Result<(), RemoteError> {
        self.check()?;
        self.rules
            .lock()
            .remove(name)
            .ok_or_else(|| no_such_rule(name))?;
        self.mutated();
        Ok(())
    }

    fn rename_rule(&self, old: &RuleName, new: &RuleName) -> Result<(), RemoteError> {
        self.check()?;
        let mut rules = self.rules.lock();
        if rules.contains_key(new) {
            return Err(RemoteError::name_already_exists(new.to_string()));
        }
        let content = rules.remove(old).ok_or_else(|| no_such_rule(old))?;
        rules.insert(new.clone(), content);
        self.mutated();
        Ok(())
    }

    fn set_credentials(&self, credentials: &Credentials) -> Result<(), RemoteError> {
        self.check()?;
        *self.credentials.lock() = credentials.clone();
        Ok(())
    }
}

/// Connector handing out [`MemoryDevice`]s, one per host key
///
/// Connecting to an unknown key creates an empty device.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    devices: Mutex<HashMap<HostKey, Arc<MemoryDevice>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `device` for `key`, replacing any previous one
    pub fn insert(&self, key: HostKey, device: Arc<MemoryDevice>) {
        self.devices.lock().insert(key, device);
    }

    /// Returns the device for `key`, creating an empty one if needed
    pub fn device(&self, key: &HostKey) -> Arc<MemoryDevice> {
        Arc::clone(
            self.devices
                .lock()
                .entry(key.clone())
                .or_insert_with(|| Arc::new(MemoryDevice::new())),
        )
    }

    /// Every known device, keyed by host
    pub fn devices(&self) -> Vec<(HostKey, Arc<MemoryDevice>)> {
        let mut all: Vec<_> = self
            .devices
            .lock()
            .iter()
            .map(|(k, d)| (k.clone(), Arc::clone(d)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

impl DeviceConnector for MemoryConnector {
    fn connect(&self, key: &HostKey, credentials: &Credentials) -> Arc<dyn RemoteDevice> {
        let device = self.device(key);
        *device.credentials.lock() = credentials.clone();
        device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RemoteErrorKind;

    fn name(s: &str) -> RuleName {
        RuleName::new(s).unwrap()
    }

    #[test]
    fn test_add_get_list() {
        let device = MemoryDevice::new();
        device.add_rule(&name("Foo"), b"bar").unwrap();
        assert_eq!(device.get_rule(&name("Foo")).unwrap(), b"bar");
        assert_eq!(device.list_rules().unwrap(), vec![name("Foo")]);
        assert_eq!(device.mutation_count(), 1);
    }

    #[test]
    fn test_add_existing_fails_with_conflict() {
        let device = MemoryDevice::with_rules([(name("Foo"), b"x".to_vec())]);
        let err = device.add_rule(&name("Foo"), b"y").unwrap_err();
        assert_eq!(err.kind(), RemoteErrorKind::NameAlreadyExists);
        assert_eq!(device.get_rule(&name("Foo")).unwrap(), b"x");
    }

    #[test]
    fn test_rename_and_delete() {
        let device = MemoryDevice::with_rules([(name("A"), b"1".to_vec())]);
        device.rename_rule(&name("A"), &name("B")).unwrap();
        assert!(device.get_rule(&name("A")).is_err());
        assert_eq!(device.get_rule(&name("B")).unwrap(), b"1");

        device.delete_rule(&name("B")).unwrap();
        assert!(device.list_rules().unwrap().is_empty());
    }

    #[test]
    fn test_injected_failure() {
        let device = MemoryDevice::new();
        device.fail_with(RemoteError::connection_refused("down"));
        let err = device.list_rules().unwrap_err();
        assert_eq!(err.kind(), RemoteErrorKind::ConnectionRefused);

        device.clear_failure();
        assert!(device.list_rules().is_ok());
    }

    #[test]
    fn test_connector_reuses_device_per_key() {
        let connector = MemoryConnector::new();
        let key = HostKey::new("h1", 9090).unwrap();
        connector.device(&key).put(name("Foo"), "bar");

        let device = connector.connect(&key, &Credentials::new("admin", "pw"));
        assert_eq!(device.get_rule(&name("Foo")).unwrap(), b"bar");
        assert_eq!(connector.device(&key).credentials().username, "admin");
    }
}
