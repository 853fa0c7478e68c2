//! Offline device snapshots
//!
//! A snapshot is a YAML file describing one or more devices and the rules
//! they hold:
//!
//! ```yaml
//! devices:
//!   - address: lb1.example.com
//!     port: 9090
//!     username: admin
//!     password: secret
//!     rules:
//!       Redirect: |
//!         http.redirect("https://example.com/");
//! ```
//!
//! The CLI loads it into a [`MemoryConnector`], links every device as a
//! host, and writes the devices back once a command has changed them.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zxfs_core::domain::{Credentials, HostKey, RuleName};
use zxfs_core::ports::{MemoryConnector, MemoryDevice};

/// One device and its rules
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Rule name to TrafficScript source
    #[serde(default)]
    pub rules: BTreeMap<String, String>,
}

impl DeviceSnapshot {
    pub fn key(&self) -> Result<HostKey> {
        HostKey::new(self.address.clone(), self.port)
            .with_context(|| format!("Invalid device {}:{}", self.address, self.port))
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

impl std::fmt::Debug for DeviceSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSnapshot")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("rules", &self.rules.len())
            .finish()
    }
}

/// Every device of a snapshot file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub devices: Vec<DeviceSnapshot>,
}

impl Snapshot {
    /// Loads a snapshot; a missing file is an empty snapshot.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Snapshot file missing, starting empty");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize snapshot")?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        info!(path = %path.display(), devices = self.devices.len(), "Snapshot saved");
        Ok(())
    }

    /// Builds a connector holding one in-memory device per entry.
    pub fn connector(&self) -> Result<Arc<MemoryConnector>> {
        let connector = Arc::new(MemoryConnector::new());
        for entry in &self.devices {
            let key = entry.key()?;
            let rules = entry
                .rules
                .iter()
                .map(|(name, source)| {
                    RuleName::new(name.clone())
                        .map(|name| (name, source.clone().into_bytes()))
                        .with_context(|| format!("Invalid rule name {:?} on {}", name, key))
                })
                .collect::<Result<Vec<_>>>()?;
            connector.insert(key, Arc::new(MemoryDevice::with_rules(rules)));
        }
        Ok(connector)
    }

    /// Replaces the rules of every entry with what the devices now hold.
    ///
    /// Devices created for hosts that only appear in the configuration are
    /// appended, with the credentials they were connected with.
    pub fn capture(&mut self, connector: &MemoryConnector) {
        for (key, device) in connector.devices() {
            let rules: BTreeMap<String, String> = device
                .snapshot()
                .into_iter()
                .map(|(name, content)| {
                    (
                        name.as_str().to_string(),
                        String::from_utf8_lossy(&content).into_owned(),
                    )
                })
                .collect();

            let existing = self
                .devices
                .iter_mut()
                .find(|entry| entry.key().map(|k| k == key).unwrap_or(false));
            match existing {
                Some(entry) => entry.rules = rules,
                None => {
                    let credentials = device.credentials();
                    self.devices.push(DeviceSnapshot {
                        address: key.address().to_string(),
                        port: key.port(),
                        username: credentials.username,
                        password: credentials.password,
                        rules,
                    });
                }
            }
        }
    }
}

/// Total remote mutations across every device of `connector`
pub fn mutation_count(connector: &MemoryConnector) -> usize {
    connector
        .devices()
        .iter()
        .map(|(_, device)| device.mutation_count())
        .sum()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;
    use zxfs_core::ports::RemoteDevice;

    use super::*;

    const SAMPLE: &str = r#"
devices:
  - address: h1
    port: 9090
    username: admin
    password: secret
    rules:
      Foo: bar
      "a:b": colon
"#;

    fn sample() -> Snapshot {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        Snapshot::load(file.path()).unwrap()
    }

    #[test]
    fn test_load_sample() {
        let snapshot = sample();
        assert_eq!(snapshot.devices.len(), 1);
        let device = &snapshot.devices[0];
        assert_eq!(device.key().unwrap(), HostKey::new("h1", 9090).unwrap());
        assert_eq!(device.credentials(), Credentials::new("admin", "secret"));
        assert_eq!(device.rules["a:b"], "colon");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = Snapshot::load(&dir.path().join("none.yaml")).unwrap();
        assert!(snapshot.devices.is_empty());
    }

    #[test]
    fn test_connector_holds_rules() {
        let connector = sample().connector().unwrap();
        let device = connector.device(&HostKey::new("h1", 9090).unwrap());
        assert_eq!(
            device.get_rule(&RuleName::new("Foo").unwrap()).unwrap(),
            b"bar"
        );
        assert_eq!(mutation_count(&connector), 0);
    }

    #[test]
    fn test_invalid_rule_name_is_rejected() {
        let snapshot = Snapshot {
            devices: vec![DeviceSnapshot {
                address: "h1".into(),
                port: 9090,
                username: String::new(),
                password: String::new(),
                rules: BTreeMap::from([("a/b".to_string(), String::new())]),
            }],
        };
        let err = snapshot.connector().unwrap_err();
        assert!(err.to_string().contains("a/b"));
    }

    #[test]
    fn test_capture_and_save_round_trip() {
        let mut snapshot = sample();
        let connector = snapshot.connector().unwrap();
        let h1 = connector.device(&HostKey::new("h1", 9090).unwrap());
        h1.add_rule(&RuleName::new("New").unwrap(), b"x").unwrap();
        connector.device(&HostKey::new("h2", 80).unwrap());

        snapshot.capture(&connector);
        let file = NamedTempFile::new().unwrap();
        snapshot.save(file.path()).unwrap();
        let reloaded = Snapshot::load(file.path()).unwrap();

        assert_eq!(reloaded.devices.len(), 2);
        assert_eq!(reloaded.devices[0].rules["New"], "x");
        assert_eq!(reloaded.devices[0].password, "secret");
        assert_eq!(reloaded.devices[1].address, "h2");
        assert!(reloaded.devices[1].rules.is_empty());
    }
}
