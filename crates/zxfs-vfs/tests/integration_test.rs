//! Integration test: Controller → RuleFs → MemoryDevice
//!
//! Drives the public filesystem API against in-memory devices, with the
//! model refreshed by hand the way the poller would.

use std::io::Write;
use std::sync::Arc;
use std::thread;

use zxfs_core::domain::{Controller, Credentials, Host, HostKey, RemoteError, RuleName};
use zxfs_core::ports::{MemoryConnector, MemoryDevice, RemoteDevice};
use zxfs_vfs::{ChangeKind, RuleFs, VfsError};

const H1: &str = "zxtm://h1:9090";

struct Fixture {
    fs: RuleFs,
    host: Arc<Host>,
    device: Arc<MemoryDevice>,
}

fn fixture() -> Fixture {
    let connector = Arc::new(MemoryConnector::new());
    let key = HostKey::new("h1", 9090).unwrap();
    let device = connector.device(&key);
    let controller = Arc::new(Controller::new(connector));
    let host = controller
        .add_host(key, Credentials::new("admin", "secret"))
        .unwrap();
    Fixture {
        fs: RuleFs::new(controller),
        host,
        device,
    }
}

fn name(s: &str) -> RuleName {
    RuleName::new(s).unwrap()
}

/// One poll pass over the fixture host.
fn refresh(f: &Fixture) {
    let names = match f.device.list_rules() {
        Ok(names) => names,
        Err(e) => {
            f.host.mark_failed(e).unwrap();
            return;
        }
    };
    f.host.apply_listing(names);
    for rule in f.host.rules() {
        match f.device.get_rule(rule.name()) {
            Ok(content) => rule.apply_fetched(content).unwrap(),
            Err(e) => {
                rule.mark_failed(e).unwrap();
            }
        }
    }
    f.host.mark_up_to_date().unwrap();
}

fn write(fs: &RuleFs, uri: &str, body: &[u8]) -> std::io::Result<()> {
    let handle = fs.resolve(uri).unwrap();
    let mut writer = fs.open_write(&handle).map_err(std::io::Error::from)?;
    writer.write_all(body)?;
    writer.close()
}

#[test]
fn scenario_a_empty_collection() {
    let f = fixture();
    refresh(&f);

    let rules = f.fs.resolve(&format!("{H1}/Rules")).unwrap();
    let meta = f.fs.metadata(&rules);
    assert!(meta.exists);
    assert!(meta.is_directory);
    assert!(f.fs.list_children(&rules).is_empty());
}

#[test]
fn scenario_b_existing_rule() {
    let f = fixture();
    f.device.put(name("Foo"), "bar");
    refresh(&f);

    let handle = f.fs.resolve(&format!("{H1}/Rules/Foo.zts")).unwrap();
    let meta = f.fs.metadata(&handle);
    assert!(meta.exists);
    assert_eq!(meta.length, 3);
    assert_eq!(f.fs.open_read(&handle).unwrap(), b"bar");
}

#[test]
fn scenario_c_write_creates_missing_rule() {
    let f = fixture();
    refresh(&f);
    let uri = format!("{H1}/Rules/Missing.zts");

    let handle = f.fs.resolve(&uri).unwrap();
    assert!(!f.fs.metadata(&handle).exists);

    write(&f.fs, &uri, b"x").unwrap();

    let again = f.fs.resolve(&uri).unwrap();
    let meta = f.fs.metadata(&again);
    assert!(meta.exists);
    assert_eq!(meta.length, 1);
    assert_eq!(f.device.get_rule(&name("Missing")).unwrap(), b"x");
}

#[test]
fn scenario_d_delimiter_in_name() {
    let f = fixture();
    f.device.put(name("a:b"), "colon");
    f.device.put(name("a~b"), "tilde");
    refresh(&f);

    let rules = f.fs.resolve(&format!("{H1}/Rules/")).unwrap();
    assert_eq!(f.fs.list_children(&rules), vec!["a~cb.zts", "a~b.zts"]);

    let colon = f.fs.resolve(&format!("{H1}/Rules/a~cb.zts")).unwrap();
    let tilde = f.fs.resolve(&format!("{H1}/Rules/a~b.zts")).unwrap();
    assert_eq!(f.fs.open_read(&colon).unwrap(), b"colon");
    assert_eq!(f.fs.open_read(&tilde).unwrap(), b"tilde");
}

#[test]
fn resolution_is_idempotent_across_spellings() {
    let f = fixture();
    f.device.put(name("Foo"), "bar");
    refresh(&f);

    let spellings = [
        format!("{H1}/Rules"),
        format!("{H1}/Rules/"),
        format!("{H1}/./Rules"),
        format!("{H1}/Rules/Foo.zts/.."),
    ];
    let handles: Vec<_> = spellings.iter().map(|s| f.fs.resolve(s).unwrap()).collect();
    for handle in &handles {
        assert!(Arc::ptr_eq(handle, &handles[0]));
        assert_eq!(f.fs.list_children(handle), vec!["Foo.zts"]);
    }
}

#[test]
fn write_then_read_back() {
    let f = fixture();
    f.device.put(name("Foo"), "old");
    refresh(&f);
    let uri = format!("{H1}/Rules/Foo.zts");

    write(&f.fs, &uri, b"new content").unwrap();

    let handle = f.fs.resolve(&uri).unwrap();
    assert_eq!(f.fs.open_read(&handle).unwrap(), b"new content");
}

#[test]
fn delete_then_not_found() {
    let f = fixture();
    f.device.put(name("Foo"), "bar");
    refresh(&f);
    let uri = format!("{H1}/Rules/Foo.zts");

    let handle = f.fs.resolve(&uri).unwrap();
    f.fs.delete(&handle).unwrap();

    assert!(!f.fs.metadata(&f.fs.resolve(&uri).unwrap()).exists);
    assert!(matches!(
        f.fs.open_read(&handle),
        Err(VfsError::NotFound(_))
    ));
    assert!(f.device.snapshot().is_empty());
}

#[test]
fn reads_are_gated_on_sync_state() {
    let f = fixture();
    f.device.put(name("Foo"), "bar");
    f.host.apply_listing(f.device.list_rules().unwrap());
    let handle = f.fs.resolve(&format!("{H1}/Rules/Foo.zts")).unwrap();

    // Listed but never fetched.
    assert!(f.fs.metadata(&handle).exists);
    assert!(matches!(
        f.fs.open_read(&handle),
        Err(VfsError::PendingFirstSync(_))
    ));

    f.host
        .rule(&name("Foo"))
        .unwrap()
        .mark_failed(RemoteError::authentication("bad password for admin"))
        .unwrap();
    match f.fs.open_read(&handle) {
        Err(VfsError::RemoteAuthFailed(message)) => {
            assert!(message.contains("bad password for admin"))
        }
        other => panic!("unexpected read result: {other:?}"),
    }

    refresh(&f);
    assert_eq!(f.fs.open_read(&handle).unwrap(), b"bar");
}

#[test]
fn remote_delete_is_observed_by_cached_handles() {
    let f = fixture();
    f.device.put(name("Foo"), "bar");
    refresh(&f);
    let handle = f.fs.resolve(&format!("{H1}/Rules/Foo.zts")).unwrap();
    let rule = f.host.rule(&name("Foo")).unwrap();

    f.device.remove(&name("Foo"));
    refresh(&f);

    assert!(!f.fs.metadata(&handle).exists);
    assert_eq!(rule.state(), zxfs_core::domain::SyncState::Deleted);
}

#[test]
fn failed_commit_surfaces_io_error_and_keeps_buffer() {
    let f = fixture();
    refresh(&f);
    let handle = f.fs.resolve(&format!("{H1}/Rules/Foo.zts")).unwrap();
    let mut writer = f.fs.open_write(&handle).unwrap();
    writer.write_all(b"draft").unwrap();

    f.device.fail_with(RemoteError::connection_refused("h1 down"));
    let err = writer.close().unwrap_err();
    assert!(err.to_string().contains("h1 down"));
    assert_eq!(writer.contents(), b"draft");
    assert!(!f.fs.metadata(&handle).exists);
}

#[test]
fn unknown_host_stub_becomes_valid_once_linked() {
    let f = fixture();
    let uri = "zxtm://h2:9090/Rules";
    let stub = f.fs.resolve(uri).unwrap();
    assert!(!f.fs.metadata(&stub).exists);
    assert!(f.fs.parent(&stub).is_some());

    f.fs.controller()
        .add_host(HostKey::new("h2", 9090).unwrap(), Credentials::default())
        .unwrap();
    let rules = f.fs.resolve(uri).unwrap();
    assert!(f.fs.metadata(&rules).exists);
    assert!(f.fs.metadata(&f.fs.parent(&rules).unwrap()).is_directory);
}

#[test]
fn concurrent_resolution_while_polling() {
    let f = Arc::new(fixture());
    for i in 0..20 {
        f.device.put(name(&format!("r{i}")), format!("v{i}"));
    }

    let poller = {
        let f = Arc::clone(&f);
        thread::spawn(move || {
            for _ in 0..50 {
                refresh(&f);
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let f = Arc::clone(&f);
            thread::spawn(move || {
                for i in 0..200 {
                    let uri = format!("{H1}/Rules/r{}.zts", i % 20);
                    let a = f.fs.resolve(&uri).unwrap();
                    let b = f.fs.resolve(&uri).unwrap();
                    assert!(Arc::ptr_eq(&a, &b));
                    match f.fs.open_read(&a) {
                        Ok(body) => assert_eq!(body, format!("v{}", i % 20).into_bytes()),
                        Err(VfsError::PendingFirstSync(_)) | Err(VfsError::NotFound(_)) => {}
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
            })
        })
        .collect();

    poller.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[tokio::test]
async fn change_feed_reports_writes_by_host() {
    let f = fixture();
    refresh(&f);
    let mut rx = f.fs.subscribe();

    write(&f.fs, &format!("{H1}/Rules/Foo.zts"), b"bar").unwrap();

    let change = rx.recv().await.unwrap();
    assert_eq!(change.host, HostKey::new("h1", 9090).unwrap());
    assert_eq!(change.kind, ChangeKind::RuleAdded { rule: name("Foo") });
}
