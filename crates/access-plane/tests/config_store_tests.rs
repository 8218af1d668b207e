use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::thread;

use access_plane::{
    ConfigStore, ConfigStoreError, JsonFileConfigStore, PermissionLevel, PersistedConfig,
    ServicePolicy, CONFIG_SCHEMA_VERSION,
};

fn sample_config() -> PersistedConfig {
    let mut services = HashMap::new();
    let mut eventlog = ServicePolicy::secure_default("eventlog");
    eventlog.enabled = true;
    eventlog.permission_level = PermissionLevel::ReadOnly;
    services.insert("eventlog".to_string(), eventlog);
    services.insert(
        "filesearch".to_string(),
        ServicePolicy::secure_default("filesearch"),
    );
    PersistedConfig::new(services)
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store =
        JsonFileConfigStore::open(dir.path().join("services.json"), dir.path()).expect("store");

    let config = sample_config();
    store.save(&config).expect("save");
    let loaded = store.load().expect("load").expect("config");

    assert_eq!(loaded.schema_version, CONFIG_SCHEMA_VERSION);
    assert_eq!(loaded.last_modified_ms, config.last_modified_ms);
    assert_eq!(loaded.services, config.services);
}

#[test]
fn missing_file_loads_as_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store =
        JsonFileConfigStore::open(dir.path().join("services.json"), dir.path()).expect("store");
    assert!(store.load().expect("load").is_none());
}

#[test]
fn save_leaves_no_temp_files_behind() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store =
        JsonFileConfigStore::open(dir.path().join("services.json"), dir.path()).expect("store");
    store.save(&sample_config()).expect("save");

    let names: Vec<String> = fs::read_dir(dir.path())
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["services.json".to_string()]);
}

#[test]
fn truncated_file_is_quarantined_and_recoverable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("services.json");
    let store = JsonFileConfigStore::open(&path, dir.path()).expect("store");

    let truncated = "{\"schema_version\":1,\"last_modified_ms\":12,\"services\":{\"event";
    fs::write(&path, truncated).expect("write");

    let err = store.load().expect_err("corrupt");
    let quarantined_to = match err {
        ConfigStoreError::Corrupt { quarantined_to, .. } => quarantined_to,
        other => panic!("expected corrupt error, got {other}"),
    };
    assert!(!path.exists());
    assert!(quarantined_to.contains(".corrupt-"));
    let preserved = fs::read_to_string(&quarantined_to).expect("quarantined file");
    assert_eq!(preserved, truncated);

    assert!(store.load().expect("load").is_none());
}

#[test]
fn schema_version_mismatch_is_corrupt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("services.json");
    let store = JsonFileConfigStore::open(&path, dir.path()).expect("store");

    fs::write(
        &path,
        "{\"schema_version\":99,\"last_modified_ms\":12,\"services\":{}}",
    )
    .expect("write");

    assert!(matches!(
        store.load(),
        Err(ConfigStoreError::Corrupt { .. })
    ));
}

#[test]
fn unknown_permission_level_is_corrupt_not_coerced() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("services.json");
    let store = JsonFileConfigStore::open(&path, dir.path()).expect("store");

    let raw = r#"{
        "schema_version": 1,
        "last_modified_ms": 12,
        "services": {
            "eventlog": {
                "service_id": "eventlog",
                "enabled": true,
                "permission_level": "SUPERUSER",
                "enable_anonymization": false
            }
        }
    }"#;
    fs::write(&path, raw).expect("write");

    assert!(matches!(
        store.load(),
        Err(ConfigStoreError::Corrupt { .. })
    ));
}

#[test]
fn non_boolean_enabled_is_corrupt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("services.json");
    let store = JsonFileConfigStore::open(&path, dir.path()).expect("store");

    let raw = r#"{
        "schema_version": 1,
        "last_modified_ms": 12,
        "services": {
            "eventlog": {
                "service_id": "eventlog",
                "enabled": "yes",
                "permission_level": "READ_ONLY",
                "enable_anonymization": false
            }
        }
    }"#;
    fs::write(&path, raw).expect("write");

    assert!(matches!(
        store.load(),
        Err(ConfigStoreError::Corrupt { .. })
    ));
}

#[test]
fn mismatched_service_key_is_corrupt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("services.json");
    let store = JsonFileConfigStore::open(&path, dir.path()).expect("store");

    let raw = r#"{
        "schema_version": 1,
        "last_modified_ms": 12,
        "services": {
            "eventlog": {
                "service_id": "filesearch",
                "enabled": false,
                "permission_level": "DISABLED",
                "enable_anonymization": false
            }
        }
    }"#;
    fs::write(&path, raw).expect("write");

    assert!(matches!(
        store.load(),
        Err(ConfigStoreError::Corrupt { .. })
    ));
}

#[test]
fn path_outside_base_is_rejected() {
    let base = tempfile::tempdir().expect("base");
    let outside = tempfile::tempdir().expect("outside");

    let result = JsonFileConfigStore::open(outside.path().join("services.json"), base.path());
    assert!(matches!(result, Err(ConfigStoreError::Path(_))));
}

#[test]
fn parent_traversal_is_rejected() {
    let base = tempfile::tempdir().expect("base");
    let candidate = base.path().join("..").join("services.json");
    let result = JsonFileConfigStore::open(candidate, base.path());
    assert!(matches!(result, Err(ConfigStoreError::Path(_))));
}

#[cfg(unix)]
#[test]
fn symlink_escape_is_rejected() {
    let base = tempfile::tempdir().expect("base");
    let outside = tempfile::tempdir().expect("outside");
    let link = base.path().join("link");
    std::os::unix::fs::symlink(outside.path(), &link).expect("symlink");

    let result = JsonFileConfigStore::open(link.join("services.json"), base.path());
    assert!(matches!(result, Err(ConfigStoreError::Path(_))));
}

#[cfg(unix)]
#[test]
fn saved_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("services.json");
    let store = JsonFileConfigStore::open(&path, dir.path()).expect("store");
    store.save(&sample_config()).expect("save");

    let mode = fs::metadata(&path).expect("metadata").permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn concurrent_saves_leave_a_parseable_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(
        JsonFileConfigStore::open(dir.path().join("services.json"), dir.path()).expect("store"),
    );

    let mut handles = Vec::new();
    for index in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            let mut services = HashMap::new();
            for n in 0..=index {
                let id = format!("service-{n}");
                services.insert(id.clone(), ServicePolicy::secure_default(id));
            }
            store.save(&PersistedConfig::new(services)).expect("save");
        }));
    }
    for handle in handles {
        handle.join().expect("thread");
    }

    let loaded = store.load().expect("load").expect("config");
    assert!(!loaded.services.is_empty());
    assert!(loaded.services.len() <= 8);
}
