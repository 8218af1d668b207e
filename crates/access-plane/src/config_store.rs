use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::paths::{resolve_within_base, PathError};
use crate::policy::ServicePolicy;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedConfig {
    pub schema_version: u32,
    pub last_modified_ms: u64,
    pub services: HashMap<String, ServicePolicy>,
}

impl PersistedConfig {
    pub fn new(services: HashMap<String, ServicePolicy>) -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            last_modified_ms: now_ms(),
            services,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("config file {path} is corrupt, quarantined to {quarantined_to}")]
    Corrupt { path: String, quarantined_to: String },
    #[error("config write failed: {0}")]
    Write(String),
    #[error("config path rejected: {0}")]
    Path(#[from] PathError),
}

pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<Option<PersistedConfig>, ConfigStoreError>;
    fn save(&self, config: &PersistedConfig) -> Result<(), ConfigStoreError>;
}

pub struct JsonFileConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileConfigStore {
    pub fn open(path: impl AsRef<Path>, base_dir: impl AsRef<Path>) -> Result<Self, ConfigStoreError> {
        let path = resolve_within_base(path.as_ref(), base_dir.as_ref())?;
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn shared(
        path: impl AsRef<Path>,
        base_dir: impl AsRef<Path>,
    ) -> Result<Arc<Self>, ConfigStoreError> {
        Ok(Arc::new(Self::open(path, base_dir)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn quarantine(&self) -> Result<PathBuf, ConfigStoreError> {
        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("config");
        let unique = Uuid::new_v4().simple().to_string();
        let target = self
            .path
            .with_file_name(format!("{file_name}.corrupt-{}-{}", now_ms(), &unique[..8]));
        fs::rename(&self.path, &target).map_err(|err| ConfigStoreError::Write(err.to_string()))?;
        Ok(target)
    }

    fn corrupt(&self, detail: &str) -> ConfigStoreError {
        warn!(path = %self.path.display(), detail, "persisted config is corrupt");
        match self.quarantine() {
            Ok(quarantined) => ConfigStoreError::Corrupt {
                path: self.path.display().to_string(),
                quarantined_to: quarantined.display().to_string(),
            },
            Err(err) => err,
        }
    }

    fn validate(config: &PersistedConfig) -> Result<(), String> {
        if config.schema_version != CONFIG_SCHEMA_VERSION {
            return Err(format!(
                "unsupported schema version {}",
                config.schema_version
            ));
        }
        for (key, policy) in &config.services {
            if policy.service_id != *key {
                return Err(format!(
                    "service entry {key} carries mismatched id {}",
                    policy.service_id
                ));
            }
        }
        Ok(())
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn load(&self) -> Result<Option<PersistedConfig>, ConfigStoreError> {
        let _guard = self.write_lock.lock();
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.corrupt(&err.to_string())),
        };
        let config: PersistedConfig = match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(err) => return Err(self.corrupt(&err.to_string())),
        };
        if let Err(detail) = Self::validate(&config) {
            return Err(self.corrupt(&detail));
        }
        Ok(Some(config))
    }

    fn save(&self, config: &PersistedConfig) -> Result<(), ConfigStoreError> {
        let payload = serde_json::to_string_pretty(config)
            .map_err(|err| ConfigStoreError::Write(err.to_string()))?;
        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("config");

        let _guard = self.write_lock.lock();
        let tmp = self
            .path
            .with_file_name(format!(".{file_name}.tmp-{}", Uuid::new_v4().simple()));
        fs::write(&tmp, payload).map_err(|err| ConfigStoreError::Write(err.to_string()))?;
        restrict_to_owner(&tmp);
        if let Err(err) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(ConfigStoreError::Write(err.to_string()));
        }
        Ok(())
    }
}

pub struct InMemoryConfigStore {
    snapshot: RwLock<Option<PersistedConfig>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(None),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load(&self) -> Result<Option<PersistedConfig>, ConfigStoreError> {
        Ok(self.snapshot.read().clone())
    }

    fn save(&self, config: &PersistedConfig) -> Result<(), ConfigStoreError> {
        *self.snapshot.write() = Some(config.clone());
        Ok(())
    }
}

#[cfg(unix)]
pub(crate) fn restrict_to_owner(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        warn!(path = %path.display(), error = %err, "unable to restrict file permissions");
    }
}

#[cfg(not(unix))]
pub(crate) fn restrict_to_owner(path: &Path) {
    warn!(
        path = %path.display(),
        "owner-only file permissions are not enforced on this platform"
    );
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
