use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::admin::AdminHandler;
use crate::audit::{AuditAction, AuditError, AuditEvent, AuditSink, FileAuditSink, InMemoryAuditSink};
use crate::config::SystemConfig;
use crate::config_store::{
    ConfigStore, ConfigStoreError, InMemoryConfigStore, JsonFileConfigStore,
};
use crate::evaluator::{AccessEvaluator, PolicyEvaluator};
use crate::policy::{InMemoryPolicyDirectory, PolicyDirectory, ServicePolicy};

pub const CONFIG_PATH_ENV: &str = "ACCESS_PLANE_CONFIG_PATH";
pub const AUDIT_PATH_ENV: &str = "ACCESS_PLANE_AUDIT_PATH";

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config store: {0}")]
    Store(#[from] ConfigStoreError),
    #[error("audit log: {0}")]
    Audit(#[from] AuditError),
}

pub struct AccessPlaneBundle {
    pub directory: Arc<InMemoryPolicyDirectory>,
    pub evaluator: Arc<dyn AccessEvaluator>,
    pub admin: Arc<AdminHandler>,
    pub audit: Arc<dyn AuditSink>,
    pub store: Arc<dyn ConfigStore>,
}

pub fn from_parts(
    store: Arc<dyn ConfigStore>,
    audit: Arc<dyn AuditSink>,
    known_services: &[String],
    seed_on_start: bool,
) -> AccessPlaneBundle {
    let persisted = match store.load() {
        Ok(found) => found,
        Err(err) => {
            warn!(error = %err, "persisted config unusable, starting from secure defaults");
            None
        }
    };
    let first_start = persisted.is_none();

    let mut services: HashMap<String, ServicePolicy> =
        persisted.map(|config| config.services).unwrap_or_default();
    for id in known_services {
        services
            .entry(id.clone())
            .or_insert_with(|| ServicePolicy::secure_default(id.clone()));
    }

    let directory = InMemoryPolicyDirectory::shared(services);
    let evaluator: Arc<dyn AccessEvaluator> = PolicyEvaluator::shared(directory.clone());
    let admin = AdminHandler::shared(directory.clone(), store.clone(), audit.clone());

    if first_start && seed_on_start {
        if let Err(err) = store.save(&admin.snapshot()) {
            warn!(error = %err, "unable to persist secure defaults on first start");
        }
    }

    let startup = AuditEvent {
        action: AuditAction::Startup,
        service_id: "*".to_string(),
        previous_value: None,
        new_value: Some(json!({ "services": directory.policies().len() })),
        source: "bootstrap".to_string(),
    };
    if let Err(err) = audit.record(startup) {
        warn!(error = %err, "unable to record startup audit entry");
    }
    info!(services = directory.policies().len(), "access plane ready");

    AccessPlaneBundle {
        directory,
        evaluator,
        admin,
        audit,
        store,
    }
}

pub fn in_memory(known_services: &[String]) -> AccessPlaneBundle {
    from_parts(
        InMemoryConfigStore::shared(),
        InMemoryAuditSink::shared(),
        known_services,
        false,
    )
}

pub fn load_from_system_config(config: &SystemConfig) -> Result<AccessPlaneBundle, BootstrapError> {
    let base_dir = config.get_string("storage.base_dir");
    let config_path = env::var(CONFIG_PATH_ENV)
        .ok()
        .unwrap_or_else(|| config.get_string("storage.config_path"));
    let audit_path = env::var(AUDIT_PATH_ENV)
        .ok()
        .unwrap_or_else(|| config.get_string("audit.log_path"));

    let store = JsonFileConfigStore::shared(&config_path, &base_dir)?;
    let rotate_bytes = config.get_number("audit.rotate_bytes").max(1) as u64;
    let retain = config.get_number("audit.retain_files").max(1) as usize;
    let audit = FileAuditSink::shared(&audit_path, &base_dir, rotate_bytes, retain)?;

    let known: Vec<String> = config
        .get_string("services.known")
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    let seed_on_start = config.get_bool("bootstrap.seed_on_start");

    Ok(from_parts(store, audit, &known, seed_on_start))
}
