use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info};

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::config_store::{ConfigStore, ConfigStoreError, PersistedConfig};
use crate::policy::{InMemoryPolicyDirectory, PermissionLevel, PolicyDirectory, ServicePolicy};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("config persistence failed: {0}")]
    Persist(#[from] ConfigStoreError),
}

pub trait AdminAuthorizer: Send + Sync {
    fn authorize(&self, origin: &str, token: Option<&str>) -> bool;
}

/// Proof that the administrative authorization gate approved the caller.
/// Only `acquire` can mint one, so handler methods cannot run ungated.
pub struct AdminPermit {
    _private: (),
}

impl AdminPermit {
    pub fn acquire(
        authorizer: &dyn AdminAuthorizer,
        origin: &str,
        token: Option<&str>,
    ) -> Option<AdminPermit> {
        if authorizer.authorize(origin, token) {
            Some(AdminPermit { _private: () })
        } else {
            None
        }
    }
}

pub struct StaticAdminAuthorizer {
    tokens: HashSet<String>,
}

impl StaticAdminAuthorizer {
    pub fn new(tokens: HashSet<String>) -> Self {
        Self { tokens }
    }

    pub fn shared(tokens: HashSet<String>) -> Arc<Self> {
        Arc::new(Self::new(tokens))
    }
}

impl AdminAuthorizer for StaticAdminAuthorizer {
    fn authorize(&self, _origin: &str, token: Option<&str>) -> bool {
        token.map(|token| self.tokens.contains(token)).unwrap_or(false)
    }
}

pub struct AdminHandler {
    registry: Arc<InMemoryPolicyDirectory>,
    store: Arc<dyn ConfigStore>,
    audit: Arc<dyn AuditSink>,
    admin_lock: Mutex<()>,
}

impl AdminHandler {
    pub fn new(
        registry: Arc<InMemoryPolicyDirectory>,
        store: Arc<dyn ConfigStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            registry,
            store,
            audit,
            admin_lock: Mutex::new(()),
        }
    }

    pub fn shared(
        registry: Arc<InMemoryPolicyDirectory>,
        store: Arc<dyn ConfigStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Arc<Self> {
        Arc::new(Self::new(registry, store, audit))
    }

    pub fn enable_service(
        &self,
        _permit: &AdminPermit,
        service_id: &str,
        level: PermissionLevel,
        source: &str,
    ) -> Result<ServicePolicy, AdminError> {
        self.apply(service_id, AuditAction::ServiceEnable, source, |policy| {
            policy.enabled = true;
            policy.permission_level = level;
        })
    }

    pub fn disable_service(
        &self,
        _permit: &AdminPermit,
        service_id: &str,
        source: &str,
    ) -> Result<ServicePolicy, AdminError> {
        self.apply(service_id, AuditAction::ServiceDisable, source, |policy| {
            policy.enabled = false;
        })
    }

    pub fn set_permission_level(
        &self,
        _permit: &AdminPermit,
        service_id: &str,
        level: PermissionLevel,
        source: &str,
    ) -> Result<ServicePolicy, AdminError> {
        self.apply(service_id, AuditAction::PermissionChange, source, |policy| {
            policy.permission_level = level;
        })
    }

    pub fn set_anonymization(
        &self,
        _permit: &AdminPermit,
        service_id: &str,
        enabled: bool,
        source: &str,
    ) -> Result<ServicePolicy, AdminError> {
        self.apply(service_id, AuditAction::PiiToggle, source, |policy| {
            policy.enable_anonymization = enabled;
        })
    }

    pub fn reset_service(
        &self,
        _permit: &AdminPermit,
        service_id: &str,
        source: &str,
    ) -> Result<ServicePolicy, AdminError> {
        self.apply(service_id, AuditAction::ConfigReset, source, |policy| {
            *policy = ServicePolicy::secure_default(policy.service_id.clone());
        })
    }

    pub fn snapshot(&self) -> PersistedConfig {
        PersistedConfig::new(policies_to_map(self.registry.policies()))
    }

    fn apply(
        &self,
        service_id: &str,
        action: AuditAction,
        source: &str,
        mutate: impl FnOnce(&mut ServicePolicy),
    ) -> Result<ServicePolicy, AdminError> {
        let _guard = self.admin_lock.lock();
        let Some(previous) = self.registry.policy(service_id) else {
            return Err(AdminError::InvalidRequest(format!(
                "unknown service {service_id}"
            )));
        };

        let mut next = previous.clone();
        mutate(&mut next);
        self.registry.set_policy(service_id, next.clone());

        let snapshot = PersistedConfig::new(policies_to_map(self.registry.policies()));
        if let Err(err) = self.store.save(&snapshot) {
            self.registry.set_policy(service_id, previous);
            return Err(AdminError::Persist(err));
        }

        let event = AuditEvent {
            action,
            service_id: service_id.to_string(),
            previous_value: serde_json::to_value(&previous).ok(),
            new_value: serde_json::to_value(&next).ok(),
            source: source.to_string(),
        };
        if let Err(err) = self.audit.record(event) {
            error!(
                service_id = %service_id,
                error = %err,
                "audit trail append failed for an applied administrative change"
            );
        }
        info!(
            service_id = %service_id,
            action = ?action,
            source = %source,
            "administrative change applied"
        );
        Ok(next)
    }
}

fn policies_to_map(policies: Vec<ServicePolicy>) -> HashMap<String, ServicePolicy> {
    policies
        .into_iter()
        .map(|policy| (policy.service_id.clone(), policy))
        .collect()
}
