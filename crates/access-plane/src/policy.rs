use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::evaluator::AccessMask;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    Disabled,
    ReadOnly,
    ReadWrite,
}

impl PermissionLevel {
    pub fn grants(&self) -> AccessMask {
        match self {
            PermissionLevel::Disabled => AccessMask::empty(),
            PermissionLevel::ReadOnly => AccessMask::READ,
            PermissionLevel::ReadWrite => AccessMask::READ | AccessMask::WRITE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServicePolicy {
    pub service_id: String,
    pub enabled: bool,
    pub permission_level: PermissionLevel,
    pub enable_anonymization: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServicePolicy {
    pub fn secure_default(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            enabled: false,
            permission_level: PermissionLevel::Disabled,
            enable_anonymization: false,
            extra: Map::new(),
        }
    }
}

pub trait PolicyDirectory: Send + Sync {
    fn policy(&self, service_id: &str) -> Option<ServicePolicy>;
    fn policies(&self) -> Vec<ServicePolicy>;
}

pub struct InMemoryPolicyDirectory {
    services: RwLock<HashMap<String, ServicePolicy>>,
}

impl InMemoryPolicyDirectory {
    pub fn from_services(services: HashMap<String, ServicePolicy>) -> Self {
        Self {
            services: RwLock::new(services),
        }
    }

    pub fn with_defaults<I, S>(service_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let services = service_ids
            .into_iter()
            .map(|id| {
                let id = id.into();
                (id.clone(), ServicePolicy::secure_default(id))
            })
            .collect();
        Self::from_services(services)
    }

    pub fn shared(services: HashMap<String, ServicePolicy>) -> Arc<Self> {
        Arc::new(Self::from_services(services))
    }

    pub fn contains(&self, service_id: &str) -> bool {
        self.services.read().contains_key(service_id)
    }

    pub(crate) fn set_policy(&self, service_id: &str, policy: ServicePolicy) -> Option<ServicePolicy> {
        self.services.write().insert(service_id.to_string(), policy)
    }
}

impl PolicyDirectory for InMemoryPolicyDirectory {
    fn policy(&self, service_id: &str) -> Option<ServicePolicy> {
        self.services.read().get(service_id).cloned()
    }

    fn policies(&self) -> Vec<ServicePolicy> {
        self.services.read().values().cloned().collect()
    }
}
