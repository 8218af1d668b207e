use std::sync::Arc;

use bitflags::bitflags;

use crate::policy::PolicyDirectory;

bitflags! {
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
    pub struct AccessMask: u8 {
        const READ = 0b01;
        const WRITE = 0b10;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecisionReason {
    Granted,
    UnknownService,
    ServiceDisabled,
    LevelInsufficient,
}

#[derive(Clone, Debug)]
pub struct PermissionDecision {
    pub allowed: bool,
    pub reason: DecisionReason,
}

impl PermissionDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: DecisionReason::Granted,
        }
    }

    fn deny(reason: DecisionReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

pub trait AccessEvaluator: Send + Sync {
    fn evaluate(&self, service_id: &str, access: AccessMask) -> PermissionDecision;
}

pub struct PolicyEvaluator {
    policies: Arc<dyn PolicyDirectory>,
}

impl PolicyEvaluator {
    pub fn new(policies: Arc<dyn PolicyDirectory>) -> Self {
        Self { policies }
    }

    pub fn shared(policies: Arc<dyn PolicyDirectory>) -> Arc<Self> {
        Arc::new(Self::new(policies))
    }
}

impl AccessEvaluator for PolicyEvaluator {
    fn evaluate(&self, service_id: &str, access: AccessMask) -> PermissionDecision {
        let Some(policy) = self.policies.policy(service_id) else {
            return PermissionDecision::deny(DecisionReason::UnknownService);
        };
        if !policy.enabled {
            return PermissionDecision::deny(DecisionReason::ServiceDisabled);
        }
        if access.is_empty() {
            return PermissionDecision::deny(DecisionReason::LevelInsufficient);
        }
        if policy.permission_level.grants().contains(access) {
            PermissionDecision::allow()
        } else {
            PermissionDecision::deny(DecisionReason::LevelInsufficient)
        }
    }
}
