pub mod admin;
pub mod audit;
pub mod bootstrap;
pub mod config;
pub mod config_store;
pub mod evaluator;
pub mod paths;
pub mod policy;
pub mod static_config;

pub use admin::{AdminAuthorizer, AdminError, AdminHandler, AdminPermit, StaticAdminAuthorizer};
pub use audit::{
    AuditAction, AuditError, AuditEvent, AuditRecord, AuditSink, FileAuditSink, InMemoryAuditSink,
};
pub use bootstrap::{
    from_parts, in_memory, load_from_system_config, AccessPlaneBundle, BootstrapError,
    AUDIT_PATH_ENV, CONFIG_PATH_ENV,
};
pub use config::{ConfigError, SystemConfig, SystemConfigLoader};
pub use config_store::{
    ConfigStore, ConfigStoreError, InMemoryConfigStore, JsonFileConfigStore, PersistedConfig,
    CONFIG_SCHEMA_VERSION,
};
pub use evaluator::{
    AccessEvaluator, AccessMask, DecisionReason, PermissionDecision, PolicyEvaluator,
};
pub use paths::{resolve_within_base, PathError};
pub use policy::{InMemoryPolicyDirectory, PermissionLevel, PolicyDirectory, ServicePolicy};
