#[derive(Clone, Debug)]
pub struct StaticConfigItem {
    pub key: &'static str,
    pub description: &'static str,
    pub value_type: &'static str,
    pub default_value: &'static str,
}

pub static STATIC_CONFIG_TABLE: &[StaticConfigItem] = &[
    StaticConfigItem {
        key: "storage.base_dir",
        description: "Directory that must contain every file this process writes",
        value_type: "string",
        default_value: "data",
    },
    StaticConfigItem {
        key: "storage.config_path",
        description: "Persisted service configuration file",
        value_type: "string",
        default_value: "data/services.json",
    },
    StaticConfigItem {
        key: "audit.log_path",
        description: "Active audit trail file",
        value_type: "string",
        default_value: "data/audit.log",
    },
    StaticConfigItem {
        key: "audit.rotate_bytes",
        description: "Audit file size threshold that triggers rotation",
        value_type: "number",
        default_value: "10485760",
    },
    StaticConfigItem {
        key: "audit.retain_files",
        description: "Rotated audit backups kept before the oldest is deleted",
        value_type: "number",
        default_value: "5",
    },
    StaticConfigItem {
        key: "bootstrap.seed_on_start",
        description: "Persist secure defaults on first start when no config file exists",
        value_type: "boolean",
        default_value: "true",
    },
    StaticConfigItem {
        key: "services.known",
        description: "Comma-separated service ids registered at startup",
        value_type: "string",
        default_value: "",
    },
];
