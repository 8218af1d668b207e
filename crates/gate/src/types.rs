use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallerContext {
    pub origin: String,
    pub admin_token: Option<String>,
}

impl CallerContext {
    pub fn anonymous(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            admin_token: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationRequest {
    pub request_id: String,
    pub name: String,
    pub caller: CallerContext,
    pub payload: Value,
}

impl OperationRequest {
    pub fn new(name: impl Into<String>, caller: CallerContext, payload: Value) -> Self {
        Self {
            request_id: String::new(),
            name: name.into(),
            caller,
            payload,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverResponse {
    pub payload: Value,
}
