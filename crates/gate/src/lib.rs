mod types;

pub use types::{CallerContext, OperationRequest, ResolverResponse};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use access_plane::{AccessEvaluator, AccessMask, AdminAuthorizer, AdminPermit};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialCode {
    AccessDenied,
    UnknownOperation,
    AdminUnauthorized,
    ResolverUnavailable,
}

impl DenialCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialCode::AccessDenied => "access_denied",
            DenialCode::UnknownOperation => "unknown_operation",
            DenialCode::AdminUnauthorized => "admin_unauthorized",
            DenialCode::ResolverUnavailable => "resolver_unavailable",
        }
    }
}

impl fmt::Display for DenialCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("operation denied: {code}")]
    Denied { code: DenialCode },
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl GateError {
    pub fn denied(code: DenialCode) -> Self {
        Self::Denied { code }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum OperationClass {
    Data {
        service_id: &'static str,
        access: AccessMask,
    },
    Admin,
    Open,
}

pub struct OperationTable {
    entries: HashMap<&'static str, OperationClass>,
}

impl OperationTable {
    pub fn new(entries: &[(&'static str, OperationClass)]) -> Self {
        Self {
            entries: entries.iter().copied().collect(),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<OperationClass> {
        if name.is_empty() || name != name.trim() {
            return None;
        }
        self.entries.get(name).copied()
    }
}

pub fn default_table() -> OperationTable {
    OperationTable::new(&[
        (
            "eventlog.query",
            OperationClass::Data {
                service_id: "eventlog",
                access: AccessMask::READ,
            },
        ),
        (
            "eventlog.purge",
            OperationClass::Data {
                service_id: "eventlog",
                access: AccessMask::WRITE,
            },
        ),
        (
            "filesearch.query",
            OperationClass::Data {
                service_id: "filesearch",
                access: AccessMask::READ,
            },
        ),
        (
            "filesearch.reindex",
            OperationClass::Data {
                service_id: "filesearch",
                access: AccessMask::WRITE,
            },
        ),
        ("admin.service.enable", OperationClass::Admin),
        ("admin.service.disable", OperationClass::Admin),
        ("admin.service.permission", OperationClass::Admin),
        ("admin.service.anonymization", OperationClass::Admin),
        ("admin.service.reset", OperationClass::Admin),
        ("meta.health", OperationClass::Open),
        ("meta.version", OperationClass::Open),
    ])
}

#[async_trait]
pub trait DataResolver: Send + Sync {
    async fn resolve(
        &self,
        service_id: &str,
        access: AccessMask,
        req: &OperationRequest,
    ) -> Result<ResolverResponse, GateError>;
}

pub struct InMemoryResolver {
    evaluator: Arc<dyn AccessEvaluator>,
}

impl InMemoryResolver {
    pub fn new(evaluator: Arc<dyn AccessEvaluator>) -> Self {
        Self { evaluator }
    }

    pub fn shared(evaluator: Arc<dyn AccessEvaluator>) -> Arc<Self> {
        Arc::new(Self::new(evaluator))
    }
}

#[async_trait]
impl DataResolver for InMemoryResolver {
    async fn resolve(
        &self,
        service_id: &str,
        access: AccessMask,
        req: &OperationRequest,
    ) -> Result<ResolverResponse, GateError> {
        // resolvers re-check on their own even though the gate already did
        let decision = self.evaluator.evaluate(service_id, access);
        if !decision.allowed {
            return Err(GateError::denied(DenialCode::AccessDenied));
        }
        Ok(ResolverResponse {
            payload: req.payload.clone(),
        })
    }
}

pub struct RequestGate {
    table: OperationTable,
    evaluator: Arc<dyn AccessEvaluator>,
    authorizer: Arc<dyn AdminAuthorizer>,
    resolver: Arc<dyn DataResolver>,
}

impl RequestGate {
    pub fn new(
        table: OperationTable,
        evaluator: Arc<dyn AccessEvaluator>,
        authorizer: Arc<dyn AdminAuthorizer>,
        resolver: Arc<dyn DataResolver>,
    ) -> Self {
        Self {
            table,
            evaluator,
            authorizer,
            resolver,
        }
    }

    pub async fn dispatch(&self, mut req: OperationRequest) -> Result<ResolverResponse, GateError> {
        if req.request_id.is_empty() {
            req.request_id = Uuid::new_v4().to_string();
        }
        let class = match self.table.resolve(&req.name) {
            Some(class) => class,
            None => {
                warn!(
                    request_id = %req.request_id,
                    operation = %req.name,
                    "operation resolution failed, denying"
                );
                return Err(GateError::denied(DenialCode::UnknownOperation));
            }
        };

        match class {
            OperationClass::Open => {
                debug!(request_id = %req.request_id, operation = %req.name, "open operation");
                Ok(ResolverResponse {
                    payload: req.payload.clone(),
                })
            }
            OperationClass::Admin => {
                warn!(
                    request_id = %req.request_id,
                    operation = %req.name,
                    "administrative operation on the data path, denying"
                );
                Err(GateError::denied(DenialCode::AdminUnauthorized))
            }
            OperationClass::Data { service_id, access } => {
                let decision = self.evaluator.evaluate(service_id, access);
                if !decision.allowed {
                    debug!(
                        request_id = %req.request_id,
                        service_id,
                        reason = ?decision.reason,
                        "access denied"
                    );
                    return Err(GateError::denied(DenialCode::AccessDenied));
                }
                match self.resolver.resolve(service_id, access, &req).await {
                    Ok(response) => Ok(response),
                    Err(GateError::Denied { code }) => Err(GateError::denied(code)),
                    Err(err) => {
                        warn!(
                            request_id = %req.request_id,
                            service_id,
                            error = %err,
                            "resolver failure, denying"
                        );
                        Err(GateError::denied(DenialCode::ResolverUnavailable))
                    }
                }
            }
        }
    }

    pub fn authorize_admin(&self, caller: &CallerContext) -> Result<AdminPermit, GateError> {
        AdminPermit::acquire(
            self.authorizer.as_ref(),
            &caller.origin,
            caller.admin_token.as_deref(),
        )
        .ok_or(GateError::denied(DenialCode::AdminUnauthorized))
    }
}
