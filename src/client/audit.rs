use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    Login { user_id: Uuid },
    Logout { user_id: Option<Uuid> },
    SessionRestored { user_id: Uuid },
    SessionExpired { user_id: Uuid },
    SessionRejected { user_id: Uuid },
}

/// Receives session transitions. Errors are logged by the caller and never
/// hold up the transition itself.
#[cfg_attr(test, mockall::automock)]
pub trait AuditObserver: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), ClientError>;
}

/// Writes audit events to the `audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditObserver for TracingAudit {
    fn record(&self, event: &AuditEvent) -> Result<(), ClientError> {
        let payload = serde_json::to_string(event).map_err(|e| ClientError::AuditError(e.to_string()))?;
        info!(target: "audit", "{}", payload);
        Ok(())
    }
}
