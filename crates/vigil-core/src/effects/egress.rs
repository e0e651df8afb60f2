//! Egress queue seam for outbound audit events.

use async_trait::async_trait;
use thiserror::Error;

use crate::audit::AuditEvent;

/// Egress failures. Fire-and-forget from the pipeline's perspective: the
/// reporter logs and meters these, never propagates them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EgressError {
    #[error("egress queue unavailable: {0}")]
    Unavailable(String),
}

/// Downstream audit-trail queue.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn send(&self, event: &AuditEvent) -> Result<(), EgressError>;
}

#[async_trait]
impl<T: AuditSink + ?Sized> AuditSink for std::sync::Arc<T> {
    async fn send(&self, event: &AuditEvent) -> Result<(), EgressError> {
        (**self).send(event).await
    }
}
