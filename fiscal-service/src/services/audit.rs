//! Audit sinks.

use crate::error::FiscalError;
use crate::models::AuditEvent;
use crate::services::metrics::record_error;
use crate::services::store::AuditSink;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{warn, Instrument, Span};

/// Records `event` on a background task inside the caller's span.
///
/// The caller never waits on the sink. Failures are logged and counted
/// under the `audit` error label.
pub fn dispatch(sink: Arc<dyn AuditSink>, event: AuditEvent) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            if let Err(e) = sink.record(&event).await {
                record_error("audit");
                warn!(
                    error = %e,
                    event_id = %event.event_id,
                    entity_id = %event.entity_id,
                    "Failed to record audit event"
                );
            }
        }
        .instrument(Span::current()),
    )
}

/// Writes audit events to the structured log under the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), FiscalError> {
        tracing::info!(
            target: "audit",
            event_id = %event.event_id,
            action = event.action.as_str(),
            entity_type = %event.entity_type,
            entity_id = %event.entity_id,
            actor_id = event.actor_id.as_deref().unwrap_or("anonymous"),
            actor_role = event.actor_role.as_deref().unwrap_or("unknown"),
            request_id = event.request_id.as_deref().unwrap_or(""),
            severity = event.severity.as_str(),
            occurred_at = %event.occurred_at,
            "{}",
            event.description
        );
        Ok(())
    }
}

/// Fans an event out to several sinks; fails if any sink fails.
pub struct CompositeAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl CompositeAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl AuditSink for CompositeAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), FiscalError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record(event).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
