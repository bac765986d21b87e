//! Audit trail entries for invoice changes.

use crate::models::{Invoice, InvoiceStatus, RequestContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const INVOICE_ENTITY: &str = "INVOICE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    StatusChange,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::StatusChange => "STATUS_CHANGE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditSeverity {
    Low,
    Medium,
    High,
}

impl AuditSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Low => "LOW",
            AuditSeverity::Medium => "MEDIUM",
            AuditSeverity::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub actor_id: Option<String>,
    pub actor_role: Option<String>,
    pub request_id: Option<String>,
    pub severity: AuditSeverity,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    fn for_invoice(
        ctx: &RequestContext,
        invoice: &Invoice,
        action: AuditAction,
        severity: AuditSeverity,
        description: String,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            action,
            entity_type: INVOICE_ENTITY.to_string(),
            entity_id: invoice.invoice_id(),
            actor_id: ctx.actor_id.clone(),
            actor_role: ctx.actor_role.clone(),
            request_id: ctx.request_id.clone(),
            severity,
            description,
            occurred_at: Utc::now(),
        }
    }

    pub fn invoice_issued(ctx: &RequestContext, invoice: &Invoice) -> Self {
        Self::for_invoice(
            ctx,
            invoice,
            AuditAction::Create,
            AuditSeverity::Low,
            format!(
                "Invoice {} issued for sale {}",
                invoice.invoice_number(),
                invoice.sale_id()
            ),
        )
    }

    pub fn invoice_status_changed(
        ctx: &RequestContext,
        invoice: &Invoice,
        previous: InvoiceStatus,
    ) -> Self {
        let severity = match invoice.status() {
            InvoiceStatus::Cancelled | InvoiceStatus::Rejected => AuditSeverity::High,
            _ => AuditSeverity::Medium,
        };
        Self::for_invoice(
            ctx,
            invoice,
            AuditAction::StatusChange,
            severity,
            format!(
                "Invoice {} moved from {} to {}",
                invoice.invoice_number(),
                previous,
                invoice.status()
            ),
        )
    }
}
