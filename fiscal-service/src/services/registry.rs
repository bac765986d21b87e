//! Invoice lookups and post-issuance lifecycle.

use crate::error::FiscalError;
use crate::models::{AuditEvent, Invoice, InvoiceStatus, ListInvoicesFilter, RequestContext};
use crate::services::metrics::{record_error, STATUS_TRANSITIONS_TOTAL};
use crate::services::store::{AuditSink, InvoiceStore};
use crate::services::{audit, Backend};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct InvoiceRegistry {
    invoices: Arc<dyn InvoiceStore>,
    audit: Arc<dyn AuditSink>,
}

impl InvoiceRegistry {
    pub fn new(backend: &Backend) -> Self {
        Self {
            invoices: backend.invoices.clone(),
            audit: backend.audit.clone(),
        }
    }

    pub async fn get(&self, invoice_id: Uuid) -> Result<Invoice, FiscalError> {
        self.invoices
            .find_by_id(invoice_id)
            .await?
            .ok_or_else(|| FiscalError::NotFound(format!("Invoice {} not found", invoice_id)))
    }

    pub async fn get_by_sale(&self, sale_id: Uuid) -> Result<Invoice, FiscalError> {
        self.invoices
            .find_by_sale(sale_id)
            .await?
            .ok_or_else(|| FiscalError::NotFound(format!("No invoice for sale {}", sale_id)))
    }

    pub async fn get_by_number(&self, invoice_number: &str) -> Result<Invoice, FiscalError> {
        self.invoices
            .find_by_number(invoice_number)
            .await?
            .ok_or_else(|| FiscalError::NotFound(format!("Invoice {} not found", invoice_number)))
    }

    /// One page of invoices plus the token for the next page, if any.
    pub async fn list(
        &self,
        filter: &ListInvoicesFilter,
    ) -> Result<(Vec<Invoice>, Option<Uuid>), FiscalError> {
        let invoices = self.invoices.list(filter).await?;
        let next_page_token = if invoices.len() == filter.page_size as usize {
            invoices.last().map(|inv| inv.invoice_id())
        } else {
            None
        };
        Ok((invoices, next_page_token))
    }

    /// Move an issued invoice to `SUBMITTED`, `ACCEPTED`, `REJECTED` or
    /// `CANCELLED`. Only the status and its timestamp change.
    #[instrument(skip(self, ctx), fields(invoice_id = %invoice_id, target = %target))]
    pub async fn advance_status(
        &self,
        ctx: &RequestContext,
        invoice_id: Uuid,
        target: InvoiceStatus,
    ) -> Result<Invoice, FiscalError> {
        let current = self.get(invoice_id).await?.status();
        current.transition(target).inspect_err(|e| {
            record_error(e.error_type());
        })?;

        let updated = self
            .invoices
            .update_status(invoice_id, current, target)
            .await?;

        STATUS_TRANSITIONS_TOTAL
            .with_label_values(&[current.as_str(), target.as_str()])
            .inc();
        info!(
            invoice_number = %updated.invoice_number(),
            from = %current,
            to = %target,
            "Invoice status changed"
        );

        audit::dispatch(
            self.audit.clone(),
            AuditEvent::invoice_status_changed(ctx, &updated, current),
        );

        Ok(updated)
    }
}
