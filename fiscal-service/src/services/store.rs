//! Storage seams of the fiscal pipeline.
//!
//! Sales, shops and products belong to other domains and are read only.
//! Invoices, number sequences and audit events are owned here.

use crate::error::FiscalError;
use crate::models::{
    AuditEvent, Invoice, InvoiceStatus, ListInvoicesFilter, SaleSnapshot, Shop,
};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait SaleDirectory: Send + Sync {
    async fn find_sale(&self, sale_id: Uuid) -> Result<Option<SaleSnapshot>, FiscalError>;
}

#[async_trait]
pub trait ShopDirectory: Send + Sync {
    async fn find_shop(&self, shop_id: Uuid) -> Result<Option<Shop>, FiscalError>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn product_name(&self, product_id: Uuid) -> Result<Option<String>, FiscalError>;
}

/// Durable per-shop counter. Values are strictly increasing per shop and
/// never handed out twice, including across restarts.
#[async_trait]
pub trait SequenceStore: Send + Sync {
    async fn next_value(&self, shop_id: Uuid) -> Result<u64, FiscalError>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Persist a complete invoice with its lines atomically.
    ///
    /// Fails with [`FiscalError::Conflict`] when the sale already has an
    /// invoice or the number is taken.
    async fn insert(&self, invoice: &Invoice) -> Result<(), FiscalError>;

    async fn find_by_id(&self, invoice_id: Uuid) -> Result<Option<Invoice>, FiscalError>;

    async fn find_by_sale(&self, sale_id: Uuid) -> Result<Option<Invoice>, FiscalError>;

    async fn find_by_number(&self, invoice_number: &str)
        -> Result<Option<Invoice>, FiscalError>;

    /// Ordered by invoice id, starting after `page_token`.
    async fn list(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, FiscalError>;

    /// Compare-and-set of the status column. Fails with
    /// [`FiscalError::Conflict`] when the stored status is not `expected`.
    async fn update_status(
        &self,
        invoice_id: Uuid,
        expected: InvoiceStatus,
        next: InvoiceStatus,
    ) -> Result<Invoice, FiscalError>;

    async fn ping(&self) -> Result<(), FiscalError>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<(), FiscalError>;
}
