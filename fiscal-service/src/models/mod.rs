//! Domain models for fiscal-service.

pub mod audit;
pub mod context;
pub mod invoice;
pub mod sale;
pub mod shop;
pub mod status;

pub use audit::{AuditAction, AuditEvent, AuditSeverity};
pub use context::RequestContext;
pub use invoice::{Invoice, InvoiceDraft, InvoiceLine, InvoiceRow, ListInvoicesFilter};
pub use sale::{SaleItem, SaleRow, SaleSnapshot};
pub use shop::Shop;
pub use status::InvoiceStatus;
