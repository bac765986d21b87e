//! Services module for fiscal-service.

pub mod audit;
pub mod database;
pub mod issuance;
pub mod memory;
pub mod metrics;
pub mod registry;
pub mod store;
pub mod verification;

pub use audit::{CompositeAuditSink, TracingAuditSink};
pub use database::Database;
pub use issuance::IssuancePipeline;
pub use memory::MemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use registry::InvoiceRegistry;
pub use store::{
    AuditSink, InvoiceStore, ProductCatalog, SaleDirectory, SequenceStore, ShopDirectory,
};
pub use verification::{IntegrityReport, VerificationService};

use std::sync::Arc;

/// The set of stores the fiscal services run against.
#[derive(Clone)]
pub struct Backend {
    pub sales: Arc<dyn SaleDirectory>,
    pub shops: Arc<dyn ShopDirectory>,
    pub products: Arc<dyn ProductCatalog>,
    pub sequences: Arc<dyn SequenceStore>,
    pub invoices: Arc<dyn InvoiceStore>,
    pub audit: Arc<dyn AuditSink>,
}

impl Backend {
    /// PostgreSQL for everything; audit events also go to the log.
    pub fn postgres(db: Arc<Database>) -> Self {
        let sinks: Vec<Arc<dyn AuditSink>> = vec![db.clone(), Arc::new(TracingAuditSink)];
        let audit: Arc<dyn AuditSink> = Arc::new(CompositeAuditSink::new(sinks));
        Self {
            sales: db.clone(),
            shops: db.clone(),
            products: db.clone(),
            sequences: db.clone(),
            invoices: db,
            audit,
        }
    }

    pub fn memory(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            sales: store.clone(),
            shops: store.clone(),
            products: store.clone(),
            sequences: store.clone(),
            invoices: store.clone(),
            audit: store,
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }
}
