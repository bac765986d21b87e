//! In-process backend for tests and local runs without PostgreSQL.

use crate::error::FiscalError;
use crate::models::{
    AuditEvent, Invoice, InvoiceStatus, ListInvoicesFilter, SaleSnapshot, Shop,
};
use crate::services::store::{
    AuditSink, InvoiceStore, ProductCatalog, SaleDirectory, SequenceStore, ShopDirectory,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    sales: HashMap<Uuid, SaleSnapshot>,
    shops: HashMap<Uuid, Shop>,
    products: HashMap<Uuid, String>,
    sequences: HashMap<Uuid, u64>,
    invoices: Vec<Invoice>,
    by_id: HashMap<Uuid, usize>,
    by_sale: HashMap<Uuid, usize>,
    by_number: HashMap<String, usize>,
    audit: Vec<AuditEvent>,
}

/// Every operation takes a single lock, so check-and-insert is atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, FiscalError> {
        self.inner
            .lock()
            .map_err(|_| FiscalError::Storage(anyhow::anyhow!("memory store lock poisoned")))
    }

    pub fn add_shop(&self, shop: Shop) -> Result<(), FiscalError> {
        self.lock()?.shops.insert(shop.shop_id, shop);
        Ok(())
    }

    pub fn add_sale(&self, sale: SaleSnapshot) -> Result<(), FiscalError> {
        self.lock()?.sales.insert(sale.sale_id, sale);
        Ok(())
    }

    pub fn add_product(&self, product_id: Uuid, name: impl Into<String>) -> Result<(), FiscalError> {
        self.lock()?.products.insert(product_id, name.into());
        Ok(())
    }

    pub fn audit_events(&self) -> Result<Vec<AuditEvent>, FiscalError> {
        Ok(self.lock()?.audit.clone())
    }

    /// Audit events are written in the background; poll until at least
    /// `count` have arrived or half a second has passed.
    pub async fn settled_audit_events(&self, count: usize) -> Result<Vec<AuditEvent>, FiscalError> {
        for _ in 0..50 {
            let events = self.audit_events()?;
            if events.len() >= count {
                return Ok(events);
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.audit_events()
    }

    pub fn invoice_count(&self) -> Result<usize, FiscalError> {
        Ok(self.lock()?.invoices.len())
    }
}

#[async_trait]
impl SaleDirectory for MemoryStore {
    async fn find_sale(&self, sale_id: Uuid) -> Result<Option<SaleSnapshot>, FiscalError> {
        Ok(self.lock()?.sales.get(&sale_id).cloned())
    }
}

#[async_trait]
impl ShopDirectory for MemoryStore {
    async fn find_shop(&self, shop_id: Uuid) -> Result<Option<Shop>, FiscalError> {
        Ok(self.lock()?.shops.get(&shop_id).cloned())
    }
}

#[async_trait]
impl ProductCatalog for MemoryStore {
    async fn product_name(&self, product_id: Uuid) -> Result<Option<String>, FiscalError> {
        Ok(self.lock()?.products.get(&product_id).cloned())
    }
}

#[async_trait]
impl SequenceStore for MemoryStore {
    async fn next_value(&self, shop_id: Uuid) -> Result<u64, FiscalError> {
        let mut inner = self.lock()?;
        let value = inner.sequences.entry(shop_id).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn insert(&self, invoice: &Invoice) -> Result<(), FiscalError> {
        let mut inner = self.lock()?;

        if inner.by_sale.contains_key(&invoice.sale_id()) {
            return Err(FiscalError::Conflict(format!(
                "Invoice already exists for sale {}",
                invoice.sale_id()
            )));
        }
        if inner.by_number.contains_key(invoice.invoice_number()) {
            return Err(FiscalError::Conflict(format!(
                "Invoice number {} already issued",
                invoice.invoice_number()
            )));
        }
        if inner.by_id.contains_key(&invoice.invoice_id()) {
            return Err(FiscalError::Conflict(format!(
                "Invoice {} already exists",
                invoice.invoice_id()
            )));
        }

        let idx = inner.invoices.len();
        inner.by_id.insert(invoice.invoice_id(), idx);
        inner.by_sale.insert(invoice.sale_id(), idx);
        inner
            .by_number
            .insert(invoice.invoice_number().to_string(), idx);
        inner.invoices.push(invoice.clone());
        Ok(())
    }

    async fn find_by_id(&self, invoice_id: Uuid) -> Result<Option<Invoice>, FiscalError> {
        let inner = self.lock()?;
        Ok(inner
            .by_id
            .get(&invoice_id)
            .map(|&idx| inner.invoices[idx].clone()))
    }

    async fn find_by_sale(&self, sale_id: Uuid) -> Result<Option<Invoice>, FiscalError> {
        let inner = self.lock()?;
        Ok(inner
            .by_sale
            .get(&sale_id)
            .map(|&idx| inner.invoices[idx].clone()))
    }

    async fn find_by_number(
        &self,
        invoice_number: &str,
    ) -> Result<Option<Invoice>, FiscalError> {
        let inner = self.lock()?;
        Ok(inner
            .by_number
            .get(invoice_number)
            .map(|&idx| inner.invoices[idx].clone()))
    }

    async fn list(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, FiscalError> {
        let inner = self.lock()?;
        let mut invoices: Vec<Invoice> = inner
            .invoices
            .iter()
            .filter(|inv| filter.shop_id.is_none_or(|shop| inv.shop_id() == shop))
            .filter(|inv| filter.page_token.is_none_or(|token| inv.invoice_id() > token))
            .cloned()
            .collect();
        invoices.sort_by_key(|inv| inv.invoice_id());
        invoices.truncate(usize::try_from(filter.page_size).unwrap_or(0));
        Ok(invoices)
    }

    async fn update_status(
        &self,
        invoice_id: Uuid,
        expected: InvoiceStatus,
        next: InvoiceStatus,
    ) -> Result<Invoice, FiscalError> {
        let mut inner = self.lock()?;
        let idx = *inner
            .by_id
            .get(&invoice_id)
            .ok_or_else(|| FiscalError::NotFound(format!("Invoice {} not found", invoice_id)))?;

        let invoice = &mut inner.invoices[idx];
        if invoice.status() != expected {
            return Err(FiscalError::Conflict(format!(
                "Invoice {} is {}, expected {}",
                invoice_id,
                invoice.status(),
                expected
            )));
        }
        invoice.advance(next)?;
        Ok(invoice.clone())
    }

    async fn ping(&self) -> Result<(), FiscalError> {
        self.lock().map(|_| ())
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn record(&self, event: &AuditEvent) -> Result<(), FiscalError> {
        self.lock()?.audit.push(event.clone());
        Ok(())
    }
}
