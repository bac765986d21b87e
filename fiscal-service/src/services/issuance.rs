//! Invoice issuance: sale -> taxed, numbered, hashed, signed, QR-stamped invoice.

use crate::error::FiscalError;
use crate::fiscal::{
    canonicalize, InvoiceDigest, InvoiceNumberAllocator, InvoiceSigner, QrPayloadBuilder,
    TaxCalculator,
};
use crate::models::{
    AuditEvent, Invoice, InvoiceDraft, InvoiceLine, RequestContext, SaleSnapshot,
};
use crate::services::metrics::{
    record_error, GROSS_AMOUNT_ISSUED, ISSUANCES_TOTAL, ISSUANCE_DURATION,
};
use crate::services::store::{AuditSink, InvoiceStore, ProductCatalog, SaleDirectory, ShopDirectory};
use crate::services::{audit, Backend};
use chrono::{SubsecRound, Utc};
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Label for sale items whose product is no longer in the catalog.
pub const UNKNOWN_PRODUCT: &str = "Unknown";

pub struct IssuancePipeline {
    sales: Arc<dyn SaleDirectory>,
    shops: Arc<dyn ShopDirectory>,
    products: Arc<dyn ProductCatalog>,
    invoices: Arc<dyn InvoiceStore>,
    audit: Arc<dyn AuditSink>,
    numbers: InvoiceNumberAllocator,
    tax: TaxCalculator,
    signer: Arc<dyn InvoiceSigner>,
    qr: QrPayloadBuilder,
}

impl IssuancePipeline {
    pub fn new(
        backend: &Backend,
        tax: TaxCalculator,
        signer: Arc<dyn InvoiceSigner>,
        qr: QrPayloadBuilder,
    ) -> Self {
        Self {
            sales: backend.sales.clone(),
            shops: backend.shops.clone(),
            products: backend.products.clone(),
            invoices: backend.invoices.clone(),
            audit: backend.audit.clone(),
            numbers: InvoiceNumberAllocator::new(backend.sequences.clone()),
            tax,
            signer,
            qr,
        }
    }

    /// Issue the fiscal invoice for a completed sale.
    ///
    /// At most one invoice exists per sale; a second request fails with
    /// [`FiscalError::Conflict`] and leaves the first untouched.
    #[instrument(
        skip(self, ctx),
        fields(sale_id = %sale_id, shop_id = %shop_id, actor_id = ?ctx.actor_id)
    )]
    pub async fn issue(
        &self,
        ctx: &RequestContext,
        sale_id: Uuid,
        shop_id: Uuid,
    ) -> Result<Invoice, FiscalError> {
        let timer = ISSUANCE_DURATION.start_timer();
        let result = self.run(ctx, sale_id, shop_id).await;
        timer.observe_duration();

        match &result {
            Ok(invoice) => {
                ISSUANCES_TOTAL.with_label_values(&["issued"]).inc();
                if let Some(gross) = invoice.amounts().gross_amount.to_f64() {
                    GROSS_AMOUNT_ISSUED.inc_by(gross);
                }
            }
            Err(e) => {
                ISSUANCES_TOTAL.with_label_values(&[e.error_type()]).inc();
                record_error(e.error_type());
                warn!(error = %e, "Invoice issuance failed");
            }
        }

        result
    }

    async fn run(
        &self,
        ctx: &RequestContext,
        sale_id: Uuid,
        shop_id: Uuid,
    ) -> Result<Invoice, FiscalError> {
        let sale = self
            .sales
            .find_sale(sale_id)
            .await?
            .ok_or_else(|| FiscalError::NotFound(format!("Sale {} not found", sale_id)))?;
        let shop = self
            .shops
            .find_shop(shop_id)
            .await?
            .ok_or_else(|| FiscalError::NotFound(format!("Shop {} not found", shop_id)))?;

        if sale.shop_id != shop_id {
            return Err(FiscalError::InvalidRequest(format!(
                "Sale {} does not belong to shop {}",
                sale_id, shop_id
            )));
        }

        // Fast path only; the unique constraint on insert is what holds under races.
        if let Some(existing) = self.invoices.find_by_sale(sale_id).await? {
            return Err(FiscalError::Conflict(format!(
                "Invoice {} already exists for sale {}",
                existing.invoice_number(),
                sale_id
            )));
        }

        let amounts = self.tax.calculate(sale.net_amount()?)?;

        let issued_at = Utc::now().trunc_subsecs(3);
        let invoice_number = self
            .numbers
            .allocate(shop_id, issued_at.date_naive())
            .await?;
        let lines = self.resolve_lines(&sale).await?;

        let draft = InvoiceDraft::new(invoice_number, shop_id, sale_id, amounts, issued_at, lines);
        let canonical_payload = canonicalize(&draft.canonical_fields())?;
        let digest = InvoiceDigest::of(canonical_payload.as_bytes());
        let signature = self.signer.sign(&digest)?;

        let mut invoice = draft.seal(canonical_payload, digest.to_base64(), signature)?;
        let qr_payload = self.qr.build(&invoice, &shop)?;
        invoice.attach_qr_payload(qr_payload.to_json()?)?;

        self.invoices.insert(&invoice).await?;

        info!(
            invoice_id = %invoice.invoice_id(),
            invoice_number = %invoice.invoice_number(),
            gross_amount = %invoice.amounts().gross_amount,
            signature_scheme = ?self.signer.scheme(),
            "Invoice issued"
        );

        audit::dispatch(
            self.audit.clone(),
            AuditEvent::invoice_issued(ctx, &invoice),
        );

        Ok(invoice)
    }

    async fn resolve_lines(&self, sale: &SaleSnapshot) -> Result<Vec<InvoiceLine>, FiscalError> {
        let mut lines = Vec::with_capacity(sale.items.len());
        for (idx, item) in sale.items.iter().enumerate() {
            let name = match self.products.product_name(item.product_id).await? {
                Some(name) => name,
                None => {
                    warn!(product_id = %item.product_id, "Product not in catalog, labelling line as unknown");
                    UNKNOWN_PRODUCT.to_string()
                }
            };
            let line_no = i32::try_from(idx + 1).map_err(|_| {
                FiscalError::InvalidRequest(format!("Sale {} has too many items", sale.sale_id))
            })?;
            lines.push(InvoiceLine::new(
                line_no,
                name,
                item.quantity,
                item.unit_price,
                item.total_price,
            )?);
        }
        Ok(lines)
    }
}
