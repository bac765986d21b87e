//! Invoice number allocation.

use crate::error::FiscalError;
use crate::services::store::SequenceStore;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// `INV-{shop}-{yyyymmdd}-{sequence}`, sequence zero-padded to six digits.
pub fn format_invoice_number(shop_id: Uuid, issued_on: NaiveDate, sequence: u64) -> String {
    format!(
        "INV-{}-{}-{:06}",
        shop_id,
        issued_on.format("%Y%m%d"),
        sequence
    )
}

/// Hands out invoice numbers backed by a durable per-shop sequence.
///
/// A number allocated for an issuance that later fails is not reused.
#[derive(Clone)]
pub struct InvoiceNumberAllocator {
    sequences: Arc<dyn SequenceStore>,
}

impl InvoiceNumberAllocator {
    pub fn new(sequences: Arc<dyn SequenceStore>) -> Self {
        Self { sequences }
    }

    #[instrument(skip(self), fields(shop_id = %shop_id))]
    pub async fn allocate(&self, shop_id: Uuid, issued_on: NaiveDate) -> Result<String, FiscalError> {
        let sequence = self.sequences.next_value(shop_id).await?;
        let number = format_invoice_number(shop_id, issued_on, sequence);
        debug!(invoice_number = %number, "Invoice number allocated");
        Ok(number)
    }
}
