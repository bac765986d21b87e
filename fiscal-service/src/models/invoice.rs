//! Fiscal invoice model.
//!
//! An [`InvoiceDraft`] is assembled by the issuance pipeline. Once its
//! canonical form has been hashed and signed it is sealed into an
//! [`Invoice`], whose financial fields can no longer be changed.

use crate::error::FiscalError;
use crate::fiscal::canonical::CanonicalInvoice;
use crate::fiscal::tax::{checked_mul, ensure_storable, round_minor, TaxBreakdown};
use crate::models::InvoiceStatus;
use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One priced line, copied from the sale at issuance time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct InvoiceLine {
    pub line_no: i32,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl InvoiceLine {
    /// Amounts are taken as given and must already be whole minor units with
    /// `line_total == quantity * unit_price`. Nothing is rounded here.
    pub fn new(
        line_no: i32,
        product_name: impl Into<String>,
        quantity: i32,
        unit_price: Decimal,
        line_total: Decimal,
    ) -> Result<Self, FiscalError> {
        ensure_storable(unit_price, &format!("Line {} unit price", line_no))?;
        ensure_storable(line_total, &format!("Line {} total", line_no))?;
        let expected = checked_mul(
            unit_price,
            Decimal::from(quantity),
            &format!("Line {} total", line_no),
        )?;
        if expected != line_total {
            return Err(FiscalError::InvalidAmount(format!(
                "Line {} total {} does not equal {} x {}",
                line_no, line_total, quantity, unit_price
            )));
        }
        // Exact: both values carry at most two decimal places.
        Ok(Self {
            line_no,
            product_name: product_name.into(),
            quantity,
            unit_price: round_minor(unit_price),
            line_total: round_minor(line_total),
        })
    }
}

/// Invoice under construction.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub shop_id: Uuid,
    pub sale_id: Uuid,
    pub amounts: TaxBreakdown,
    pub issued_at: DateTime<Utc>,
    pub lines: Vec<InvoiceLine>,
    status: InvoiceStatus,
}

impl InvoiceDraft {
    /// `issued_at` is truncated to millisecond precision, the precision of
    /// the canonical encoding.
    pub fn new(
        invoice_number: String,
        shop_id: Uuid,
        sale_id: Uuid,
        amounts: TaxBreakdown,
        issued_at: DateTime<Utc>,
        lines: Vec<InvoiceLine>,
    ) -> Self {
        Self {
            invoice_id: Uuid::new_v4(),
            invoice_number,
            shop_id,
            sale_id,
            amounts,
            issued_at: issued_at.trunc_subsecs(3),
            lines,
            status: InvoiceStatus::Created,
        }
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn canonical_fields(&self) -> CanonicalInvoice<'_> {
        CanonicalInvoice {
            invoice_number: &self.invoice_number,
            issued_at: self.issued_at,
            net_amount: self.amounts.net_amount,
            vat_amount: self.amounts.vat_amount,
            surtax_amount: self.amounts.surtax_amount,
            gross_amount: self.amounts.gross_amount,
        }
    }

    /// Freeze the draft together with the digest and signature of its
    /// canonical payload.
    pub fn seal(
        self,
        canonical_payload: String,
        invoice_hash: String,
        signature: String,
    ) -> Result<Invoice, FiscalError> {
        let status = self.status.transition(InvoiceStatus::Signed)?;
        Ok(Invoice {
            invoice_id: self.invoice_id,
            invoice_number: self.invoice_number,
            shop_id: self.shop_id,
            sale_id: self.sale_id,
            status,
            amounts: self.amounts,
            issued_at: self.issued_at,
            lines: self.lines,
            canonical_payload,
            invoice_hash,
            signature,
            qr_payload: None,
            updated_at: self.issued_at,
        })
    }
}

/// A sealed invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    invoice_id: Uuid,
    invoice_number: String,
    shop_id: Uuid,
    sale_id: Uuid,
    status: InvoiceStatus,
    amounts: TaxBreakdown,
    issued_at: DateTime<Utc>,
    lines: Vec<InvoiceLine>,
    canonical_payload: String,
    invoice_hash: String,
    signature: String,
    qr_payload: Option<String>,
    updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn invoice_id(&self) -> Uuid {
        self.invoice_id
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn shop_id(&self) -> Uuid {
        self.shop_id
    }

    pub fn sale_id(&self) -> Uuid {
        self.sale_id
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn amounts(&self) -> &TaxBreakdown {
        &self.amounts
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    pub fn canonical_payload(&self) -> &str {
        &self.canonical_payload
    }

    pub fn invoice_hash(&self) -> &str {
        &self.invoice_hash
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn qr_payload(&self) -> Option<&str> {
        self.qr_payload.as_deref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn attach_qr_payload(&mut self, payload: String) -> Result<(), FiscalError> {
        self.status = self.status.transition(InvoiceStatus::QrGenerated)?;
        self.qr_payload = Some(payload);
        Ok(())
    }

    /// Move to `next`, returning the previous status.
    pub fn advance(&mut self, next: InvoiceStatus) -> Result<InvoiceStatus, FiscalError> {
        let previous = self.status;
        self.status = previous.transition(next)?;
        self.updated_at = Utc::now();
        Ok(previous)
    }

    pub fn from_row(row: InvoiceRow, lines: Vec<InvoiceLine>) -> Result<Self, FiscalError> {
        let status = row.status.parse::<InvoiceStatus>().map_err(|_| {
            FiscalError::Storage(anyhow::anyhow!(
                "Invoice {} has unknown status '{}'",
                row.invoice_id,
                row.status
            ))
        })?;

        Ok(Self {
            invoice_id: row.invoice_id,
            invoice_number: row.invoice_number,
            shop_id: row.shop_id,
            sale_id: row.sale_id,
            status,
            amounts: TaxBreakdown {
                net_amount: row.net_amount,
                vat_amount: row.vat_amount,
                surtax_amount: row.surtax_amount,
                gross_amount: row.gross_amount,
            },
            issued_at: row.issued_utc,
            lines,
            canonical_payload: row.canonical_payload,
            invoice_hash: row.invoice_hash,
            signature: row.signature,
            qr_payload: row.qr_payload,
            updated_at: row.updated_utc,
        })
    }
}

/// Database row of the `invoices` table.
#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRow {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub shop_id: Uuid,
    pub sale_id: Uuid,
    pub status: String,
    pub net_amount: Decimal,
    pub vat_amount: Decimal,
    pub surtax_amount: Decimal,
    pub gross_amount: Decimal,
    pub issued_utc: DateTime<Utc>,
    pub canonical_payload: String,
    pub invoice_hash: String,
    pub signature: String,
    pub qr_payload: Option<String>,
    pub updated_utc: DateTime<Utc>,
}

/// Filter for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub shop_id: Option<Uuid>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

impl ListInvoicesFilter {
    pub const DEFAULT_PAGE_SIZE: i32 = 50;
    pub const MAX_PAGE_SIZE: i32 = 100;

    pub fn new(
        shop_id: Option<Uuid>,
        page_size: Option<i32>,
        page_token: Option<Uuid>,
    ) -> Result<Self, FiscalError> {
        let page_size = page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE);
        if !(1..=Self::MAX_PAGE_SIZE).contains(&page_size) {
            return Err(FiscalError::InvalidRequest(format!(
                "pageSize must be between 1 and {}",
                Self::MAX_PAGE_SIZE
            )));
        }
        Ok(Self {
            shop_id,
            page_size,
            page_token,
        })
    }
}
