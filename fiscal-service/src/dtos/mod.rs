//! HTTP request and response bodies.

use crate::fiscal::format_timestamp;
use crate::models::{Invoice, InvoiceLine, InvoiceStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueInvoiceRequest {
    pub sale_id: Uuid,
    pub shop_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceStatusRequest {
    pub status: InvoiceStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInvoicesQuery {
    pub shop_id: Option<Uuid>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLineResponse {
    pub line_no: i32,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: String,
    pub line_total: String,
}

impl From<&InvoiceLine> for InvoiceLineResponse {
    fn from(line: &InvoiceLine) -> Self {
        Self {
            line_no: line.line_no,
            product_name: line.product_name.clone(),
            quantity: line.quantity,
            unit_price: format!("{:.2}", line.unit_price),
            line_total: format!("{:.2}", line.line_total),
        }
    }
}

/// Amounts are decimal strings with two places.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub invoice_number: String,
    pub shop_id: Uuid,
    pub sale_id: Uuid,
    pub status: InvoiceStatus,
    pub net_amount: String,
    pub vat_amount: String,
    pub surtax_amount: String,
    pub gross_amount: String,
    pub issued_at: String,
    pub updated_at: String,
    pub canonical_payload: String,
    pub invoice_hash: String,
    pub signature: String,
    pub qr_payload: Option<serde_json::Value>,
    pub lines: Vec<InvoiceLineResponse>,
}

impl From<&Invoice> for InvoiceResponse {
    fn from(invoice: &Invoice) -> Self {
        let amounts = invoice.amounts();
        Self {
            id: invoice.invoice_id(),
            invoice_number: invoice.invoice_number().to_string(),
            shop_id: invoice.shop_id(),
            sale_id: invoice.sale_id(),
            status: invoice.status(),
            net_amount: format!("{:.2}", amounts.net_amount),
            vat_amount: format!("{:.2}", amounts.vat_amount),
            surtax_amount: format!("{:.2}", amounts.surtax_amount),
            gross_amount: format!("{:.2}", amounts.gross_amount),
            issued_at: format_timestamp(invoice.issued_at()),
            updated_at: format_timestamp(invoice.updated_at()),
            canonical_payload: invoice.canonical_payload().to_string(),
            invoice_hash: invoice.invoice_hash().to_string(),
            signature: invoice.signature().to_string(),
            qr_payload: invoice
                .qr_payload()
                .and_then(|raw| serde_json::from_str(raw).ok()),
            lines: invoice.lines().iter().map(InvoiceLineResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceListResponse {
    pub invoices: Vec<InvoiceResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<Uuid>,
}
