//! Public verification payload printed as a QR code on the receipt.

use crate::error::FiscalError;
use crate::models::{Invoice, InvoiceStatus, Shop};
use serde::{Deserialize, Serialize};

/// Serialized with keys in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationPayload {
    pub invoice_number: String,
    pub invoice_hash: String,
    pub merchant_tin: String,
    pub verification_url: String,
}

impl VerificationPayload {
    pub fn to_json(&self) -> Result<String, FiscalError> {
        serde_json::to_string(self)
            .map_err(|e| FiscalError::Canonicalization(format!("QR payload: {}", e)))
    }
}

#[derive(Debug, Clone)]
pub struct QrPayloadBuilder {
    base_url: String,
}

impl QrPayloadBuilder {
    pub fn new(base_url: &str) -> Result<Self, FiscalError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(FiscalError::InvalidRequest(
                "Verification base URL is empty".to_string(),
            ));
        }
        Ok(Self {
            base_url: base_url.to_string(),
        })
    }

    pub fn verification_url(&self, invoice_number: &str) -> String {
        format!("{}/{}", self.base_url, invoice_number)
    }

    /// Only signed invoices get a QR payload; the hash it carries is the
    /// stored one.
    pub fn build(&self, invoice: &Invoice, shop: &Shop) -> Result<VerificationPayload, FiscalError> {
        if invoice.status() != InvoiceStatus::Signed {
            return Err(FiscalError::InvalidTransition {
                from: invoice.status(),
                to: InvoiceStatus::QrGenerated,
            });
        }

        Ok(VerificationPayload {
            invoice_number: invoice.invoice_number().to_string(),
            invoice_hash: invoice.invoice_hash().to_string(),
            merchant_tin: shop.merchant_tin.clone(),
            verification_url: self.verification_url(invoice.invoice_number()),
        })
    }
}
