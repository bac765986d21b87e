//! Public invoice verification.

use crate::error::FiscalError;
use crate::fiscal::{hashes_match, InvoiceDigest, InvoiceSigner, SignatureScheme, DIGEST_ALGORITHM};
use crate::models::{Invoice, InvoiceStatus};
use crate::services::metrics::VERIFICATIONS_TOTAL;
use crate::services::store::InvoiceStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub digest_algorithm: &'static str,
    /// Stored hash equals the digest of the stored canonical payload.
    pub hash_matches_payload: bool,
    pub signature_scheme: SignatureScheme,
    /// The active signer accepts the stored signature over that digest.
    pub signature_valid: bool,
    /// Payload intact and signed with a production scheme.
    pub trusted: bool,
}

pub struct VerificationService {
    invoices: Arc<dyn InvoiceStore>,
    signer: Arc<dyn InvoiceSigner>,
}

impl VerificationService {
    pub fn new(invoices: Arc<dyn InvoiceStore>, signer: Arc<dyn InvoiceSigner>) -> Self {
        Self { invoices, signer }
    }

    async fn load(&self, invoice_number: &str) -> Result<Invoice, FiscalError> {
        match self.invoices.find_by_number(invoice_number).await? {
            Some(invoice) => Ok(invoice),
            None => {
                VERIFICATIONS_TOTAL
                    .with_label_values(&["unknown_invoice"])
                    .inc();
                Err(FiscalError::NotFound(format!(
                    "Invoice {} not found",
                    invoice_number
                )))
            }
        }
    }

    /// Compare a presented hash with the one stored at issuance.
    ///
    /// The stored hash is authoritative; nothing is recomputed from the
    /// invoice's current field values.
    #[instrument(skip(self, presented_hash))]
    pub async fn verify(
        &self,
        invoice_number: &str,
        presented_hash: &str,
    ) -> Result<bool, FiscalError> {
        let invoice = self.load(invoice_number).await?;
        let valid = hashes_match(invoice.invoice_hash(), presented_hash);

        VERIFICATIONS_TOTAL
            .with_label_values(&[if valid { "match" } else { "mismatch" }])
            .inc();
        info!(valid = valid, "Invoice verification");

        Ok(valid)
    }

    /// Check the stored artifacts against each other.
    #[instrument(skip(self))]
    pub async fn inspect(&self, invoice_number: &str) -> Result<IntegrityReport, FiscalError> {
        let invoice = self.load(invoice_number).await?;

        let digest = InvoiceDigest::of(invoice.canonical_payload().as_bytes());
        let hash_matches_payload = hashes_match(invoice.invoice_hash(), &digest.to_base64());
        let signature_scheme = SignatureScheme::detect(invoice.signature());
        let signature_valid = signature_scheme == self.signer.scheme()
            && self.signer.verify(&digest, invoice.signature());

        Ok(IntegrityReport {
            invoice_number: invoice.invoice_number().to_string(),
            status: invoice.status(),
            digest_algorithm: DIGEST_ALGORITHM,
            hash_matches_payload,
            signature_scheme,
            signature_valid,
            trusted: hash_matches_payload && signature_valid && signature_scheme.is_trusted(),
        })
    }
}
