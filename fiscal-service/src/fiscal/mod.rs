//! Fiscal primitives: taxes, numbering, canonical form, digest, signatures
//! and the verification payload.

pub mod canonical;
pub mod digest;
pub mod numbering;
pub mod qr;
pub mod signer;
pub mod tax;

pub use canonical::{canonicalize, format_timestamp, CanonicalInvoice};
pub use digest::{hashes_match, InvoiceDigest, DIGEST_ALGORITHM};
pub use numbering::{format_invoice_number, InvoiceNumberAllocator};
pub use qr::{QrPayloadBuilder, VerificationPayload};
pub use signer::{
    DummySigner, InvoiceSigner, KeyStore, RsaSigner, SignatureScheme, StaticKeyStore,
};
pub use tax::{round_minor, TaxBreakdown, TaxCalculator, TaxRates};
