//! SHA-256 digest over canonical invoice payloads.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

pub const DIGEST_ALGORITHM: &str = "SHA-256";

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct InvoiceDigest([u8; 32]);

impl InvoiceDigest {
    pub fn of(payload: &[u8]) -> Self {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&Sha256::digest(payload));
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Standard base64 with padding; the form stored on the invoice and
    /// printed in the QR payload.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl fmt::Display for InvoiceDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for InvoiceDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvoiceDigest({})", self.to_base64())
    }
}

/// Constant-time equality of two encoded hashes.
pub fn hashes_match(expected: &str, supplied: &str) -> bool {
    let expected = expected.as_bytes();
    let supplied = supplied.as_bytes();

    if expected.len() != supplied.len() {
        return false;
    }

    expected.ct_eq(supplied).into()
}
