//! Invoice signing.
//!
//! Signatures are stored as `<scheme>:<body>` so that verification can tell
//! which scheme produced them. The dummy scheme exists for development and
//! is never reported as trusted.

use crate::error::FiscalError;
use crate::fiscal::digest::InvoiceDigest;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use rsa::signature::{Keypair, SignatureEncoding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::Serialize;
use sha2::Sha256;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureScheme {
    Dummy,
    #[serde(rename = "rsa-sha256")]
    RsaSha256,
    Unknown,
}

impl SignatureScheme {
    pub fn prefix(&self) -> &'static str {
        match self {
            SignatureScheme::Dummy => "dummy:",
            SignatureScheme::RsaSha256 => "rsa-sha256:",
            SignatureScheme::Unknown => "",
        }
    }

    pub fn detect(signature: &str) -> Self {
        if signature.starts_with(SignatureScheme::Dummy.prefix()) {
            SignatureScheme::Dummy
        } else if signature.starts_with(SignatureScheme::RsaSha256.prefix()) {
            SignatureScheme::RsaSha256
        } else {
            SignatureScheme::Unknown
        }
    }

    pub fn is_trusted(&self) -> bool {
        matches!(self, SignatureScheme::RsaSha256)
    }
}

/// Produces a signature over an invoice digest.
pub trait InvoiceSigner: Send + Sync {
    fn scheme(&self) -> SignatureScheme;

    fn sign(&self, digest: &InvoiceDigest) -> Result<String, FiscalError>;

    fn verify(&self, digest: &InvoiceDigest, signature: &str) -> bool;
}

const DUMMY_MARKER: &str = "DUMMY-SIGNATURE::";

/// Placeholder signer: a reversible encoding of the hash, not a signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummySigner;

impl InvoiceSigner for DummySigner {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Dummy
    }

    fn sign(&self, digest: &InvoiceDigest) -> Result<String, FiscalError> {
        let body = STANDARD.encode(format!("{}{}", DUMMY_MARKER, digest.to_base64()));
        Ok(format!("{}{}", SignatureScheme::Dummy.prefix(), body))
    }

    fn verify(&self, digest: &InvoiceDigest, signature: &str) -> bool {
        self.sign(digest).is_ok_and(|expected| expected == signature)
    }
}

/// Holds signing keys. Private key material never leaves the store.
pub trait KeyStore: Send + Sync {
    fn key_id(&self) -> &str;

    /// Sign a SHA-256 digest that was computed by the caller.
    fn sign_prehash(&self, digest: &[u8]) -> Result<Signature, FiscalError>;

    fn verifying_key(&self) -> VerifyingKey<Sha256>;
}

pub struct StaticKeyStore {
    key_id: String,
    signing_key: SigningKey<Sha256>,
}

impl StaticKeyStore {
    pub fn new(key_id: impl Into<String>, private_key: RsaPrivateKey) -> Self {
        Self {
            key_id: key_id.into(),
            signing_key: SigningKey::<Sha256>::new(private_key),
        }
    }

    /// Build from a PKCS#8 PEM encoded RSA private key.
    pub fn from_pkcs8_pem(key_id: impl Into<String>, pem: &str) -> Result<Self, FiscalError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem.trim()).map_err(|e| {
            FiscalError::SigningFailure(format!("Signing key is not a PKCS#8 RSA key: {}", e))
        })?;
        if private_key.size() * 8 < MIN_KEY_BITS {
            return Err(FiscalError::SigningFailure(format!(
                "Signing key must be at least {} bits, got {}",
                MIN_KEY_BITS,
                private_key.size() * 8
            )));
        }
        Ok(Self::new(key_id, private_key))
    }
}

const MIN_KEY_BITS: usize = 2048;

impl KeyStore for StaticKeyStore {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn sign_prehash(&self, digest: &[u8]) -> Result<Signature, FiscalError> {
        self.signing_key
            .sign_prehash(digest)
            .map_err(|e| FiscalError::SigningFailure(e.to_string()))
    }

    fn verifying_key(&self) -> VerifyingKey<Sha256> {
        self.signing_key.verifying_key()
    }
}

/// RSASSA-PKCS1-v1_5 with SHA-256. The digest is the SHA-256 of the
/// canonical payload, so the result equals a SHA256withRSA signature over
/// the payload itself.
///
/// Format: `rsa-sha256:<key id>:<base64 signature>`.
pub struct RsaSigner {
    keys: Arc<dyn KeyStore>,
}

impl RsaSigner {
    pub fn new(keys: Arc<dyn KeyStore>) -> Self {
        Self { keys }
    }
}

impl InvoiceSigner for RsaSigner {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::RsaSha256
    }

    fn sign(&self, digest: &InvoiceDigest) -> Result<String, FiscalError> {
        let signature = self.keys.sign_prehash(digest.as_bytes())?;
        Ok(format!(
            "{}{}:{}",
            SignatureScheme::RsaSha256.prefix(),
            self.keys.key_id(),
            STANDARD.encode(signature.to_bytes())
        ))
    }

    fn verify(&self, digest: &InvoiceDigest, signature: &str) -> bool {
        let Some(rest) = signature.strip_prefix(SignatureScheme::RsaSha256.prefix()) else {
            return false;
        };
        let Some((key_id, body)) = rest.rsplit_once(':') else {
            return false;
        };
        if key_id != self.keys.key_id() {
            return false;
        }
        let Ok(bytes) = STANDARD.decode(body) else {
            return false;
        };
        let Ok(signature) = Signature::try_from(bytes.as_slice()) else {
            return false;
        };
        self.keys
            .verifying_key()
            .verify_prehash(digest.as_bytes(), &signature)
            .is_ok()
    }
}
