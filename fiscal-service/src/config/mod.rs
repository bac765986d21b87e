//! Configuration module for fiscal-service.

use rust_decimal::Decimal;
use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct FiscalConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub tax: TaxConfig,
    pub verification: VerificationConfig,
    pub signer: SignerConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct TaxConfig {
    pub vat_rate: Decimal,
    pub surtax_rate: Decimal,
}

#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// Public URL the QR code points at; the invoice number is appended.
    pub base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerKind {
    Dummy,
    Rsa,
}

impl FromStr for SignerKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dummy" => Ok(SignerKind::Dummy),
            "rsa" => Ok(SignerKind::Rsa),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "FISCAL_SIGNER must be 'dummy' or 'rsa', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignerConfig {
    pub kind: SignerKind,
    pub key_id: String,
    /// PKCS#8 PEM encoded RSA private key.
    pub signing_key: Option<Secret<String>>,
}

fn decimal_var(name: &str, default: Decimal) -> Result<Decimal, AppError> {
    match env::var(name) {
        Ok(raw) => Decimal::from_str(raw.trim()).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} is not a decimal: {}", name, e))
        }),
        Err(_) => Ok(default),
    }
}

/// The key may be given inline or as a path to a PEM file; the file wins.
fn signing_key_from_env() -> Result<Option<Secret<String>>, AppError> {
    if let Ok(path) = env::var("FISCAL_SIGNING_KEY_FILE") {
        let pem = std::fs::read_to_string(&path).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "FISCAL_SIGNING_KEY_FILE '{}' could not be read: {}",
                path,
                e
            ))
        })?;
        return Ok(Some(Secret::new(pem)));
    }
    // Single-line env values carry the PEM's newlines escaped.
    Ok(env::var("FISCAL_SIGNING_KEY")
        .ok()
        .map(|pem| Secret::new(pem.replace("\\n", "\n"))))
}

impl FiscalConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let signer_kind = env::var("FISCAL_SIGNER")
            .map(|s| s.parse())
            .unwrap_or(Ok(SignerKind::Dummy))?;

        let signer = SignerConfig {
            kind: signer_kind,
            key_id: env::var("FISCAL_SIGNING_KEY_ID").unwrap_or_else(|_| "default".to_string()),
            signing_key: signing_key_from_env()?,
        };
        if signer.kind == SignerKind::Rsa && signer.signing_key.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "FISCAL_SIGNING_KEY or FISCAL_SIGNING_KEY_FILE is required when FISCAL_SIGNER=rsa"
            )));
        }

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "fiscal-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
            tax: TaxConfig {
                vat_rate: decimal_var("FISCAL_VAT_RATE", Decimal::new(15, 2))?,
                surtax_rate: decimal_var("FISCAL_SURTAX_RATE", Decimal::new(1, 2))?,
            },
            verification: VerificationConfig {
                base_url: env::var("FISCAL_VERIFICATION_BASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!(
                        "FISCAL_VERIFICATION_BASE_URL is required"
                    ))
                })?,
            },
            signer,
        })
    }
}
