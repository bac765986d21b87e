//! Domain errors for fiscal-service.

use crate::models::InvoiceStatus;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FiscalError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },

    #[error("Signing failed: {0}")]
    SigningFailure(String),

    #[error("Canonicalization failed: {0}")]
    Canonicalization(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(anyhow::Error),
}

impl FiscalError {
    /// Stable label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            FiscalError::NotFound(_) => "not_found",
            FiscalError::Conflict(_) => "conflict",
            FiscalError::InvalidAmount(_) => "invalid_amount",
            FiscalError::InvalidTransition { .. } => "invalid_transition",
            FiscalError::SigningFailure(_) => "signing_failure",
            FiscalError::Canonicalization(_) => "canonicalization",
            FiscalError::InvalidRequest(_) => "invalid_request",
            FiscalError::Storage(_) => "storage",
        }
    }
}

impl From<FiscalError> for AppError {
    fn from(err: FiscalError) -> Self {
        match err {
            FiscalError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            FiscalError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            FiscalError::InvalidRequest(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            FiscalError::SigningFailure(msg) => {
                AppError::InternalError(anyhow::anyhow!("Signing failed: {}", msg))
            }
            FiscalError::Storage(e) => AppError::DatabaseError(e),
            other @ (FiscalError::InvalidAmount(_)
            | FiscalError::InvalidTransition { .. }
            | FiscalError::Canonicalization(_)) => {
                AppError::UnprocessableEntity(anyhow::anyhow!(other.to_string()))
            }
        }
    }
}
