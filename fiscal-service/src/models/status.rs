//! Legal status of an issued invoice.

use crate::error::FiscalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Invoice status.
///
/// The lifecycle only moves forward:
/// `CREATED -> SIGNED -> QR_GENERATED -> SUBMITTED -> ACCEPTED | REJECTED`,
/// and any non-terminal status may move to `CANCELLED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Created,
    Signed,
    QrGenerated,
    Submitted,
    Accepted,
    Rejected,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Created => "CREATED",
            InvoiceStatus::Signed => "SIGNED",
            InvoiceStatus::QrGenerated => "QR_GENERATED",
            InvoiceStatus::Submitted => "SUBMITTED",
            InvoiceStatus::Accepted => "ACCEPTED",
            InvoiceStatus::Rejected => "REJECTED",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Accepted | InvoiceStatus::Rejected | InvoiceStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        match (*self, next) {
            (Created, Signed)
            | (Signed, QrGenerated)
            | (QrGenerated, Submitted)
            | (Submitted, Accepted)
            | (Submitted, Rejected) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn transition(self, next: InvoiceStatus) -> Result<InvoiceStatus, FiscalError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(FiscalError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = FiscalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(InvoiceStatus::Created),
            "SIGNED" => Ok(InvoiceStatus::Signed),
            "QR_GENERATED" => Ok(InvoiceStatus::QrGenerated),
            "SUBMITTED" => Ok(InvoiceStatus::Submitted),
            "ACCEPTED" => Ok(InvoiceStatus::Accepted),
            "REJECTED" => Ok(InvoiceStatus::Rejected),
            "CANCELLED" => Ok(InvoiceStatus::Cancelled),
            other => Err(FiscalError::InvalidRequest(format!(
                "Unknown invoice status '{}'",
                other
            ))),
        }
    }
}
