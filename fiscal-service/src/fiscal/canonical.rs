//! Canonical encoding of an invoice's financial identity.
//!
//! The output is the exact byte sequence that is hashed and signed, so every
//! detail here is part of the fiscal contract and must not change for
//! invoices already issued:
//!
//! - a single JSON object, no whitespace, keys in the order
//!   `invoiceNumber, issuedAt, netAmount, vatAmount, surtaxAmount, grossAmount`
//! - amounts as bare JSON numbers with exactly two decimal places
//! - `issuedAt` as RFC 3339 UTC with millisecond precision and a `Z` suffix

use crate::error::FiscalError;
use crate::fiscal::tax::is_minor_precision;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::fmt::Write;

/// The fields covered by the invoice hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalInvoice<'a> {
    pub invoice_number: &'a str,
    pub issued_at: DateTime<Utc>,
    pub net_amount: Decimal,
    pub vat_amount: Decimal,
    pub surtax_amount: Decimal,
    pub gross_amount: Decimal,
}

pub fn canonicalize(invoice: &CanonicalInvoice<'_>) -> Result<String, FiscalError> {
    if invoice.invoice_number.is_empty() {
        return Err(FiscalError::Canonicalization(
            "invoice number is empty".to_string(),
        ));
    }

    let mut out = String::with_capacity(192);
    out.push('{');
    push_key(&mut out, "invoiceNumber");
    push_string(&mut out, invoice.invoice_number)?;
    out.push(',');
    push_key(&mut out, "issuedAt");
    push_string(&mut out, &format_timestamp(invoice.issued_at))?;

    for (key, amount) in [
        ("netAmount", invoice.net_amount),
        ("vatAmount", invoice.vat_amount),
        ("surtaxAmount", invoice.surtax_amount),
        ("grossAmount", invoice.gross_amount),
    ] {
        out.push(',');
        push_key(&mut out, key);
        out.push_str(&format_amount(key, amount)?);
    }
    out.push('}');

    Ok(out)
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn format_amount(field: &str, amount: Decimal) -> Result<String, FiscalError> {
    if amount.is_zero() {
        return Ok("0.00".to_string());
    }
    if amount.is_sign_negative() {
        return Err(FiscalError::Canonicalization(format!(
            "{} is negative: {}",
            field, amount
        )));
    }
    if !is_minor_precision(amount) {
        return Err(FiscalError::Canonicalization(format!(
            "{} has sub-minor precision: {}",
            field, amount
        )));
    }
    let mut s = String::new();
    write!(s, "{:.2}", amount)
        .map_err(|e| FiscalError::Canonicalization(format!("{}: {}", field, e)))?;
    Ok(s)
}

fn push_key(out: &mut String, key: &str) {
    out.push('"');
    out.push_str(key);
    out.push_str("\":");
}

fn push_string(out: &mut String, value: &str) -> Result<(), FiscalError> {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if c.is_control() => {
                return Err(FiscalError::Canonicalization(format!(
                    "control character U+{:04X} in string field",
                    c as u32
                )));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    Ok(())
}
