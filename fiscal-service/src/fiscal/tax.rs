//! VAT and surtax computation.

use crate::error::FiscalError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Amounts are kept in minor units of the currency (two decimal places).
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Round half away from zero to the currency's minor unit.
pub fn round_minor(amount: Decimal) -> Decimal {
    let mut rounded =
        amount.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MINOR_UNIT_SCALE);
    rounded
}

/// True when `amount` carries no precision below the minor unit.
pub fn is_minor_precision(amount: Decimal) -> bool {
    amount.normalize().scale() <= MINOR_UNIT_SCALE
}

/// Largest amount the invoice columns hold, `NUMERIC(14, 2)`.
pub fn max_amount() -> Decimal {
    Decimal::new(99_999_999_999_999, 2)
}

/// Rejects amounts with sub-minor precision or beyond [`max_amount`].
pub fn ensure_storable(amount: Decimal, what: &str) -> Result<Decimal, FiscalError> {
    if !is_minor_precision(amount) {
        return Err(FiscalError::InvalidAmount(format!(
            "{} {} has more than {} decimal places",
            what, amount, MINOR_UNIT_SCALE
        )));
    }
    if amount.abs() > max_amount() {
        return Err(FiscalError::InvalidAmount(format!(
            "{} {} exceeds {}",
            what,
            amount,
            max_amount()
        )));
    }
    Ok(amount)
}

pub fn checked_mul(a: Decimal, b: Decimal, what: &str) -> Result<Decimal, FiscalError> {
    a.checked_mul(b)
        .ok_or_else(|| FiscalError::InvalidAmount(format!("{} overflows: {} x {}", what, a, b)))
}

pub fn checked_add(a: Decimal, b: Decimal, what: &str) -> Result<Decimal, FiscalError> {
    a.checked_add(b)
        .ok_or_else(|| FiscalError::InvalidAmount(format!("{} overflows: {} + {}", what, a, b)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxRates {
    vat_rate: Decimal,
    surtax_rate: Decimal,
}

impl TaxRates {
    pub fn new(vat_rate: Decimal, surtax_rate: Decimal) -> Result<Self, FiscalError> {
        for (name, rate) in [("VAT", vat_rate), ("surtax", surtax_rate)] {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(FiscalError::InvalidAmount(format!(
                    "{} rate {} is outside 0..=1",
                    name, rate
                )));
            }
        }
        Ok(Self {
            vat_rate,
            surtax_rate,
        })
    }

    pub fn vat_rate(&self) -> Decimal {
        self.vat_rate
    }

    pub fn surtax_rate(&self) -> Decimal {
        self.surtax_rate
    }
}

impl Default for TaxRates {
    /// 15% VAT, 1% surtax.
    fn default() -> Self {
        Self {
            vat_rate: Decimal::new(15, 2),
            surtax_rate: Decimal::new(1, 2),
        }
    }
}

/// Net, taxes and gross of one invoice. `gross = net + vat + surtax` exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub net_amount: Decimal,
    pub vat_amount: Decimal,
    pub surtax_amount: Decimal,
    pub gross_amount: Decimal,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TaxCalculator {
    rates: TaxRates,
}

impl TaxCalculator {
    pub fn new(rates: TaxRates) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> TaxRates {
        self.rates
    }

    /// Each tax is rounded independently; gross is the exact sum of the
    /// rounded components.
    pub fn calculate(&self, net_amount: Decimal) -> Result<TaxBreakdown, FiscalError> {
        if net_amount.is_sign_negative() && !net_amount.is_zero() {
            return Err(FiscalError::InvalidAmount(format!(
                "Net amount {} is negative",
                net_amount
            )));
        }
        let net_amount = round_minor(ensure_storable(net_amount, "Net amount")?);
        let vat_amount = round_minor(checked_mul(net_amount, self.rates.vat_rate, "VAT")?);
        let surtax_amount =
            round_minor(checked_mul(net_amount, self.rates.surtax_rate, "Surtax")?);
        let gross_amount = checked_add(
            checked_add(net_amount, vat_amount, "Gross amount")?,
            surtax_amount,
            "Gross amount",
        )?;
        ensure_storable(gross_amount, "Gross amount")?;

        Ok(TaxBreakdown {
            net_amount,
            vat_amount,
            surtax_amount,
            gross_amount,
        })
    }
}
