//! Read-only view of a completed sale, owned by the sales domain.

use crate::error::FiscalError;
use crate::fiscal::tax::{checked_add, checked_mul, ensure_storable};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A completed sale as the fiscal pipeline sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleSnapshot {
    pub sale_id: Uuid,
    pub shop_id: Uuid,
    pub total_amount: Decimal,
    pub items: Vec<SaleItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SaleItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// Header columns of a sale row.
#[derive(Debug, Clone, FromRow)]
pub struct SaleRow {
    pub sale_id: Uuid,
    pub shop_id: Uuid,
    pub total_amount: Decimal,
}

impl SaleRow {
    pub fn with_items(self, items: Vec<SaleItem>) -> SaleSnapshot {
        SaleSnapshot {
            sale_id: self.sale_id,
            shop_id: self.shop_id,
            total_amount: self.total_amount,
            items,
        }
    }
}

impl SaleItem {
    fn validate(&self, position: usize) -> Result<(), FiscalError> {
        if self.quantity <= 0 {
            return Err(FiscalError::InvalidAmount(format!(
                "Item {} has non-positive quantity {}",
                position, self.quantity
            )));
        }
        if self.unit_price.is_sign_negative() && !self.unit_price.is_zero() {
            return Err(FiscalError::InvalidAmount(format!(
                "Item {} has negative unit price {}",
                position, self.unit_price
            )));
        }
        ensure_storable(self.unit_price, &format!("Item {} unit price", position))?;
        ensure_storable(self.total_price, &format!("Item {} total", position))?;
        let expected = checked_mul(
            self.unit_price,
            Decimal::from(self.quantity),
            &format!("Item {} total", position),
        )?;
        if expected != self.total_price {
            return Err(FiscalError::InvalidAmount(format!(
                "Item {} total {} does not equal {} x {}",
                position, self.total_price, self.quantity, self.unit_price
            )));
        }
        Ok(())
    }
}

impl SaleSnapshot {
    /// Validates every item against the sale total and returns the net amount.
    pub fn net_amount(&self) -> Result<Decimal, FiscalError> {
        if self.items.is_empty() {
            return Err(FiscalError::InvalidAmount(format!(
                "Sale {} has no items",
                self.sale_id
            )));
        }

        let mut sum = Decimal::ZERO;
        for (idx, item) in self.items.iter().enumerate() {
            item.validate(idx + 1)?;
            sum = checked_add(sum, item.total_price, "Sale total")?;
        }

        if sum != self.total_amount {
            return Err(FiscalError::InvalidAmount(format!(
                "Sale total {} does not equal the sum of its items {}",
                self.total_amount, sum
            )));
        }

        Ok(self.total_amount)
    }
}
