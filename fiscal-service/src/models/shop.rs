//! Shop and merchant identity.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A shop together with the tax identification number of its merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Shop {
    pub shop_id: Uuid,
    pub name: String,
    pub merchant_tin: String,
}
