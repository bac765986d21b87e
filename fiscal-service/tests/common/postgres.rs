//! PostgreSQL test database helpers.
//!
//! Every test gets its own schema on the server named by `TEST_DATABASE_URL`.
//! When the variable is unset the Postgres tests are skipped.

use super::{dec, TEST_MERCHANT_TIN};
use fiscal_service::services::{Backend, Database};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use uuid::Uuid;

// Counter for unique schema names
static SCHEMA_COUNTER: AtomicU32 = AtomicU32::new(0);

fn unique_schema_name() -> String {
    let counter = SCHEMA_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("test_fiscal_{}_{}", std::process::id(), counter)
}

/// `base_url` with `schema` as the only entry on the search path.
pub fn url_with_schema(base_url: &str, schema: &str) -> String {
    // Use ? or & depending on whether URL already has query parameters
    let separator = if base_url.contains('?') { "&" } else { "?" };
    format!("{}{}options=-c search_path%3D{}", base_url, separator, schema)
}

pub struct TestDatabase {
    pub db: Arc<Database>,
    /// Connection URL scoped to this test's schema.
    pub url: String,
    base_url: String,
    schema_name: String,
}

impl TestDatabase {
    /// A migrated, empty schema, or `None` when no test server is configured.
    pub async fn create() -> Option<Self> {
        let Ok(base_url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL is not set; skipping PostgreSQL test");
            return None;
        };
        let schema_name = unique_schema_name();

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&base_url)
            .await
            .expect("Failed to connect to test database");
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema_name))
            .execute(&pool)
            .await
            .ok();
        sqlx::query(&format!("CREATE SCHEMA {}", schema_name))
            .execute(&pool)
            .await
            .expect("Failed to create test schema");
        pool.close().await;

        let url = url_with_schema(&base_url, &schema_name);
        let db = Database::new(&url, 10, 1)
            .await
            .expect("Failed to create test database");
        db.run_migrations()
            .await
            .expect("Failed to migrate test schema");

        Some(Self {
            db: Arc::new(db),
            url,
            base_url,
            schema_name,
        })
    }

    pub fn backend(&self) -> Backend {
        Backend::postgres(self.db.clone())
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        self.db.pool()
    }

    pub async fn seed_shop(&self) -> Uuid {
        let merchant_id = Uuid::new_v4();
        let shop_id = Uuid::new_v4();
        sqlx::query("INSERT INTO merchants (merchant_id, name, tin) VALUES ($1, $2, $3)")
            .bind(merchant_id)
            .bind("Acme Trading")
            .bind(TEST_MERCHANT_TIN)
            .execute(self.pool())
            .await
            .expect("Failed to seed merchant");
        sqlx::query("INSERT INTO shops (shop_id, merchant_id, name) VALUES ($1, $2, $3)")
            .bind(shop_id)
            .bind(merchant_id)
            .bind("Corner Shop")
            .execute(self.pool())
            .await
            .expect("Failed to seed shop");
        shop_id
    }

    pub async fn seed_product(&self, name: &str) -> Uuid {
        let product_id = Uuid::new_v4();
        sqlx::query("INSERT INTO products (product_id, name) VALUES ($1, $2)")
            .bind(product_id)
            .bind(name)
            .execute(self.pool())
            .await
            .expect("Failed to seed product");
        product_id
    }

    /// A sale whose items are `(product, quantity, unit price)`.
    pub async fn seed_sale(&self, shop_id: Uuid, items: &[(Uuid, i32, &str)]) -> Uuid {
        let sale_id = Uuid::new_v4();
        let total: Decimal = items
            .iter()
            .map(|(_, quantity, price)| dec(price) * Decimal::from(*quantity))
            .sum();
        sqlx::query("INSERT INTO sales (sale_id, shop_id, total_amount) VALUES ($1, $2, $3)")
            .bind(sale_id)
            .bind(shop_id)
            .bind(total)
            .execute(self.pool())
            .await
            .expect("Failed to seed sale");

        for (idx, (product_id, quantity, price)) in items.iter().enumerate() {
            let unit_price = dec(price);
            sqlx::query(
                r#"
                INSERT INTO sale_items (sale_id, line_no, product_id, quantity, unit_price, total_price)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(sale_id)
            .bind(idx as i32 + 1)
            .bind(product_id)
            .bind(quantity)
            .bind(unit_price)
            .bind(unit_price * Decimal::from(*quantity))
            .execute(self.pool())
            .await
            .expect("Failed to seed sale item");
        }
        sale_id
    }

    pub async fn count(&self, sql: &str, id: Uuid) -> i64 {
        sqlx::query_scalar::<_, i64>(sql)
            .bind(id)
            .fetch_one(self.pool())
            .await
            .expect("Failed to count rows")
    }

    /// Drop the test schema.
    pub async fn cleanup(&self) {
        self.db.pool().close().await;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&self.base_url)
            .await
            .ok();

        if let Some(pool) = pool {
            let _ = sqlx::query(&format!(
                "DROP SCHEMA IF EXISTS {} CASCADE",
                self.schema_name
            ))
            .execute(&pool)
            .await;
            pool.close().await;
        }
    }
}
