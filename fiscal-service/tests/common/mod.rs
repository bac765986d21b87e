//! Test helper module for fiscal-service integration tests.
//!
//! Runs the full HTTP application against the in-memory backend, or against
//! a per-test PostgreSQL schema (see [`postgres`]).

#![allow(dead_code)]

pub mod postgres;

use fiscal_service::config::{
    DatabaseConfig, FiscalConfig, SignerConfig, SignerKind, TaxConfig, VerificationConfig,
};
use fiscal_service::models::{SaleItem, SaleSnapshot, Shop};
use fiscal_service::services::{init_metrics, Backend, MemoryStore};
use fiscal_service::startup::Application;
use rust_decimal::Decimal;
use service_core::config::Config as CoreConfig;
use std::str::FromStr;
use uuid::Uuid;

pub const TEST_MERCHANT_TIN: &str = "TIN-000123";
pub const TEST_VERIFICATION_URL: &str = "https://verify.example.test/v";

pub fn dec(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap()
}

pub fn test_config(signer: SignerConfig) -> FiscalConfig {
    FiscalConfig {
        common: CoreConfig::ephemeral(),
        service_name: "fiscal-service".to_string(),
        service_version: "0.1.0".to_string(),
        log_level: "warn".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        tax: TaxConfig {
            vat_rate: dec("0.15"),
            surtax_rate: dec("0.01"),
        },
        verification: VerificationConfig {
            base_url: TEST_VERIFICATION_URL.to_string(),
        },
        signer,
    }
}

pub fn dummy_signer() -> SignerConfig {
    SignerConfig {
        kind: SignerKind::Dummy,
        key_id: "default".to_string(),
        signing_key: None,
    }
}

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub http_address: String,
    pub http_port: u16,
    pub store: MemoryStore,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn a new test application on a random port.
    pub async fn spawn() -> Self {
        Self::spawn_with(dummy_signer()).await
    }

    pub async fn spawn_with(signer: SignerConfig) -> Self {
        init_metrics();

        let store = MemoryStore::new();
        let app = Application::build_with_backend(
            test_config(signer),
            Backend::memory(store.clone()),
        )
        .await
        .expect("Failed to build test application");

        Self::serve(app, store).await
    }

    /// Spawn the production build path against `db`'s schema. `store` stays
    /// empty; seed through [`postgres::TestDatabase`].
    pub async fn spawn_postgres(db: &postgres::TestDatabase) -> Self {
        init_metrics();

        let mut config = test_config(dummy_signer());
        config.database.url = db.url.clone();
        config.database.max_connections = 5;
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        Self::serve(app, MemoryStore::new()).await
    }

    async fn serve(app: Application, store: MemoryStore) -> Self {
        let http_port = app.port();
        let http_address = format!("http://127.0.0.1:{}", http_port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", http_address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            http_address,
            http_port,
            store,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.http_address, path)
    }

    pub fn seed_shop(&self) -> Uuid {
        let shop_id = Uuid::new_v4();
        self.store
            .add_shop(Shop {
                shop_id,
                name: "Corner Shop".to_string(),
                merchant_tin: TEST_MERCHANT_TIN.to_string(),
            })
            .unwrap();
        shop_id
    }

    pub fn seed_product(&self, name: &str) -> Uuid {
        let product_id = Uuid::new_v4();
        self.store.add_product(product_id, name).unwrap();
        product_id
    }

    /// A single-line sale of `quantity` x `unit_price`.
    pub fn seed_sale(&self, shop_id: Uuid, quantity: i32, unit_price: &str) -> Uuid {
        let product_id = self.seed_product("Espresso Beans 1kg");
        let unit_price = dec(unit_price);
        let total = unit_price * Decimal::from(quantity);
        self.seed_sale_with_items(
            shop_id,
            total,
            vec![SaleItem {
                product_id,
                quantity,
                unit_price,
                total_price: total,
            }],
        )
    }

    pub fn seed_sale_with_items(
        &self,
        shop_id: Uuid,
        total_amount: Decimal,
        items: Vec<SaleItem>,
    ) -> Uuid {
        let sale_id = Uuid::new_v4();
        self.store
            .add_sale(SaleSnapshot {
                sale_id,
                shop_id,
                total_amount,
                items,
            })
            .unwrap();
        sale_id
    }

    pub async fn issue(&self, sale_id: Uuid, shop_id: Uuid) -> reqwest::Response {
        self.client
            .post(self.url("/api/invoices"))
            .header("x-actor-id", "cashier-7")
            .header("x-actor-role", "cashier")
            .json(&serde_json::json!({ "saleId": sale_id, "shopId": shop_id }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Issue and return the response body, asserting 201.
    pub async fn issue_ok(&self, sale_id: Uuid, shop_id: Uuid) -> serde_json::Value {
        let response = self.issue(sale_id, shop_id).await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.expect("Failed to parse JSON")
    }

    pub async fn advance(&self, invoice_id: &str, status: &str) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/invoices/{}/status", invoice_id)))
            .header("x-actor-id", "ops-1")
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await
            .expect("Failed to execute request")
    }
}
