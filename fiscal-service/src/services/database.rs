//! PostgreSQL backend for fiscal-service.

use crate::error::FiscalError;
use crate::models::{
    AuditEvent, Invoice, InvoiceLine, InvoiceRow, InvoiceStatus, ListInvoicesFilter, SaleItem,
    SaleRow, SaleSnapshot, Shop,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{
    AuditSink, InvoiceStore, ProductCatalog, SaleDirectory, SequenceStore, ShopDirectory,
};
use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "invoice_id, invoice_number, shop_id, sale_id, status, \
     net_amount, vat_amount, surtax_amount, gross_amount, issued_utc, \
     canonical_payload, invoice_hash, signature, qr_payload, updated_utc";

#[derive(sqlx::FromRow)]
struct InvoiceLineRow {
    invoice_id: Uuid,
    line_no: i32,
    product_name: String,
    quantity: i32,
    unit_price: rust_decimal::Decimal,
    line_total: rust_decimal::Decimal,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

fn storage(context: &str, e: sqlx::Error) -> FiscalError {
    FiscalError::Storage(anyhow::anyhow!("{}: {}", context, e))
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "fiscal-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn load_lines(&self, invoice_id: Uuid) -> Result<Vec<InvoiceLine>, FiscalError> {
        sqlx::query_as::<_, InvoiceLine>(
            r#"
            SELECT line_no, product_name, quantity, unit_price, line_total
            FROM invoice_lines
            WHERE invoice_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("Failed to load invoice lines", e))
    }

    /// Lines of many invoices in one round trip, grouped by invoice.
    async fn load_lines_for(
        &self,
        invoice_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<InvoiceLine>>, FiscalError> {
        if invoice_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, InvoiceLineRow>(
            r#"
            SELECT invoice_id, line_no, product_name, quantity, unit_price, line_total
            FROM invoice_lines
            WHERE invoice_id = ANY($1)
            ORDER BY invoice_id, line_no
            "#,
        )
        .bind(invoice_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("Failed to load invoice lines", e))?;

        let mut grouped: HashMap<Uuid, Vec<InvoiceLine>> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.invoice_id)
                .or_default()
                .push(InvoiceLine {
                    line_no: row.line_no,
                    product_name: row.product_name,
                    quantity: row.quantity,
                    unit_price: row.unit_price,
                    line_total: row.line_total,
                });
        }
        Ok(grouped)
    }

    async fn hydrate(&self, row: Option<InvoiceRow>) -> Result<Option<Invoice>, FiscalError> {
        match row {
            Some(row) => {
                let lines = self.load_lines(row.invoice_id).await?;
                Invoice::from_row(row, lines).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn find_one<T>(
        &self,
        operation: &str,
        column: &str,
        value: T,
    ) -> Result<Option<Invoice>, FiscalError>
    where
        T: for<'q> sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres> + Send + 'static,
    {
        let timer = DB_QUERY_DURATION
            .with_label_values(&[operation])
            .start_timer();

        let sql = format!(
            "SELECT {} FROM invoices WHERE {} = $1",
            INVOICE_COLUMNS, column
        );
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("Failed to get invoice", e))?;

        let invoice = self.hydrate(row).await?;
        timer.observe_duration();
        Ok(invoice)
    }
}

#[async_trait]
impl SaleDirectory for Database {
    #[instrument(skip(self), fields(sale_id = %sale_id))]
    async fn find_sale(&self, sale_id: Uuid) -> Result<Option<SaleSnapshot>, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_sale"])
            .start_timer();

        let header = sqlx::query_as::<_, SaleRow>(
            "SELECT sale_id, shop_id, total_amount FROM sales WHERE sale_id = $1",
        )
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage("Failed to get sale", e))?;

        let Some(header) = header else {
            timer.observe_duration();
            return Ok(None);
        };

        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT product_id, quantity, unit_price, total_price
            FROM sale_items
            WHERE sale_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("Failed to get sale items", e))?;

        timer.observe_duration();
        Ok(Some(header.with_items(items)))
    }
}

#[async_trait]
impl ShopDirectory for Database {
    #[instrument(skip(self), fields(shop_id = %shop_id))]
    async fn find_shop(&self, shop_id: Uuid) -> Result<Option<Shop>, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_shop"])
            .start_timer();

        let shop = sqlx::query_as::<_, Shop>(
            r#"
            SELECT s.shop_id, s.name, m.tin AS merchant_tin
            FROM shops s
            JOIN merchants m ON m.merchant_id = s.merchant_id
            WHERE s.shop_id = $1
            "#,
        )
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage("Failed to get shop", e))?;

        timer.observe_duration();
        Ok(shop)
    }
}

#[async_trait]
impl ProductCatalog for Database {
    async fn product_name(&self, product_id: Uuid) -> Result<Option<String>, FiscalError> {
        sqlx::query_scalar::<_, String>("SELECT name FROM products WHERE product_id = $1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("Failed to get product", e))
    }
}

#[async_trait]
impl SequenceStore for Database {
    #[instrument(skip(self), fields(shop_id = %shop_id))]
    async fn next_value(&self, shop_id: Uuid) -> Result<u64, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["next_invoice_sequence"])
            .start_timer();

        let value = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO invoice_sequences (shop_id, last_value)
            VALUES ($1, 1)
            ON CONFLICT (shop_id)
            DO UPDATE SET last_value = invoice_sequences.last_value + 1, updated_utc = NOW()
            RETURNING last_value
            "#,
        )
        .bind(shop_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage("Failed to advance invoice sequence", e))?;

        timer.observe_duration();

        u64::try_from(value).map_err(|_| {
            FiscalError::Storage(anyhow::anyhow!(
                "Invoice sequence for shop {} is negative",
                shop_id
            ))
        })
    }
}

#[async_trait]
impl InvoiceStore for Database {
    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.invoice_id(), sale_id = %invoice.sale_id()))]
    async fn insert(&self, invoice: &Invoice) -> Result<(), FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage("Failed to begin transaction", e))?;

        let amounts = invoice.amounts();
        sqlx::query(
            r#"
            INSERT INTO invoices (invoice_id, invoice_number, shop_id, sale_id, status,
                                  net_amount, vat_amount, surtax_amount, gross_amount, issued_utc,
                                  canonical_payload, invoice_hash, signature, qr_payload, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(invoice.invoice_id())
        .bind(invoice.invoice_number())
        .bind(invoice.shop_id())
        .bind(invoice.sale_id())
        .bind(invoice.status().as_str())
        .bind(amounts.net_amount)
        .bind(amounts.vat_amount)
        .bind(amounts.surtax_amount)
        .bind(amounts.gross_amount)
        .bind(invoice.issued_at())
        .bind(invoice.canonical_payload())
        .bind(invoice.invoice_hash())
        .bind(invoice.signature())
        .bind(invoice.qr_payload())
        .bind(invoice.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                if db_err.constraint() == Some("invoices_sale_id_key") {
                    FiscalError::Conflict(format!(
                        "Invoice already exists for sale {}",
                        invoice.sale_id()
                    ))
                } else {
                    FiscalError::Conflict(format!(
                        "Invoice number {} already issued",
                        invoice.invoice_number()
                    ))
                }
            }
            _ => storage("Failed to insert invoice", e),
        })?;

        for line in invoice.lines() {
            sqlx::query(
                r#"
                INSERT INTO invoice_lines (invoice_id, line_no, product_name, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(invoice.invoice_id())
            .bind(line.line_no)
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.line_total)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage("Failed to insert invoice line", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| storage("Failed to commit invoice", e))?;

        timer.observe_duration();

        info!(invoice_number = %invoice.invoice_number(), "Invoice persisted");

        Ok(())
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn find_by_id(&self, invoice_id: Uuid) -> Result<Option<Invoice>, FiscalError> {
        self.find_one("get_invoice", "invoice_id", invoice_id).await
    }

    #[instrument(skip(self), fields(sale_id = %sale_id))]
    async fn find_by_sale(&self, sale_id: Uuid) -> Result<Option<Invoice>, FiscalError> {
        self.find_one("get_invoice_by_sale", "sale_id", sale_id).await
    }

    #[instrument(skip(self))]
    async fn find_by_number(
        &self,
        invoice_number: &str,
    ) -> Result<Option<Invoice>, FiscalError> {
        self.find_one(
            "get_invoice_by_number",
            "invoice_number",
            invoice_number.to_string(),
        )
        .await
    }

    #[instrument(skip(self, filter), fields(shop_id = ?filter.shop_id))]
    async fn list(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let sql = format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE ($1::UUID IS NULL OR shop_id = $1)
              AND ($2::UUID IS NULL OR invoice_id > $2)
            ORDER BY invoice_id
            LIMIT $3
            "#,
            INVOICE_COLUMNS
        );
        let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(filter.shop_id)
            .bind(filter.page_token)
            .bind(i64::from(filter.page_size))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage("Failed to list invoices", e))?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.invoice_id).collect();
        let mut lines = self.load_lines_for(&ids).await?;

        let mut invoices = Vec::with_capacity(rows.len());
        for row in rows {
            let invoice_lines = lines.remove(&row.invoice_id).unwrap_or_default();
            invoices.push(Invoice::from_row(row, invoice_lines)?);
        }

        timer.observe_duration();
        Ok(invoices)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id, from = %expected, to = %next))]
    async fn update_status(
        &self,
        invoice_id: Uuid,
        expected: InvoiceStatus,
        next: InvoiceStatus,
    ) -> Result<Invoice, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice_status"])
            .start_timer();

        let sql = format!(
            r#"
            UPDATE invoices
            SET status = $3, updated_utc = NOW()
            WHERE invoice_id = $1 AND status = $2
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(invoice_id)
            .bind(expected.as_str())
            .bind(next.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage("Failed to update invoice status", e))?;

        timer.observe_duration();

        match self.hydrate(row).await? {
            Some(invoice) => Ok(invoice),
            None => match self.find_by_id(invoice_id).await? {
                Some(current) => Err(FiscalError::Conflict(format!(
                    "Invoice {} is {}, expected {}",
                    invoice_id,
                    current.status(),
                    expected
                ))),
                None => Err(FiscalError::NotFound(format!(
                    "Invoice {} not found",
                    invoice_id
                ))),
            },
        }
    }

    async fn ping(&self) -> Result<(), FiscalError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| storage("Health check failed", e))?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for Database {
    #[instrument(skip(self, event), fields(entity_id = %event.entity_id, action = event.action.as_str()))]
    async fn record(&self, event: &AuditEvent) -> Result<(), FiscalError> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (event_id, action, entity_type, entity_id, actor_id, actor_role,
                                      request_id, severity, description, occurred_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(event.event_id)
        .bind(event.action.as_str())
        .bind(&event.entity_type)
        .bind(event.entity_id)
        .bind(&event.actor_id)
        .bind(&event.actor_role)
        .bind(&event.request_id)
        .bind(event.severity.as_str())
        .bind(&event.description)
        .bind(event.occurred_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage("Failed to record audit event", e))?;
        Ok(())
    }
}
