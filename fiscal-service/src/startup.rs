//! Application startup and lifecycle management.

use crate::config::{FiscalConfig, SignerConfig, SignerKind};
use crate::error::FiscalError;
use crate::fiscal::{
    DummySigner, InvoiceSigner, QrPayloadBuilder, RsaSigner, StaticKeyStore, TaxCalculator,
    TaxRates,
};
use crate::handlers::{self, invoices, verification};
use crate::services::{
    init_metrics, Backend, Database, InvoiceRegistry, InvoiceStore, IssuancePipeline,
    VerificationService,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service_name: String,
    pub issuance: Arc<IssuancePipeline>,
    pub registry: Arc<InvoiceRegistry>,
    pub verification: Arc<VerificationService>,
    pub invoices: Arc<dyn InvoiceStore>,
}

pub fn build_signer(config: &SignerConfig) -> Result<Arc<dyn InvoiceSigner>, FiscalError> {
    match config.kind {
        SignerKind::Dummy => {
            tracing::warn!("Using the dummy signer; issued invoices will not be trusted");
            Ok(Arc::new(DummySigner))
        }
        SignerKind::Rsa => {
            let pem = config.signing_key.as_ref().ok_or_else(|| {
                FiscalError::SigningFailure("No RSA signing key configured".to_string())
            })?;
            let keys = StaticKeyStore::from_pkcs8_pem(&config.key_id, pem.expose_secret())?;
            tracing::info!(key_id = %config.key_id, "Using the RSA SHA-256 signer");
            Ok(Arc::new(RsaSigner::new(Arc::new(keys))))
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route(
            "/api/invoices",
            post(invoices::issue_invoice).get(invoices::list_invoices),
        )
        .route("/api/invoices/:invoice_id", get(invoices::get_invoice))
        .route("/api/invoices/:invoice_id/qr", get(invoices::get_invoice_qr))
        .route(
            "/api/invoices/:invoice_id/status",
            post(invoices::advance_status),
        )
        .route(
            "/api/sales/:sale_id/invoice",
            get(invoices::get_invoice_by_sale),
        )
        .route(
            "/api/invoice-numbers/:invoice_number",
            get(invoices::get_invoice_by_number),
        )
        .route(
            "/api/verify/:invoice_number",
            get(verification::verify_invoice),
        )
        .route(
            "/api/verify/:invoice_number/integrity",
            get(verification::inspect_invoice),
        )
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build against PostgreSQL, running migrations first.
    pub async fn build(config: FiscalConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        Self::build_with_backend(config, Backend::postgres(Arc::new(db))).await
    }

    pub async fn build_with_backend(
        config: FiscalConfig,
        backend: Backend,
    ) -> Result<Self, AppError> {
        init_metrics();

        let rates = TaxRates::new(config.tax.vat_rate, config.tax.surtax_rate)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e.to_string())))?;
        let qr = QrPayloadBuilder::new(&config.verification.base_url)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e.to_string())))?;
        let signer = build_signer(&config.signer)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e.to_string())))?;

        let state = AppState {
            service_name: config.service_name.clone(),
            issuance: Arc::new(IssuancePipeline::new(
                &backend,
                TaxCalculator::new(rates),
                signer.clone(),
                qr,
            )),
            registry: Arc::new(InvoiceRegistry::new(&backend)),
            verification: Arc::new(VerificationService::new(
                backend.invoices.clone(),
                signer,
            )),
            invoices: backend.invoices.clone(),
        };

        let addr = config.common.bind_address();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port = port,
            vat_rate = %rates.vat_rate(),
            surtax_rate = %rates.surtax_rate(),
            "Fiscal service listener bound"
        );

        Ok(Self {
            port,
            listener,
            router: router(state),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!(
            service = "fiscal-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, self.router).await
    }
}
