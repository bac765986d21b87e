//! Public verification endpoints, reached from the QR code.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{VerifyQuery, VerifyResponse},
    services::IntegrityReport,
    AppState,
};

pub async fn verify_invoice(
    State(state): State<AppState>,
    Path(invoice_number): Path<String>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<VerifyResponse>, AppError> {
    let valid = state
        .verification
        .verify(&invoice_number, &query.hash)
        .await?;
    Ok(Json(VerifyResponse { valid }))
}

pub async fn inspect_invoice(
    State(state): State<AppState>,
    Path(invoice_number): Path<String>,
) -> Result<Json<IntegrityReport>, AppError> {
    let report = state.verification.inspect(&invoice_number).await?;
    Ok(Json(report))
}
