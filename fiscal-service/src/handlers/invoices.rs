//! Invoice issuance, lookup and lifecycle handlers.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::{
        AdvanceStatusRequest, InvoiceListResponse, InvoiceResponse, IssueInvoiceRequest,
        ListInvoicesQuery,
    },
    models::{ListInvoicesFilter, RequestContext},
    utils::render_qr_png,
    AppState,
};

/// Issue the fiscal invoice for a completed sale.
pub async fn issue_invoice(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<IssueInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    tracing::info!(
        sale_id = %payload.sale_id,
        shop_id = %payload.shop_id,
        "Issuing invoice"
    );

    let invoice = state
        .issuance
        .issue(&ctx, payload.sale_id, payload.shop_id)
        .await?;

    Ok((StatusCode::CREATED, Json(InvoiceResponse::from(&invoice))))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<InvoiceListResponse>, AppError> {
    let filter = ListInvoicesFilter::new(query.shop_id, query.page_size, query.page_token)?;
    let (invoices, next_page_token) = state.registry.list(&filter).await?;

    Ok(Json(InvoiceListResponse {
        invoices: invoices.iter().map(InvoiceResponse::from).collect(),
        next_page_token,
    }))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state.registry.get(invoice_id).await?;
    Ok(Json(InvoiceResponse::from(&invoice)))
}

pub async fn get_invoice_by_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state.registry.get_by_sale(sale_id).await?;
    Ok(Json(InvoiceResponse::from(&invoice)))
}

pub async fn get_invoice_by_number(
    State(state): State<AppState>,
    Path(invoice_number): Path<String>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state.registry.get_by_number(&invoice_number).await?;
    Ok(Json(InvoiceResponse::from(&invoice)))
}

/// The stored QR payload rendered as a PNG image.
pub async fn get_invoice_qr(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state.registry.get(invoice_id).await?;
    let payload = invoice.qr_payload().ok_or_else(|| {
        AppError::NotFound(anyhow::anyhow!(
            "Invoice {} has no QR payload",
            invoice.invoice_number()
        ))
    })?;

    let png = render_qr_png(payload)?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

pub async fn advance_status(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<AdvanceStatusRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    tracing::info!(
        invoice_id = %invoice_id,
        status = %payload.status,
        "Advancing invoice status"
    );

    let invoice = state
        .registry
        .advance_status(&ctx, invoice_id, payload.status)
        .await?;

    Ok(Json(InvoiceResponse::from(&invoice)))
}
