// src/handlers/invoices.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        invoice::{CreateInvoicePayload, Invoice, InvoiceFilters, PaymentPayload},
        UpdatePayload,
    },
};

// GET /api/invoices
#[utoipa::path(
    get,
    path = "/api/invoices",
    tag = "Invoices",
    params(InvoiceFilters),
    responses(
        (status = 200, description = "Invoices owned by the caller", body = Vec<Invoice>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_invoices(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(filters): Query<InvoiceFilters>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let invoices = app_state.invoice_service.list(user.id(), filters).await?;
    Ok(Json(invoices))
}

// POST /api/invoices
#[utoipa::path(
    post,
    path = "/api/invoices",
    tag = "Invoices",
    request_body = CreateInvoicePayload,
    responses(
        (status = 201, description = "Invoice issued; the service call becomes invoiced", body = Invoice),
        (status = 400, description = "Invalid data or nothing to bill"),
        (status = 409, description = "Call not completed, or already invoiced (existing invoice in the body)")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_invoice(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateInvoicePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let invoice = app_state.invoice_service.create(user.id(), payload).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

// GET /api/invoices/{id}
#[utoipa::path(
    get,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice with current payment status", body = Invoice),
        (status = 404, description = "Invoice not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_invoice(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(app_state.invoice_service.get(user.id(), id).await?))
}

// PUT /api/invoices/{id}
#[utoipa::path(
    put,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    request_body = UpdatePayload,
    responses(
        (status = 200, description = "Invoice updated", body = Invoice),
        (status = 403, description = "Immutable fields in the patch"),
        (status = 409, description = "Invoice is paid or total would drop below payments")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_invoice(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(UpdatePayload(patch)): Json<UpdatePayload>,
) -> Result<Json<Invoice>, AppError> {
    let invoice = app_state.invoice_service.update(user.id(), id, &patch).await?;
    Ok(Json(invoice))
}

// DELETE /api/invoices/{id}
#[utoipa::path(
    delete,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 204, description = "Invoice deleted; the service call returns to completed"),
        (status = 404, description = "Invoice not found"),
        (status = 409, description = "Invoice has payments")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_invoice(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.invoice_service.delete(user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/invoices/{id}/payments
#[utoipa::path(
    post,
    path = "/api/invoices/{id}/payments",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    request_body = PaymentPayload,
    responses(
        (status = 200, description = "Payment recorded", body = Invoice),
        (status = 400, description = "Amount is not positive or exceeds the balance"),
        (status = 409, description = "Invoice already paid")
    ),
    security(("api_jwt" = []))
)]
pub async fn record_payment(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentPayload>,
) -> Result<Json<Invoice>, AppError> {
    let invoice = app_state
        .invoice_service
        .record_payment(user.id(), id, payload)
        .await?;
    Ok(Json(invoice))
}
