// src/handlers/quotations.rs

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
        quotation::{CreateQuotationPayload, Quotation, QuotationFilters, QuotationStatusPayload},
        UpdatePayload,
    },
    services::quotation_service::Conversion,
};

// GET /api/quotations
#[utoipa::path(
    get,
    path = "/api/quotations",
    tag = "Quotations",
    params(QuotationFilters),
    responses(
        (status = 200, description = "Quotations owned by the caller; lapsed ones come back expired", body = Vec<Quotation>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_quotations(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(filters): Query<QuotationFilters>,
) -> Result<Json<Vec<Quotation>>, AppError> {
    let quotations = app_state.quotation_service.list(user.id(), filters).await?;
    Ok(Json(quotations))
}

// POST /api/quotations
#[utoipa::path(
    post,
    path = "/api/quotations",
    tag = "Quotations",
    request_body = CreateQuotationPayload,
    responses(
        (status = 201, description = "Draft quotation created", body = Quotation),
        (status = 400, description = "Invalid data")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_quotation(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateQuotationPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let quotation = app_state.quotation_service.create(user.id(), payload).await?;
    Ok((StatusCode::CREATED, Json(quotation)))
}

// GET /api/quotations/{id}
#[utoipa::path(
    get,
    path = "/api/quotations/{id}",
    tag = "Quotations",
    params(("id" = Uuid, Path, description = "Quotation id")),
    responses(
        (status = 200, description = "Quotation", body = Quotation),
        (status = 404, description = "Quotation not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_quotation(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Quotation>, AppError> {
    Ok(Json(app_state.quotation_service.get(user.id(), id).await?))
}

// PUT /api/quotations/{id}
#[utoipa::path(
    put,
    path = "/api/quotations/{id}",
    tag = "Quotations",
    params(("id" = Uuid, Path, description = "Quotation id")),
    request_body = UpdatePayload,
    responses(
        (status = 200, description = "Quotation updated and repriced", body = Quotation),
        (status = 403, description = "Immutable fields in the patch"),
        (status = 409, description = "Pricing is locked in the current status")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_quotation(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(UpdatePayload(patch)): Json<UpdatePayload>,
) -> Result<Json<Quotation>, AppError> {
    let quotation = app_state.quotation_service.update(user.id(), id, &patch).await?;
    Ok(Json(quotation))
}

// DELETE /api/quotations/{id}
#[utoipa::path(
    delete,
    path = "/api/quotations/{id}",
    tag = "Quotations",
    params(("id" = Uuid, Path, description = "Quotation id")),
    responses(
        (status = 204, description = "Quotation deleted"),
        (status = 404, description = "Quotation not found"),
        (status = 409, description = "Quotation was converted")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_quotation(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.quotation_service.delete(user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// PUT /api/quotations/{id}/status
#[utoipa::path(
    put,
    path = "/api/quotations/{id}/status",
    tag = "Quotations",
    params(("id" = Uuid, Path, description = "Quotation id")),
    request_body = QuotationStatusPayload,
    responses(
        (status = 200, description = "Status changed", body = Quotation),
        (status = 400, description = "Status cannot be set directly"),
        (status = 409, description = "Quotation was converted")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_quotation_status(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<QuotationStatusPayload>,
) -> Result<Json<Quotation>, AppError> {
    let quotation = app_state
        .quotation_service
        .update_status(user.id(), id, payload)
        .await?;
    Ok(Json(quotation))
}

// POST /api/quotations/{id}/convert
#[utoipa::path(
    post,
    path = "/api/quotations/{id}/convert",
    tag = "Quotations",
    params(("id" = Uuid, Path, description = "Quotation id")),
    responses(
        (status = 201, description = "Service call created from the quotation", body = Conversion),
        (status = 409, description = "Quotation is not approved")
    ),
    security(("api_jwt" = []))
)]
pub async fn convert_quotation(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let conversion = app_state.quotation_service.convert(user.id(), id).await?;
    Ok((StatusCode::CREATED, Json(conversion)))
}
