// src/handlers/equipment.rs

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
        equipment::{CreateEquipmentPayload, Equipment, EquipmentFilters, WarrantyStatus},
        UpdatePayload,
    },
};

// GET /api/equipment
#[utoipa::path(
    get,
    path = "/api/equipment",
    tag = "Equipment",
    params(EquipmentFilters),
    responses(
        (status = 200, description = "Equipment owned by the caller", body = Vec<Equipment>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_equipment(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(filters): Query<EquipmentFilters>,
) -> Result<Json<Vec<Equipment>>, AppError> {
    let units = app_state.equipment_service.list(user.id(), filters).await?;
    Ok(Json(units))
}

// POST /api/equipment
#[utoipa::path(
    post,
    path = "/api/equipment",
    tag = "Equipment",
    request_body = CreateEquipmentPayload,
    responses(
        (status = 201, description = "Equipment registered", body = Equipment),
        (status = 400, description = "Invalid data or unknown customer site")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_equipment(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateEquipmentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let unit = app_state.equipment_service.create(user.id(), payload).await?;
    Ok((StatusCode::CREATED, Json(unit)))
}

// GET /api/equipment/{id}
#[utoipa::path(
    get,
    path = "/api/equipment/{id}",
    tag = "Equipment",
    params(("id" = Uuid, Path, description = "Equipment id")),
    responses(
        (status = 200, description = "Equipment", body = Equipment),
        (status = 404, description = "Equipment not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_equipment(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Equipment>, AppError> {
    Ok(Json(app_state.equipment_service.get(user.id(), id).await?))
}

// PUT /api/equipment/{id}
#[utoipa::path(
    put,
    path = "/api/equipment/{id}",
    tag = "Equipment",
    params(("id" = Uuid, Path, description = "Equipment id")),
    request_body = UpdatePayload,
    responses(
        (status = 200, description = "Equipment updated", body = Equipment),
        (status = 403, description = "Immutable fields in the patch"),
        (status = 404, description = "Equipment not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_equipment(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(UpdatePayload(patch)): Json<UpdatePayload>,
) -> Result<Json<Equipment>, AppError> {
    let unit = app_state.equipment_service.update(user.id(), id, &patch).await?;
    Ok(Json(unit))
}

// DELETE /api/equipment/{id}
#[utoipa::path(
    delete,
    path = "/api/equipment/{id}",
    tag = "Equipment",
    params(("id" = Uuid, Path, description = "Equipment id")),
    responses(
        (status = 204, description = "Equipment deleted"),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Equipment has service history")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_equipment(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.equipment_service.delete(user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/equipment/{id}/warranty
#[utoipa::path(
    get,
    path = "/api/equipment/{id}/warranty",
    tag = "Equipment",
    params(("id" = Uuid, Path, description = "Equipment id")),
    responses(
        (status = 200, description = "Warranty state as of today", body = WarrantyStatus),
        (status = 404, description = "Equipment not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn warranty_status(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<WarrantyStatus>, AppError> {
    let status = app_state.equipment_service.warranty_status(user.id(), id).await?;
    Ok(Json(status))
}
