// src/handlers/service_calls.rs

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
        service_call::{
            CreateServiceCallPayload, PhotosPayload, RatingPayload, ServiceCall,
            ServiceCallDetail, ServiceCallFilters,
        },
        UpdatePayload,
    },
};

// GET /api/service-calls
#[utoipa::path(
    get,
    path = "/api/service-calls",
    tag = "Service Calls",
    params(ServiceCallFilters),
    responses(
        (status = 200, description = "Service calls owned by the caller", body = Vec<ServiceCall>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_service_calls(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(filters): Query<ServiceCallFilters>,
) -> Result<Json<Vec<ServiceCall>>, AppError> {
    let calls = app_state.service_call_service.list(user.id(), filters).await?;
    Ok(Json(calls))
}

// POST /api/service-calls
#[utoipa::path(
    post,
    path = "/api/service-calls",
    tag = "Service Calls",
    request_body = CreateServiceCallPayload,
    responses(
        (status = 201, description = "Service call opened", body = ServiceCall),
        (status = 400, description = "Invalid data"),
        (status = 404, description = "Customer, agent or equipment not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_service_call(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateServiceCallPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let call = app_state.service_call_service.create(user.id(), payload).await?;
    Ok((StatusCode::CREATED, Json(call)))
}

// GET /api/service-calls/{id}
#[utoipa::path(
    get,
    path = "/api/service-calls/{id}",
    tag = "Service Calls",
    params(("id" = Uuid, Path, description = "Service call id")),
    responses(
        (status = 200, description = "Service call with customer, agent and equipment summaries", body = ServiceCallDetail),
        (status = 404, description = "Service call not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_service_call(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceCallDetail>, AppError> {
    Ok(Json(app_state.service_call_service.get(user.id(), id).await?))
}

// PUT /api/service-calls/{id}
#[utoipa::path(
    put,
    path = "/api/service-calls/{id}",
    tag = "Service Calls",
    params(("id" = Uuid, Path, description = "Service call id")),
    request_body = UpdatePayload,
    responses(
        (status = 200, description = "Service call updated", body = ServiceCall),
        (status = 403, description = "Immutable fields in the patch"),
        (status = 404, description = "Service call not found"),
        (status = 409, description = "Status transition not allowed")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_service_call(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(UpdatePayload(patch)): Json<UpdatePayload>,
) -> Result<Json<ServiceCall>, AppError> {
    let call = app_state
        .service_call_service
        .update(user.id(), id, &patch)
        .await?;
    Ok(Json(call))
}

// DELETE /api/service-calls/{id}
#[utoipa::path(
    delete,
    path = "/api/service-calls/{id}",
    tag = "Service Calls",
    params(("id" = Uuid, Path, description = "Service call id")),
    responses(
        (status = 204, description = "Service call deleted"),
        (status = 404, description = "Service call not found"),
        (status = 409, description = "Service call is invoiced")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_service_call(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.service_call_service.delete(user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/service-calls/{id}/rating
#[utoipa::path(
    post,
    path = "/api/service-calls/{id}/rating",
    tag = "Service Calls",
    params(("id" = Uuid, Path, description = "Service call id")),
    request_body = RatingPayload,
    responses(
        (status = 200, description = "Rating stored", body = ServiceCall),
        (status = 400, description = "Rating outside 1..=5"),
        (status = 409, description = "Call not finished or already rated")
    ),
    security(("api_jwt" = []))
)]
pub async fn submit_rating(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RatingPayload>,
) -> Result<Json<ServiceCall>, AppError> {
    let call = app_state
        .service_call_service
        .submit_rating(user.id(), id, payload)
        .await?;
    Ok(Json(call))
}

// POST /api/service-calls/{id}/photos
#[utoipa::path(
    post,
    path = "/api/service-calls/{id}/photos",
    tag = "Service Calls",
    params(("id" = Uuid, Path, description = "Service call id")),
    request_body = PhotosPayload,
    responses(
        (status = 200, description = "Photos attached", body = ServiceCall),
        (status = 400, description = "No photo URLs"),
        (status = 404, description = "Service call not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn add_photos(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PhotosPayload>,
) -> Result<Json<ServiceCall>, AppError> {
    let call = app_state
        .service_call_service
        .add_photos(user.id(), id, payload)
        .await?;
    Ok(Json(call))
}
