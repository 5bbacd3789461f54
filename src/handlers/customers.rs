// src/handlers/customers.rs

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
        customer::{CreateCustomerPayload, Customer, CustomerFilters, Site, SitePayload},
        UpdatePayload,
    },
};

// =============================================================================
//  CUSTOMERS
// =============================================================================

// GET /api/customers
#[utoipa::path(
    get,
    path = "/api/customers",
    tag = "Customers",
    params(CustomerFilters),
    responses(
        (status = 200, description = "Customers owned by the caller", body = Vec<Customer>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_customers(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(filters): Query<CustomerFilters>,
) -> Result<Json<Vec<Customer>>, AppError> {
    let customers = app_state.customer_service.list(user.id(), filters).await?;
    Ok(Json(customers))
}

// POST /api/customers
#[utoipa::path(
    post,
    path = "/api/customers",
    tag = "Customers",
    request_body = CreateCustomerPayload,
    responses(
        (status = 201, description = "Customer created", body = Customer),
        (status = 400, description = "Invalid data"),
        (status = 409, description = "Customer id already in use")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_customer(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateCustomerPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let customer = app_state.customer_service.create(user.id(), payload).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

// GET /api/customers/{id}
#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    tag = "Customers",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer", body = Customer),
        (status = 404, description = "Customer not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_customer(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    Ok(Json(app_state.customer_service.get(user.id(), id).await?))
}

// PUT /api/customers/{id}
#[utoipa::path(
    put,
    path = "/api/customers/{id}",
    tag = "Customers",
    params(("id" = Uuid, Path, description = "Customer id")),
    request_body = UpdatePayload,
    responses(
        (status = 200, description = "Customer updated", body = Customer),
        (status = 403, description = "Immutable fields in the patch"),
        (status = 404, description = "Customer not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_customer(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(UpdatePayload(patch)): Json<UpdatePayload>,
) -> Result<Json<Customer>, AppError> {
    let customer = app_state.customer_service.update(user.id(), id, &patch).await?;
    Ok(Json(customer))
}

// DELETE /api/customers/{id}
#[utoipa::path(
    delete,
    path = "/api/customers/{id}",
    tag = "Customers",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 404, description = "Customer not found"),
        (status = 409, description = "Customer is still referenced")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_customer(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.customer_service.delete(user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  SITES
// =============================================================================

// POST /api/customers/{id}/sites
#[utoipa::path(
    post,
    path = "/api/customers/{id}/sites",
    tag = "Customers",
    params(("id" = Uuid, Path, description = "Customer id")),
    request_body = SitePayload,
    responses(
        (status = 201, description = "Site added", body = Site),
        (status = 404, description = "Customer not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn add_site(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SitePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let site = app_state.customer_service.add_site(user.id(), id, payload).await?;
    Ok((StatusCode::CREATED, Json(site)))
}

// PUT /api/customers/{id}/sites/{site_id}
#[utoipa::path(
    put,
    path = "/api/customers/{id}/sites/{site_id}",
    tag = "Customers",
    params(
        ("id" = Uuid, Path, description = "Customer id"),
        ("site_id" = Uuid, Path, description = "Site id")
    ),
    request_body = SitePayload,
    responses(
        (status = 200, description = "Site updated", body = Site),
        (status = 404, description = "Customer or site not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_site(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, site_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SitePayload>,
) -> Result<Json<Site>, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let site = app_state
        .customer_service
        .update_site(user.id(), id, site_id, payload)
        .await?;
    Ok(Json(site))
}

// DELETE /api/customers/{id}/sites/{site_id}
#[utoipa::path(
    delete,
    path = "/api/customers/{id}/sites/{site_id}",
    tag = "Customers",
    params(
        ("id" = Uuid, Path, description = "Customer id"),
        ("site_id" = Uuid, Path, description = "Site id")
    ),
    responses(
        (status = 200, description = "Site removed", body = Customer),
        (status = 404, description = "Customer or site not found"),
        (status = 409, description = "A business customer keeps at least one site")
    ),
    security(("api_jwt" = []))
)]
pub async fn remove_site(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, site_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Customer>, AppError> {
    let customer = app_state
        .customer_service
        .remove_site(user.id(), id, site_id)
        .await?;
    Ok(Json(customer))
}
