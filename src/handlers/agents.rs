// src/handlers/agents.rs

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
        agent::{Agent, AgentFilters, AvailabilityPayload, CreateAgentPayload, LocationPayload},
        UpdatePayload,
    },
};

// GET /api/agents
#[utoipa::path(
    get,
    path = "/api/agents",
    tag = "Agents",
    params(AgentFilters),
    responses(
        (status = 200, description = "Agents owned by the caller", body = Vec<Agent>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_agents(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(filters): Query<AgentFilters>,
) -> Result<Json<Vec<Agent>>, AppError> {
    let agents = app_state.agent_service.list(user.id(), filters).await?;
    Ok(Json(agents))
}

// POST /api/agents
#[utoipa::path(
    post,
    path = "/api/agents",
    tag = "Agents",
    request_body = CreateAgentPayload,
    responses(
        (status = 201, description = "Agent created", body = Agent),
        (status = 400, description = "Invalid data"),
        (status = 409, description = "Employee id already in use")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_agent(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateAgentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let agent = app_state.agent_service.create(user.id(), payload).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

// GET /api/agents/{id}
#[utoipa::path(
    get,
    path = "/api/agents/{id}",
    tag = "Agents",
    params(("id" = Uuid, Path, description = "Agent id")),
    responses(
        (status = 200, description = "Agent", body = Agent),
        (status = 404, description = "Agent not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_agent(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Agent>, AppError> {
    Ok(Json(app_state.agent_service.get(user.id(), id).await?))
}

// PUT /api/agents/{id}
#[utoipa::path(
    put,
    path = "/api/agents/{id}",
    tag = "Agents",
    params(("id" = Uuid, Path, description = "Agent id")),
    request_body = UpdatePayload,
    responses(
        (status = 200, description = "Agent updated", body = Agent),
        (status = 403, description = "Immutable fields in the patch"),
        (status = 404, description = "Agent not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_agent(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(UpdatePayload(patch)): Json<UpdatePayload>,
) -> Result<Json<Agent>, AppError> {
    let agent = app_state.agent_service.update(user.id(), id, &patch).await?;
    Ok(Json(agent))
}

// DELETE /api/agents/{id}
#[utoipa::path(
    delete,
    path = "/api/agents/{id}",
    tag = "Agents",
    params(("id" = Uuid, Path, description = "Agent id")),
    responses(
        (status = 204, description = "Agent deleted"),
        (status = 404, description = "Agent not found"),
        (status = 409, description = "Agent still has open service calls")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_agent(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.agent_service.delete(user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// PUT /api/agents/{id}/availability
#[utoipa::path(
    put,
    path = "/api/agents/{id}/availability",
    tag = "Agents",
    params(("id" = Uuid, Path, description = "Agent id")),
    request_body = AvailabilityPayload,
    responses(
        (status = 200, description = "Availability updated", body = Agent),
        (status = 404, description = "Agent not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_availability(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AvailabilityPayload>,
) -> Result<Json<Agent>, AppError> {
    let agent = app_state
        .agent_service
        .update_availability(user.id(), id, payload.availability)
        .await?;
    Ok(Json(agent))
}

// PUT /api/agents/{id}/location
#[utoipa::path(
    put,
    path = "/api/agents/{id}/location",
    tag = "Agents",
    params(("id" = Uuid, Path, description = "Agent id")),
    request_body = LocationPayload,
    responses(
        (status = 200, description = "Location updated", body = Agent),
        (status = 400, description = "Coordinates out of range"),
        (status = 404, description = "Agent not found")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_location(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<LocationPayload>,
) -> Result<Json<Agent>, AppError> {
    let agent = app_state
        .agent_service
        .update_location(user.id(), id, payload.lat, payload.lng)
        .await?;
    Ok(Json(agent))
}
