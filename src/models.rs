pub mod agent;
pub mod auth;
pub mod customer;
pub mod equipment;
pub mod invoice;
pub mod quotation;
pub mod service_call;

use serde::Deserialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Raw JSON object sent to an update endpoint. Checked against the entity's field permissions.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct UpdatePayload(pub Map<String, Value>);
