// src/models/agent.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, permissions::FieldPermissions},
    db::Document,
};

pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AgentStatus {
    Active,
    Inactive,
    OnLeave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    Available,
    Busy,
    OffDuty,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    #[schema(example = -33.9249)]
    pub lat: f64,
    #[schema(example = 18.4241)]
    pub lng: f64,
    pub updated_at: DateTime<Utc>,
}

/// A field technician.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: Uuid,
    #[schema(example = "EMP-000001")]
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub specializations: Vec<String>,
    pub status: AgentStatus,
    pub availability: Availability,
    pub location: Option<GeoLocation>,

    // Performance counters, only moved by service-call lifecycle events
    pub total_jobs_attended: u32,
    pub average_rating: f64,
    pub ratings_count: u32,

    pub hourly_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Agent {
    const COLLECTION: &'static str = "agents";
    const LABEL: &'static str = "Agent";
    const UNIQUE_KEYS: &'static [&'static str] = &["employeeId"];
    const PERMISSIONS: FieldPermissions = FieldPermissions {
        entity: "Agent",
        immutable: &["firstName", "lastName", "employeeId"],
        editable: &[
            "email",
            "phone",
            "skills",
            "specializations",
            "status",
            "availability",
            "hourlyRate",
            "notes",
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Uuid {
        self.created_by
    }
}

impl Agent {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Folds one rating into the running mean.
    pub fn record_rating(&mut self, rating: u8) -> Result<(), AppError> {
        validate_rating(rating)?;

        let count = f64::from(self.ratings_count);
        let average = (self.average_rating * count + f64::from(rating)) / (count + 1.0);

        self.average_rating = average.clamp(0.0, f64::from(MAX_RATING));
        self.ratings_count += 1;
        Ok(())
    }

    pub fn move_to(&mut self, lat: f64, lng: f64, now: DateTime<Utc>) -> Result<(), AppError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::invalid("lat must be between -90 and 90"));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::invalid("lng must be between -180 and 180"));
        }
        self.location = Some(GeoLocation {
            lat,
            lng,
            updated_at: now,
        });
        Ok(())
    }
}

pub fn validate_rating(rating: u8) -> Result<(), AppError> {
    if rating == 0 || rating > MAX_RATING {
        return Err(AppError::invalid(format!(
            "rating must be between 1 and {MAX_RATING}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub id: Uuid,
    pub employee_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub availability: Availability,
}

impl From<&Agent> for AgentSummary {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            employee_id: agent.employee_id.clone(),
            name: agent.full_name(),
            phone: agent.phone.clone(),
            availability: agent.availability,
        }
    }
}

// =============================================================================
//  Payloads
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentPayload {
    /// Generated (EMP-NNNNNN) when omitted.
    pub employee_id: Option<String>,
    #[validate(length(min = 1, message = "required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "required"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email address."))]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub specializations: Vec<String>,
    pub status: Option<AgentStatus>,
    pub availability: Option<Availability>,
    pub hourly_rate: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AvailabilityPayload {
    pub availability: Availability,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LocationPayload {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AgentFilters {
    pub status: Option<AgentStatus>,
    pub availability: Option<Availability>,
    /// Matches agents listing this skill.
    pub skill: Option<String>,
}
