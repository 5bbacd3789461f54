// src/models/service_call.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, permissions::FieldPermissions},
    db::Document,
    models::{agent::AgentSummary, customer::CustomerSummary, equipment::EquipmentSummary},
};

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceCallStatus {
    // "pending" was used by older clients for calls nobody has picked up yet
    #[serde(alias = "pending")]
    Open,
    Assigned,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
    Invoiced,
}

impl ServiceCallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceCallStatus::Open => "open",
            ServiceCallStatus::Assigned => "assigned",
            ServiceCallStatus::InProgress => "in-progress",
            ServiceCallStatus::OnHold => "on-hold",
            ServiceCallStatus::Completed => "completed",
            ServiceCallStatus::Cancelled => "cancelled",
            ServiceCallStatus::Invoiced => "invoiced",
        }
    }

    /// Transitions a caller may request through an update.
    ///
    /// `invoiced` is entered by creating an invoice and left by deleting it.
    pub fn allowed_transitions(&self) -> &'static [ServiceCallStatus] {
        use ServiceCallStatus::*;
        match self {
            Open => &[Assigned, InProgress, OnHold, Cancelled],
            Assigned => &[Open, InProgress, OnHold, Cancelled],
            InProgress => &[Assigned, OnHold, Completed, Cancelled],
            OnHold => &[Assigned, InProgress, Cancelled],
            Completed | Cancelled | Invoiced => &[],
        }
    }

    pub fn can_transition_to(&self, next: ServiceCallStatus) -> bool {
        *self == next || self.allowed_transitions().contains(&next)
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            ServiceCallStatus::Completed | ServiceCallStatus::Cancelled | ServiceCallStatus::Invoiced
        )
    }

    pub fn accepts_rating(&self) -> bool {
        matches!(self, ServiceCallStatus::Completed | ServiceCallStatus::Invoiced)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PhotoKind {
    Before,
    After,
}

// --- Sub-structures ---

/// On-site specifics for the technician.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    #[schema(example = "Cold room not holding temperature")]
    pub reported_problem: Option<String>,
    pub access_notes: Option<String>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[schema(example = "2.5")]
    pub estimated_hours: Option<Decimal>,
    pub work_performed: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartUsed {
    #[schema(example = "Thermostat")]
    pub name: String,
    pub part_number: Option<String>,
    #[schema(example = "1")]
    pub quantity: Decimal,
    #[schema(example = "450.00")]
    pub unit_price: Decimal,
    #[serde(default)]
    pub total: Decimal,
}

// --- Entity ---

/// A work order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCall {
    pub id: Uuid,
    #[schema(example = "SC-000001")]
    pub call_number: String,
    pub customer: Uuid,
    pub site: Option<Uuid>,
    pub assigned_agent: Option<Uuid>,
    pub equipment: Option<Uuid>,
    pub quotation: Option<Uuid>,

    #[schema(example = "Cold room service")]
    pub title: String,
    pub description: Option<String>,
    pub service_type: Option<String>,
    pub status: ServiceCallStatus,
    pub priority: Priority,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub job_details: Option<JobDetails>,

    #[serde(default)]
    pub parts_used: Vec<PartUsed>,
    #[serde(default)]
    pub parts_cost: Decimal,
    pub labor_hours: Option<Decimal>,

    #[serde(default)]
    pub before_photos: Vec<String>,
    #[serde(default)]
    pub after_photos: Vec<String>,

    pub completed_date: Option<DateTime<Utc>>,
    pub invoiced_date: Option<DateTime<Utc>>,

    pub rating: Option<u8>,
    pub customer_feedback: Option<String>,
    pub rated_date: Option<DateTime<Utc>>,

    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for ServiceCall {
    const COLLECTION: &'static str = "service_calls";
    const LABEL: &'static str = "Service call";
    const UNIQUE_KEYS: &'static [&'static str] = &["callNumber"];
    const PERMISSIONS: FieldPermissions = FieldPermissions {
        entity: "ServiceCall",
        immutable: &["callNumber"],
        editable: &[
            "title",
            "description",
            "status",
            "priority",
            "assignedAgent",
            "equipment",
            "site",
            "scheduledDate",
            "jobDetails",
            "partsUsed",
            "laborHours",
            "serviceType",
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

impl ServiceCall {
    /// Recomputes every part line and the parts cost.
    pub fn recalculate_parts(&mut self) -> Result<(), AppError> {
        let mut parts_cost = Decimal::ZERO;
        for (index, part) in self.parts_used.iter_mut().enumerate() {
            if part.quantity.is_sign_negative() || part.unit_price.is_sign_negative() {
                return Err(AppError::invalid(format!(
                    "partsUsed[{index}]: quantity and unitPrice must not be negative"
                )));
            }
            part.total = part.quantity * part.unit_price;
            parts_cost += part.total;
        }
        self.parts_cost = parts_cost;
        Ok(())
    }

    /// Moves to `next` through an update, enforcing the transition table.
    ///
    /// Returns true when this call reached `completed` for the first time.
    pub fn transition_to(&mut self, next: ServiceCallStatus, now: DateTime<Utc>) -> Result<bool, AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::conflict(format!(
                "Service call cannot move from '{}' to '{}'",
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        Ok(self.stamp_completion(now))
    }

    // completedDate is written once, the first time the call completes
    fn stamp_completion(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == ServiceCallStatus::Completed && self.completed_date.is_none() {
            self.completed_date = Some(now);
            return true;
        }
        false
    }

    pub fn rate(&mut self, rating: u8, feedback: Option<String>, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.status.accepts_rating() {
            return Err(AppError::conflict(format!(
                "Only completed or invoiced service calls can be rated (status is '{}')",
                self.status.as_str()
            )));
        }
        if self.rating.is_some() {
            return Err(AppError::conflict("This service call has already been rated"));
        }
        crate::models::agent::validate_rating(rating)?;

        self.rating = Some(rating);
        self.customer_feedback = feedback;
        self.rated_date = Some(now);
        Ok(())
    }

    pub fn mark_invoiced(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status != ServiceCallStatus::Completed {
            return Err(AppError::conflict(format!(
                "Only completed service calls can be invoiced (status is '{}')",
                self.status.as_str()
            )));
        }
        self.status = ServiceCallStatus::Invoiced;
        self.invoiced_date = Some(now);
        Ok(())
    }

    /// Undoes `mark_invoiced` when the invoice goes away.
    pub fn revert_invoiced(&mut self) {
        if self.status == ServiceCallStatus::Invoiced {
            self.status = ServiceCallStatus::Completed;
        }
        self.invoiced_date = None;
    }

    pub fn add_photos(&mut self, kind: PhotoKind, urls: Vec<String>) {
        let target = match kind {
            PhotoKind::Before => &mut self.before_photos,
            PhotoKind::After => &mut self.after_photos,
        };
        target.extend(urls.into_iter().filter(|url| !url.trim().is_empty()));
    }
}

/// A service call with its references expanded.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCallDetail {
    #[serde(flatten)]
    pub call: ServiceCall,
    pub customer_details: Option<CustomerSummary>,
    pub agent_details: Option<AgentSummary>,
    pub equipment_details: Option<EquipmentSummary>,
}

// =============================================================================
//  Payloads
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceCallPayload {
    /// Generated (SC-NNNNNN) when omitted.
    pub call_number: Option<String>,
    pub customer: Uuid,
    pub site: Option<Uuid>,
    pub assigned_agent: Option<Uuid>,
    pub equipment: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters."))]
    pub title: String,
    pub description: Option<String>,
    pub service_type: Option<String>,
    pub priority: Option<Priority>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub job_details: Option<JobDetails>,
    #[serde(default)]
    pub parts_used: Vec<PartUsed>,
    pub labor_hours: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingPayload {
    #[schema(example = 5)]
    pub rating: u8,
    pub customer_feedback: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhotosPayload {
    pub kind: PhotoKind,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ServiceCallFilters {
    pub status: Option<ServiceCallStatus>,
    pub priority: Option<Priority>,
    pub customer: Option<Uuid>,
    pub assigned_agent: Option<Uuid>,
}
