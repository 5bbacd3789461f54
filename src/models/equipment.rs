// src/models/equipment.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{common::permissions::FieldPermissions, db::Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum EquipmentStatus {
    Operational,
    NeedsService,
    UnderRepair,
    OutOfOrder,
    Decommissioned,
}

/// An asset installed at a customer (or one of its sites).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    pub id: Uuid,
    #[schema(example = "EQ-000001")]
    pub equipment_id: String,
    pub customer: Uuid,
    pub site: Option<Uuid>,
    #[schema(example = "Walk-in freezer")]
    pub name: String,
    pub equipment_type: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    #[schema(value_type = Option<String>, format = Date, example = "2023-03-01")]
    pub installation_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date)]
    pub purchase_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date, example = "2026-03-01")]
    pub warranty_expiry: Option<NaiveDate>,
    pub status: EquipmentStatus,
    pub last_service_date: Option<DateTime<Utc>>,
    /// Service calls raised against this unit.
    #[serde(default)]
    pub service_history: Vec<Uuid>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Equipment {
    const COLLECTION: &'static str = "equipment";
    const LABEL: &'static str = "Equipment";
    const UNIQUE_KEYS: &'static [&'static str] = &["equipmentId"];
    const PERMISSIONS: FieldPermissions = FieldPermissions {
        entity: "Equipment",
        immutable: &["equipmentId"],
        editable: &[
            "name",
            "equipmentType",
            "manufacturer",
            "model",
            "serialNumber",
            "site",
            "installationDate",
            "purchaseDate",
            "warrantyExpiry",
            "status",
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

impl Equipment {
    pub fn link_service_call(&mut self, call_id: Uuid) {
        if !self.service_history.contains(&call_id) {
            self.service_history.push(call_id);
        }
    }

    pub fn unlink_service_call(&mut self, call_id: Uuid) {
        self.service_history.retain(|id| *id != call_id);
    }

    pub fn warranty_status(&self, today: NaiveDate) -> WarrantyStatus {
        let (state, days_remaining) = match self.warranty_expiry {
            None => (WarrantyState::Unknown, None),
            Some(expiry) => {
                let days = (expiry - today).num_days();
                if days >= 0 {
                    (WarrantyState::Active, Some(days))
                } else {
                    (WarrantyState::Expired, Some(0))
                }
            }
        };

        WarrantyStatus {
            equipment: self.id,
            equipment_id: self.equipment_id.clone(),
            warranty_expiry: self.warranty_expiry,
            state,
            days_remaining,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum WarrantyState {
    Active,
    Expired,
    Unknown,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WarrantyStatus {
    pub equipment: Uuid,
    pub equipment_id: String,
    #[schema(value_type = Option<String>, format = Date)]
    pub warranty_expiry: Option<NaiveDate>,
    pub state: WarrantyState,
    pub days_remaining: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentSummary {
    pub id: Uuid,
    pub equipment_id: String,
    pub name: String,
    pub serial_number: Option<String>,
    pub status: EquipmentStatus,
}

impl From<&Equipment> for EquipmentSummary {
    fn from(equipment: &Equipment) -> Self {
        Self {
            id: equipment.id,
            equipment_id: equipment.equipment_id.clone(),
            name: equipment.name.clone(),
            serial_number: equipment.serial_number.clone(),
            status: equipment.status,
        }
    }
}

// =============================================================================
//  Payloads
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEquipmentPayload {
    /// Generated (EQ-NNNNNN) when omitted.
    pub equipment_id: Option<String>,
    pub customer: Uuid,
    pub site: Option<Uuid>,
    #[validate(length(min = 1, message = "required"))]
    pub name: String,
    pub equipment_type: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    #[schema(value_type = Option<String>, format = Date)]
    pub installation_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date)]
    pub purchase_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date)]
    pub warranty_expiry: Option<NaiveDate>,
    pub status: Option<EquipmentStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EquipmentFilters {
    pub customer: Option<Uuid>,
    pub status: Option<EquipmentStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equipment(warranty_expiry: Option<NaiveDate>) -> Equipment {
        let now = Utc::now();
        Equipment {
            id: Uuid::new_v4(),
            equipment_id: "EQ-000001".into(),
            customer: Uuid::new_v4(),
            site: None,
            name: "Walk-in freezer".into(),
            equipment_type: None,
            manufacturer: None,
            model: None,
            serial_number: None,
            installation_date: None,
            purchase_date: None,
            warranty_expiry,
            status: EquipmentStatus::Operational,
            last_service_date: None,
            service_history: Vec::new(),
            notes: None,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn warranty_state_follows_expiry_date() {
        let today = date(2026, 1, 1);

        let active = equipment(Some(date(2026, 1, 31))).warranty_status(today);
        assert_eq!(active.state, WarrantyState::Active);
        assert_eq!(active.days_remaining, Some(30));

        let last_day = equipment(Some(today)).warranty_status(today);
        assert_eq!(last_day.state, WarrantyState::Active);
        assert_eq!(last_day.days_remaining, Some(0));

        let expired = equipment(Some(date(2025, 12, 1))).warranty_status(today);
        assert_eq!(expired.state, WarrantyState::Expired);

        let unknown = equipment(None).warranty_status(today);
        assert_eq!(unknown.state, WarrantyState::Unknown);
        assert_eq!(unknown.days_remaining, None);
    }

    #[test]
    fn service_history_links_are_unique() {
        let mut unit = equipment(None);
        let call = Uuid::new_v4();
        unit.link_service_call(call);
        unit.link_service_call(call);
        assert_eq!(unit.service_history, vec![call]);
        unit.unlink_service_call(call);
        assert!(unit.service_history.is_empty());
    }
}
