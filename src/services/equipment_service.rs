// src/services/equipment_service.rs

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        identifiers::{supplied, EQUIPMENT_PREFIX},
        permissions::apply_patch,
    },
    db::{DocumentStore, Filter, Repository},
    models::{
        customer::Customer,
        equipment::{
            CreateEquipmentPayload, Equipment, EquipmentFilters, EquipmentStatus, WarrantyStatus,
        },
    },
    services::today,
};

#[derive(Clone)]
pub struct EquipmentService {
    equipment: Repository<Equipment>,
    customers: Repository<Customer>,
}

impl EquipmentService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            equipment: Repository::new(store.clone()),
            customers: Repository::new(store),
        }
    }

    pub async fn list(&self, owner: Uuid, filters: EquipmentFilters) -> Result<Vec<Equipment>, AppError> {
        let filter = Filter::new()
            .eq_opt("customer", filters.customer)
            .eq_opt("status", filters.status);
        self.equipment.list(owner, &filter).await
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<Equipment, AppError> {
        self.equipment.get(owner, id).await
    }

    pub async fn create(&self, owner: Uuid, payload: CreateEquipmentPayload) -> Result<Equipment, AppError> {
        let customer = self.customers.get(owner, payload.customer).await?;
        ensure_site(&customer, payload.site)?;

        let equipment_id = match supplied(payload.equipment_id.as_deref()) {
            Some(id) => id,
            None => self.equipment.next_identifier(EQUIPMENT_PREFIX).await?,
        };

        let now = Utc::now();
        let equipment = Equipment {
            id: Uuid::new_v4(),
            equipment_id,
            customer: customer.id,
            site: payload.site,
            name: payload.name,
            equipment_type: payload.equipment_type,
            manufacturer: payload.manufacturer,
            model: payload.model,
            serial_number: payload.serial_number,
            installation_date: payload.installation_date,
            purchase_date: payload.purchase_date,
            warranty_expiry: payload.warranty_expiry,
            status: payload.status.unwrap_or(EquipmentStatus::Operational),
            last_service_date: None,
            service_history: Vec::new(),
            notes: payload.notes,
            created_by: owner,
            created_at: now,
            updated_at: now,
        };

        self.equipment.insert(&equipment).await?;
        tracing::info!("⚙️ Equipment {} registered for customer {}", equipment.equipment_id, customer.customer_id);
        Ok(equipment)
    }

    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &Map<String, Value>,
    ) -> Result<Equipment, AppError> {
        let current = self.equipment.get(owner, id).await?;
        let mut equipment = apply_patch(&current, patch)?;

        if equipment.site != current.site {
            let customer = self.customers.get(owner, equipment.customer).await?;
            ensure_site(&customer, equipment.site)?;
        }
        equipment.updated_at = Utc::now();

        self.equipment.save(&equipment).await?;
        tracing::info!("Equipment {} updated", equipment.equipment_id);
        Ok(equipment)
    }

    /// Equipment with service history is kept for the record.
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), AppError> {
        let equipment = self.equipment.get(owner, id).await?;
        if !equipment.service_history.is_empty() {
            tracing::warn!("Refused to delete equipment {}: has service history", equipment.equipment_id);
            return Err(AppError::conflict(format!(
                "Equipment has {} service call(s) in its history",
                equipment.service_history.len()
            )));
        }

        self.equipment.delete(&equipment).await?;
        tracing::info!("🗑️ Equipment {} deleted", equipment.equipment_id);
        Ok(())
    }

    pub async fn warranty_status(&self, owner: Uuid, id: Uuid) -> Result<WarrantyStatus, AppError> {
        let equipment = self.equipment.get(owner, id).await?;
        Ok(equipment.warranty_status(today()))
    }
}

/// A site reference must point at one of the customer's own sites.
pub(crate) fn ensure_site(customer: &Customer, site: Option<Uuid>) -> Result<(), AppError> {
    match site {
        Some(site_id) if !customer.has_site(site_id) => Err(AppError::invalid(format!(
            "Site {site_id} does not belong to customer {}",
            customer.customer_id
        ))),
        _ => Ok(()),
    }
}
