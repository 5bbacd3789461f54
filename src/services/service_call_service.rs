// src/services/service_call_service.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        identifiers::{supplied, SERVICE_CALL_PREFIX},
        permissions::apply_patch,
    },
    db::{store::Write, DocumentStore, Filter, Repository},
    models::{
        agent::{Agent, AgentSummary},
        customer::{Customer, CustomerSummary},
        equipment::{Equipment, EquipmentSummary},
        service_call::{
            CreateServiceCallPayload, PhotosPayload, Priority, RatingPayload, ServiceCall,
            ServiceCallDetail, ServiceCallFilters, ServiceCallStatus,
        },
    },
    services::equipment_service::ensure_site,
};

#[derive(Clone)]
pub struct ServiceCallService {
    calls: Repository<ServiceCall>,
    customers: Repository<Customer>,
    agents: Repository<Agent>,
    equipment: Repository<Equipment>,
}

impl ServiceCallService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            calls: Repository::new(store.clone()),
            customers: Repository::new(store.clone()),
            agents: Repository::new(store.clone()),
            equipment: Repository::new(store),
        }
    }

    pub async fn list(&self, owner: Uuid, filters: ServiceCallFilters) -> Result<Vec<ServiceCall>, AppError> {
        let filter = Filter::new()
            .eq_opt("status", filters.status)
            .eq_opt("priority", filters.priority)
            .eq_opt("customer", filters.customer)
            .eq_opt("assignedAgent", filters.assigned_agent);
        self.calls.list(owner, &filter).await
    }

    /// The call with its customer, agent and equipment expanded.
    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<ServiceCallDetail, AppError> {
        let call = self.calls.get(owner, id).await?;

        let customer_details = self
            .customers
            .find(owner, call.customer)
            .await?
            .map(|customer| CustomerSummary::from(&customer));
        let agent_details = match call.assigned_agent {
            Some(agent_id) => self.agents.find(owner, agent_id).await?.map(|agent| AgentSummary::from(&agent)),
            None => None,
        };
        let equipment_details = match call.equipment {
            Some(equipment_id) => self
                .equipment
                .find(owner, equipment_id)
                .await?
                .map(|equipment| EquipmentSummary::from(&equipment)),
            None => None,
        };

        Ok(ServiceCallDetail {
            call,
            customer_details,
            agent_details,
            equipment_details,
        })
    }

    pub async fn create(&self, owner: Uuid, payload: CreateServiceCallPayload) -> Result<ServiceCall, AppError> {
        let customer = self.customers.get(owner, payload.customer).await?;
        ensure_site(&customer, payload.site)?;
        if let Some(agent_id) = payload.assigned_agent {
            self.agents.get(owner, agent_id).await?;
        }
        let mut equipment = match payload.equipment {
            Some(equipment_id) => Some(self.equipment_for(owner, equipment_id, customer.id).await?),
            None => None,
        };

        let now = Utc::now();
        let status = if payload.assigned_agent.is_some() {
            ServiceCallStatus::Assigned
        } else {
            ServiceCallStatus::Open
        };

        let mut call = ServiceCall {
            id: Uuid::new_v4(),
            call_number: String::new(),
            customer: customer.id,
            site: payload.site,
            assigned_agent: payload.assigned_agent,
            equipment: payload.equipment,
            quotation: None,
            title: payload.title,
            description: payload.description,
            service_type: payload.service_type,
            status,
            priority: payload.priority.unwrap_or(Priority::Medium),
            scheduled_date: payload.scheduled_date,
            job_details: payload.job_details,
            parts_used: payload.parts_used,
            parts_cost: Decimal::ZERO,
            labor_hours: payload.labor_hours,
            before_photos: Vec::new(),
            after_photos: Vec::new(),
            completed_date: None,
            invoiced_date: None,
            rating: None,
            customer_feedback: None,
            rated_date: None,
            notes: payload.notes,
            created_by: owner,
            created_at: now,
            updated_at: now,
        };
        call.recalculate_parts()?;

        // Allocated after validation
        call.call_number = match supplied(payload.call_number.as_deref()) {
            Some(number) => number,
            None => self.calls.next_identifier(SERVICE_CALL_PREFIX).await?,
        };

        let mut writes = vec![Repository::insert_write(&call)?];
        if let Some(unit) = equipment.as_mut() {
            unit.link_service_call(call.id);
            unit.updated_at = now;
            writes.push(Repository::update_write(&*unit)?);
        }
        self.calls.commit(writes).await?;

        tracing::info!("📋 Service call {} opened for customer {}", call.call_number, customer.customer_id);
        Ok(call)
    }

    /// Permission-gated update. Status changes go through the transition table and
    /// a first completion updates the agent and equipment in the same batch.
    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &Map<String, Value>,
    ) -> Result<ServiceCall, AppError> {
        let current = self.calls.get(owner, id).await?;
        let mut call = apply_patch(&current, patch)?;
        let now = Utc::now();

        if call.site != current.site {
            let customer = self.customers.get(owner, call.customer).await?;
            ensure_site(&customer, call.site)?;
        }

        let newly_assigned = call.assigned_agent.is_some() && call.assigned_agent != current.assigned_agent;
        if newly_assigned {
            if let Some(agent_id) = call.assigned_agent {
                self.agents.get(owner, agent_id).await?;
            }
        }

        let mut requested = call.status;
        if requested == current.status && requested == ServiceCallStatus::Open && newly_assigned {
            requested = ServiceCallStatus::Assigned;
        }
        call.status = current.status;
        let first_completion = call.transition_to(requested, now).inspect_err(|e| {
            tracing::warn!("Service call {}: {}", current.call_number, e);
        })?;

        call.recalculate_parts()?;
        call.updated_at = now;

        let mut equipment_writes: Vec<Equipment> = Vec::new();
        if call.equipment != current.equipment {
            if let Some(old_id) = current.equipment {
                if let Some(mut old) = self.equipment.find(owner, old_id).await? {
                    old.unlink_service_call(call.id);
                    old.updated_at = now;
                    equipment_writes.push(old);
                }
            }
            if let Some(new_id) = call.equipment {
                let mut unit = self.equipment_for(owner, new_id, call.customer).await?;
                unit.link_service_call(call.id);
                unit.updated_at = now;
                equipment_writes.push(unit);
            }
        }

        let mut writes = vec![Repository::update_write(&call)?];

        if first_completion {
            if let Some(agent_id) = call.assigned_agent {
                if let Some(mut agent) = self.agents.find(owner, agent_id).await? {
                    agent.total_jobs_attended += 1;
                    agent.updated_at = now;
                    writes.push(Repository::update_write(&agent)?);
                }
            }
            if let Some(equipment_id) = call.equipment {
                self.stamp_service_date(owner, equipment_id, now, &mut equipment_writes)
                    .await?;
            }
        }

        for unit in &equipment_writes {
            writes.push(Repository::update_write(unit)?);
        }
        self.calls.commit(writes).await?;

        if current.status != call.status {
            tracing::info!(
                "Service call {} moved {} -> {}",
                call.call_number,
                current.status.as_str(),
                call.status.as_str()
            );
        } else {
            tracing::info!("Service call {} updated", call.call_number);
        }
        Ok(call)
    }

    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), AppError> {
        let call = self.calls.get(owner, id).await?;
        if call.status == ServiceCallStatus::Invoiced {
            tracing::warn!("Refused to delete invoiced service call {}", call.call_number);
            return Err(AppError::conflict(
                "An invoiced service call cannot be deleted; delete the invoice first",
            ));
        }
        if call.quotation.is_some() {
            tracing::warn!("Refused to delete service call {} created from a quotation", call.call_number);
            return Err(AppError::conflict(
                "This service call was created from a quotation and cannot be deleted",
            ));
        }

        let mut writes = vec![Repository::delete_write(&call)];
        if let Some(equipment_id) = call.equipment {
            if let Some(mut unit) = self.equipment.find(owner, equipment_id).await? {
                unit.unlink_service_call(call.id);
                unit.updated_at = Utc::now();
                writes.push(Repository::update_write(&unit)?);
            }
        }
        self.calls.commit(writes).await?;

        tracing::info!("🗑️ Service call {} deleted", call.call_number);
        Ok(())
    }

    /// Rates a finished call once and folds the rating into the agent's average.
    pub async fn submit_rating(
        &self,
        owner: Uuid,
        id: Uuid,
        payload: RatingPayload,
    ) -> Result<ServiceCall, AppError> {
        let mut call = self.calls.get(owner, id).await?;
        let now = Utc::now();

        call.rate(payload.rating, payload.customer_feedback, now)
            .inspect_err(|e| tracing::warn!("Rating refused for {}: {}", call.call_number, e))?;
        call.updated_at = now;

        let mut writes = vec![Repository::update_write(&call)?];
        if let Some(agent_id) = call.assigned_agent {
            if let Some(mut agent) = self.agents.find(owner, agent_id).await? {
                agent.record_rating(payload.rating)?;
                agent.updated_at = now;
                writes.push(Repository::update_write(&agent)?);
            }
        }
        self.calls.commit(writes).await?;

        tracing::info!("⭐ Service call {} rated {}/5", call.call_number, payload.rating);
        Ok(call)
    }

    pub async fn add_photos(
        &self,
        owner: Uuid,
        id: Uuid,
        payload: PhotosPayload,
    ) -> Result<ServiceCall, AppError> {
        if payload.urls.iter().all(|url| url.trim().is_empty()) {
            return Err(AppError::invalid("At least one photo URL is required"));
        }

        let mut call = self.calls.get(owner, id).await?;
        call.add_photos(payload.kind, payload.urls);
        call.updated_at = Utc::now();
        self.calls.save(&call).await?;
        Ok(call)
    }

    // Equipment referenced by a call must be owned and belong to the call's customer
    async fn equipment_for(&self, owner: Uuid, equipment_id: Uuid, customer: Uuid) -> Result<Equipment, AppError> {
        let unit = self.equipment.get(owner, equipment_id).await?;
        if unit.customer != customer {
            return Err(AppError::invalid(format!(
                "Equipment {} does not belong to this customer",
                unit.equipment_id
            )));
        }
        Ok(unit)
    }

    async fn stamp_service_date(
        &self,
        owner: Uuid,
        equipment_id: Uuid,
        now: DateTime<Utc>,
        pending: &mut Vec<Equipment>,
    ) -> Result<(), AppError> {
        if let Some(unit) = pending.iter_mut().find(|unit| unit.id == equipment_id) {
            unit.last_service_date = Some(now);
            return Ok(());
        }
        if let Some(mut unit) = self.equipment.find(owner, equipment_id).await? {
            unit.last_service_date = Some(now);
            unit.updated_at = now;
            pending.push(unit);
        }
        Ok(())
    }
}

/// Builds the batch write for a call created elsewhere (quotation conversion).
pub(crate) fn link_equipment(unit: &mut Equipment, call_id: Uuid, now: DateTime<Utc>) -> Result<Write, AppError> {
    unit.link_service_call(call_id);
    unit.updated_at = now;
    Repository::update_write(&*unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::service_call::{PartUsed, PhotoKind},
        services::testing::{agent_payload, call_payload, equipment_payload, patch, Fixture},
    };
    use serde_json::json;

    #[tokio::test]
    async fn call_numbers_are_sequential() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let mut numbers = Vec::new();
        for _ in 0..3 {
            numbers.push(fx.calls.create(fx.owner, call_payload(customer.id)).await.unwrap().call_number);
        }
        assert_eq!(numbers, vec!["SC-000001", "SC-000002", "SC-000003"]);
    }

    #[tokio::test]
    async fn invalid_parts_are_rejected_without_burning_a_number() {
        let fx = Fixture::new();
        let customer = fx.customer().await;

        let mut payload = call_payload(customer.id);
        payload.parts_used = vec![PartUsed {
            name: "Relay".into(),
            part_number: None,
            quantity: Decimal::from(-1),
            unit_price: Decimal::from(20),
            total: Decimal::ZERO,
        }];
        assert!(matches!(
            fx.calls.create(fx.owner, payload).await,
            Err(AppError::InvalidInput(_))
        ));

        let call = fx.calls.create(fx.owner, call_payload(customer.id)).await.unwrap();
        assert_eq!(call.call_number, "SC-000001");
    }

    #[tokio::test]
    async fn references_must_be_owned() {
        let fx = Fixture::new();
        let customer = fx.customer().await;

        assert!(matches!(
            fx.calls.create(Uuid::new_v4(), call_payload(customer.id)).await,
            Err(AppError::NotFound("Customer"))
        ));

        let mut payload = call_payload(customer.id);
        payload.assigned_agent = Some(Uuid::new_v4());
        assert!(matches!(
            fx.calls.create(fx.owner, payload).await,
            Err(AppError::NotFound("Agent"))
        ));
    }

    #[tokio::test]
    async fn call_number_is_immutable() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let call = fx.calls.create(fx.owner, call_payload(customer.id)).await.unwrap();

        match fx
            .calls
            .update(fx.owner, call.id, &patch(json!({ "callNumber": "SC-999999", "title": "x" })))
            .await
        {
            Err(AppError::ImmutableFields(fields)) => assert_eq!(fields, vec!["callNumber"]),
            other => panic!("unexpected result: {other:?}"),
        }

        let same = fx
            .calls
            .update(fx.owner, call.id, &patch(json!({ "callNumber": call.call_number, "title": "x" })))
            .await
            .unwrap();
        assert_eq!(same.title, "x");
    }

    #[tokio::test]
    async fn assigning_an_agent_moves_open_to_assigned() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let agent = fx.agents.create(fx.owner, agent_payload("Sipho", "Dlamini")).await.unwrap();
        let call = fx.calls.create(fx.owner, call_payload(customer.id)).await.unwrap();
        assert_eq!(call.status, ServiceCallStatus::Open);

        let updated = fx
            .calls
            .update(fx.owner, call.id, &patch(json!({ "assignedAgent": agent.id })))
            .await
            .unwrap();
        assert_eq!(updated.status, ServiceCallStatus::Assigned);
    }

    #[tokio::test]
    async fn illegal_transitions_are_conflicts() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let call = fx.calls.create(fx.owner, call_payload(customer.id)).await.unwrap();

        for status in ["completed", "invoiced"] {
            assert!(matches!(
                fx.calls.update(fx.owner, call.id, &patch(json!({ "status": status }))).await,
                Err(AppError::Conflict(_))
            ));
        }
        assert!(matches!(
            fx.calls.update(fx.owner, call.id, &patch(json!({ "status": "teleported" }))).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn completion_updates_agent_and_equipment_once() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let agent = fx.agents.create(fx.owner, agent_payload("Sipho", "Dlamini")).await.unwrap();
        let unit = fx.equipment.create(fx.owner, equipment_payload(customer.id)).await.unwrap();

        let mut payload = call_payload(customer.id);
        payload.assigned_agent = Some(agent.id);
        payload.equipment = Some(unit.id);
        let call = fx.calls.create(fx.owner, payload).await.unwrap();

        let linked = fx.equipment.get(fx.owner, unit.id).await.unwrap();
        assert_eq!(linked.service_history, vec![call.id]);

        fx.calls
            .update(fx.owner, call.id, &patch(json!({ "status": "in-progress" })))
            .await
            .unwrap();
        let done = fx
            .calls
            .update(fx.owner, call.id, &patch(json!({ "status": "completed" })))
            .await
            .unwrap();
        let stamped = done.completed_date.unwrap();

        // A repeated "completed" is a no-op
        let again = fx
            .calls
            .update(fx.owner, call.id, &patch(json!({ "status": "completed", "notes": "signed off" })))
            .await
            .unwrap();
        assert_eq!(again.completed_date, Some(stamped));

        let agent = fx.agents.get(fx.owner, agent.id).await.unwrap();
        assert_eq!(agent.total_jobs_attended, 1);
        let unit = fx.equipment.get(fx.owner, unit.id).await.unwrap();
        assert_eq!(unit.last_service_date, Some(stamped));
    }

    #[tokio::test]
    async fn parts_cost_is_recomputed_on_update() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let call = fx.calls.create(fx.owner, call_payload(customer.id)).await.unwrap();

        let updated = fx
            .calls
            .update(
                fx.owner,
                call.id,
                &patch(json!({
                    "partsUsed": [
                        { "name": "Thermostat", "quantity": 2, "unitPrice": 125.5 },
                        { "name": "Gas", "quantity": 1, "unitPrice": 100 }
                    ],
                    "partsCost": 1
                })),
            )
            .await
            .unwrap();
        assert_eq!(updated.parts_used[0].total, Decimal::from(251));
        assert_eq!(updated.parts_cost, Decimal::from(351));
    }

    #[tokio::test]
    async fn rating_flow_aggregates_into_agent() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let agent = fx.agents.create(fx.owner, agent_payload("Sipho", "Dlamini")).await.unwrap();

        let mut ratings = Vec::new();
        for rating in [4u8, 2] {
            let mut payload = call_payload(customer.id);
            payload.assigned_agent = Some(agent.id);
            let call = fx.calls.create(fx.owner, payload).await.unwrap();

            let early = RatingPayload { rating, customer_feedback: None };
            assert!(matches!(
                fx.calls.submit_rating(fx.owner, call.id, early).await,
                Err(AppError::Conflict(_))
            ));

            fx.complete(call.id).await;
            let rated = fx
                .calls
                .submit_rating(
                    fx.owner,
                    call.id,
                    RatingPayload { rating, customer_feedback: Some("ok".into()) },
                )
                .await
                .unwrap();
            assert!(rated.rated_date.is_some());
            ratings.push(call.id);
        }

        let agent = fx.agents.get(fx.owner, agent.id).await.unwrap();
        assert_eq!(agent.average_rating, 3.0);
        assert_eq!(agent.ratings_count, 2);

        // Second rating of the same call
        assert!(matches!(
            fx.calls
                .submit_rating(fx.owner, ratings[0], RatingPayload { rating: 5, customer_feedback: None })
                .await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn out_of_range_rating_changes_nothing() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let call = fx.calls.create(fx.owner, call_payload(customer.id)).await.unwrap();
        fx.complete(call.id).await;

        assert!(matches!(
            fx.calls
                .submit_rating(fx.owner, call.id, RatingPayload { rating: 6, customer_feedback: None })
                .await,
            Err(AppError::InvalidInput(_))
        ));
        let stored = fx.calls.get(fx.owner, call.id).await.unwrap();
        assert_eq!(stored.call.rating, None);
    }

    #[tokio::test]
    async fn photos_append_and_detail_expands_references() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let agent = fx.agents.create(fx.owner, agent_payload("Sipho", "Dlamini")).await.unwrap();
        let mut payload = call_payload(customer.id);
        payload.assigned_agent = Some(agent.id);
        let call = fx.calls.create(fx.owner, payload).await.unwrap();

        for url in ["a.jpg", "b.jpg"] {
            fx.calls
                .add_photos(fx.owner, call.id, PhotosPayload { kind: PhotoKind::Before, urls: vec![url.into()] })
                .await
                .unwrap();
        }
        assert!(matches!(
            fx.calls
                .add_photos(fx.owner, call.id, PhotosPayload { kind: PhotoKind::After, urls: vec![] })
                .await,
            Err(AppError::InvalidInput(_))
        ));

        let detail = fx.calls.get(fx.owner, call.id).await.unwrap();
        assert_eq!(detail.call.before_photos, vec!["a.jpg", "b.jpg"]);
        assert_eq!(detail.customer_details.map(|c| c.name), Some("Harbour Foods".to_string()));
        assert_eq!(detail.agent_details.map(|a| a.name), Some("Sipho Dlamini".to_string()));
        assert!(detail.equipment_details.is_none());
    }

    #[tokio::test]
    async fn deleting_a_call_unlinks_equipment() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let unit = fx.equipment.create(fx.owner, equipment_payload(customer.id)).await.unwrap();
        let mut payload = call_payload(customer.id);
        payload.equipment = Some(unit.id);
        let call = fx.calls.create(fx.owner, payload).await.unwrap();

        fx.calls.delete(fx.owner, call.id).await.unwrap();
        let unit = fx.equipment.get(fx.owner, unit.id).await.unwrap();
        assert!(unit.service_history.is_empty());
        fx.equipment.delete(fx.owner, unit.id).await.unwrap();
    }

    #[tokio::test]
    async fn converted_call_cannot_be_deleted() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let quotation = fx.approved_quotation(customer.id).await;
        let conversion = fx.quotations.convert(fx.owner, quotation.id).await.unwrap();

        let result = fx.calls.delete(fx.owner, conversion.service_call.id).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(fx.calls.get(fx.owner, conversion.service_call.id).await.is_ok());
    }
}
