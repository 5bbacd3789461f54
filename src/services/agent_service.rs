// src/services/agent_service.rs

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        identifiers::{supplied, EMPLOYEE_PREFIX},
        permissions::apply_patch,
    },
    db::{DocumentStore, Filter, Repository},
    models::{
        agent::{Agent, AgentFilters, AgentStatus, Availability, CreateAgentPayload},
        service_call::ServiceCall,
    },
};

#[derive(Clone)]
pub struct AgentService {
    agents: Repository<Agent>,
    calls: Repository<ServiceCall>,
}

impl AgentService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            agents: Repository::new(store.clone()),
            calls: Repository::new(store),
        }
    }

    pub async fn list(&self, owner: Uuid, filters: AgentFilters) -> Result<Vec<Agent>, AppError> {
        let filter = Filter::new()
            .eq_opt("status", filters.status)
            .eq_opt("availability", filters.availability);
        let mut agents = self.agents.list(owner, &filter).await?;

        if let Some(skill) = filters.skill {
            let skill = skill.to_lowercase();
            agents.retain(|agent| agent.skills.iter().any(|s| s.to_lowercase() == skill));
        }
        Ok(agents)
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<Agent, AppError> {
        self.agents.get(owner, id).await
    }

    pub async fn create(&self, owner: Uuid, payload: CreateAgentPayload) -> Result<Agent, AppError> {
        if payload.hourly_rate.is_some_and(|rate| rate.is_sign_negative()) {
            return Err(AppError::invalid("hourlyRate must not be negative"));
        }

        let employee_id = match supplied(payload.employee_id.as_deref()) {
            Some(id) => id,
            None => self.agents.next_identifier(EMPLOYEE_PREFIX).await?,
        };

        let now = Utc::now();
        let agent = Agent {
            id: Uuid::new_v4(),
            employee_id,
            first_name: payload.first_name,
            last_name: payload.last_name,
            email: payload.email,
            phone: payload.phone,
            skills: payload.skills,
            specializations: payload.specializations,
            status: payload.status.unwrap_or(AgentStatus::Active),
            availability: payload.availability.unwrap_or(Availability::Available),
            location: None,
            total_jobs_attended: 0,
            average_rating: 0.0,
            ratings_count: 0,
            hourly_rate: payload.hourly_rate,
            notes: payload.notes,
            created_by: owner,
            created_at: now,
            updated_at: now,
        };

        self.agents.insert(&agent).await?;
        tracing::info!("🧰 Agent {} created ({})", agent.employee_id, agent.full_name());
        Ok(agent)
    }

    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &Map<String, Value>,
    ) -> Result<Agent, AppError> {
        let current = self.agents.get(owner, id).await?;
        let mut agent = apply_patch(&current, patch)?;

        if agent.hourly_rate.is_some_and(|rate| rate.is_sign_negative()) {
            return Err(AppError::invalid("hourlyRate must not be negative"));
        }
        agent.updated_at = Utc::now();

        self.agents.save(&agent).await?;
        tracing::info!("Agent {} updated", agent.employee_id);
        Ok(agent)
    }

    /// Agents still holding unfinished calls cannot be removed.
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), AppError> {
        let agent = self.agents.get(owner, id).await?;

        let calls = self
            .calls
            .list(owner, &Filter::new().eq("assignedAgent", id))
            .await?;
        let open = calls.iter().filter(|call| !call.status.is_finished()).count();
        if open > 0 {
            tracing::warn!("Refused to delete agent {}: {} open call(s)", agent.employee_id, open);
            return Err(AppError::conflict(format!(
                "Agent is assigned to {open} unfinished service call(s)"
            )));
        }

        self.agents.delete(&agent).await?;
        tracing::info!("🗑️ Agent {} deleted", agent.employee_id);
        Ok(())
    }

    pub async fn update_availability(
        &self,
        owner: Uuid,
        id: Uuid,
        availability: Availability,
    ) -> Result<Agent, AppError> {
        let mut agent = self.agents.get(owner, id).await?;
        agent.availability = availability;
        agent.updated_at = Utc::now();
        self.agents.save(&agent).await?;
        Ok(agent)
    }

    pub async fn update_location(
        &self,
        owner: Uuid,
        id: Uuid,
        lat: f64,
        lng: f64,
    ) -> Result<Agent, AppError> {
        let mut agent = self.agents.get(owner, id).await?;
        let now = Utc::now();
        agent.move_to(lat, lng, now)?;
        agent.updated_at = now;
        self.agents.save(&agent).await?;
        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{agent_payload, call_payload, patch, Fixture};
    use serde_json::json;

    #[tokio::test]
    async fn employee_ids_are_sequential_unless_supplied() {
        let fx = Fixture::new();
        let first = fx.agents.create(fx.owner, agent_payload("Sipho", "Dlamini")).await.unwrap();
        let second = fx.agents.create(fx.owner, agent_payload("Anele", "Khumalo")).await.unwrap();
        assert_eq!(first.employee_id, "EMP-000001");
        assert_eq!(second.employee_id, "EMP-000002");

        let mut payload = agent_payload("Lerato", "Nkosi");
        payload.employee_id = Some("  TECH-7 ".into());
        let third = fx.agents.create(fx.owner, payload).await.unwrap();
        assert_eq!(third.employee_id, "TECH-7");

        let mut duplicate = agent_payload("Other", "Person");
        duplicate.employee_id = Some("TECH-7".into());
        assert!(matches!(
            fx.agents.create(fx.owner, duplicate).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn identity_fields_are_immutable() {
        let fx = Fixture::new();
        let agent = fx.agents.create(fx.owner, agent_payload("Sipho", "Dlamini")).await.unwrap();

        for field in ["firstName", "lastName", "employeeId", "id", "createdBy"] {
            let err = fx
                .agents
                .update(fx.owner, agent.id, &patch(json!({ field: "changed" })))
                .await
                .unwrap_err();
            match err {
                AppError::ImmutableFields(fields) => assert_eq!(fields, vec![field.to_string()]),
                other => panic!("{field}: unexpected error {other:?}"),
            }
        }

        // Sending the stored value back is not a change
        let same = fx
            .agents
            .update(fx.owner, agent.id, &patch(json!({ "firstName": "Sipho", "phone": "082" })))
            .await
            .unwrap();
        assert_eq!(same.phone.as_deref(), Some("082"));
    }

    #[tokio::test]
    async fn editable_fields_apply_and_counters_are_ignored() {
        let fx = Fixture::new();
        let agent = fx.agents.create(fx.owner, agent_payload("Sipho", "Dlamini")).await.unwrap();

        let updated = fx
            .agents
            .update(
                fx.owner,
                agent.id,
                &patch(json!({
                    "skills": ["electrical"],
                    "status": "on-leave",
                    "availability": "off-duty",
                    "hourlyRate": 350.5,
                    "averageRating": 5.0,
                    "totalJobsAttended": 99,
                })),
            )
            .await
            .unwrap();

        assert_eq!(updated.skills, vec!["electrical"]);
        assert_eq!(updated.status, AgentStatus::OnLeave);
        assert_eq!(updated.availability, Availability::OffDuty);
        assert_eq!(updated.hourly_rate, Some(rust_decimal::Decimal::new(3505, 1)));
        assert_eq!(updated.average_rating, 0.0);
        assert_eq!(updated.total_jobs_attended, 0);
    }

    #[tokio::test]
    async fn other_owners_see_not_found() {
        let fx = Fixture::new();
        let agent = fx.agents.create(fx.owner, agent_payload("Sipho", "Dlamini")).await.unwrap();
        let stranger = Uuid::new_v4();

        assert!(matches!(fx.agents.get(stranger, agent.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            fx.agents.update(stranger, agent.id, &patch(json!({ "phone": "1" }))).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(fx.agents.delete(stranger, agent.id).await, Err(AppError::NotFound(_))));
        assert!(fx.agents.list(stranger, AgentFilters::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_filters_by_skill_case_insensitively() {
        let fx = Fixture::new();
        let mut fridge = agent_payload("Sipho", "Dlamini");
        fridge.skills = vec!["Refrigeration".into()];
        fx.agents.create(fx.owner, fridge).await.unwrap();
        fx.agents.create(fx.owner, agent_payload("Anele", "Khumalo")).await.unwrap();

        let filters = AgentFilters {
            skill: Some("refrigeration".into()),
            ..Default::default()
        };
        let found = fx.agents.list(fx.owner, filters).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_name, "Sipho");
    }

    #[tokio::test]
    async fn location_and_availability_updates() {
        let fx = Fixture::new();
        let agent = fx.agents.create(fx.owner, agent_payload("Sipho", "Dlamini")).await.unwrap();

        let moved = fx.agents.update_location(fx.owner, agent.id, -33.92, 18.42).await.unwrap();
        assert_eq!(moved.location.map(|l| (l.lat, l.lng)), Some((-33.92, 18.42)));
        assert!(matches!(
            fx.agents.update_location(fx.owner, agent.id, 120.0, 0.0).await,
            Err(AppError::InvalidInput(_))
        ));

        let busy = fx
            .agents
            .update_availability(fx.owner, agent.id, Availability::Busy)
            .await
            .unwrap();
        assert_eq!(busy.availability, Availability::Busy);
    }

    #[tokio::test]
    async fn agent_with_open_calls_cannot_be_deleted() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let agent = fx.agents.create(fx.owner, agent_payload("Sipho", "Dlamini")).await.unwrap();

        let mut payload = call_payload(customer.id);
        payload.assigned_agent = Some(agent.id);
        let call = fx.calls.create(fx.owner, payload).await.unwrap();

        assert!(matches!(fx.agents.delete(fx.owner, agent.id).await, Err(AppError::Conflict(_))));

        fx.calls
            .update(fx.owner, call.id, &patch(json!({ "status": "cancelled" })))
            .await
            .unwrap();
        fx.agents.delete(fx.owner, agent.id).await.unwrap();
    }
}
