// src/services/quotation_service.rs

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        identifiers::{supplied, QUOTATION_PREFIX, SERVICE_CALL_PREFIX},
        money::DEFAULT_VAT_RATE,
        permissions::{apply_patch, patch_touches},
    },
    db::{DocumentStore, Filter, Repository},
    models::{
        customer::Customer,
        equipment::Equipment,
        quotation::{
            default_valid_until, CreateQuotationPayload, Quotation, QuotationFilters,
            QuotationStatus, QuotationStatusPayload,
        },
        service_call::{Priority, ServiceCall, ServiceCallStatus},
    },
    services::{equipment_service::ensure_site, service_call_service::link_equipment, today},
};

const PRICING_FIELDS: [&str; 2] = ["lineItems", "vatRate"];

/// Result of turning an approved quotation into work.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub quotation: Quotation,
    pub service_call: ServiceCall,
}

#[derive(Clone)]
pub struct QuotationService {
    quotations: Repository<Quotation>,
    customers: Repository<Customer>,
    equipment: Repository<Equipment>,
    calls: Repository<ServiceCall>,
}

impl QuotationService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            quotations: Repository::new(store.clone()),
            customers: Repository::new(store.clone()),
            equipment: Repository::new(store.clone()),
            calls: Repository::new(store),
        }
    }

    /// Expired quotations found while listing are written back in one batch.
    pub async fn list(&self, owner: Uuid, filters: QuotationFilters) -> Result<Vec<Quotation>, AppError> {
        let filter = Filter::new().eq_opt("customer", filters.customer);
        let mut quotations = self.quotations.list(owner, &filter).await?;

        let today = today();
        let mut expired = Vec::new();
        for quotation in quotations.iter_mut() {
            if quotation.expire_if_due(today) {
                quotation.updated_at = Utc::now();
                expired.push(Repository::update_write(&*quotation)?);
            }
        }
        if !expired.is_empty() {
            tracing::info!("⌛ {} quotation(s) expired", expired.len());
            self.quotations.commit(expired).await?;
        }

        if let Some(status) = filters.status {
            quotations.retain(|quotation| quotation.status == status);
        }
        Ok(quotations)
    }

    /// Loads a quotation, persisting a lazy expiry if one happened.
    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<Quotation, AppError> {
        let mut quotation = self.quotations.get(owner, id).await?;
        if quotation.expire_if_due(today()) {
            quotation.updated_at = Utc::now();
            self.quotations.save(&quotation).await?;
            tracing::info!("⌛ Quotation {} expired", quotation.quotation_number);
        }
        Ok(quotation)
    }

    pub async fn create(&self, owner: Uuid, payload: CreateQuotationPayload) -> Result<Quotation, AppError> {
        let customer = self.customers.get(owner, payload.customer).await?;
        ensure_site(&customer, payload.site)?;
        if let Some(equipment_id) = payload.equipment {
            self.equipment_for(owner, equipment_id, customer.id).await?;
        }

        let issue_date = payload.issue_date.unwrap_or_else(today);
        let valid_until = payload
            .valid_until
            .unwrap_or_else(|| default_valid_until(issue_date));
        if valid_until < issue_date {
            return Err(AppError::invalid("validUntil must not be before issueDate"));
        }

        let now = Utc::now();
        let mut quotation = Quotation {
            id: Uuid::new_v4(),
            quotation_number: String::new(),
            customer: customer.id,
            site: payload.site,
            equipment: payload.equipment,
            title: payload.title,
            description: payload.description,
            line_items: payload.line_items,
            vat_rate: payload.vat_rate.unwrap_or(DEFAULT_VAT_RATE),
            subtotal: Decimal::ZERO,
            vat_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            status: QuotationStatus::Draft,
            issue_date,
            valid_until,
            sent_date: None,
            approved_date: None,
            rejected_date: None,
            rejection_reason: None,
            converted_to_service_call: None,
            converted_date: None,
            notes: payload.notes,
            terms: payload.terms,
            created_by: owner,
            created_at: now,
            updated_at: now,
        };
        quotation.recalculate()?;

        // Allocated after validation
        quotation.quotation_number = match supplied(payload.quotation_number.as_deref()) {
            Some(number) => number,
            None => self.quotations.next_identifier(QUOTATION_PREFIX).await?,
        };

        self.quotations.insert(&quotation).await?;
        tracing::info!(
            "🧾 Quotation {} created for customer {} (total {})",
            quotation.quotation_number,
            customer.customer_id,
            quotation.total_amount
        );
        Ok(quotation)
    }

    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &Map<String, Value>,
    ) -> Result<Quotation, AppError> {
        let current = self.get(owner, id).await?;
        current.ensure_not_converted()?;

        let repricing = patch_touches(patch, &PRICING_FIELDS);
        if repricing && current.status.locks_pricing() {
            tracing::warn!(
                "Refused pricing change on {} quotation {}",
                current.status.as_str(),
                current.quotation_number
            );
            return Err(AppError::conflict(format!(
                "Line items and VAT rate cannot change once a quotation is {}",
                current.status.as_str()
            )));
        }

        let mut quotation = apply_patch(&current, patch)?;

        if quotation.site != current.site {
            let customer = self.customers.get(owner, quotation.customer).await?;
            ensure_site(&customer, quotation.site)?;
        }
        if quotation.equipment != current.equipment {
            if let Some(equipment_id) = quotation.equipment {
                self.equipment_for(owner, equipment_id, quotation.customer).await?;
            }
        }
        if quotation.valid_until < quotation.issue_date {
            return Err(AppError::invalid("validUntil must not be before issueDate"));
        }

        quotation.recalculate()?;
        quotation.expire_if_due(today());
        quotation.updated_at = Utc::now();

        self.quotations.save(&quotation).await?;
        tracing::info!("Quotation {} updated", quotation.quotation_number);
        Ok(quotation)
    }

    pub async fn update_status(
        &self,
        owner: Uuid,
        id: Uuid,
        payload: QuotationStatusPayload,
    ) -> Result<Quotation, AppError> {
        let mut quotation = self.get(owner, id).await?;
        let previous = quotation.status;
        let now = Utc::now();

        if let Err(e) = quotation.apply_status(payload.status, payload.rejection_reason, now) {
            tracing::warn!("Status change refused for quotation {}: {}", quotation.quotation_number, e);
            return Err(e);
        }
        quotation.expire_if_due(today());
        quotation.updated_at = now;

        self.quotations.save(&quotation).await?;
        tracing::info!(
            "Quotation {} moved {} -> {}",
            quotation.quotation_number,
            previous.as_str(),
            quotation.status.as_str()
        );
        Ok(quotation)
    }

    /// Approved quotation -> new service call. Both records (and the equipment
    /// history) are written in one batch.
    pub async fn convert(&self, owner: Uuid, id: Uuid) -> Result<Conversion, AppError> {
        let mut quotation = self.get(owner, id).await?;
        let now = Utc::now();
        let call_id = Uuid::new_v4();

        if let Err(e) = quotation.mark_converted(call_id, now) {
            tracing::warn!("Conversion refused for quotation {}: {}", quotation.quotation_number, e);
            return Err(e);
        }
        quotation.updated_at = now;

        let service_call = ServiceCall {
            id: call_id,
            call_number: self.calls.next_identifier(SERVICE_CALL_PREFIX).await?,
            customer: quotation.customer,
            site: quotation.site,
            assigned_agent: None,
            equipment: quotation.equipment,
            quotation: Some(quotation.id),
            title: quotation.title.clone(),
            description: quotation.description.clone(),
            service_type: None,
            status: ServiceCallStatus::Open,
            priority: Priority::Medium,
            scheduled_date: None,
            job_details: None,
            parts_used: Vec::new(),
            parts_cost: Decimal::ZERO,
            labor_hours: None,
            before_photos: Vec::new(),
            after_photos: Vec::new(),
            completed_date: None,
            invoiced_date: None,
            rating: None,
            customer_feedback: None,
            rated_date: None,
            notes: quotation.notes.clone(),
            created_by: owner,
            created_at: now,
            updated_at: now,
        };

        let mut writes = vec![
            Repository::update_write(&quotation)?,
            Repository::insert_write(&service_call)?,
        ];
        if let Some(equipment_id) = service_call.equipment {
            if let Some(mut unit) = self.equipment.find(owner, equipment_id).await? {
                writes.push(link_equipment(&mut unit, service_call.id, now)?);
            }
        }
        self.quotations.commit(writes).await?;

        tracing::info!(
            "🔁 Quotation {} converted into service call {}",
            quotation.quotation_number,
            service_call.call_number
        );
        Ok(Conversion {
            quotation,
            service_call,
        })
    }

    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), AppError> {
        let quotation = self.quotations.get(owner, id).await?;
        quotation.ensure_not_converted()?;

        self.quotations.delete(&quotation).await?;
        tracing::info!("🗑️ Quotation {} deleted", quotation.quotation_number);
        Ok(())
    }

    async fn equipment_for(&self, owner: Uuid, equipment_id: Uuid, customer: Uuid) -> Result<(), AppError> {
        let unit = self.equipment.get(owner, equipment_id).await?;
        if unit.customer != customer {
            return Err(AppError::invalid(format!(
                "Equipment {} does not belong to this customer",
                unit.equipment_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{equipment_payload, line, patch, quotation_payload, Fixture};
    use chrono::Days;
    use serde_json::json;

    fn status(status: QuotationStatus) -> QuotationStatusPayload {
        QuotationStatusPayload {
            status,
            rejection_reason: None,
        }
    }

    #[tokio::test]
    async fn create_computes_totals_and_defaults() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let quotation = fx
            .quotations
            .create(fx.owner, quotation_payload(customer.id))
            .await
            .unwrap();

        assert_eq!(quotation.quotation_number, "QT-000001");
        assert_eq!(quotation.status, QuotationStatus::Draft);
        assert_eq!(quotation.vat_rate, Decimal::from(15));
        assert_eq!(quotation.subtotal, Decimal::from(250));
        assert_eq!(quotation.vat_amount, Decimal::new(375, 1));
        assert_eq!(quotation.total_amount, Decimal::new(2875, 1));
        assert_eq!(quotation.valid_until, default_valid_until(quotation.issue_date));
    }

    #[tokio::test]
    async fn quotation_number_is_immutable() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let quotation = fx
            .quotations
            .create(fx.owner, quotation_payload(customer.id))
            .await
            .unwrap();

        match fx
            .quotations
            .update(
                fx.owner,
                quotation.id,
                &patch(json!({ "quotationNumber": "QT-999999", "title": "Renamed" })),
            )
            .await
        {
            Err(AppError::ImmutableFields(fields)) => assert_eq!(fields, vec!["quotationNumber"]),
            other => panic!("unexpected result: {other:?}"),
        }
        let stored = fx.quotations.get(fx.owner, quotation.id).await.unwrap();
        assert_eq!(stored.title, quotation.title);

        let same = fx
            .quotations
            .update(
                fx.owner,
                quotation.id,
                &patch(json!({ "quotationNumber": quotation.quotation_number, "title": "Renamed" })),
            )
            .await
            .unwrap();
        assert_eq!(same.title, "Renamed");
        assert_eq!(same.quotation_number, "QT-000001");
    }

    #[tokio::test]
    async fn invalid_line_items_are_rejected_without_burning_a_number() {
        let fx = Fixture::new();
        let customer = fx.customer().await;

        let mut payload = quotation_payload(customer.id);
        payload.line_items = vec![line("A", -1, 100)];
        assert!(matches!(
            fx.quotations.create(fx.owner, payload).await,
            Err(AppError::InvalidInput(_))
        ));

        let ok = fx
            .quotations
            .create(fx.owner, quotation_payload(customer.id))
            .await
            .unwrap();
        assert_eq!(ok.quotation_number, "QT-000001");
    }

    #[tokio::test]
    async fn replacing_line_items_on_a_draft_recomputes_totals() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let quotation = fx
            .quotations
            .create(fx.owner, quotation_payload(customer.id))
            .await
            .unwrap();

        let updated = fx
            .quotations
            .update(
                fx.owner,
                quotation.id,
                &patch(json!({
                    "lineItems": [{ "description": "C", "quantity": 4, "unitPrice": 25 }],
                    "vatRate": 10,
                    "subtotal": 1,
                    "status": "approved",
                })),
            )
            .await
            .unwrap();

        assert_eq!(updated.line_items[0].total, Decimal::from(100));
        assert_eq!(updated.subtotal, Decimal::from(100));
        assert_eq!(updated.vat_amount, Decimal::from(10));
        assert_eq!(updated.total_amount, Decimal::from(110));
        assert_eq!(updated.status, QuotationStatus::Draft);
    }

    #[tokio::test]
    async fn sent_date_is_stamped_once() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let quotation = fx
            .quotations
            .create(fx.owner, quotation_payload(customer.id))
            .await
            .unwrap();

        let sent = fx
            .quotations
            .update_status(fx.owner, quotation.id, status(QuotationStatus::Sent))
            .await
            .unwrap();
        let again = fx
            .quotations
            .update_status(fx.owner, quotation.id, status(QuotationStatus::Sent))
            .await
            .unwrap();
        assert!(sent.sent_date.is_some());
        assert_eq!(again.sent_date, sent.sent_date);
    }

    #[tokio::test]
    async fn sent_quotation_past_validity_expires_on_load() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let quotation = fx
            .quotations
            .create(fx.owner, quotation_payload(customer.id))
            .await
            .unwrap();
        let mut sent = fx
            .quotations
            .update_status(fx.owner, quotation.id, status(QuotationStatus::Sent))
            .await
            .unwrap();

        // Time passes: the stored validity is now behind us
        sent.issue_date = today().checked_sub_days(Days::new(40)).unwrap();
        sent.valid_until = today().checked_sub_days(Days::new(1)).unwrap();
        fx.store_quotation(&sent).await;

        let loaded = fx.quotations.get(fx.owner, quotation.id).await.unwrap();
        assert_eq!(loaded.status, QuotationStatus::Expired);

        let listed = fx
            .quotations
            .list(
                fx.owner,
                QuotationFilters {
                    status: Some(QuotationStatus::Expired),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn approved_pricing_is_frozen_but_notes_are_not() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let quotation = fx.approved_quotation(customer.id).await;

        assert!(matches!(
            fx.quotations
                .update(fx.owner, quotation.id, &patch(json!({ "vatRate": 0 })))
                .await,
            Err(AppError::Conflict(_))
        ));
        let updated = fx
            .quotations
            .update(fx.owner, quotation.id, &patch(json!({ "notes": "Call before arriving" })))
            .await
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("Call before arriving"));
    }

    #[tokio::test]
    async fn converted_status_is_not_settable() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let quotation = fx.approved_quotation(customer.id).await;

        assert!(matches!(
            fx.quotations
                .update_status(fx.owner, quotation.id, status(QuotationStatus::Converted))
                .await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn conversion_requires_approval() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let draft = fx
            .quotations
            .create(fx.owner, quotation_payload(customer.id))
            .await
            .unwrap();

        assert!(matches!(
            fx.quotations.convert(fx.owner, draft.id).await,
            Err(AppError::Conflict(_))
        ));
        assert!(fx
            .calls
            .list(fx.owner, Default::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn conversion_creates_one_linked_call_and_locks_the_quotation() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let unit = fx
            .equipment
            .create(fx.owner, equipment_payload(customer.id))
            .await
            .unwrap();

        let mut payload = quotation_payload(customer.id);
        payload.equipment = Some(unit.id);
        payload.site = Some(customer.sites[0].id);
        let quotation = fx.quotations.create(fx.owner, payload).await.unwrap();
        fx.quotations
            .update_status(fx.owner, quotation.id, status(QuotationStatus::Approved))
            .await
            .unwrap();

        let conversion = fx.quotations.convert(fx.owner, quotation.id).await.unwrap();
        let call = &conversion.service_call;
        assert_eq!(conversion.quotation.status, QuotationStatus::Converted);
        assert_eq!(conversion.quotation.converted_to_service_call, Some(call.id));
        assert_eq!(call.quotation, Some(quotation.id));
        assert_eq!(call.customer, customer.id);
        assert_eq!(call.site, quotation.site);
        assert_eq!(call.title, quotation.title);
        assert_eq!(call.status, ServiceCallStatus::Open);
        assert_eq!(call.call_number, "SC-000001");

        let calls = fx.calls.list(fx.owner, Default::default()).await.unwrap();
        assert_eq!(calls.len(), 1);
        let unit = fx.equipment.get(fx.owner, unit.id).await.unwrap();
        assert_eq!(unit.service_history, vec![call.id]);

        // Locked for good
        assert!(matches!(
            fx.quotations.convert(fx.owner, quotation.id).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            fx.quotations
                .update(fx.owner, quotation.id, &patch(json!({ "notes": "x" })))
                .await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            fx.quotations
                .update_status(fx.owner, quotation.id, status(QuotationStatus::Draft))
                .await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            fx.quotations.delete(fx.owner, quotation.id).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn draft_quotation_can_be_deleted() {
        let fx = Fixture::new();
        let customer = fx.customer().await;
        let quotation = fx
            .quotations
            .create(fx.owner, quotation_payload(customer.id))
            .await
            .unwrap();

        fx.quotations.delete(fx.owner, quotation.id).await.unwrap();
        assert!(matches!(
            fx.quotations.get(fx.owner, quotation.id).await,
            Err(AppError::NotFound("Quotation"))
        ));
    }
}
