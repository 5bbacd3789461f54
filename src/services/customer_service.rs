// src/services/customer_service.rs

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        identifiers::{supplied, CUSTOMER_PREFIX},
        permissions::apply_patch,
    },
    db::{DocumentStore, Filter, Repository},
    models::{
        customer::{CreateCustomerPayload, Customer, CustomerFilters, CustomerType, Site, SitePayload},
        equipment::Equipment,
        invoice::Invoice,
        quotation::Quotation,
        service_call::ServiceCall,
    },
};

#[derive(Clone)]
pub struct CustomerService {
    customers: Repository<Customer>,
    calls: Repository<ServiceCall>,
    equipment: Repository<Equipment>,
    quotations: Repository<Quotation>,
    invoices: Repository<Invoice>,
}

impl CustomerService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            customers: Repository::new(store.clone()),
            calls: Repository::new(store.clone()),
            equipment: Repository::new(store.clone()),
            quotations: Repository::new(store.clone()),
            invoices: Repository::new(store),
        }
    }

    pub async fn list(&self, owner: Uuid, filters: CustomerFilters) -> Result<Vec<Customer>, AppError> {
        let filter = Filter::new()
            .eq_opt("customerType", filters.customer_type)
            .eq_opt("isActive", filters.is_active);
        self.customers.list(owner, &filter).await
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<Customer, AppError> {
        self.customers.get(owner, id).await
    }

    pub async fn create(&self, owner: Uuid, payload: CreateCustomerPayload) -> Result<Customer, AppError> {
        match payload.customer_type {
            CustomerType::Business => {
                if payload.business_name.as_deref().is_none_or(|name| name.trim().is_empty()) {
                    return Err(AppError::invalid("businessName is required for business customers"));
                }
                if payload.sites.is_empty() {
                    return Err(AppError::invalid("A business customer needs at least one site"));
                }
            }
            CustomerType::Individual => {
                if payload.first_name.is_none() && payload.last_name.is_none() {
                    return Err(AppError::invalid(
                        "firstName or lastName is required for individual customers",
                    ));
                }
            }
        }

        let customer_id = match supplied(payload.customer_id.as_deref()) {
            Some(id) => id,
            None => self.customers.next_identifier(CUSTOMER_PREFIX).await?,
        };

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            customer_id,
            customer_type: payload.customer_type,
            business_name: payload.business_name,
            contact_person: payload.contact_person,
            first_name: payload.first_name,
            last_name: payload.last_name,
            email: payload.email,
            phone: payload.phone,
            address: payload.address,
            vat_number: payload.vat_number,
            sites: payload
                .sites
                .into_iter()
                .map(|site| site.into_site(Uuid::new_v4()))
                .collect(),
            intake: payload.intake,
            notes: payload.notes,
            is_active: true,
            created_by: owner,
            created_at: now,
            updated_at: now,
        };

        self.customers.insert(&customer).await?;
        tracing::info!("🏢 Customer {} created ({})", customer.customer_id, customer.display_name());
        Ok(customer)
    }

    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &Map<String, Value>,
    ) -> Result<Customer, AppError> {
        let current = self.customers.get(owner, id).await?;
        let mut customer = apply_patch(&current, patch)?;
        customer.updated_at = Utc::now();

        self.customers.save(&customer).await?;
        tracing::info!("Customer {} updated", customer.customer_id);
        Ok(customer)
    }

    /// Customers referenced by any call, equipment, quotation or invoice are kept.
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), AppError> {
        let customer = self.customers.get(owner, id).await?;
        let by_customer = Filter::new().eq("customer", id);

        let references = [
            ("service calls", self.calls.count(owner, &by_customer).await?),
            ("equipment", self.equipment.count(owner, &by_customer).await?),
            ("quotations", self.quotations.count(owner, &by_customer).await?),
            ("invoices", self.invoices.count(owner, &by_customer).await?),
        ];
        let blocking: Vec<String> = references
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|(what, count)| format!("{count} {what}"))
            .collect();

        if !blocking.is_empty() {
            tracing::warn!("Refused to delete customer {}: still referenced", customer.customer_id);
            return Err(AppError::conflict(format!(
                "Customer still has {}",
                blocking.join(", ")
            )));
        }

        self.customers.delete(&customer).await?;
        tracing::info!("🗑️ Customer {} deleted", customer.customer_id);
        Ok(())
    }

    // --- Sites ---

    pub async fn add_site(&self, owner: Uuid, id: Uuid, payload: SitePayload) -> Result<Site, AppError> {
        let mut customer = self.customers.get(owner, id).await?;
        let site = customer.add_site(payload).clone();
        customer.updated_at = Utc::now();
        self.customers.save(&customer).await?;
        tracing::info!("Site '{}' added to customer {}", site.name, customer.customer_id);
        Ok(site)
    }

    pub async fn update_site(
        &self,
        owner: Uuid,
        id: Uuid,
        site_id: Uuid,
        payload: SitePayload,
    ) -> Result<Site, AppError> {
        let mut customer = self.customers.get(owner, id).await?;
        let site = customer.update_site(site_id, payload)?.clone();
        customer.updated_at = Utc::now();
        self.customers.save(&customer).await?;
        Ok(site)
    }

    pub async fn remove_site(&self, owner: Uuid, id: Uuid, site_id: Uuid) -> Result<Customer, AppError> {
        let mut customer = self.customers.get(owner, id).await?;
        let removed = match customer.remove_site(site_id) {
            Ok(site) => site,
            Err(e) => {
                tracing::warn!("Site removal refused for customer {}: {}", customer.customer_id, e);
                return Err(e);
            }
        };

        let by_site = Filter::new().eq("site", site_id);
        let references = [
            ("service calls", self.calls.count(owner, &by_site).await?),
            ("equipment", self.equipment.count(owner, &by_site).await?),
            ("quotations", self.quotations.count(owner, &by_site).await?),
        ];
        let blocking: Vec<String> = references
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|(what, count)| format!("{count} {what}"))
            .collect();
        if !blocking.is_empty() {
            tracing::warn!(
                "Refused to remove site '{}' from customer {}: still referenced",
                removed.name,
                customer.customer_id
            );
            return Err(AppError::conflict(format!(
                "Site '{}' is still used by {}",
                removed.name,
                blocking.join(", ")
            )));
        }

        customer.updated_at = Utc::now();
        self.customers.save(&customer).await?;
        tracing::info!("Site '{}' removed from customer {}", removed.name, customer.customer_id);
        Ok(customer)
    }
}
