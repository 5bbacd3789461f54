// Shared fixtures for service tests. Everything runs on the in-memory store.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::{
    common::money::LineItem,
    db::{DocumentStore, MemoryDocumentStore, Repository},
    models::{
        agent::CreateAgentPayload,
        auth::RegisterUserPayload,
        customer::{CreateCustomerPayload, Customer, CustomerType, SitePayload},
        equipment::CreateEquipmentPayload,
        invoice::CreateInvoicePayload,
        quotation::{CreateQuotationPayload, Quotation, QuotationStatus, QuotationStatusPayload},
        service_call::{CreateServiceCallPayload, ServiceCall},
    },
    services::{
        AgentService, AuthService, CustomerService, EquipmentService, InvoiceService,
        QuotationService, ServiceCallService,
    },
};

pub fn memory_store() -> Arc<dyn DocumentStore> {
    Arc::new(MemoryDocumentStore::new())
}

pub fn auth_service(store: Arc<dyn DocumentStore>) -> AuthService {
    // Lowest bcrypt cost keeps the suite fast
    AuthService::new(store, "test-secret".into(), 1, 4)
}

pub fn patch(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("patch must be a JSON object")
}

pub fn line(description: &str, quantity: i64, unit_price: i64) -> LineItem {
    LineItem::new(description, Decimal::from(quantity), Decimal::from(unit_price))
}

pub fn register_payload(user_name: &str, email: &str) -> RegisterUserPayload {
    RegisterUserPayload {
        user_name: user_name.into(),
        email: email.into(),
        password: "correct-horse".into(),
        first_name: "Naledi".into(),
        last_name: "Mokoena".into(),
        phone: None,
        business_name: "Acme Refrigeration".into(),
        business_registration_number: "2019/123456/07".into(),
        vat_number: None,
        tax_number: None,
        website: None,
        address: None,
    }
}

pub fn site_payload(name: &str) -> SitePayload {
    SitePayload {
        name: name.into(),
        address: None,
        contact_name: None,
        contact_phone: None,
        contact_email: None,
        notes: None,
    }
}

pub fn customer_payload(customer_type: CustomerType) -> CreateCustomerPayload {
    let business = customer_type == CustomerType::Business;
    CreateCustomerPayload {
        customer_id: None,
        customer_type,
        business_name: business.then(|| "Harbour Foods".to_string()),
        contact_person: None,
        first_name: (!business).then(|| "Thandi".to_string()),
        last_name: (!business).then(|| "Mokoena".to_string()),
        email: None,
        phone: Some("021 555 0199".into()),
        address: None,
        vat_number: None,
        sites: if business { vec![site_payload("Head Office")] } else { Vec::new() },
        intake: None,
        notes: None,
    }
}

pub fn agent_payload(first_name: &str, last_name: &str) -> CreateAgentPayload {
    CreateAgentPayload {
        employee_id: None,
        first_name: first_name.into(),
        last_name: last_name.into(),
        email: None,
        phone: None,
        skills: Vec::new(),
        specializations: Vec::new(),
        status: None,
        availability: None,
        hourly_rate: None,
        notes: None,
    }
}

pub fn call_payload(customer: Uuid) -> CreateServiceCallPayload {
    CreateServiceCallPayload {
        call_number: None,
        customer,
        site: None,
        assigned_agent: None,
        equipment: None,
        title: "Cold room not holding temperature".into(),
        description: None,
        service_type: None,
        priority: None,
        scheduled_date: None,
        job_details: None,
        parts_used: Vec::new(),
        labor_hours: None,
        notes: None,
    }
}

pub fn equipment_payload(customer: Uuid) -> CreateEquipmentPayload {
    CreateEquipmentPayload {
        equipment_id: None,
        customer,
        site: None,
        name: "Walk-in freezer".into(),
        equipment_type: None,
        manufacturer: None,
        model: None,
        serial_number: None,
        installation_date: None,
        purchase_date: None,
        warranty_expiry: None,
        status: None,
        notes: None,
    }
}

pub fn quotation_payload(customer: Uuid) -> CreateQuotationPayload {
    CreateQuotationPayload {
        quotation_number: None,
        customer,
        site: None,
        equipment: None,
        title: "Compressor replacement".into(),
        description: None,
        line_items: vec![line("A", 2, 100), line("B", 1, 50)],
        vat_rate: None,
        issue_date: None,
        valid_until: None,
        notes: None,
        terms: None,
    }
}

/// Explicit lines totalling 1000 with no VAT.
pub fn invoice_payload(service_call: Uuid) -> CreateInvoicePayload {
    CreateInvoicePayload {
        invoice_number: None,
        service_call,
        line_items: Some(vec![line("Labour", 1, 1000)]),
        vat_rate: Some(Decimal::ZERO),
        payment_terms: None,
        issue_date: None,
        due_date: None,
        notes: None,
        terms: None,
    }
}

/// Every service wired to one store, plus a principal to act as.
pub struct Fixture {
    pub owner: Uuid,
    pub store: Arc<dyn DocumentStore>,
    pub agents: AgentService,
    pub customers: CustomerService,
    pub calls: ServiceCallService,
    pub equipment: EquipmentService,
    pub quotations: QuotationService,
    pub invoices: InvoiceService,
}

impl Fixture {
    pub fn new() -> Self {
        let store = memory_store();
        Self {
            owner: Uuid::new_v4(),
            agents: AgentService::new(store.clone()),
            customers: CustomerService::new(store.clone()),
            calls: ServiceCallService::new(store.clone()),
            equipment: EquipmentService::new(store.clone()),
            quotations: QuotationService::new(store.clone()),
            invoices: InvoiceService::new(store.clone()),
            store,
        }
    }

    pub async fn customer(&self) -> Customer {
        self.customers
            .create(self.owner, customer_payload(CustomerType::Business))
            .await
            .unwrap()
    }

    pub async fn complete(&self, call: Uuid) {
        for status in ["in-progress", "completed"] {
            self.calls
                .update(self.owner, call, &patch(json!({ "status": status })))
                .await
                .unwrap();
        }
    }

    pub async fn completed_call(&self) -> ServiceCall {
        let customer = self.customer().await;
        let call = self
            .calls
            .create(self.owner, call_payload(customer.id))
            .await
            .unwrap();
        self.complete(call.id).await;
        self.calls.get(self.owner, call.id).await.unwrap().call
    }

    pub async fn approved_quotation(&self, customer: Uuid) -> Quotation {
        let quotation = self
            .quotations
            .create(self.owner, quotation_payload(customer))
            .await
            .unwrap();
        self.quotations
            .update_status(
                self.owner,
                quotation.id,
                QuotationStatusPayload {
                    status: QuotationStatus::Approved,
                    rejection_reason: None,
                },
            )
            .await
            .unwrap()
    }

    /// Writes a quotation as-is, bypassing the service rules.
    pub async fn store_quotation(&self, quotation: &Quotation) {
        Repository::<Quotation>::new(self.store.clone())
            .save(quotation)
            .await
            .unwrap();
    }
}
