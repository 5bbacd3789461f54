pub mod agent_service;
pub mod auth;
pub mod customer_service;
pub mod equipment_service;
pub mod invoice_service;
pub mod quotation_service;
pub mod service_call_service;

#[cfg(test)]
pub(crate) mod testing;

pub use agent_service::AgentService;
pub use auth::AuthService;
pub use customer_service::CustomerService;
pub use equipment_service::EquipmentService;
pub use invoice_service::InvoiceService;
pub use quotation_service::QuotationService;
pub use service_call_service::ServiceCallService;

use chrono::{NaiveDate, Utc};

/// Calendar date used for due dates, validity and warranty checks.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}
