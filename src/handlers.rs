pub mod agents;
pub mod auth;
pub mod customers;
pub mod equipment;
pub mod invoices;
pub mod quotations;
pub mod service_calls;
