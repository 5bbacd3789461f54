// src/docs.rs

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::OpenApi;

use crate::{common, handlers, models, services};

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,
        handlers::auth::update_me,
        handlers::auth::change_password,

        // --- Agents ---
        handlers::agents::list_agents,
        handlers::agents::create_agent,
        handlers::agents::get_agent,
        handlers::agents::update_agent,
        handlers::agents::delete_agent,
        handlers::agents::update_availability,
        handlers::agents::update_location,

        // --- Customers ---
        handlers::customers::list_customers,
        handlers::customers::create_customer,
        handlers::customers::get_customer,
        handlers::customers::update_customer,
        handlers::customers::delete_customer,
        handlers::customers::add_site,
        handlers::customers::update_site,
        handlers::customers::remove_site,

        // --- Service calls ---
        handlers::service_calls::list_service_calls,
        handlers::service_calls::create_service_call,
        handlers::service_calls::get_service_call,
        handlers::service_calls::update_service_call,
        handlers::service_calls::delete_service_call,
        handlers::service_calls::submit_rating,
        handlers::service_calls::add_photos,

        // --- Equipment ---
        handlers::equipment::list_equipment,
        handlers::equipment::create_equipment,
        handlers::equipment::get_equipment,
        handlers::equipment::update_equipment,
        handlers::equipment::delete_equipment,
        handlers::equipment::warranty_status,

        // --- Quotations ---
        handlers::quotations::list_quotations,
        handlers::quotations::create_quotation,
        handlers::quotations::get_quotation,
        handlers::quotations::update_quotation,
        handlers::quotations::delete_quotation,
        handlers::quotations::update_quotation_status,
        handlers::quotations::convert_quotation,

        // --- Invoices ---
        handlers::invoices::list_invoices,
        handlers::invoices::create_invoice,
        handlers::invoices::get_invoice,
        handlers::invoices::update_invoice,
        handlers::invoices::delete_invoice,
        handlers::invoices::record_payment,
    ),
    components(
        schemas(
            models::UpdatePayload,
            common::money::LineItem,

            // --- Auth ---
            models::auth::UserProfile,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::ChangePasswordPayload,
            models::auth::AuthResponse,

            // --- Agents ---
            models::agent::AgentStatus,
            models::agent::Availability,
            models::agent::GeoLocation,
            models::agent::Agent,
            models::agent::AgentSummary,
            models::agent::CreateAgentPayload,
            models::agent::AvailabilityPayload,
            models::agent::LocationPayload,

            // --- Customers ---
            models::customer::Address,
            models::customer::CustomerType,
            models::customer::ContactMethod,
            models::customer::CustomerIntake,
            models::customer::Site,
            models::customer::Customer,
            models::customer::CustomerSummary,
            models::customer::SitePayload,
            models::customer::CreateCustomerPayload,

            // --- Service calls ---
            models::service_call::ServiceCallStatus,
            models::service_call::Priority,
            models::service_call::PhotoKind,
            models::service_call::JobDetails,
            models::service_call::PartUsed,
            models::service_call::ServiceCall,
            models::service_call::ServiceCallDetail,
            models::service_call::CreateServiceCallPayload,
            models::service_call::RatingPayload,
            models::service_call::PhotosPayload,

            // --- Equipment ---
            models::equipment::EquipmentStatus,
            models::equipment::Equipment,
            models::equipment::WarrantyState,
            models::equipment::WarrantyStatus,
            models::equipment::EquipmentSummary,
            models::equipment::CreateEquipmentPayload,

            // --- Quotations ---
            models::quotation::QuotationStatus,
            models::quotation::Quotation,
            models::quotation::CreateQuotationPayload,
            models::quotation::QuotationStatusPayload,
            services::quotation_service::Conversion,

            // --- Invoices ---
            models::invoice::PaymentStatus,
            models::invoice::PaymentMethod,
            models::invoice::Payment,
            models::invoice::Invoice,
            models::invoice::CreateInvoicePayload,
            models::invoice::PaymentPayload,
        )
    ),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Users", description = "The signed-in business account"),
        (name = "Agents", description = "Field technicians"),
        (name = "Customers", description = "Customers and their service sites"),
        (name = "Service Calls", description = "Jobs from open to invoiced"),
        (name = "Equipment", description = "Installed units and warranty"),
        (name = "Quotations", description = "Priced offers and conversion to work"),
        (name = "Invoices", description = "Billing and payments")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}
