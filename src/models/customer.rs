// src/models/customer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, permissions::FieldPermissions},
    db::Document,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[schema(example = "12 Long Street")]
    pub street: Option<String>,
    #[schema(example = "Cape Town")]
    pub city: Option<String>,
    pub province: Option<String>,
    #[schema(example = "8001")]
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CustomerType {
    Individual,
    Business,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ContactMethod {
    Phone,
    Email,
    Sms,
    Whatsapp,
}

/// How the customer came in and what the field team should know about them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerIntake {
    #[schema(example = "referral")]
    pub source: Option<String>,
    pub preferred_contact_method: Option<ContactMethod>,
    #[schema(example = "Gate code 4411, ring the bell twice")]
    pub access_instructions: Option<String>,
    pub notes: Option<String>,
}

/// A physical location of a business customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: Uuid,
    #[schema(example = "Head Office")]
    pub name: String,
    pub address: Option<Address>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    #[schema(example = "CUST-000001")]
    pub customer_id: String,
    pub customer_type: CustomerType,
    #[schema(example = "Harbour Foods (Pty) Ltd")]
    pub business_name: Option<String>,
    pub contact_person: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub vat_number: Option<String>,
    #[serde(default)]
    pub sites: Vec<Site>,
    pub intake: Option<CustomerIntake>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Customer {
    const COLLECTION: &'static str = "customers";
    const LABEL: &'static str = "Customer";
    const UNIQUE_KEYS: &'static [&'static str] = &["customerId"];
    const PERMISSIONS: FieldPermissions = FieldPermissions {
        entity: "Customer",
        immutable: &["businessName", "customerId"],
        editable: &[
            "contactPerson",
            "firstName",
            "lastName",
            "email",
            "phone",
            "address",
            "vatNumber",
            "intake",
            "notes",
            "isActive",
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Uuid {
        self.created_by
    }
}

impl Customer {
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.business_name {
            return name.clone();
        }
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            self.customer_id.clone()
        } else {
            parts.join(" ")
        }
    }

    pub fn has_site(&self, site_id: Uuid) -> bool {
        self.sites.iter().any(|site| site.id == site_id)
    }

    pub fn add_site(&mut self, payload: SitePayload) -> &Site {
        self.sites.push(payload.into_site(Uuid::new_v4()));
        &self.sites[self.sites.len() - 1]
    }

    pub fn update_site(&mut self, site_id: Uuid, payload: SitePayload) -> Result<&Site, AppError> {
        let site = self
            .sites
            .iter_mut()
            .find(|site| site.id == site_id)
            .ok_or(AppError::NotFound("Site"))?;
        *site = payload.into_site(site_id);
        Ok(site)
    }

    /// A business customer always keeps at least one site.
    pub fn remove_site(&mut self, site_id: Uuid) -> Result<Site, AppError> {
        let index = self
            .sites
            .iter()
            .position(|site| site.id == site_id)
            .ok_or(AppError::NotFound("Site"))?;

        if self.customer_type == CustomerType::Business && self.sites.len() == 1 {
            return Err(AppError::conflict(
                "A business customer must keep at least one site",
            ));
        }

        Ok(self.sites.remove(index))
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub id: Uuid,
    pub customer_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl From<&Customer> for CustomerSummary {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id,
            customer_id: customer.customer_id.clone(),
            name: customer.display_name(),
            phone: customer.phone.clone(),
            email: customer.email.clone(),
        }
    }
}

// =============================================================================
//  Payloads
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SitePayload {
    #[validate(length(min = 1, message = "required"))]
    pub name: String,
    pub address: Option<Address>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    #[validate(email(message = "Invalid email address."))]
    pub contact_email: Option<String>,
    pub notes: Option<String>,
}

impl SitePayload {
    pub fn into_site(self, id: Uuid) -> Site {
        Site {
            id,
            name: self.name,
            address: self.address,
            contact_name: self.contact_name,
            contact_phone: self.contact_phone,
            contact_email: self.contact_email,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerPayload {
    /// Generated (CUST-NNNNNN) when omitted.
    pub customer_id: Option<String>,
    pub customer_type: CustomerType,
    pub business_name: Option<String>,
    pub contact_person: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email address."))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub vat_number: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub sites: Vec<SitePayload>,
    pub intake: Option<CustomerIntake>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CustomerFilters {
    pub customer_type: Option<CustomerType>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn business_customer() -> Customer {
        let now = Utc::now();
        Customer {
            id: Uuid::new_v4(),
            customer_id: "CUST-000001".into(),
            customer_type: CustomerType::Business,
            business_name: Some("Harbour Foods".into()),
            contact_person: None,
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            address: None,
            vat_number: None,
            sites: Vec::new(),
            intake: None,
            notes: None,
            is_active: true,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    fn site(name: &str) -> SitePayload {
        SitePayload {
            name: name.into(),
            address: None,
            contact_name: None,
            contact_phone: None,
            contact_email: None,
            notes: None,
        }
    }

    #[test]
    fn last_site_of_business_customer_cannot_be_removed() {
        let mut customer = business_customer();
        let first = customer.add_site(site("Head Office")).id;
        let second = customer.add_site(site("Warehouse")).id;

        assert!(customer.remove_site(second).is_ok());
        assert!(matches!(customer.remove_site(first), Err(AppError::Conflict(_))));
        assert_eq!(customer.sites.len(), 1);
    }

    #[test]
    fn individual_customer_may_remove_every_site() {
        let mut customer = business_customer();
        customer.customer_type = CustomerType::Individual;
        let only = customer.add_site(site("Home")).id;
        assert!(customer.remove_site(only).is_ok());
        assert!(customer.sites.is_empty());
    }

    #[test]
    fn unknown_site_is_not_found() {
        let mut customer = business_customer();
        customer.add_site(site("Head Office"));
        assert!(matches!(
            customer.remove_site(Uuid::new_v4()),
            Err(AppError::NotFound("Site"))
        ));
        assert!(matches!(
            customer.update_site(Uuid::new_v4(), site("X")),
            Err(AppError::NotFound("Site"))
        ));
    }

    #[test]
    fn display_name_prefers_business_name() {
        let mut customer = business_customer();
        assert_eq!(customer.display_name(), "Harbour Foods");
        customer.business_name = None;
        customer.first_name = Some("Thandi".into());
        customer.last_name = Some("Mokoena".into());
        assert_eq!(customer.display_name(), "Thandi Mokoena");
    }
}
