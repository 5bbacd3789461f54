// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::permissions::FieldPermissions,
    db::Document,
    models::customer::Address,
};

/// The business account ("super user"). A user document is owned by itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub user_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,

    pub business_name: String,
    pub business_registration_number: String,
    pub vat_number: Option<String>,
    pub tax_number: Option<String>,
    pub website: Option<String>,
    pub address: Option<Address>,

    pub is_super_user: bool,
    pub is_active: bool,

    // Stored with the document, never returned (see UserProfile)
    pub password_hash: String,

    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for User {
    const COLLECTION: &'static str = "users";
    const LABEL: &'static str = "User";
    const UNIQUE_KEYS: &'static [&'static str] = &["userName", "email"];
    const PERMISSIONS: FieldPermissions = FieldPermissions {
        entity: "User",
        immutable: &["userName", "businessName", "businessRegistrationNumber"],
        editable: &[
            "email",
            "firstName",
            "lastName",
            "phone",
            "address",
            "vatNumber",
            "taxNumber",
            "website",
        ],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Uuid {
        self.created_by
    }
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    #[schema(example = "acme-admin")]
    pub user_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    #[schema(example = "Acme Refrigeration")]
    pub business_name: String,
    pub business_registration_number: String,
    pub vat_number: Option<String>,
    pub tax_number: Option<String>,
    pub website: Option<String>,
    pub address: Option<Address>,
    pub is_super_user: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            user_name: user.user_name,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            business_name: user.business_name,
            business_registration_number: user.business_registration_number,
            vat_number: user.vat_number,
            tax_number: user.tax_number,
            website: user.website,
            address: user.address,
            is_super_user: user.is_super_user,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserPayload {
    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters."))]
    pub user_name: String,
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
    pub password: String,
    #[validate(length(min = 1, message = "required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "required"))]
    pub last_name: String,
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "required"))]
    pub business_name: String,
    #[validate(length(min = 1, message = "required"))]
    pub business_registration_number: String,
    pub vat_number: Option<String>,
    pub tax_number: Option<String>,
    pub website: Option<String>,
    pub address: Option<Address>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginUserPayload {
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordPayload {
    #[validate(length(min = 1, message = "required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
}

// JWT claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // user id
    pub exp: usize, // expiry
    pub iat: usize, // issued at
}
