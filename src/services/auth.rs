// src/services/auth.rs

use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::ValidateEmail;

use crate::{
    common::{error::AppError, permissions::apply_patch},
    db::{DocumentStore, Filter, Repository},
    models::auth::{ChangePasswordPayload, Claims, RegisterUserPayload, User, UserProfile},
};

#[derive(Clone)]
pub struct AuthService {
    users: Repository<User>,
    jwt_secret: String,
    token_ttl: chrono::Duration,
    hash_cost: u32,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        jwt_secret: String,
        token_ttl_hours: i64,
        hash_cost: u32,
    ) -> Self {
        Self {
            users: Repository::new(store),
            jwt_secret,
            token_ttl: chrono::Duration::hours(token_ttl_hours),
            hash_cost,
        }
    }

    pub async fn register(&self, payload: RegisterUserPayload) -> Result<String, AppError> {
        let email = normalize_email(&payload.email);
        let user_name = payload.user_name.trim().to_string();

        // Friendlier than the store's duplicate-key error; the unique keys still guard races
        if self.users.find_first(&Filter::new().eq("email", &email)).await?.is_some() {
            return Err(AppError::conflict("This email is already registered"));
        }
        if self
            .users
            .find_first(&Filter::new().eq("userName", &user_name))
            .await?
            .is_some()
        {
            return Err(AppError::conflict("This username is already taken"));
        }

        let password_hash = self.hash_password(payload.password).await?;

        let now = Utc::now();
        let id = Uuid::new_v4();
        let user = User {
            id,
            user_name,
            email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            phone: payload.phone,
            business_name: payload.business_name,
            business_registration_number: payload.business_registration_number,
            vat_number: payload.vat_number,
            tax_number: payload.tax_number,
            website: payload.website,
            address: payload.address,
            is_super_user: true,
            is_active: true,
            password_hash,
            created_by: id,
            created_at: now,
            updated_at: now,
        };

        self.users.insert(&user).await?;
        tracing::info!("👤 Registered business account {} ({})", user.user_name, user.id);

        self.create_token(user.id)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String, AppError> {
        let user = self
            .users
            .find_first(&Filter::new().eq("email", normalize_email(email)))
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !self.password_matches(password, &user.password_hash).await? {
            tracing::warn!("Failed login attempt for {}", user.id);
            return Err(AppError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AppError::AccountInactive);
        }

        self.create_token(user.id)
    }

    /// Resolves a bearer token to its (active) user.
    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        let user_id = token_data.claims.sub;
        let user = self
            .users
            .find(user_id, user_id)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if !user.is_active {
            return Err(AppError::AccountInactive);
        }
        Ok(user)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile, AppError> {
        Ok(self.users.get(user_id, user_id).await?.into())
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        patch: &Map<String, Value>,
    ) -> Result<UserProfile, AppError> {
        let current = self.users.get(user_id, user_id).await?;
        let mut user = apply_patch(&current, patch)?;

        if user.email != current.email {
            user.email = normalize_email(&user.email);
            if !user.email.validate_email() {
                return Err(AppError::invalid("Invalid email address."));
            }
        }
        user.updated_at = Utc::now();

        self.users.save(&user).await?;
        tracing::info!("👤 Profile updated for {}", user.id);
        Ok(user.into())
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        payload: ChangePasswordPayload,
    ) -> Result<(), AppError> {
        let mut user = self.users.get(user_id, user_id).await?;

        if !self
            .password_matches(&payload.current_password, &user.password_hash)
            .await?
        {
            return Err(AppError::InvalidCredentials);
        }

        user.password_hash = self.hash_password(payload.new_password).await?;
        user.updated_at = Utc::now();
        self.users.save(&user).await?;

        tracing::info!("🔑 Password changed for {}", user.id);
        Ok(())
    }

    async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let cost = self.hash_cost;
        let hashed = tokio::task::spawn_blocking(move || hash(&password, cost))
            .await
            .map_err(|e| anyhow::anyhow!("password hashing task failed: {}", e))??;
        Ok(hashed)
    }

    async fn password_matches(&self, password: &str, password_hash: &str) -> Result<bool, AppError> {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();
        let valid = tokio::task::spawn_blocking(move || verify(&password, &password_hash))
            .await
            .map_err(|e| anyhow::anyhow!("password verification task failed: {}", e))??;
        Ok(valid)
    }

    fn create_token(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + self.token_ttl;

        let claims = Claims {
            sub: user_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
