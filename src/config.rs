// src/config.rs

use std::{env, str::FromStr, sync::Arc};

use anyhow::Context;

use crate::{
    db::DocumentStore,
    services::{
        AgentService, AuthService, CustomerService, EquipmentService, InvoiceService,
        QuotationService, ServiceCallService,
    },
};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub bind_addr: String,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub db_max_connections: u32,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        Ok(Self {
            database_url: optional("DATABASE_URL"),
            jwt_secret,
            jwt_ttl_hours: parsed("JWT_TTL_HOURS", 168)?,
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            log_level: optional("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_dir: optional("LOG_DIR"),
            db_max_connections: parsed("DB_MAX_CONNECTIONS", 5)?,
            bcrypt_cost: parsed("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub agent_service: AgentService,
    pub customer_service: CustomerService,
    pub service_call_service: ServiceCallService,
    pub equipment_service: EquipmentService,
    pub quotation_service: QuotationService,
    pub invoice_service: InvoiceService,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            auth_service: AuthService::new(
                store.clone(),
                config.jwt_secret.clone(),
                config.jwt_ttl_hours,
                config.bcrypt_cost,
            ),
            agent_service: AgentService::new(store.clone()),
            customer_service: CustomerService::new(store.clone()),
            service_call_service: ServiceCallService::new(store.clone()),
            equipment_service: EquipmentService::new(store.clone()),
            quotation_service: QuotationService::new(store.clone()),
            invoice_service: InvoiceService::new(store),
        }
    }
}
