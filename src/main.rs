//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::{
    common::logger::init_logger,
    config::{AppState, Config},
    docs::ApiDoc,
    middleware::auth::auth_guard,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let logger = init_logger(&config.log_level, config.log_dir.as_deref())?;
    if logger.writes_to_file() {
        tracing::info!("📝 Writing logs to {}", config.log_dir.as_deref().unwrap_or_default());
    }

    let store = db::connect(&config).await?;
    let app_state = AppState::new(&config, store);

    // Public
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me).put(handlers::auth::update_me))
        .route("/me/password", put(handlers::auth::change_password));

    let agent_routes = Router::new()
        .route(
            "/",
            get(handlers::agents::list_agents).post(handlers::agents::create_agent),
        )
        .route(
            "/{id}",
            get(handlers::agents::get_agent)
                .put(handlers::agents::update_agent)
                .delete(handlers::agents::delete_agent),
        )
        .route("/{id}/availability", put(handlers::agents::update_availability))
        .route("/{id}/location", put(handlers::agents::update_location));

    let customer_routes = Router::new()
        .route(
            "/",
            get(handlers::customers::list_customers).post(handlers::customers::create_customer),
        )
        .route(
            "/{id}",
            get(handlers::customers::get_customer)
                .put(handlers::customers::update_customer)
                .delete(handlers::customers::delete_customer),
        )
        .route("/{id}/sites", post(handlers::customers::add_site))
        .route(
            "/{id}/sites/{site_id}",
            put(handlers::customers::update_site).delete(handlers::customers::remove_site),
        );

    let service_call_routes = Router::new()
        .route(
            "/",
            get(handlers::service_calls::list_service_calls)
                .post(handlers::service_calls::create_service_call),
        )
        .route(
            "/{id}",
            get(handlers::service_calls::get_service_call)
                .put(handlers::service_calls::update_service_call)
                .delete(handlers::service_calls::delete_service_call),
        )
        .route("/{id}/rating", post(handlers::service_calls::submit_rating))
        .route("/{id}/photos", post(handlers::service_calls::add_photos));

    let equipment_routes = Router::new()
        .route(
            "/",
            get(handlers::equipment::list_equipment).post(handlers::equipment::create_equipment),
        )
        .route(
            "/{id}",
            get(handlers::equipment::get_equipment)
                .put(handlers::equipment::update_equipment)
                .delete(handlers::equipment::delete_equipment),
        )
        .route("/{id}/warranty", get(handlers::equipment::warranty_status));

    let quotation_routes = Router::new()
        .route(
            "/",
            get(handlers::quotations::list_quotations)
                .post(handlers::quotations::create_quotation),
        )
        .route(
            "/{id}",
            get(handlers::quotations::get_quotation)
                .put(handlers::quotations::update_quotation)
                .delete(handlers::quotations::delete_quotation),
        )
        .route("/{id}/status", put(handlers::quotations::update_quotation_status))
        .route("/{id}/convert", post(handlers::quotations::convert_quotation));

    let invoice_routes = Router::new()
        .route(
            "/",
            get(handlers::invoices::list_invoices).post(handlers::invoices::create_invoice),
        )
        .route(
            "/{id}",
            get(handlers::invoices::get_invoice)
                .put(handlers::invoices::update_invoice)
                .delete(handlers::invoices::delete_invoice),
        )
        .route("/{id}/payments", post(handlers::invoices::record_payment));

    // Everything below requires a bearer token
    let protected = Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/agents", agent_routes)
        .nest("/api/customers", customer_routes)
        .nest("/api/service-calls", service_call_routes)
        .nest("/api/equipment", equipment_routes)
        .nest("/api/quotations", quotation_routes)
        .nest("/api/invoices", invoice_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .merge(protected)
        .with_state(app_state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Server stopped");
    // Flushes the file writer
    drop(logger);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
