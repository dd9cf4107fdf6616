//! Car Rental Platform - Main Application Entry Point
//!
//! This is a REST API server for a peer-to-peer car rental marketplace.
//! Owners list cars, drivers book them, staff review licenses and incident
//! reports, and technicians manage the GPS tracker fleet. Customer PII
//! (phone numbers, license numbers, license plates) is encrypted per field
//! with AES-256-GCM under a process master key.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: Bearer access token with SHA-256 hashing
//! - **Background jobs**: tokio tasks (reminder timers + periodic sweeps)
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Parse the master encryption key
//! 3. Create database connection pool and run migrations
//! 4. Build the mail and image store clients
//! 5. Spawn the periodic booking lifecycle jobs
//! 6. Build HTTP router with routes and middleware
//! 7. Start server on configured port

mod config;
mod crypto;
mod db;
mod error;
mod handlers;
mod jobs;
mod middleware;
mod models;
mod services;
mod state;

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::crypto::key_management::MasterKey;
use crate::services::{email_service::Mailer, image_service::ImageStore};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Parse the master key before touching the database; a bad key must
    // fail startup, not the first signup
    let master_key = MasterKey::from_hex(&config.master_key)?;

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    // Outbound clients; both degrade to logging no-ops when unconfigured
    let mailer = Mailer::from_config(
        config.mail_provider_url.clone(),
        config.mail_provider_api_key.clone(),
    )?;
    let images = ImageStore::from_config(
        config.image_store_url.clone(),
        config.image_store_secret.clone(),
    )?;

    let state = AppState {
        pool: pool.clone(),
        master_key,
        mailer: mailer.clone(),
        images,
        scheduler: jobs::scheduler::JobScheduler::default(),
    };

    // Periodic sweeps: stale-booking expiry, overdue-return bumping,
    // owner escrow release, compensation-deadline bans
    tokio::spawn(jobs::scheduler::run_periodic(
        pool,
        mailer,
        config.job_interval_secs,
    ));
    tracing::info!(
        interval_secs = config.job_interval_secs,
        "Booking lifecycle jobs scheduled"
    );

    // Create authenticated routes (API endpoints)
    let authenticated_routes = Router::new()
        // User routes
        .route("/api/v1/users/me", get(handlers::users::get_me))
        .route(
            "/api/v1/users/me/license",
            put(handlers::users::update_my_license),
        )
        .route(
            "/api/v1/users/{id}/license/review",
            post(handlers::users::review_license),
        )
        .route("/api/v1/users/{id}/ban", post(handlers::users::set_ban))
        .route("/api/v1/users/{id}", delete(handlers::users::delete_user))
        // Car routes
        .route("/api/v1/cars", post(handlers::cars::create_car))
        .route("/api/v1/cars", get(handlers::cars::list_cars))
        .route("/api/v1/cars/{id}", get(handlers::cars::get_car))
        .route(
            "/api/v1/cars/{id}/activate",
            post(handlers::cars::activate_car),
        )
        // Inspection routes
        .route(
            "/api/v1/inspections",
            post(handlers::inspections::create_inspection),
        )
        .route(
            "/api/v1/inspections/{id}/start",
            post(handlers::inspections::start_inspection),
        )
        .route(
            "/api/v1/inspections/{id}/approve",
            post(handlers::inspections::approve_inspection),
        )
        .route(
            "/api/v1/inspections/{id}/reject",
            post(handlers::inspections::reject_inspection),
        )
        .route(
            "/api/v1/cars/{id}/inspections",
            get(handlers::inspections::list_car_inspections),
        )
        // GPS device routes
        .route(
            "/api/v1/devices/assign",
            post(handlers::devices::assign_device),
        )
        .route("/api/v1/devices", get(handlers::devices::list_devices))
        .route(
            "/api/v1/devices/{id}/switch",
            post(handlers::devices::switch_device),
        )
        .route(
            "/api/v1/devices/{id}/unassign",
            post(handlers::devices::unassign_device),
        )
        .route(
            "/api/v1/devices/{id}/maintenance",
            put(handlers::devices::set_maintenance),
        )
        .route(
            "/api/v1/devices/{id}",
            delete(handlers::devices::delete_device),
        )
        // Booking routes
        .route("/api/v1/bookings", post(handlers::bookings::create_booking))
        .route("/api/v1/bookings", get(handlers::bookings::list_bookings))
        .route("/api/v1/bookings/{id}", get(handlers::bookings::get_booking))
        .route(
            "/api/v1/bookings/{id}/approve",
            post(handlers::bookings::approve_booking),
        )
        .route(
            "/api/v1/bookings/{id}/reject",
            post(handlers::bookings::reject_booking),
        )
        .route(
            "/api/v1/bookings/{id}/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/v1/bookings/{id}/pay",
            post(handlers::bookings::pay_booking),
        )
        .route(
            "/api/v1/bookings/{id}/ready",
            post(handlers::bookings::mark_ready),
        )
        .route(
            "/api/v1/bookings/{id}/pickup",
            post(handlers::bookings::start_rental),
        )
        .route(
            "/api/v1/bookings/{id}/return",
            post(handlers::bookings::return_car),
        )
        .route(
            "/api/v1/bookings/{id}/complete",
            post(handlers::bookings::complete_booking),
        )
        // Report routes
        .route("/api/v1/reports", post(handlers::reports::create_report))
        .route(
            "/api/v1/reports/{id}/review",
            post(handlers::reports::start_review),
        )
        .route(
            "/api/v1/reports/{id}/resolve",
            post(handlers::reports::resolve_report),
        )
        .route(
            "/api/v1/reports/{id}/reject",
            post(handlers::reports::reject_report),
        )
        .route(
            "/api/v1/reports/{id}/compensation",
            post(handlers::reports::pay_compensation),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Combine authenticated routes with public routes
    let app = Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/users/signup", post(handlers::users::signup))
        // Merge authenticated routes
        .merge(authenticated_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share application state with all handlers via State extraction
        .with_state(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests
    // This blocks forever, handling requests concurrently with tokio
    axum::serve(listener, app).await?;

    Ok(())
}
