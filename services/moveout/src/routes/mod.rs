//! MoveOut service routes

pub mod auth;
pub mod customers;
pub mod labels;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use crate::{AppState, middleware::log_request};

/// Multipart bodies (label media) are capped at 25 MiB
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Create the router for the MoveOut service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Identity & session
        .route("/api/register", post(auth::register))
        .route("/api/verify", get(auth::verify))
        .route("/api/login", post(auth::login))
        .route("/api/auth/google", get(auth::google_login))
        .route("/api/auth/google/callback", get(auth::google_callback))
        .route("/api/update-password", post(auth::update_password))
        // Label domain
        .route(
            "/api/labels",
            get(labels::list_labels).post(labels::create_label),
        )
        .route(
            "/api/labels/:id",
            get(labels::get_label).put(labels::update_label),
        )
        .route("/api/label/:id/action", post(labels::label_action))
        .route("/api/description/:id", get(labels::get_description))
        .route("/api/customers/:id/labels", get(labels::list_customer_labels))
        // Customer administration
        .route("/api/customers", get(customers::list_customers))
        .route("/api/customers/:id", get(customers::get_customer))
        .route("/api/promote-to-admin/:id", post(customers::promote_to_admin))
        .route(
            "/api/deactivate-customer/:id",
            post(customers::deactivate_customer),
        )
        .route(
            "/api/activate-customer/:id",
            post(customers::activate_customer),
        )
        .route("/api/deactivate-account", post(customers::deactivate_account))
        .route("/api/marketing-mail", post(customers::marketing_mail))
        .route("/api/share-label", post(customers::share_label))
        .route(
            "/api/request-delete-account",
            post(customers::request_delete_account),
        )
        .route("/api/delete-account", post(customers::delete_account))
        .layer(middleware::from_fn(log_request))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "moveout"
    }))
}
