//! HTTP endpoints for mtpanel.
//!
//! Provides the health check and the bearer-protected admin API.

mod api;
mod auth;
pub mod health;

use crate::server::ProxyPanel;
use axum::{
    middleware,
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;

pub use api::{ApiError, ClientList, ClientView};
pub use auth::AuthState;
pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
///
/// Every `/api` route requires `Authorization: Bearer <admin_token>`.
pub fn build_router(panel: Arc<ProxyPanel>, admin_token: impl Into<String>) -> Router {
    let api = Router::new()
        .route("/status", get(api::status))
        .route("/clients", get(api::list_clients).post(api::create_client))
        .route(
            "/clients/:id",
            get(api::get_client)
                .put(api::update_client)
                .delete(api::delete_client),
        )
        .route("/sync", post(api::manual_sync))
        .route("/cleanup-expired", post(api::cleanup_expired))
        .route_layer(middleware::from_fn_with_state(
            AuthState::new(admin_token),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/api", api)
        .layer(Extension(panel))
}
