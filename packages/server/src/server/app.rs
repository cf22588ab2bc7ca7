//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::server::middleware::identity_middleware;
use crate::server::routes::{health_handler, package, signatures, submissions, transitions};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<Config>,
}

/// Build the Axum application router
pub fn build_app(pool: PgPool, config: Config) -> Router {
    let app_state = AppState {
        db_pool: pool,
        config: Arc::new(config),
    };

    // CORS configuration - allow any origin for development
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    // Every /requisitions route requires a forwarded identity; /health does not.
    let api = Router::new()
        .route("/requisitions", post(package::create_requisition_handler))
        .route(
            "/requisitions/:id/package",
            get(package::edit_package_handler),
        )
        .route(
            "/requisitions/:id/package/heartbeat",
            post(package::heartbeat_handler),
        )
        .route(
            "/requisitions/:id/package/release",
            post(package::release_handler),
        )
        .route(
            "/requisitions/:id/package/force-release",
            post(package::force_release_handler),
        )
        .route("/requisitions/:id/lock", get(package::lock_status_handler))
        .route("/requisitions/:id/lines", post(package::save_lines_handler))
        .route("/requisitions/:id/sign", post(signatures::sign_handler))
        .route("/requisitions/:id/un-sign", post(signatures::unsign_handler))
        .route("/requisitions/:id/comment", post(signatures::comment_handler))
        .route("/requisitions/:id/submit", post(transitions::submit_handler))
        .route(
            "/requisitions/:id/record-invitations",
            post(transitions::record_invitations_handler),
        )
        .route(
            "/requisitions/:id/record-manual-entry",
            post(transitions::record_manual_entry_handler),
        )
        .route(
            "/requisitions/:id/request-approval",
            post(transitions::request_approval_handler),
        )
        .route(
            "/requisitions/:id/manager-approve",
            post(transitions::manager_approve_handler),
        )
        .route(
            "/requisitions/:id/manager-reject",
            post(transitions::manager_reject_handler),
        )
        .route(
            "/requisitions/:id/manager-return",
            post(transitions::manager_return_handler),
        )
        .route(
            "/requisitions/:id/manager-archive",
            post(transitions::manager_archive_handler),
        )
        .route(
            "/requisitions/:id/submit-changes",
            post(transitions::submit_changes_handler),
        )
        .route(
            "/requisitions/:id/approve-changes",
            post(transitions::approve_changes_handler),
        )
        .route(
            "/requisitions/:id/reject-changes",
            post(transitions::reject_changes_handler),
        )
        .route("/requisitions/:id/close", post(transitions::close_handler))
        .route(
            "/requisitions/:id/submissions",
            post(submissions::record_submission_handler),
        )
        .route(
            "/requisitions/:id/reference-prices",
            get(submissions::reference_prices_handler),
        )
        .route(
            "/requisitions/:id/recommendation",
            get(submissions::recommendation_handler),
        )
        .layer(middleware::from_fn(identity_middleware));

    api.route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
