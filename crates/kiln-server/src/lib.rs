//! Kiln Server
//!
//! HTTP server for the Kiln workspace sync protocol: a client and this
//! server jointly maintain the canonical state of a file tree. Phase 1
//! (`/sync`) plans per-file actions and hands out upload URLs; phase 2
//! (`/sync/confirm`) commits metadata atomically under optimistic
//! concurrency control. File bytes never pass through this process.
//!
//! Uses SQLite (embedded) as the transactional version store.

pub mod extractors;
pub mod gateway;
pub mod handlers;
pub mod services;
pub mod storage;

use axum::{
    routing::{get, post},
    Router,
};
use kiln_core::ports::{BlobGateway, MembershipPort};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use services::{AuthService, ConfirmCommitter, ManifestReader, StoreMembership, SyncPlanner};
use storage::Database;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth_service: Arc<AuthService>,
    pub membership: Arc<dyn MembershipPort>,
    pub planner: Arc<SyncPlanner>,
    pub committer: Arc<ConfirmCommitter>,
    pub manifest: Arc<ManifestReader>,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        gateway: Arc<dyn BlobGateway>,
        jwt_secret: String,
        upload_ttl: Duration,
        download_ttl: Duration,
    ) -> Self {
        let auth_service = Arc::new(AuthService::new(jwt_secret));
        let membership: Arc<dyn MembershipPort> = Arc::new(StoreMembership::new(db.clone()));
        let planner = Arc::new(SyncPlanner::new(db.clone(), gateway.clone(), upload_ttl));
        let committer = Arc::new(ConfirmCommitter::new(db.clone(), gateway.clone()));
        let manifest = Arc::new(ManifestReader::new(db.clone(), gateway, download_ttl));

        Self {
            db,
            auth_service,
            membership,
            planner,
            committer,
            manifest,
        }
    }
}

/// Builds the HTTP router with every protocol route mounted.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/workspaces", post(handlers::workspaces::create))
        .route("/workspaces/:id", get(handlers::workspaces::get))
        .route(
            "/workspaces/:id/manifest",
            get(handlers::workspaces::manifest),
        )
        .route("/workspaces/:id/sync", post(handlers::sync::sync))
        .route(
            "/workspaces/:id/sync/confirm",
            post(handlers::sync::confirm),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
