pub mod auth;
pub mod config;
pub mod entities;
pub mod errors;
pub mod filter;
pub mod migration;
pub mod models;
pub mod openapi;
pub mod queries;
pub mod routes;
pub mod seed;
pub mod slug;
pub mod sort;
pub mod traits;
pub mod uploads;
pub mod validation;

use std::sync::Arc;

use axum::Router;
use axum::extract::FromRef;
use sea_orm::DatabaseConnection;

pub use auth::{Credentials, SessionStore};
pub use config::Config;
pub use errors::ApiError;
pub use migration::Migrator;
pub use traits::CollectionResource;
pub use uploads::MediaStore;

/// Shared state handed to every handler
#[derive(Clone, FromRef)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub sessions: SessionStore,
    pub credentials: Arc<Credentials>,
    pub media: MediaStore,
}

impl AppState {
    #[must_use]
    pub fn new(db: DatabaseConnection, credentials: Credentials, media: MediaStore) -> Self {
        Self {
            db,
            sessions: SessionStore::new(),
            credentials: Arc::new(credentials),
            media,
        }
    }
}

/// Build the application router over `state`
pub fn build_router(state: AppState) -> Router {
    routes::router(state)
}
