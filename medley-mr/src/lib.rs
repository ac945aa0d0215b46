//! medley-mr - Metadata Resolver service
//!
//! Resolves book, movie, and TV metadata by querying multiple upstream
//! providers concurrently, reconciling the partial answers into one
//! canonical record with provenance and a confidence tier.

pub mod api;
pub mod cache;
pub mod config;
pub mod matcher;
pub mod merge;
pub mod models;
pub mod rate_limit;
pub mod resolver;
pub mod sources;

pub use crate::api::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::cache::MetadataCache;
use crate::resolver::Resolver;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    pub cache: Arc<MetadataCache>,
    /// Whether a TMDB adapter was registered at startup
    pub screen_enabled: bool,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(resolver: Arc<Resolver>, cache: Arc<MetadataCache>, screen_enabled: bool) -> Self {
        Self {
            resolver,
            cache,
            screen_enabled,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::lookup_routes())
        .merge(api::cache_routes())
        .merge(api::health_routes())
        .with_state(state)
}
