//! HTTP API surface
//!
//! Deliberately thin: deserialization, bound checks, and error-to-status
//! mapping only. Lookup semantics live in the resolver.

pub mod cache_admin;
pub mod error;
pub mod health;
pub mod lookup;

pub use cache_admin::cache_routes;
pub use error::{ApiError, ApiResult};
pub use health::health_routes;
pub use lookup::lookup_routes;
