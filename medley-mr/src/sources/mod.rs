//! Source adapters
//!
//! One adapter per upstream provider, behind a common seam. Every adapter
//! follows the same discipline: cache lookup first, then a rate-limited
//! HTTP call, then fuzzy best-candidate selection, then a cache write.
//! Ordinary not-found is `None`; transport and parsing failures are
//! logged and swallowed to `None` at this layer; the resolver aggregates
//! failure visibility.

pub mod client;
pub mod goodreads;
pub mod google_books;
pub mod open_library;
pub mod tmdb;

use crate::cache::MetadataCache;
use crate::models::{BookPartial, BookQuery, Source};
use async_trait::async_trait;
use client::HttpClient;
use std::sync::Arc;

pub use goodreads::GoodreadsSource;
pub use google_books::GoogleBooksSource;
pub use open_library::OpenLibrarySource;
pub use tmdb::TmdbSource;

/// Shared collaborators handed to every adapter at construction.
///
/// The cache and rate limiter (inside [`HttpClient`]) are process-wide
/// singletons; adapters never construct their own.
#[derive(Clone)]
pub struct SourceContext {
    pub http: Arc<HttpClient>,
    pub cache: Arc<MetadataCache>,
}

/// One adapter hit, flagged when it was served entirely from cache
pub struct SourceHit {
    pub partial: BookPartial,
    pub cached: bool,
}

impl SourceHit {
    pub fn fresh(partial: BookPartial) -> Self {
        Self { partial, cached: false }
    }

    pub fn cached(partial: BookPartial) -> Self {
        Self { partial, cached: true }
    }
}

/// Common contract for book providers.
///
/// Returns one partial record or `None` ("no sufficiently confident
/// match"). Implementations never propagate errors from here.
#[async_trait]
pub trait BookSource: Send + Sync {
    fn source(&self) -> Source;

    async fn lookup(&self, query: &BookQuery) -> Option<SourceHit>;
}
