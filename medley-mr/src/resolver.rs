//! Resolution orchestration
//!
//! Fans a lookup out to every enabled, requested adapter concurrently,
//! aggregates hits and failures, and hands book results to the merge
//! engine. Screen media has one authoritative source, so those lookups
//! pass through a single adapter. Batch lookups run in fixed-size
//! concurrency chunks, sequential between chunks, and one item's failure
//! never aborts the rest.

use crate::merge::merge_book_records;
use crate::models::{BookQuery, BookRecord, MovieQuery, MovieRecord, Source, TvQuery, TvRecord};
use crate::sources::{BookSource, TmdbSource};
use futures::future::join_all;
use medley_common::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const BATCH_MAX_ITEMS: usize = 50;
pub const BATCH_DEFAULT_CONCURRENCY: usize = 3;
pub const BATCH_MIN_CONCURRENCY: usize = 1;
pub const BATCH_MAX_CONCURRENCY: usize = 10;

/// Per-item outcome of a batch lookup, tagged with the item's position
/// in the request so callers can correlate
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchOutcome {
    Ok {
        index: usize,
        record: Box<BookRecord>,
    },
    Error {
        index: usize,
        kind: &'static str,
        message: String,
        retryable: bool,
    },
}

pub struct Resolver {
    book_sources: Vec<Arc<dyn BookSource>>,
    tmdb: Option<Arc<TmdbSource>>,
}

impl Resolver {
    /// Adapters are registered once at startup; a provider whose
    /// credentials or config are missing is simply never registered.
    pub fn new(book_sources: Vec<Arc<dyn BookSource>>, tmdb: Option<Arc<TmdbSource>>) -> Self {
        Self { book_sources, tmdb }
    }

    pub fn enabled_book_sources(&self) -> Vec<Source> {
        self.book_sources.iter().map(|s| s.source()).collect()
    }

    pub async fn lookup_book(&self, query: &BookQuery) -> Result<BookRecord> {
        if query.title.trim().is_empty() {
            return Err(Error::Validation("book lookup requires a title".to_string()));
        }

        let adapters: Vec<&Arc<dyn BookSource>> = match &query.sources {
            Some(requested) => self
                .book_sources
                .iter()
                .filter(|a| requested.contains(&a.source()))
                .collect(),
            None => self.book_sources.iter().collect(),
        };

        if adapters.is_empty() {
            return Err(Error::Validation(
                "no enabled source matches the requested source list".to_string(),
            ));
        }

        let sources_queried: Vec<Source> = adapters.iter().map(|a| a.source()).collect();
        debug!(title = %query.title, sources = ?sources_queried, "Book lookup fan-out");

        let outcomes = join_all(
            adapters
                .iter()
                .map(|adapter| async move { (adapter.source(), adapter.lookup(query).await) }),
        )
        .await;

        let mut hits = Vec::new();
        let mut sources_failed = Vec::new();
        for (source, outcome) in outcomes {
            match outcome {
                Some(hit) => hits.push(hit),
                None => sources_failed.push(source),
            }
        }

        if hits.is_empty() {
            info!(title = %query.title, "No source produced an acceptable match");
            return Err(Error::NotFound(format!(
                "no source found a match for '{}'",
                query.title
            )));
        }

        // Served from cache only when every contributing source was
        let cached = hits.iter().all(|hit| hit.cached);
        let partials = hits.into_iter().map(|hit| hit.partial).collect();

        merge_book_records(partials, sources_queried, sources_failed, cached)
    }

    pub async fn lookup_movie(&self, query: &MovieQuery) -> Result<MovieRecord> {
        if query.title.trim().is_empty() && query.tmdb_id.is_none() {
            return Err(Error::Validation(
                "movie lookup requires a title or tmdb_id".to_string(),
            ));
        }
        self.screen_adapter()?.lookup_movie(query).await
    }

    pub async fn lookup_tv(&self, query: &TvQuery) -> Result<TvRecord> {
        if query.title.trim().is_empty() && query.tmdb_id.is_none() {
            return Err(Error::Validation(
                "tv lookup requires a title or tmdb_id".to_string(),
            ));
        }
        self.screen_adapter()?.lookup_tv(query).await
    }

    fn screen_adapter(&self) -> Result<&Arc<TmdbSource>> {
        self.tmdb
            .as_ref()
            .ok_or_else(|| Error::Auth("tmdb API key not configured".to_string()))
    }

    /// Batch book lookup: fixed-size concurrency chunks, sequential
    /// between chunks, one outcome per item in request order.
    pub async fn batch_books(
        &self,
        items: &[BookQuery],
        concurrency: Option<usize>,
    ) -> Result<Vec<BatchOutcome>> {
        if items.is_empty() {
            return Err(Error::Validation("batch requires at least one item".to_string()));
        }
        if items.len() > BATCH_MAX_ITEMS {
            return Err(Error::Validation(format!(
                "batch is limited to {} items, got {}",
                BATCH_MAX_ITEMS,
                items.len()
            )));
        }

        let chunk_size = clamp_concurrency(concurrency);
        info!(items = items.len(), chunk_size, "Batch book lookup");

        let mut outcomes = Vec::with_capacity(items.len());
        for (chunk_index, chunk) in items.chunks(chunk_size).enumerate() {
            let base = chunk_index * chunk_size;
            let results = join_all(chunk.iter().map(|query| self.lookup_book(query))).await;

            for (offset, result) in results.into_iter().enumerate() {
                let index = base + offset;
                outcomes.push(match result {
                    Ok(record) => BatchOutcome::Ok {
                        index,
                        record: Box::new(record),
                    },
                    Err(e) => {
                        warn!(index, error = %e, "Batch item failed");
                        BatchOutcome::Error {
                            index,
                            kind: e.kind(),
                            message: e.to_string(),
                            retryable: e.retryable(),
                        }
                    }
                });
            }
        }

        Ok(outcomes)
    }
}

fn clamp_concurrency(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(BATCH_DEFAULT_CONCURRENCY)
        .clamp(BATCH_MIN_CONCURRENCY, BATCH_MAX_CONCURRENCY)
}
