//! Lookup endpoints
//!
//! Thin layer over the resolver: deserialize, delegate, map errors. All
//! semantics live in the resolver and merge engine.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::ApiResult;
use crate::models::{BookQuery, BookRecord, MovieQuery, MovieRecord, TvQuery, TvRecord};
use crate::resolver::BatchOutcome;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<BookQuery>,
    pub concurrency: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<BatchOutcome>,
}

/// POST /book/lookup
pub async fn book_lookup(
    State(state): State<AppState>,
    Json(query): Json<BookQuery>,
) -> ApiResult<Json<BookRecord>> {
    info!(title = %query.title, "Book lookup");
    Ok(Json(state.resolver.lookup_book(&query).await?))
}

/// POST /book/batch
pub async fn book_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Json<BatchResponse>> {
    info!(items = request.items.len(), "Book batch lookup");
    let results = state
        .resolver
        .batch_books(&request.items, request.concurrency)
        .await?;
    Ok(Json(BatchResponse { results }))
}

/// POST /movie/lookup
pub async fn movie_lookup(
    State(state): State<AppState>,
    Json(query): Json<MovieQuery>,
) -> ApiResult<Json<MovieRecord>> {
    info!(title = %query.title, "Movie lookup");
    Ok(Json(state.resolver.lookup_movie(&query).await?))
}

/// POST /tv/lookup
pub async fn tv_lookup(
    State(state): State<AppState>,
    Json(query): Json<TvQuery>,
) -> ApiResult<Json<TvRecord>> {
    info!(title = %query.title, seasons = query.include_seasons, "TV lookup");
    Ok(Json(state.resolver.lookup_tv(&query).await?))
}

pub fn lookup_routes() -> Router<AppState> {
    Router::new()
        .route("/book/lookup", post(book_lookup))
        .route("/book/batch", post(book_batch))
        .route("/movie/lookup", post(movie_lookup))
        .route("/tv/lookup", post(tv_lookup))
}
