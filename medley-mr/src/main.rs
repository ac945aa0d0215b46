//! medley-mr - Metadata Resolver service
//!
//! Process bootstrap: tracing, configuration, cache, rate limiter,
//! adapter registration, HTTP server.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use medley_mr::cache::MetadataCache;
use medley_mr::config::ServiceConfig;
use medley_mr::rate_limit::RateLimiter;
use medley_mr::resolver::Resolver;
use medley_mr::sources::{
    client::HttpClient, BookSource, GoodreadsSource, GoogleBooksSource, OpenLibrarySource,
    SourceContext, TmdbSource,
};
use medley_mr::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting medley-mr (Metadata Resolver)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load()?;

    let cache = if config.cache.enabled {
        let path = config.cache_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), "Opening metadata cache");
        Arc::new(MetadataCache::open(&path, true, config.cache.default_ttl_hours).await?)
    } else {
        warn!("Caching disabled; every lookup will hit upstream providers");
        Arc::new(MetadataCache::disabled().await?)
    };

    let limiter = Arc::new(RateLimiter::new());
    for (source, limit) in &config.rate_limits {
        limiter
            .configure(source, limit.requests_per_window, limit.window_ms)
            .await;
    }

    let http = Arc::new(HttpClient::new(Arc::clone(&limiter))?);
    let ctx = SourceContext {
        http,
        cache: Arc::clone(&cache),
    };

    // Register whichever providers the configuration enables
    let mut book_sources: Vec<Arc<dyn BookSource>> =
        vec![Arc::new(OpenLibrarySource::new(ctx.clone()))];
    book_sources.push(Arc::new(GoogleBooksSource::new(
        ctx.clone(),
        config.google_books_api_key.clone(),
    )));
    if config.scraping_enabled {
        book_sources.push(Arc::new(GoodreadsSource::new(ctx.clone())));
    } else {
        info!("Scraping disabled; Goodreads adapter not registered");
    }

    let tmdb = match &config.tmdb_api_key {
        Some(key) => Some(Arc::new(TmdbSource::new(ctx, key.clone()))),
        None => {
            warn!("No TMDB API key configured; movie/TV lookups disabled");
            None
        }
    };
    let screen_enabled = tmdb.is_some();

    let resolver = Arc::new(Resolver::new(book_sources, tmdb));
    info!(
        book_sources = ?resolver.enabled_book_sources(),
        screen_enabled,
        "Adapters registered"
    );

    let state = AppState::new(resolver, cache, screen_enabled);
    let app = medley_mr::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Listening on http://{}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
