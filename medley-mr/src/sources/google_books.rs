//! Google Books adapter
//!
//! Volumes search with `intitle:`/`inauthor:` qualifiers, or `isbn:` when
//! an identifier is available. An API key raises quota but is not
//! required, so this adapter stays enabled without one.

use crate::cache::{cache_key, ttl};
use crate::matcher::{
    self, CANDIDATE_EXACT_TITLE, CANDIDATE_FLOOR, CANDIDATE_PARTIAL_TITLE,
};
use crate::models::{BookPartial, BookQuery, SeriesInfo, Source, SourceRating};
use crate::sources::{BookSource, SourceContext, SourceHit};
use async_trait::async_trait;
use medley_common::{Error, Result};
use serde::Deserialize;
use tracing::{debug, warn};

const BASE_URL: &str = "https://www.googleapis.com/books/v1";
const SEARCH_LIMIT: u32 = 10;

const AUTHOR_BONUS: f64 = 30.0;

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    items: Option<Vec<Volume>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    id: String,
    volume_info: VolumeInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    authors: Option<Vec<String>>,
    publisher: Option<String>,
    published_date: Option<String>,
    description: Option<String>,
    industry_identifiers: Option<Vec<IndustryIdentifier>>,
    page_count: Option<u32>,
    categories: Option<Vec<String>>,
    average_rating: Option<f64>,
    ratings_count: Option<u64>,
    image_links: Option<ImageLinks>,
    language: Option<String>,
    info_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    id_type: String,
    identifier: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageLinks {
    small_thumbnail: Option<String>,
    thumbnail: Option<String>,
    small: Option<String>,
    medium: Option<String>,
    large: Option<String>,
    extra_large: Option<String>,
}

impl ImageLinks {
    /// Highest-resolution variant offered
    fn best(self) -> Option<String> {
        self.extra_large
            .or(self.large)
            .or(self.medium)
            .or(self.small)
            .or(self.thumbnail)
            .or(self.small_thumbnail)
    }
}

pub struct GoogleBooksSource {
    ctx: SourceContext,
    api_key: Option<String>,
}

impl GoogleBooksSource {
    pub fn new(ctx: SourceContext, api_key: Option<String>) -> Self {
        Self { ctx, api_key }
    }

    async fn lookup_inner(&self, query: &BookQuery) -> Result<Option<SourceHit>> {
        let tag = Source::GoogleBooks.as_str();
        let key = cache_key(
            tag,
            &[
                Some("book"),
                query.isbn.as_deref().map(|_| "isbn"),
                query.isbn.as_deref(),
                query.isbn.is_none().then_some(query.title.as_str()),
                query.author.as_deref().filter(|_| query.isbn.is_none()),
            ],
        );

        if let Some(hit) = self.ctx.cache.get::<BookPartial>(&key).await? {
            return Ok(Some(SourceHit::cached(hit)));
        }

        let q = match &query.isbn {
            // Identifier search is unambiguous; no fuzzy selection needed
            Some(isbn) => format!("isbn:{}", isbn.trim()),
            None => match &query.author {
                Some(author) => format!("intitle:{} inauthor:{}", query.title, author),
                None => format!("intitle:{}", query.title),
            },
        };

        let mut params = vec![("q", q), ("maxResults", SEARCH_LIMIT.to_string())];
        if let Some(api_key) = &self.api_key {
            params.push(("key", api_key.clone()));
        }

        let url = format!("{}/volumes", BASE_URL);
        let response: VolumesResponse = self.ctx.http.get_json(tag, &url, &params).await?;
        let volumes = response.items.unwrap_or_default();

        let best = if query.isbn.is_some() {
            volumes.into_iter().next()
        } else {
            best_candidate(&query.title, query.author.as_deref(), volumes)
        };

        let Some(volume) = best else {
            debug!(title = %query.title, "No Google Books candidate cleared the floor");
            return Ok(None);
        };

        let partial = partial_from_volume(volume);
        self.ctx
            .cache
            .set(&key, &partial, tag, Some(ttl::BOOK_METADATA_HOURS))
            .await?;

        Ok(Some(SourceHit::fresh(partial)))
    }
}

#[async_trait]
impl BookSource for GoogleBooksSource {
    fn source(&self) -> Source {
        Source::GoogleBooks
    }

    async fn lookup(&self, query: &BookQuery) -> Option<SourceHit> {
        match self.lookup_inner(query).await {
            Ok(result) => result,
            Err(Error::NotFound(_)) => None,
            Err(e) => {
                warn!(title = %query.title, error = %e, "Google Books lookup failed");
                None
            }
        }
    }
}

fn score_candidate(query_title: &str, query_author: Option<&str>, volume: &Volume) -> f64 {
    let Some(title) = volume.volume_info.title.as_deref() else {
        return 0.0;
    };

    let nq = matcher::normalize(query_title);
    let nt = matcher::normalize(title);

    let mut score = if !nq.is_empty() && nq == nt {
        CANDIDATE_EXACT_TITLE
    } else if !nq.is_empty() && !nt.is_empty() && (nq.contains(&nt) || nt.contains(&nq)) {
        CANDIDATE_PARTIAL_TITLE
    } else {
        0.0
    };

    if let (Some(qa), Some(authors)) = (query_author, volume.volume_info.authors.as_ref()) {
        if authors
            .iter()
            .any(|a| matcher::is_fuzzy_match(qa, a, matcher::FUZZY_THRESHOLD))
        {
            score += AUTHOR_BONUS;
        }
    }

    score += volume.volume_info.ratings_count.unwrap_or(0).min(1000) as f64 / 1000.0;
    score
}

fn best_candidate(
    query_title: &str,
    query_author: Option<&str>,
    volumes: Vec<Volume>,
) -> Option<Volume> {
    volumes
        .into_iter()
        .map(|volume| {
            let score = score_candidate(query_title, query_author, &volume);
            (volume, score)
        })
        .filter(|(_, score)| *score >= CANDIDATE_FLOOR)
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(volume, _)| volume)
}

fn partial_from_volume(volume: Volume) -> BookPartial {
    let mut partial = BookPartial::new(Source::GoogleBooks);
    let info = volume.volume_info;

    if let Some(title) = info.title {
        let extracted = matcher::extract_series_from_title(&title);
        partial.title = Some(extracted.clean_title);
        if let Some(name) = extracted.series_name {
            partial.series = Some(SeriesInfo {
                name,
                position: extracted.series_position,
            });
        }
    }

    partial.authors = info.authors.unwrap_or_default();
    partial.publisher = info.publisher;
    partial.publish_year = info
        .published_date
        .as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse().ok());
    partial.description = info.description;
    partial.page_count = info.page_count;
    partial.genres = info.categories.unwrap_or_default();
    partial.language = info.language;
    partial.cover_url = info.image_links.and_then(ImageLinks::best);
    partial.source_url = info.info_link;

    for id in info.industry_identifiers.unwrap_or_default() {
        match id.id_type.as_str() {
            "ISBN_10" if partial.isbn_10.is_none() => partial.isbn_10 = Some(id.identifier),
            "ISBN_13" if partial.isbn_13.is_none() => partial.isbn_13 = Some(id.identifier),
            _ => {}
        }
    }

    if let Some(average) = info.average_rating {
        partial.rating = Some(SourceRating {
            source: Source::GoogleBooks,
            average,
            count: info.ratings_count,
        });
    }

    partial.identifier = Some(volume.id);
    partial
}
