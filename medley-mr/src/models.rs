//! Record shapes shared across sources, merge, and the API surface
//!
//! Partial records are the sparse per-source fragments produced by one
//! adapter call; canonical records are the fully merged outputs. Nullable
//! scalars serialize as `null` (never omitted) so downstream consumers see
//! a stable shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upstream metadata providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    OpenLibrary,
    GoogleBooks,
    Goodreads,
    Tmdb,
}

impl Source {
    /// Lowercase tag used in cache keys, `_meta` blocks, and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::OpenLibrary => "open_library",
            Source::GoogleBooks => "google_books",
            Source::Goodreads => "goodreads",
            Source::Tmdb => "tmdb",
        }
    }

    /// All book providers, in global priority order (highest first)
    pub const BOOK_SOURCES: [Source; 3] =
        [Source::Goodreads, Source::GoogleBooks, Source::OpenLibrary];
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rating as reported by one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRating {
    pub source: Source,
    /// Average rating on the source's native scale
    pub average: f64,
    /// Number of ratings behind the average, when reported
    pub count: Option<u64>,
}

/// Series membership for a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesInfo {
    pub name: String,
    /// 1-based position within the series, when known
    pub position: Option<f32>,
}

/// Single-source, possibly-incomplete book metadata fragment.
///
/// Created and owned by the adapter call that produced it; never mutated
/// after construction; consumed by value in the merge engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookPartial {
    pub source: Source,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub isbn_10: Option<String>,
    pub isbn_13: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub publish_year: Option<i32>,
    pub page_count: Option<u32>,
    pub genres: Vec<String>,
    pub subjects: Vec<String>,
    pub language: Option<String>,
    pub cover_url: Option<String>,
    pub rating: Option<SourceRating>,
    pub series: Option<SeriesInfo>,
    /// Provider-native identifier (OLID, volume id, Goodreads work id)
    pub identifier: Option<String>,
    pub source_url: Option<String>,
}

impl BookPartial {
    /// Empty fragment attributed to `source`
    pub fn new(source: Source) -> Self {
        Self {
            source,
            title: None,
            authors: Vec::new(),
            isbn_10: None,
            isbn_13: None,
            description: None,
            publisher: None,
            publish_year: None,
            page_count: None,
            genres: Vec::new(),
            subjects: Vec::new(),
            language: None,
            cover_url: None,
            rating: None,
            series: None,
            identifier: None,
            source_url: None,
        }
    }
}

/// Confidence tier summarizing how much corroborating data backed a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

/// Provenance and quality metadata attached to every canonical record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Every source the lookup queried (superset of `sources_failed`)
    pub sources_queried: Vec<Source>,
    /// Sources that failed or produced no acceptable match
    pub sources_failed: Vec<Source>,
    /// Highest-priority source that contributed
    pub primary_source: Source,
    pub confidence: ConfidenceTier,
    /// True when the answer was served without any upstream call
    pub cached: bool,
    /// ISO-8601 resolution timestamp
    pub resolved_at: String,
}

/// Fully merged, canonical book record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,
    pub authors: Vec<String>,
    pub isbn_10: Option<String>,
    pub isbn_13: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub publish_year: Option<i32>,
    pub page_count: Option<u32>,
    pub genres: Vec<String>,
    pub subjects: Vec<String>,
    pub language: Option<String>,
    pub cover_url: Option<String>,
    pub series: Option<SeriesInfo>,
    pub ratings: Vec<SourceRating>,
    /// Provider-native identifier per known book source (`null` where absent)
    pub identifiers: BTreeMap<String, Option<String>>,
    /// Source page URL per known book source (`null` where absent)
    pub source_urls: BTreeMap<String, Option<String>>,
    #[serde(rename = "_meta")]
    pub meta: RecordMeta,
}

/// Collection (film series) membership for a movie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    /// 1-based ordinal by release date within the collection;
    /// `null` when the queried title is undated or absent
    pub position: Option<u32>,
}

/// Watch availability for one region, partitioned by acquisition model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderBuckets {
    pub stream: Vec<String>,
    pub rent: Vec<String>,
    pub buy: Vec<String>,
}

/// Canonical movie record (single authoritative source)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieRecord {
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub release_date: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub overview: Option<String>,
    pub genres: Vec<String>,
    /// First credited director (full list in `directors`)
    pub director: Option<String>,
    pub directors: Vec<String>,
    pub cast: Vec<String>,
    pub collection: Option<CollectionInfo>,
    pub rating: Option<SourceRating>,
    pub poster_url: Option<String>,
    pub watch_providers: BTreeMap<String, ProviderBuckets>,
    pub tmdb_id: u64,
    pub imdb_id: Option<String>,
    pub source_url: Option<String>,
    #[serde(rename = "_meta")]
    pub meta: RecordMeta,
}

/// One episode of a TV season
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub episode_number: u32,
    pub name: Option<String>,
    pub air_date: Option<String>,
    pub overview: Option<String>,
    pub runtime_minutes: Option<u32>,
}

/// One season of a TV show
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonInfo {
    pub season_number: u32,
    pub name: Option<String>,
    pub air_date: Option<String>,
    pub episode_count: Option<u32>,
    pub overview: Option<String>,
    /// Populated only when episode detail was requested
    pub episodes: Option<Vec<EpisodeInfo>>,
}

/// Canonical TV show record (single authoritative source)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvRecord {
    pub title: String,
    pub original_title: Option<String>,
    pub first_air_year: Option<i32>,
    pub first_air_date: Option<String>,
    pub last_air_date: Option<String>,
    /// Upstream status string ("Returning Series", "Ended", ...)
    pub status: Option<String>,
    pub in_production: bool,
    pub number_of_seasons: Option<u32>,
    pub number_of_episodes: Option<u32>,
    pub overview: Option<String>,
    pub genres: Vec<String>,
    pub creators: Vec<String>,
    pub networks: Vec<String>,
    pub rating: Option<SourceRating>,
    pub poster_url: Option<String>,
    /// Populated only when season detail was requested
    pub seasons: Option<Vec<SeasonInfo>>,
    pub watch_providers: BTreeMap<String, ProviderBuckets>,
    pub tmdb_id: u64,
    pub source_url: Option<String>,
    #[serde(rename = "_meta")]
    pub meta: RecordMeta,
}

/// Book lookup query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookQuery {
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    /// Restrict the lookup to these sources (default: all enabled)
    pub sources: Option<Vec<Source>>,
}

/// Movie lookup query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieQuery {
    pub title: String,
    pub year: Option<i32>,
    pub tmdb_id: Option<u64>,
}

/// TV lookup query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvQuery {
    pub title: String,
    pub year: Option<i32>,
    pub tmdb_id: Option<u64>,
    #[serde(default)]
    pub include_seasons: bool,
    #[serde(default)]
    pub include_episodes: bool,
    /// Include season 0 ("specials"); excluded by default
    #[serde(default)]
    pub include_specials: bool,
}

/// Deduplicate case-insensitively while preserving first-seen order
pub fn dedupe_preserving_order(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for value in values {
        let folded = value.to_lowercase();
        if seen.insert(folded) {
            out.push(value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tags_are_lowercase_snake() {
        assert_eq!(Source::OpenLibrary.as_str(), "open_library");
        assert_eq!(Source::GoogleBooks.as_str(), "google_books");
        assert_eq!(Source::Tmdb.as_str(), "tmdb");
    }

    #[test]
    fn dedupe_is_case_insensitive_and_order_preserving() {
        let deduped = dedupe_preserving_order(vec![
            "Fantasy".to_string(),
            "fantasy".to_string(),
            "Epic Fantasy".to_string(),
            "FANTASY".to_string(),
        ]);
        assert_eq!(deduped, vec!["Fantasy", "Epic Fantasy"]);
    }

    #[test]
    fn absent_scalars_serialize_as_null() {
        let partial = BookPartial::new(Source::OpenLibrary);
        let json = serde_json::to_value(&partial).unwrap();
        assert!(json.get("isbn_13").unwrap().is_null());
        assert!(json.get("page_count").unwrap().is_null());
    }

    #[test]
    fn confidence_tier_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ConfidenceTier::High).unwrap(),
            "\"high\""
        );
    }
}
