//! TMDB adapter for movies and TV shows
//!
//! Single authoritative screen-media source, so there is no cross-source
//! merge: the adapter shapes a canonical record directly. Beyond basic
//! details it resolves director credits, collection membership with a
//! release-order position, per-region watch providers partitioned into
//! stream/rent/buy, and (for TV) lazily fetched season and episode
//! detail. An API key is required; without one the adapter is never
//! constructed.

use crate::cache::{cache_key, ttl};
use crate::matcher::{
    self, CANDIDATE_EXACT_TITLE, CANDIDATE_FLOOR, CANDIDATE_PARTIAL_TITLE,
};
use crate::merge::confidence_tier;
use crate::models::{
    CollectionInfo, EpisodeInfo, MovieQuery, MovieRecord, ProviderBuckets, RecordMeta,
    SeasonInfo, Source, SourceRating, TvQuery, TvRecord,
};
use crate::sources::SourceContext;
use medley_common::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

const BASE_URL: &str = "https://api.themoviedb.org/3";
const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/original";
const MOVIE_PAGE_URL: &str = "https://www.themoviedb.org/movie";
const TV_PAGE_URL: &str = "https://www.themoviedb.org/tv";

const YEAR_BONUS: f64 = 30.0;

/// Single-source records start here; filled fields add on top
const SCREEN_BASE_POINTS: i32 = 40;
const SCREEN_FIELD_POINTS: i32 = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Option<Vec<SearchResult>>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResult {
    id: u64,
    // Movies carry `title`, TV carries `name`
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    vote_count: Option<u64>,
}

impl SearchResult {
    fn display_title(&self) -> Option<&str> {
        self.title.as_deref().or(self.name.as_deref())
    }

    fn year(&self) -> Option<i32> {
        extract_year(self.release_date.as_deref().or(self.first_air_date.as_deref()))
    }
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CastMember {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CrewMember {
    name: String,
    job: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Credits {
    cast: Option<Vec<CastMember>>,
    crew: Option<Vec<CrewMember>>,
}

#[derive(Debug, Deserialize)]
struct CollectionRef {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct MovieDetails {
    id: u64,
    title: Option<String>,
    original_title: Option<String>,
    release_date: Option<String>,
    runtime: Option<u32>,
    overview: Option<String>,
    genres: Option<Vec<Genre>>,
    poster_path: Option<String>,
    vote_average: Option<f64>,
    vote_count: Option<u64>,
    imdb_id: Option<String>,
    belongs_to_collection: Option<CollectionRef>,
    credits: Option<Credits>,
}

#[derive(Debug, Clone, Deserialize)]
struct CollectionPart {
    id: u64,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    parts: Option<Vec<CollectionPart>>,
}

#[derive(Debug, Deserialize)]
struct ProviderRef {
    provider_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct RegionProviders {
    flatrate: Option<Vec<ProviderRef>>,
    rent: Option<Vec<ProviderRef>>,
    buy: Option<Vec<ProviderRef>>,
}

#[derive(Debug, Deserialize)]
struct ProvidersResponse {
    results: Option<BTreeMap<String, RegionProviders>>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeasonSummary {
    season_number: u32,
    name: Option<String>,
    air_date: Option<String>,
    episode_count: Option<u32>,
    overview: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EpisodeDetail {
    episode_number: u32,
    name: Option<String>,
    air_date: Option<String>,
    overview: Option<String>,
    runtime: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SeasonDetails {
    episodes: Option<Vec<EpisodeDetail>>,
}

#[derive(Debug, Deserialize)]
struct TvDetails {
    id: u64,
    name: Option<String>,
    original_name: Option<String>,
    first_air_date: Option<String>,
    last_air_date: Option<String>,
    status: Option<String>,
    in_production: Option<bool>,
    number_of_seasons: Option<u32>,
    number_of_episodes: Option<u32>,
    overview: Option<String>,
    genres: Option<Vec<Genre>>,
    created_by: Option<Vec<NamedRef>>,
    networks: Option<Vec<NamedRef>>,
    vote_average: Option<f64>,
    vote_count: Option<u64>,
    poster_path: Option<String>,
    seasons: Option<Vec<SeasonSummary>>,
}

pub struct TmdbSource {
    ctx: SourceContext,
    api_key: String,
}

impl TmdbSource {
    pub fn new(ctx: SourceContext, api_key: String) -> Self {
        Self { ctx, api_key }
    }

    fn params(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut params = vec![("api_key", self.api_key.clone())];
        params.extend(extra.iter().cloned());
        params
    }

    pub async fn lookup_movie(&self, query: &MovieQuery) -> Result<MovieRecord> {
        let tag = Source::Tmdb.as_str();
        let id_part = query.tmdb_id.map(|id| id.to_string());
        let year_part = query.year.map(|y| y.to_string());
        let key = cache_key(
            tag,
            &[
                Some("movie"),
                id_part.as_deref(),
                id_part.is_none().then_some(query.title.as_str()),
                year_part.as_deref().filter(|_| id_part.is_none()),
            ],
        );

        if let Some(mut hit) = self.ctx.cache.get::<MovieRecord>(&key).await? {
            hit.meta.cached = true;
            return Ok(hit);
        }

        let id = match query.tmdb_id {
            Some(id) => id,
            None => self.search_movie_id(query).await?,
        };

        let url = format!("{}/movie/{}", BASE_URL, id);
        let details: MovieDetails = self
            .ctx
            .http
            .get_json(tag, &url, &self.params(&[("append_to_response", "credits".into())]))
            .await?;

        let collection = match &details.belongs_to_collection {
            Some(col) => self.resolve_collection(col, details.id).await,
            None => None,
        };
        let watch_providers = self.fetch_providers("movie", details.id).await;

        let record = movie_record_from_details(details, collection, watch_providers);
        self.ctx
            .cache
            .set(&key, &record, tag, Some(ttl::SCREEN_METADATA_HOURS))
            .await?;

        Ok(record)
    }

    pub async fn lookup_tv(&self, query: &TvQuery) -> Result<TvRecord> {
        let tag = Source::Tmdb.as_str();
        let id_part = query.tmdb_id.map(|id| id.to_string());
        let year_part = query.year.map(|y| y.to_string());
        // Detail flags change the payload, so they are part of the key
        let key = cache_key(
            tag,
            &[
                Some("tv"),
                id_part.as_deref(),
                id_part.is_none().then_some(query.title.as_str()),
                year_part.as_deref().filter(|_| id_part.is_none()),
                query.include_seasons.then_some("seasons"),
                query.include_episodes.then_some("episodes"),
                query.include_specials.then_some("specials"),
            ],
        );

        if let Some(mut hit) = self.ctx.cache.get::<TvRecord>(&key).await? {
            hit.meta.cached = true;
            return Ok(hit);
        }

        let id = match query.tmdb_id {
            Some(id) => id,
            None => self.search_tv_id(query).await?,
        };

        let url = format!("{}/tv/{}", BASE_URL, id);
        let details: TvDetails = self
            .ctx
            .http
            .get_json(tag, &url, &self.params(&[("append_to_response", "credits".into())]))
            .await?;

        let seasons = if query.include_seasons {
            Some(self.resolve_seasons(&details, query).await)
        } else {
            None
        };
        let watch_providers = self.fetch_providers("tv", details.id).await;

        let in_production = details.in_production.unwrap_or(false);
        let record = tv_record_from_details(details, seasons, watch_providers);

        // Still-airing shows churn; finished ones barely move
        let ttl_hours = if in_production {
            ttl::AIRING_SEASONS_HOURS
        } else {
            ttl::SCREEN_METADATA_HOURS
        };
        self.ctx.cache.set(&key, &record, tag, Some(ttl_hours)).await?;

        Ok(record)
    }

    async fn search_movie_id(&self, query: &MovieQuery) -> Result<u64> {
        let tag = Source::Tmdb.as_str();
        let mut extra = vec![("query", query.title.clone())];
        if let Some(year) = query.year {
            extra.push(("year", year.to_string()));
        }

        let url = format!("{}/search/movie", BASE_URL);
        let response: SearchResponse = self
            .ctx
            .http
            .get_json(tag, &url, &self.params(&extra))
            .await?;

        best_candidate(&query.title, query.year, response.results.unwrap_or_default())
            .map(|result| result.id)
            .ok_or_else(|| Error::NotFound(format!("tmdb: no movie match for '{}'", query.title)))
    }

    async fn search_tv_id(&self, query: &TvQuery) -> Result<u64> {
        let tag = Source::Tmdb.as_str();
        let mut extra = vec![("query", query.title.clone())];
        if let Some(year) = query.year {
            extra.push(("first_air_date_year", year.to_string()));
        }

        let url = format!("{}/search/tv", BASE_URL);
        let response: SearchResponse = self
            .ctx
            .http
            .get_json(tag, &url, &self.params(&extra))
            .await?;

        best_candidate(&query.title, query.year, response.results.unwrap_or_default())
            .map(|result| result.id)
            .ok_or_else(|| Error::NotFound(format!("tmdb: no TV match for '{}'", query.title)))
    }

    /// Collection membership with a release-order position. Failures
    /// degrade to a position-less collection rather than failing the
    /// whole lookup.
    async fn resolve_collection(
        &self,
        collection: &CollectionRef,
        movie_id: u64,
    ) -> Option<CollectionInfo> {
        let tag = Source::Tmdb.as_str();
        let url = format!("{}/collection/{}", BASE_URL, collection.id);

        let position = match self
            .ctx
            .http
            .get_json::<CollectionResponse>(tag, &url, &self.params(&[]))
            .await
        {
            Ok(response) => collection_position(response.parts.unwrap_or_default(), movie_id),
            Err(e) => {
                warn!(collection = collection.id, error = %e, "Collection fetch failed");
                None
            }
        };

        Some(CollectionInfo {
            name: collection.name.clone(),
            position,
        })
    }

    /// Per-region watch availability; absence or failure is an empty map
    async fn fetch_providers(&self, kind: &str, id: u64) -> BTreeMap<String, ProviderBuckets> {
        let tag = Source::Tmdb.as_str();
        let url = format!("{}/{}/{}/watch/providers", BASE_URL, kind, id);

        match self
            .ctx
            .http
            .get_json::<ProvidersResponse>(tag, &url, &self.params(&[]))
            .await
        {
            Ok(response) => partition_providers(response.results.unwrap_or_default()),
            Err(e) => {
                warn!(kind, id, error = %e, "Watch-provider fetch failed");
                BTreeMap::new()
            }
        }
    }

    async fn resolve_seasons(&self, details: &TvDetails, query: &TvQuery) -> Vec<SeasonInfo> {
        let tag = Source::Tmdb.as_str();
        let mut seasons = Vec::new();

        for summary in details.seasons.as_deref().unwrap_or_default() {
            if summary.season_number == 0 && !query.include_specials {
                continue;
            }

            let episodes = if query.include_episodes {
                let url = format!(
                    "{}/tv/{}/season/{}",
                    BASE_URL, details.id, summary.season_number
                );
                match self
                    .ctx
                    .http
                    .get_json::<SeasonDetails>(tag, &url, &self.params(&[]))
                    .await
                {
                    Ok(season) => Some(
                        season
                            .episodes
                            .unwrap_or_default()
                            .into_iter()
                            .map(episode_info_from)
                            .collect(),
                    ),
                    Err(e) => {
                        warn!(
                            show = details.id,
                            season = summary.season_number,
                            error = %e,
                            "Season detail fetch failed"
                        );
                        None
                    }
                }
            } else {
                None
            };

            seasons.push(SeasonInfo {
                season_number: summary.season_number,
                name: summary.name.clone(),
                air_date: summary.air_date.clone(),
                episode_count: summary.episode_count,
                overview: summary.overview.clone(),
                episodes,
            });
        }

        seasons
    }
}

fn extract_year(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

fn score_candidate(query_title: &str, query_year: Option<i32>, result: &SearchResult) -> f64 {
    let Some(title) = result.display_title() else {
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

    if let (Some(qy), Some(ry)) = (query_year, result.year()) {
        if qy == ry {
            score += YEAR_BONUS;
        }
    }

    score += result.vote_count.unwrap_or(0).min(1000) as f64 / 1000.0;
    score
}

fn best_candidate(
    query_title: &str,
    query_year: Option<i32>,
    results: Vec<SearchResult>,
) -> Option<SearchResult> {
    results
        .into_iter()
        .map(|result| {
            let score = score_candidate(query_title, query_year, &result);
            (result, score)
        })
        .filter(|(_, score)| *score >= CANDIDATE_FLOOR)
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(result, _)| result)
}

/// 1-based ordinal of `movie_id` among collection parts sorted by release
/// date ascending. `None` when the queried part is undated or absent.
fn collection_position(mut parts: Vec<CollectionPart>, movie_id: u64) -> Option<u32> {
    parts.retain(|part| part.release_date.as_deref().is_some_and(|d| !d.is_empty()));
    parts.sort_by(|a, b| a.release_date.cmp(&b.release_date));

    parts
        .iter()
        .position(|part| part.id == movie_id)
        .map(|index| index as u32 + 1)
}

fn bucket_names(refs: Option<Vec<ProviderRef>>) -> Vec<String> {
    refs.unwrap_or_default()
        .into_iter()
        .map(|p| p.provider_name)
        .collect()
}

fn partition_providers(
    regions: BTreeMap<String, RegionProviders>,
) -> BTreeMap<String, ProviderBuckets> {
    regions
        .into_iter()
        .map(|(region, providers)| {
            let buckets = ProviderBuckets {
                stream: bucket_names(providers.flatrate),
                rent: bucket_names(providers.rent),
                buy: bucket_names(providers.buy),
            };
            (region, buckets)
        })
        .collect()
}

fn poster_url(path: Option<String>) -> Option<String> {
    path.map(|p| format!("{}{}", IMAGE_BASE_URL, p))
}

fn rating_from(average: Option<f64>, count: Option<u64>) -> Option<SourceRating> {
    average.filter(|a| *a > 0.0).map(|average| SourceRating {
        source: Source::Tmdb,
        average,
        count,
    })
}

fn directors_from(credits: &Option<Credits>) -> Vec<String> {
    credits
        .as_ref()
        .and_then(|c| c.crew.as_ref())
        .map(|crew| {
            crew.iter()
                .filter(|member| member.job.as_deref() == Some("Director"))
                .map(|member| member.name.clone())
                .collect()
        })
        .unwrap_or_default()
}

fn cast_from(credits: &Option<Credits>) -> Vec<String> {
    credits
        .as_ref()
        .and_then(|c| c.cast.as_ref())
        .map(|cast| cast.iter().map(|member| member.name.clone()).collect())
        .unwrap_or_default()
}

fn screen_meta(points: i32) -> RecordMeta {
    RecordMeta {
        sources_queried: vec![Source::Tmdb],
        sources_failed: Vec::new(),
        primary_source: Source::Tmdb,
        confidence: confidence_tier(points),
        cached: false,
        resolved_at: chrono::Utc::now().to_rfc3339(),
    }
}

fn movie_record_from_details(
    details: MovieDetails,
    collection: Option<CollectionInfo>,
    watch_providers: BTreeMap<String, ProviderBuckets>,
) -> MovieRecord {
    let directors = directors_from(&details.credits);
    let cast = cast_from(&details.credits);
    let rating = rating_from(details.vote_average, details.vote_count);
    let genres: Vec<String> = details
        .genres
        .unwrap_or_default()
        .into_iter()
        .map(|g| g.name)
        .collect();

    let mut points = SCREEN_BASE_POINTS;
    for filled in [
        details.overview.is_some(),
        details.poster_path.is_some(),
        details.release_date.as_deref().is_some_and(|d| !d.is_empty()),
        !directors.is_empty(),
        !genres.is_empty(),
        rating.is_some(),
    ] {
        if filled {
            points += SCREEN_FIELD_POINTS;
        }
    }
    debug!(id = details.id, points, "Shaped movie record");

    MovieRecord {
        title: details.title.unwrap_or_else(|| "Unknown".to_string()),
        original_title: details.original_title,
        year: extract_year(details.release_date.as_deref()),
        release_date: details.release_date.filter(|d| !d.is_empty()),
        runtime_minutes: details.runtime.filter(|r| *r > 0),
        overview: details.overview.filter(|o| !o.is_empty()),
        genres,
        director: directors.first().cloned(),
        directors,
        cast,
        collection,
        rating,
        poster_url: poster_url(details.poster_path),
        watch_providers,
        tmdb_id: details.id,
        imdb_id: details.imdb_id.filter(|i| !i.is_empty()),
        source_url: Some(format!("{}/{}", MOVIE_PAGE_URL, details.id)),
        meta: screen_meta(points),
    }
}

fn tv_record_from_details(
    details: TvDetails,
    seasons: Option<Vec<SeasonInfo>>,
    watch_providers: BTreeMap<String, ProviderBuckets>,
) -> TvRecord {
    let rating = rating_from(details.vote_average, details.vote_count);
    let genres: Vec<String> = details
        .genres
        .unwrap_or_default()
        .into_iter()
        .map(|g| g.name)
        .collect();
    let creators: Vec<String> = details
        .created_by
        .unwrap_or_default()
        .into_iter()
        .filter_map(|c| c.name)
        .collect();
    let networks: Vec<String> = details
        .networks
        .unwrap_or_default()
        .into_iter()
        .filter_map(|n| n.name)
        .collect();

    let mut points = SCREEN_BASE_POINTS;
    for filled in [
        details.overview.is_some(),
        details.poster_path.is_some(),
        details.first_air_date.as_deref().is_some_and(|d| !d.is_empty()),
        !creators.is_empty(),
        !genres.is_empty(),
        rating.is_some(),
    ] {
        if filled {
            points += SCREEN_FIELD_POINTS;
        }
    }
    debug!(id = details.id, points, "Shaped TV record");

    TvRecord {
        title: details.name.unwrap_or_else(|| "Unknown".to_string()),
        original_title: details.original_name,
        first_air_year: extract_year(details.first_air_date.as_deref()),
        first_air_date: details.first_air_date.filter(|d| !d.is_empty()),
        last_air_date: details.last_air_date.filter(|d| !d.is_empty()),
        status: details.status,
        in_production: details.in_production.unwrap_or(false),
        number_of_seasons: details.number_of_seasons,
        number_of_episodes: details.number_of_episodes,
        overview: details.overview.filter(|o| !o.is_empty()),
        genres,
        creators,
        networks,
        rating,
        poster_url: poster_url(details.poster_path),
        seasons,
        watch_providers,
        tmdb_id: details.id,
        source_url: Some(format!("{}/{}", TV_PAGE_URL, details.id)),
        meta: screen_meta(points),
    }
}

fn episode_info_from(episode: EpisodeDetail) -> EpisodeInfo {
    EpisodeInfo {
        episode_number: episode.episode_number,
        name: episode.name,
        air_date: episode.air_date,
        overview: episode.overview,
        runtime_minutes: episode.runtime,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConfidenceTier;

    const MOVIE_FIXTURE: &str = r#"{
        "id": 120,
        "title": "The Lord of the Rings: The Fellowship of the Ring",
        "original_title": "The Lord of the Rings: The Fellowship of the Ring",
        "release_date": "2001-12-18",
        "runtime": 179,
        "overview": "Young hobbit Frodo Baggins inherits a ring of power.",
        "genres": [{"id": 12, "name": "Adventure"}, {"id": 14, "name": "Fantasy"}],
        "poster_path": "/6oom5QYQ2yQTMJIbnvbkBL9cHo6.jpg",
        "vote_average": 8.4,
        "vote_count": 24000,
        "imdb_id": "tt0120737",
        "belongs_to_collection": {"id": 119, "name": "The Lord of the Rings Collection"},
        "credits": {
            "cast": [{"name": "Elijah Wood"}, {"name": "Ian McKellen"}],
            "crew": [
                {"name": "Peter Jackson", "job": "Director"},
                {"name": "Fran Walsh", "job": "Writer"}
            ]
        }
    }"#;

    fn movie_details() -> MovieDetails {
        serde_json::from_str(MOVIE_FIXTURE).unwrap()
    }

    #[test]
    fn director_is_first_crew_member_with_director_job() {
        let record = movie_record_from_details(movie_details(), None, BTreeMap::new());
        assert_eq!(record.director.as_deref(), Some("Peter Jackson"));
        assert_eq!(record.directors, vec!["Peter Jackson"]);
        assert_eq!(record.cast, vec!["Elijah Wood", "Ian McKellen"]);
    }

    #[test]
    fn movie_record_shapes_scalars() {
        let record = movie_record_from_details(movie_details(), None, BTreeMap::new());
        assert_eq!(record.year, Some(2001));
        assert_eq!(record.runtime_minutes, Some(179));
        assert_eq!(record.tmdb_id, 120);
        assert_eq!(record.imdb_id.as_deref(), Some("tt0120737"));
        assert!(record
            .poster_url
            .as_deref()
            .unwrap()
            .starts_with("https://image.tmdb.org/t/p/original/"));
        assert_eq!(record.meta.primary_source, Source::Tmdb);
        assert!(!record.meta.cached);
    }

    #[test]
    fn fully_populated_record_is_high_confidence() {
        let record = movie_record_from_details(movie_details(), None, BTreeMap::new());
        assert_eq!(record.meta.confidence, ConfidenceTier::High);
    }

    #[test]
    fn sparse_record_drops_to_medium_confidence() {
        let details: MovieDetails =
            serde_json::from_str(r#"{"id": 5, "title": "Obscure"}"#).unwrap();
        let record = movie_record_from_details(details, None, BTreeMap::new());
        assert_eq!(record.meta.confidence, ConfidenceTier::Medium);
        assert!(record.rating.is_none());
        assert!(record.director.is_none());
    }

    #[test]
    fn collection_position_is_release_order() {
        let parts = vec![
            CollectionPart { id: 121, release_date: Some("2002-12-18".to_string()) },
            CollectionPart { id: 120, release_date: Some("2001-12-18".to_string()) },
            CollectionPart { id: 122, release_date: Some("2003-12-17".to_string()) },
        ];
        assert_eq!(collection_position(parts.clone(), 120), Some(1));
        assert_eq!(collection_position(parts.clone(), 122), Some(3));
        assert_eq!(collection_position(parts, 999), None);
    }

    #[test]
    fn undated_parts_are_excluded_from_ordering() {
        let parts = vec![
            CollectionPart { id: 1, release_date: Some("1999-01-01".to_string()) },
            CollectionPart { id: 2, release_date: None },
            CollectionPart { id: 3, release_date: Some("".to_string()) },
        ];
        assert_eq!(collection_position(parts.clone(), 2), None);
        assert_eq!(collection_position(parts, 1), Some(1));
    }

    #[test]
    fn providers_partition_into_buckets() {
        let regions: BTreeMap<String, RegionProviders> = serde_json::from_str(
            r#"{
                "US": {
                    "flatrate": [{"provider_name": "Max"}],
                    "rent": [{"provider_name": "Apple TV"}, {"provider_name": "Amazon Video"}],
                    "buy": [{"provider_name": "Apple TV"}]
                },
                "DE": {"flatrate": [{"provider_name": "Netflix"}]}
            }"#,
        )
        .unwrap();

        let buckets = partition_providers(regions);
        assert_eq!(buckets["US"].stream, vec!["Max"]);
        assert_eq!(buckets["US"].rent, vec!["Apple TV", "Amazon Video"]);
        assert_eq!(buckets["US"].buy, vec!["Apple TV"]);
        assert_eq!(buckets["DE"].stream, vec!["Netflix"]);
        assert!(buckets["DE"].rent.is_empty());
    }

    #[test]
    fn year_match_breaks_title_ties() {
        let results: Vec<SearchResult> = serde_json::from_str(
            r#"[
                {"id": 11, "title": "Dune", "release_date": "1984-12-14", "vote_count": 3000},
                {"id": 22, "title": "Dune", "release_date": "2021-10-22", "vote_count": 9000}
            ]"#,
        )
        .unwrap();

        let best = best_candidate("Dune", Some(1984), results).unwrap();
        assert_eq!(best.id, 11);
    }

    #[test]
    fn unrelated_search_results_are_rejected() {
        let results: Vec<SearchResult> = serde_json::from_str(
            r#"[{"id": 7, "title": "Completely Different Film", "vote_count": 100}]"#,
        )
        .unwrap();
        assert!(best_candidate("The Fellowship of the Ring", None, results).is_none());
    }
}
