//! OpenLibrary book adapter
//!
//! Free-text lookups go through `search.json`; ISBN lookups short-circuit
//! to the edition endpoint. Editions and works are separate records
//! upstream, so a secondary work fetch pulls long-form description and
//! subjects, falling back to edition fields when it fails.

use crate::cache::{cache_key, ttl};
use crate::matcher::{
    self, CANDIDATE_EXACT_TITLE, CANDIDATE_FLOOR, CANDIDATE_PARTIAL_TITLE,
};
use crate::models::{BookPartial, BookQuery, SeriesInfo, Source};
use crate::sources::{BookSource, SourceContext, SourceHit};
use async_trait::async_trait;
use medley_common::{Error, Result};
use serde::Deserialize;
use tracing::{debug, warn};

const BASE_URL: &str = "https://openlibrary.org";
const COVERS_URL: &str = "https://covers.openlibrary.org";
const SEARCH_LIMIT: u32 = 10;

/// Bonus when the query author fuzzy-matches a result author
const AUTHOR_BONUS: f64 = 30.0;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchDoc {
    key: Option<String>,
    title: Option<String>,
    author_name: Option<Vec<String>>,
    first_publish_year: Option<i32>,
    isbn: Option<Vec<String>>,
    cover_i: Option<i64>,
    publisher: Option<Vec<String>>,
    language: Option<Vec<String>>,
    number_of_pages_median: Option<u32>,
    edition_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct KeyRef {
    key: String,
}

/// Edition record returned by `/isbn/{isbn}.json`
#[derive(Debug, Deserialize)]
struct EditionResponse {
    title: Option<String>,
    key: Option<String>,
    works: Option<Vec<KeyRef>>,
    number_of_pages: Option<u32>,
    publish_date: Option<String>,
    publishers: Option<Vec<String>>,
    isbn_10: Option<Vec<String>>,
    isbn_13: Option<Vec<String>>,
    covers: Option<Vec<i64>>,
    description: Option<TextOrValue>,
}

/// Work record: the long-form description and subjects live here
#[derive(Debug, Deserialize)]
struct WorkResponse {
    description: Option<TextOrValue>,
    subjects: Option<Vec<String>>,
}

/// OpenLibrary serializes prose either as a bare string or as
/// `{"type": ..., "value": ...}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextOrValue {
    Text(String),
    Object { value: String },
}

impl TextOrValue {
    fn into_string(self) -> String {
        match self {
            TextOrValue::Text(s) => s,
            TextOrValue::Object { value } => value,
        }
    }
}

pub struct OpenLibrarySource {
    ctx: SourceContext,
}

impl OpenLibrarySource {
    pub fn new(ctx: SourceContext) -> Self {
        Self { ctx }
    }

    async fn lookup_inner(&self, query: &BookQuery) -> Result<Option<SourceHit>> {
        let tag = Source::OpenLibrary.as_str();
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

        let partial = if let Some(isbn) = &query.isbn {
            self.lookup_by_isbn(isbn).await?
        } else {
            self.search(query).await?
        };

        if let Some(partial) = &partial {
            self.ctx
                .cache
                .set(&key, partial, tag, Some(ttl::BOOK_METADATA_HOURS))
                .await?;
        }

        Ok(partial.map(SourceHit::fresh))
    }

    /// Identifier lookup: unambiguous, skips the fuzzy-matching path
    async fn lookup_by_isbn(&self, isbn: &str) -> Result<Option<BookPartial>> {
        let url = format!("{}/isbn/{}.json", BASE_URL, isbn.trim());
        let edition: EditionResponse = self
            .ctx
            .http
            .get_json(Source::OpenLibrary.as_str(), &url, &[])
            .await?;

        let work = match edition.works.as_ref().and_then(|w| w.first()) {
            Some(work_ref) => self.fetch_work(&work_ref.key).await,
            None => None,
        };

        Ok(Some(partial_from_edition(edition, work)))
    }

    async fn search(&self, query: &BookQuery) -> Result<Option<BookPartial>> {
        let mut params = vec![
            ("title", query.title.clone()),
            ("limit", SEARCH_LIMIT.to_string()),
        ];
        if let Some(author) = &query.author {
            params.push(("author", author.clone()));
        }

        let url = format!("{}/search.json", BASE_URL);
        let response: SearchResponse = self
            .ctx
            .http
            .get_json(Source::OpenLibrary.as_str(), &url, &params)
            .await?;

        let Some(doc) = best_candidate(&query.title, query.author.as_deref(), response.docs)
        else {
            debug!(title = %query.title, "No OpenLibrary candidate cleared the floor");
            return Ok(None);
        };

        let work = match doc.key.as_deref() {
            Some(work_key) => self.fetch_work(work_key).await,
            None => None,
        };

        Ok(Some(partial_from_doc(doc, work)))
    }

    /// Secondary work fetch; failure falls back to edition/search fields
    async fn fetch_work(&self, work_key: &str) -> Option<WorkResponse> {
        let url = format!("{}{}.json", BASE_URL, work_key);
        match self
            .ctx
            .http
            .get_json::<WorkResponse>(Source::OpenLibrary.as_str(), &url, &[])
            .await
        {
            Ok(work) => Some(work),
            Err(e) => {
                warn!(work_key, error = %e, "Work fetch failed; using edition fields");
                None
            }
        }
    }
}

#[async_trait]
impl BookSource for OpenLibrarySource {
    fn source(&self) -> Source {
        Source::OpenLibrary
    }

    async fn lookup(&self, query: &BookQuery) -> Option<SourceHit> {
        match self.lookup_inner(query).await {
            Ok(result) => result,
            Err(Error::NotFound(_)) => None,
            Err(e) => {
                warn!(title = %query.title, error = %e, "OpenLibrary lookup failed");
                None
            }
        }
    }
}

/// Candidate score: exact normalized title 100, containment 50, author
/// corroboration +30, edition count as a sub-point popularity tiebreak
fn score_candidate(query_title: &str, query_author: Option<&str>, doc: &SearchDoc) -> f64 {
    let Some(title) = doc.title.as_deref() else {
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

    if let (Some(qa), Some(authors)) = (query_author, doc.author_name.as_ref()) {
        if authors
            .iter()
            .any(|a| matcher::is_fuzzy_match(qa, a, matcher::FUZZY_THRESHOLD))
        {
            score += AUTHOR_BONUS;
        }
    }

    score += doc.edition_count.unwrap_or(0).min(1000) as f64 / 1000.0;
    score
}

fn best_candidate(
    query_title: &str,
    query_author: Option<&str>,
    docs: Vec<SearchDoc>,
) -> Option<SearchDoc> {
    docs.into_iter()
        .map(|doc| {
            let score = score_candidate(query_title, query_author, &doc);
            (doc, score)
        })
        .filter(|(_, score)| *score >= CANDIDATE_FLOOR)
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(doc, _)| doc)
}

/// Split a mixed ISBN list into the first ISBN-10 and first ISBN-13
fn classify_isbns(isbns: &[String]) -> (Option<String>, Option<String>) {
    let mut isbn_10 = None;
    let mut isbn_13 = None;
    for isbn in isbns {
        let digits = isbn.trim();
        match digits.len() {
            10 if isbn_10.is_none() => isbn_10 = Some(digits.to_string()),
            13 if isbn_13.is_none() => isbn_13 = Some(digits.to_string()),
            _ => {}
        }
    }
    (isbn_10, isbn_13)
}

fn cover_url_for(cover_id: i64) -> String {
    // -L is the highest-resolution variant offered
    format!("{}/b/id/{}-L.jpg", COVERS_URL, cover_id)
}

fn partial_from_doc(doc: SearchDoc, work: Option<WorkResponse>) -> BookPartial {
    let mut partial = BookPartial::new(Source::OpenLibrary);

    if let Some(title) = doc.title {
        let extracted = matcher::extract_series_from_title(&title);
        partial.title = Some(extracted.clean_title);
        if let Some(name) = extracted.series_name {
            partial.series = Some(SeriesInfo {
                name,
                position: extracted.series_position,
            });
        }
    }

    partial.authors = doc.author_name.unwrap_or_default();
    if let Some(isbns) = doc.isbn.as_deref() {
        let (isbn_10, isbn_13) = classify_isbns(isbns);
        partial.isbn_10 = isbn_10;
        partial.isbn_13 = isbn_13;
    }
    partial.publish_year = doc.first_publish_year;
    partial.publisher = doc.publisher.and_then(|p| p.into_iter().next());
    partial.language = doc.language.and_then(|l| l.into_iter().next());
    partial.page_count = doc.number_of_pages_median;
    partial.cover_url = doc.cover_i.map(cover_url_for);

    if let Some(work) = work {
        partial.description = work.description.map(TextOrValue::into_string);
        partial.subjects = work.subjects.unwrap_or_default();
    }

    if let Some(key) = doc.key {
        partial.identifier = Some(key.trim_start_matches("/works/").to_string());
        partial.source_url = Some(format!("{}{}", BASE_URL, key));
    }

    partial
}

fn partial_from_edition(edition: EditionResponse, work: Option<WorkResponse>) -> BookPartial {
    let mut partial = BookPartial::new(Source::OpenLibrary);

    if let Some(title) = edition.title {
        let extracted = matcher::extract_series_from_title(&title);
        partial.title = Some(extracted.clean_title);
        if let Some(name) = extracted.series_name {
            partial.series = Some(SeriesInfo {
                name,
                position: extracted.series_position,
            });
        }
    }

    partial.isbn_10 = edition.isbn_10.and_then(|v| v.into_iter().next());
    partial.isbn_13 = edition.isbn_13.and_then(|v| v.into_iter().next());
    partial.page_count = edition.number_of_pages;
    partial.publisher = edition.publishers.and_then(|p| p.into_iter().next());
    partial.publish_year = edition
        .publish_date
        .as_deref()
        .and_then(extract_year);
    partial.cover_url = edition
        .covers
        .and_then(|c| c.into_iter().next())
        .map(cover_url_for);

    // Work record wins for prose; edition description is the fallback
    let edition_description = edition.description.map(TextOrValue::into_string);
    match work {
        Some(work) => {
            partial.description = work
                .description
                .map(TextOrValue::into_string)
                .or(edition_description);
            partial.subjects = work.subjects.unwrap_or_default();
        }
        None => partial.description = edition_description,
    }

    if let Some(key) = edition.key {
        partial.identifier = Some(key.trim_start_matches("/books/").to_string());
        partial.source_url = Some(format!("{}{}", BASE_URL, key));
    }

    partial
}

/// Pull a 4-digit year out of a free-form publish date ("Mar 27, 2007")
fn extract_year(date: &str) -> Option<i32> {
    static YEAR: std::sync::LazyLock<regex::Regex> =
        std::sync::LazyLock::new(|| regex::Regex::new(r"\b(\d{4})\b").expect("year pattern"));
    YEAR.captures(date)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str, authors: &[&str]) -> SearchDoc {
        SearchDoc {
            key: Some("/works/OL27448W".to_string()),
            title: Some(title.to_string()),
            author_name: Some(authors.iter().map(|s| s.to_string()).collect()),
            first_publish_year: Some(2007),
            isbn: None,
            cover_i: None,
            publisher: None,
            language: None,
            number_of_pages_median: None,
            edition_count: Some(50),
        }
    }

    #[test]
    fn exact_title_outscores_containment() {
        let exact = score_candidate("The Name of the Wind", None, &doc("The Name of the Wind", &[]));
        let contained = score_candidate(
            "The Name of the Wind",
            None,
            &doc("The Name of the Wind: Deluxe Edition", &[]),
        );
        assert!(exact >= CANDIDATE_EXACT_TITLE);
        assert!(contained >= CANDIDATE_PARTIAL_TITLE && contained < exact);
    }

    #[test]
    fn unrelated_title_stays_below_floor() {
        let score = score_candidate("The Name of the Wind", None, &doc("Pride and Prejudice", &[]));
        assert!(score < CANDIDATE_FLOOR);
    }

    #[test]
    fn author_corroboration_adds_bonus() {
        let without = score_candidate("Dune", None, &doc("Dune", &["Frank Herbert"]));
        let with = score_candidate("Dune", Some("Frank Herbert"), &doc("Dune", &["Frank Herbert"]));
        assert!((with - without - AUTHOR_BONUS).abs() < 1e-9);
    }

    #[test]
    fn best_candidate_requires_floor() {
        let docs = vec![doc("Completely Different Book", &[])];
        assert!(best_candidate("The Name of the Wind", None, docs).is_none());
    }

    #[test]
    fn classify_isbns_splits_by_length() {
        let isbns = vec![
            "9780756404741".to_string(),
            "0756404746".to_string(),
            "invalid".to_string(),
        ];
        let (isbn_10, isbn_13) = classify_isbns(&isbns);
        assert_eq!(isbn_10.as_deref(), Some("0756404746"));
        assert_eq!(isbn_13.as_deref(), Some("9780756404741"));
    }

    #[test]
    fn shapes_partial_from_search_doc_and_work() {
        let raw = r#"{
            "key": "/works/OL27448W",
            "title": "The Name of the Wind (The Kingkiller Chronicle #1)",
            "author_name": ["Patrick Rothfuss"],
            "first_publish_year": 2007,
            "isbn": ["0756404746", "9780756404741"],
            "cover_i": 8259447,
            "publisher": ["DAW Books"],
            "language": ["eng"],
            "number_of_pages_median": 662,
            "edition_count": 82
        }"#;
        let doc: SearchDoc = serde_json::from_str(raw).unwrap();
        let work = WorkResponse {
            description: Some(TextOrValue::Object {
                value: "The tale of Kvothe.".to_string(),
            }),
            subjects: Some(vec!["Fantasy".to_string()]),
        };

        let partial = partial_from_doc(doc, Some(work));
        assert_eq!(partial.title.as_deref(), Some("The Name of the Wind"));
        assert_eq!(
            partial.series.as_ref().unwrap().name,
            "The Kingkiller Chronicle"
        );
        assert_eq!(partial.series.as_ref().unwrap().position, Some(1.0));
        assert_eq!(partial.isbn_13.as_deref(), Some("9780756404741"));
        assert_eq!(partial.page_count, Some(662));
        assert_eq!(
            partial.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/8259447-L.jpg")
        );
        assert_eq!(partial.identifier.as_deref(), Some("OL27448W"));
        assert_eq!(partial.description.as_deref(), Some("The tale of Kvothe."));
        assert_eq!(partial.subjects, vec!["Fantasy"]);
    }

    #[test]
    fn edition_description_survives_work_fetch_failure() {
        let edition = EditionResponse {
            title: Some("The Name of the Wind".to_string()),
            key: Some("/books/OL8479867M".to_string()),
            works: None,
            number_of_pages: Some(662),
            publish_date: Some("March 27, 2007".to_string()),
            publishers: Some(vec!["DAW Books".to_string()]),
            isbn_10: Some(vec!["0756404746".to_string()]),
            isbn_13: Some(vec!["9780756404741".to_string()]),
            covers: Some(vec![8259447]),
            description: Some(TextOrValue::Text("Edition blurb.".to_string())),
        };

        let partial = partial_from_edition(edition, None);
        assert_eq!(partial.description.as_deref(), Some("Edition blurb."));
        assert_eq!(partial.publish_year, Some(2007));
        assert_eq!(partial.identifier.as_deref(), Some("OL8479867M"));
    }
}
