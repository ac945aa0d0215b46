//! End-to-end resolution scenarios with stub source adapters
//!
//! Exercises the full fan-out and merge pipeline without network access:
//! stub adapters stand in for the real providers and return realistic
//! partial records.

use async_trait::async_trait;
use medley_mr::models::{
    BookPartial, BookQuery, ConfidenceTier, SeriesInfo, Source, SourceRating,
};
use medley_mr::resolver::{BatchOutcome, Resolver};
use medley_mr::sources::{BookSource, SourceHit};
use std::sync::Arc;

struct StubSource {
    source: Source,
    partial: Option<BookPartial>,
}

impl StubSource {
    fn adapter(source: Source, partial: Option<BookPartial>) -> Arc<dyn BookSource> {
        Arc::new(Self { source, partial })
    }
}

#[async_trait]
impl BookSource for StubSource {
    fn source(&self) -> Source {
        self.source
    }

    async fn lookup(&self, _query: &BookQuery) -> Option<SourceHit> {
        self.partial.clone().map(SourceHit::fresh)
    }
}

fn open_library_partial() -> BookPartial {
    let mut p = BookPartial::new(Source::OpenLibrary);
    p.title = Some("The Name of the Wind".to_string());
    p.authors = vec!["Patrick Rothfuss".to_string()];
    p.isbn_10 = Some("0756404746".to_string());
    p.isbn_13 = Some("9780756404741".to_string());
    p.description = Some("Short edition blurb.".to_string());
    p.publisher = Some("DAW Books".to_string());
    p.publish_year = Some(2007);
    p.page_count = Some(662);
    p.subjects = vec!["Fantasy fiction".to_string(), "Wizards".to_string()];
    p.cover_url = Some("https://covers.openlibrary.org/b/id/8259447-L.jpg".to_string());
    p.identifier = Some("OL27448W".to_string());
    p.source_url = Some("https://openlibrary.org/works/OL27448W".to_string());
    p
}

fn google_books_partial() -> BookPartial {
    let mut p = BookPartial::new(Source::GoogleBooks);
    p.title = Some("The Name of the Wind".to_string());
    p.authors = vec!["Patrick Rothfuss".to_string()];
    p.description = Some(
        "The riveting first-person narrative of a young man who grows to be the most \
         notorious magician his world has ever seen, told over the course of one day."
            .to_string(),
    );
    p.genres = vec!["Fiction".to_string(), "Fantasy".to_string()];
    p.language = Some("en".to_string());
    p.cover_url = Some("https://books.example/large.jpg".to_string());
    p.rating = Some(SourceRating {
        source: Source::GoogleBooks,
        average: 4.5,
        count: Some(1234),
    });
    p.identifier = Some("zaRoX4o8cpcC".to_string());
    p
}

fn goodreads_partial() -> BookPartial {
    let mut p = BookPartial::new(Source::Goodreads);
    p.title = Some("The Name of the Wind".to_string());
    p.authors = vec!["Patrick Rothfuss".to_string()];
    p.series = Some(SeriesInfo {
        name: "The Kingkiller Chronicle".to_string(),
        position: Some(1.0),
    });
    p.rating = Some(SourceRating {
        source: Source::Goodreads,
        average: 4.55,
        count: Some(1_023_456),
    });
    p.identifier = Some("186074".to_string());
    p
}

fn full_resolver() -> Resolver {
    Resolver::new(
        vec![
            StubSource::adapter(Source::OpenLibrary, Some(open_library_partial())),
            StubSource::adapter(Source::GoogleBooks, Some(google_books_partial())),
            StubSource::adapter(Source::Goodreads, Some(goodreads_partial())),
        ],
        None,
    )
}

fn query(title: &str) -> BookQuery {
    BookQuery {
        title: title.to_string(),
        author: Some("Patrick Rothfuss".to_string()),
        isbn: None,
        sources: None,
    }
}

#[tokio::test]
async fn three_source_hit_merges_into_high_confidence_record() {
    let record = full_resolver()
        .lookup_book(&query("The Name of the Wind"))
        .await
        .unwrap();

    assert_eq!(record.title, "The Name of the Wind");
    assert_eq!(record.authors, vec!["Patrick Rothfuss"]);
    assert_eq!(record.meta.confidence, ConfidenceTier::High);
    assert_eq!(record.meta.primary_source, Source::Goodreads);
    assert!(record.meta.sources_failed.is_empty());
    assert_eq!(record.meta.sources_queried.len(), 3);
}

#[tokio::test]
async fn description_prefers_google_books_long_form() {
    let record = full_resolver()
        .lookup_book(&query("The Name of the Wind"))
        .await
        .unwrap();

    // Google Books has the long-form prose; OpenLibrary's short blurb loses
    assert!(record
        .description
        .as_deref()
        .unwrap()
        .starts_with("The riveting first-person narrative"));
}

#[tokio::test]
async fn series_comes_from_goodreads() {
    let record = full_resolver()
        .lookup_book(&query("The Name of the Wind"))
        .await
        .unwrap();

    let series = record.series.unwrap();
    assert_eq!(series.name, "The Kingkiller Chronicle");
    assert_eq!(series.position, Some(1.0));
}

#[tokio::test]
async fn ratings_are_listed_in_priority_order() {
    let record = full_resolver()
        .lookup_book(&query("The Name of the Wind"))
        .await
        .unwrap();

    let sources: Vec<Source> = record.ratings.iter().map(|r| r.source).collect();
    assert_eq!(sources, vec![Source::Goodreads, Source::GoogleBooks]);
}

#[tokio::test]
async fn identifier_maps_cover_every_known_source() {
    let record = full_resolver()
        .lookup_book(&query("The Name of the Wind"))
        .await
        .unwrap();

    assert_eq!(
        record.identifiers.get("open_library"),
        Some(&Some("OL27448W".to_string()))
    );
    assert_eq!(
        record.identifiers.get("goodreads"),
        Some(&Some("186074".to_string()))
    );
    // Absent entries are explicit nulls, not missing keys
    assert!(record.source_urls.contains_key("google_books"));
    assert_eq!(record.source_urls.get("google_books"), Some(&None));
}

#[tokio::test]
async fn isbn_survives_when_only_one_source_has_it() {
    let record = full_resolver()
        .lookup_book(&query("The Name of the Wind"))
        .await
        .unwrap();

    assert_eq!(record.isbn_13.as_deref(), Some("9780756404741"));
    assert_eq!(record.page_count, Some(662));
    assert_eq!(record.publisher.as_deref(), Some("DAW Books"));
}

#[tokio::test]
async fn partial_failure_still_produces_a_record() {
    let resolver = Resolver::new(
        vec![
            StubSource::adapter(Source::OpenLibrary, Some(open_library_partial())),
            StubSource::adapter(Source::GoogleBooks, None),
            StubSource::adapter(Source::Goodreads, None),
        ],
        None,
    );

    let record = resolver
        .lookup_book(&query("The Name of the Wind"))
        .await
        .unwrap();

    assert_eq!(record.meta.primary_source, Source::OpenLibrary);
    assert_eq!(
        record.meta.sources_failed,
        vec![Source::GoogleBooks, Source::Goodreads]
    );
    // One source, two misses: less corroboration, lower tier
    assert_ne!(record.meta.confidence, ConfidenceTier::High);
}

#[tokio::test]
async fn batch_of_five_preserves_request_order() {
    let resolver = full_resolver();
    let items: Vec<BookQuery> = (1..=5)
        .map(|i| query(&format!("The Name of the Wind vol {}", i)))
        .collect();

    let outcomes = resolver.batch_books(&items, Some(2)).await.unwrap();

    assert_eq!(outcomes.len(), 5);
    for (expected, outcome) in outcomes.iter().enumerate() {
        match outcome {
            BatchOutcome::Ok { index, .. } => assert_eq!(*index, expected),
            BatchOutcome::Error { index, .. } => assert_eq!(*index, expected),
        }
    }
}
