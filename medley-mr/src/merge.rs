//! Book merge engine
//!
//! Reconciles partial records from multiple book sources into one
//! canonical record. Scalar conflicts are settled by per-field source
//! preference lists (not arrival order), list fields are unioned, and a
//! point-based confidence scorer summarizes how much corroborating data
//! backed the result. The point values are a frozen contract.
//!
//! Screen media has one authoritative source and never passes through
//! here.

use crate::models::{
    dedupe_preserving_order, BookPartial, BookRecord, ConfidenceTier, RecordMeta, SeriesInfo,
    Source, SourceRating,
};
use medley_common::{Error, Result};
use tracing::debug;

/// Static total order over book sources, highest priority first.
///
/// The top-priority contributing record supplies defaults for any field
/// without a dedicated preference list.
pub const SOURCE_PRIORITY: [Source; 3] =
    [Source::Goodreads, Source::GoogleBooks, Source::OpenLibrary];

// Per-field preference lists. Sources not listed fall to end-of-list in
// original contribution order.
const PAGE_COUNT_PREFERENCE: &[Source] = &[Source::GoogleBooks, Source::OpenLibrary];
const PUBLISHER_PREFERENCE: &[Source] = &[Source::GoogleBooks, Source::OpenLibrary];
const PUBLISH_YEAR_PREFERENCE: &[Source] = &[Source::GoogleBooks, Source::OpenLibrary];
const LANGUAGE_PREFERENCE: &[Source] = &[Source::GoogleBooks, Source::OpenLibrary];
const ISBN_PREFERENCE: &[Source] = &[Source::OpenLibrary, Source::GoogleBooks];

/// Description source preferred when its text clears the length floor
const DESCRIPTION_PREFERRED_SOURCE: Source = Source::GoogleBooks;
const DESCRIPTION_MIN_LEN: usize = 100;

/// Fixed cover fallback order (first source with a cover wins)
const COVER_FALLBACK: &[Source] = &[Source::GoogleBooks, Source::OpenLibrary, Source::Goodreads];

/// Series source preferred when its series block carries a name
const SERIES_PREFERRED_SOURCE: Source = Source::Goodreads;

/// Confidence thresholds: >= 70 high, >= 40 medium, else low
const CONFIDENCE_HIGH: i32 = 70;
const CONFIDENCE_MEDIUM: i32 = 40;

fn priority_rank(source: Source) -> usize {
    SOURCE_PRIORITY
        .iter()
        .position(|s| *s == source)
        .unwrap_or(SOURCE_PRIORITY.len())
}

/// Take the first non-null value across `records`, walking `preference`
/// first, then falling back to original contribution order.
fn prefer_field<T>(
    records: &[BookPartial],
    preference: &[Source],
    getter: impl Fn(&BookPartial) -> Option<T>,
) -> Option<T> {
    for source in preference {
        if let Some(record) = records.iter().find(|r| r.source == *source) {
            if let Some(value) = getter(record) {
                return Some(value);
            }
        }
    }
    records
        .iter()
        .filter(|r| !preference.contains(&r.source))
        .find_map(|r| getter(r))
}

/// Evidence fed to the confidence scorer
#[derive(Debug, Clone)]
pub struct ConfidenceEvidence {
    pub sources_contributed: usize,
    pub sources_failed: usize,
    pub has_title: bool,
    pub has_author: bool,
    pub has_isbn: bool,
    pub has_cover: bool,
    pub has_description: bool,
    pub has_page_count: bool,
    pub has_genres: bool,
    pub has_series: bool,
    pub has_rating: bool,
}

/// Point-based confidence score.
///
/// 15 points per contributing source, minus 10 per failed source, plus
/// fixed points per populated field, plus corroboration bonuses at 2 and
/// 3 contributing sources.
pub fn confidence_points(evidence: &ConfidenceEvidence) -> i32 {
    let mut points = evidence.sources_contributed as i32 * 15;
    points -= evidence.sources_failed as i32 * 10;

    if evidence.has_title {
        points += 10;
    }
    if evidence.has_author {
        points += 10;
    }
    if evidence.has_isbn {
        points += 15;
    }
    if evidence.has_cover {
        points += 5;
    }
    if evidence.has_description {
        points += 10;
    }
    if evidence.has_page_count {
        points += 5;
    }
    if evidence.has_genres {
        points += 5;
    }
    if evidence.has_series {
        points += 10;
    }
    if evidence.has_rating {
        points += 10;
    }

    if evidence.sources_contributed >= 2 {
        points += 10;
    }
    if evidence.sources_contributed >= 3 {
        points += 10;
    }

    points
}

/// Map a point total to its coarse tier
pub fn confidence_tier(points: i32) -> ConfidenceTier {
    if points >= CONFIDENCE_HIGH {
        ConfidenceTier::High
    } else if points >= CONFIDENCE_MEDIUM {
        ConfidenceTier::Medium
    } else {
        ConfidenceTier::Low
    }
}

/// Merge partial book records into one canonical record.
///
/// `records` must be non-empty; the resolver only invokes merge when at
/// least one source produced a hit, so an empty list is a bug and fails
/// loudly.
pub fn merge_book_records(
    records: Vec<BookPartial>,
    sources_queried: Vec<Source>,
    sources_failed: Vec<Source>,
    cached: bool,
) -> Result<BookRecord> {
    if records.is_empty() {
        return Err(Error::Internal(
            "merge_book_records called with no contributing records".to_string(),
        ));
    }

    // Contributing sources in static priority order; the top one is the
    // record's primary source and default supplier.
    let mut by_priority: Vec<&BookPartial> = records.iter().collect();
    by_priority.sort_by_key(|r| priority_rank(r.source));
    let primary_source = by_priority[0].source;

    let title = by_priority
        .iter()
        .find_map(|r| r.title.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    // List fields: union across all sources, case-insensitive dedupe,
    // first-seen order. Not subject to the preference mechanism.
    let authors = dedupe_preserving_order(records.iter().flat_map(|r| r.authors.clone()));
    let genres = dedupe_preserving_order(records.iter().flat_map(|r| r.genres.clone()));
    let subjects = dedupe_preserving_order(records.iter().flat_map(|r| r.subjects.clone()));

    let isbn_10 = prefer_field(&records, ISBN_PREFERENCE, |r| r.isbn_10.clone());
    let isbn_13 = prefer_field(&records, ISBN_PREFERENCE, |r| r.isbn_13.clone());
    let page_count = prefer_field(&records, PAGE_COUNT_PREFERENCE, |r| r.page_count);
    let publisher = prefer_field(&records, PUBLISHER_PREFERENCE, |r| r.publisher.clone());
    let publish_year = prefer_field(&records, PUBLISH_YEAR_PREFERENCE, |r| r.publish_year);
    let language = prefer_field(&records, LANGUAGE_PREFERENCE, |r| r.language.clone());

    let description = select_description(&records);
    let cover_url = select_cover(&records);
    let series = select_series(&records);

    // Ratings, identifiers, and source URLs are collected per source,
    // never merged.
    let ratings: Vec<SourceRating> = {
        let mut list: Vec<SourceRating> = records.iter().filter_map(|r| r.rating.clone()).collect();
        list.sort_by_key(|r| priority_rank(r.source));
        list
    };

    let mut identifiers = std::collections::BTreeMap::new();
    let mut source_urls = std::collections::BTreeMap::new();
    for source in Source::BOOK_SOURCES {
        let record = records.iter().find(|r| r.source == source);
        identifiers.insert(
            source.as_str().to_string(),
            record.and_then(|r| r.identifier.clone()),
        );
        source_urls.insert(
            source.as_str().to_string(),
            record.and_then(|r| r.source_url.clone()),
        );
    }

    let evidence = ConfidenceEvidence {
        sources_contributed: records.len(),
        sources_failed: sources_failed.len(),
        has_title: !title.is_empty() && title != "Unknown",
        has_author: !authors.is_empty(),
        has_isbn: isbn_10.is_some() || isbn_13.is_some(),
        has_cover: cover_url.is_some(),
        has_description: description.is_some(),
        has_page_count: page_count.is_some(),
        has_genres: !genres.is_empty(),
        has_series: series.as_ref().map_or(false, |s| !s.name.is_empty()),
        has_rating: !ratings.is_empty(),
    };
    let points = confidence_points(&evidence);
    let confidence = confidence_tier(points);

    debug!(
        primary = %primary_source,
        contributed = records.len(),
        failed = sources_failed.len(),
        points,
        "Merged book records"
    );

    Ok(BookRecord {
        title,
        authors,
        isbn_10,
        isbn_13,
        description,
        publisher,
        publish_year,
        page_count,
        genres,
        subjects,
        language,
        cover_url,
        series,
        ratings,
        identifiers,
        source_urls,
        meta: RecordMeta {
            sources_queried,
            sources_failed,
            primary_source,
            confidence,
            cached,
            resolved_at: chrono::Utc::now().to_rfc3339(),
        },
    })
}

/// Dedicated description rule: the preferred source's description wins
/// when it clears the length floor; otherwise the longest available
/// description from any source.
fn select_description(records: &[BookPartial]) -> Option<String> {
    if let Some(preferred) = records
        .iter()
        .find(|r| r.source == DESCRIPTION_PREFERRED_SOURCE)
        .and_then(|r| r.description.as_ref())
    {
        if preferred.len() >= DESCRIPTION_MIN_LEN {
            return Some(preferred.clone());
        }
    }

    records
        .iter()
        .filter_map(|r| r.description.as_ref())
        .max_by_key(|d| d.len())
        .cloned()
}

/// Dedicated cover rule: fixed fallback order, first non-null wins
fn select_cover(records: &[BookPartial]) -> Option<String> {
    for source in COVER_FALLBACK {
        if let Some(url) = records
            .iter()
            .find(|r| r.source == *source)
            .and_then(|r| r.cover_url.clone())
        {
            return Some(url);
        }
    }
    records.iter().find_map(|r| r.cover_url.clone())
}

/// Series rule: preferred source wins when its block is named, else the
/// first contributing record with any series block
fn select_series(records: &[BookPartial]) -> Option<SeriesInfo> {
    if let Some(series) = records
        .iter()
        .find(|r| r.source == SERIES_PREFERRED_SOURCE)
        .and_then(|r| r.series.as_ref())
    {
        if !series.name.is_empty() {
            return Some(series.clone());
        }
    }
    records.iter().find_map(|r| r.series.clone())
}
