//! Goodreads scrape adapter
//!
//! HTML rather than JSON: every field extraction tries a primary selector
//! and falls back to an alternate before giving up on that field, so
//! markup drift degrades gracefully instead of breaking the adapter. A
//! randomized inter-request delay applies on top of rate limiting as a
//! courtesy measure. The whole adapter is disabled by configuration when
//! scraping is turned off (the resolver simply does not register it).

use crate::cache::{cache_key, ttl};
use crate::matcher::{
    self, CANDIDATE_EXACT_TITLE, CANDIDATE_FLOOR, CANDIDATE_PARTIAL_TITLE,
};
use crate::models::{BookPartial, BookQuery, SeriesInfo, Source, SourceRating};
use crate::sources::{BookSource, SourceContext, SourceHit};
use async_trait::async_trait;
use medley_common::{Error, Result};
use rand::Rng;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

const BASE_URL: &str = "https://www.goodreads.com";
const MIN_DELAY_MS: u64 = 500;
const MAX_DELAY_MS: u64 = 1500;

const AUTHOR_BONUS: f64 = 30.0;

static ROW: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"tr[itemtype="http://schema.org/Book"]"#).expect("row selector")
});
static TITLE_PRIMARY: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a.bookTitle span[itemprop="name"]"#).expect("title selector")
});
static TITLE_FALLBACK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.bookTitle").expect("title fallback selector"));
static AUTHOR_PRIMARY: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a.authorName span[itemprop="name"]"#).expect("author selector")
});
static AUTHOR_FALLBACK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.authorName").expect("author fallback selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.bookTitle").expect("link selector"));
static COVER_PRIMARY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img.bookCover").expect("cover selector"));
static COVER_FALLBACK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img.bookSmallImg").expect("cover fallback selector"));
static RATING_PRIMARY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.minirating").expect("rating selector"));
static RATING_FALLBACK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.greyText.smallText").expect("rating fallback selector"));

// "4.55 avg rating — 1,023,456 ratings"
static RATING_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\d.]+)\s+avg rating\s*[—–-]+\s*([\d,]+)\s+rating").expect("rating pattern")
});
static BOOK_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/book/show/(\d+)").expect("book id pattern"));

#[derive(Debug, Clone)]
struct ScrapedBook {
    title: String,
    author: Option<String>,
    url: Option<String>,
    cover_url: Option<String>,
    rating_average: Option<f64>,
    rating_count: Option<u64>,
}

pub struct GoodreadsSource {
    ctx: SourceContext,
}

impl GoodreadsSource {
    pub fn new(ctx: SourceContext) -> Self {
        Self { ctx }
    }

    async fn lookup_inner(&self, query: &BookQuery) -> Result<Option<SourceHit>> {
        let tag = Source::Goodreads.as_str();
        let key = cache_key(
            tag,
            &[Some("book"), Some(query.title.as_str()), query.author.as_deref()],
        );

        if let Some(hit) = self.ctx.cache.get::<BookPartial>(&key).await? {
            return Ok(Some(SourceHit::cached(hit)));
        }

        // Courtesy jitter on top of the rate limiter
        let delay_ms = rand::thread_rng().gen_range(MIN_DELAY_MS..=MAX_DELAY_MS);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        let q = match &query.author {
            Some(author) => format!("{} {}", query.title, author),
            None => query.title.clone(),
        };
        let url = format!("{}/search", BASE_URL);
        let html = self
            .ctx
            .http
            .get_text(tag, &url, &[("q", q)])
            .await?;

        let candidates = parse_search_page(&html);
        let Some(best) = best_candidate(&query.title, query.author.as_deref(), candidates) else {
            debug!(title = %query.title, "No Goodreads candidate cleared the floor");
            return Ok(None);
        };

        let partial = partial_from_scrape(best);
        // Goodreads mostly contributes ratings, which drift daily
        self.ctx
            .cache
            .set(&key, &partial, tag, Some(ttl::RATINGS_HOURS))
            .await?;

        Ok(Some(SourceHit::fresh(partial)))
    }
}

#[async_trait]
impl BookSource for GoodreadsSource {
    fn source(&self) -> Source {
        Source::Goodreads
    }

    async fn lookup(&self, query: &BookQuery) -> Option<SourceHit> {
        match self.lookup_inner(query).await {
            Ok(result) => result,
            Err(Error::NotFound(_)) => None,
            Err(e) => {
                warn!(title = %query.title, error = %e, "Goodreads lookup failed");
                None
            }
        }
    }
}

/// Inner text via `primary`, falling back to `fallback`
fn select_text(row: &ElementRef, primary: &Selector, fallback: &Selector) -> Option<String> {
    for selector in [primary, fallback] {
        if let Some(node) = row.select(selector).next() {
            let text: String = node.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Attribute via `primary`, falling back to `fallback`
fn select_attr(
    row: &ElementRef,
    primary: &Selector,
    fallback: &Selector,
    attr: &str,
) -> Option<String> {
    for selector in [primary, fallback] {
        if let Some(value) = row.select(selector).next().and_then(|n| n.value().attr(attr)) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn parse_search_page(html: &str) -> Vec<ScrapedBook> {
    let document = Html::parse_document(html);
    let mut books = Vec::new();

    for row in document.select(&ROW) {
        let Some(title) = select_text(&row, &TITLE_PRIMARY, &TITLE_FALLBACK) else {
            continue;
        };

        let author = select_text(&row, &AUTHOR_PRIMARY, &AUTHOR_FALLBACK);
        let url = select_attr(&row, &LINK, &LINK, "href")
            .map(|href| format!("{}{}", BASE_URL, href));
        let cover_url = select_attr(&row, &COVER_PRIMARY, &COVER_FALLBACK, "src");

        let (rating_average, rating_count) =
            match select_text(&row, &RATING_PRIMARY, &RATING_FALLBACK) {
                Some(text) => parse_rating(&text),
                None => (None, None),
            };

        books.push(ScrapedBook {
            title,
            author,
            url,
            cover_url,
            rating_average,
            rating_count,
        });
    }

    books
}

fn parse_rating(text: &str) -> (Option<f64>, Option<u64>) {
    let Some(caps) = RATING_TEXT.captures(text) else {
        return (None, None);
    };
    let average = caps[1].parse().ok();
    let count = caps[2].replace(',', "").parse().ok();
    (average, count)
}

fn score_candidate(query_title: &str, query_author: Option<&str>, book: &ScrapedBook) -> f64 {
    let nq = matcher::normalize(query_title);
    // Series suffixes embedded in scraped titles would defeat equality
    let nt = matcher::normalize(&matcher::extract_series_from_title(&book.title).clean_title);

    let mut score = if !nq.is_empty() && nq == nt {
        CANDIDATE_EXACT_TITLE
    } else if !nq.is_empty() && !nt.is_empty() && (nq.contains(&nt) || nt.contains(&nq)) {
        CANDIDATE_PARTIAL_TITLE
    } else {
        0.0
    };

    if let (Some(qa), Some(author)) = (query_author, book.author.as_deref()) {
        if matcher::is_fuzzy_match(qa, author, matcher::FUZZY_THRESHOLD) {
            score += AUTHOR_BONUS;
        }
    }

    score += book.rating_count.unwrap_or(0).min(1000) as f64 / 1000.0;
    score
}

fn best_candidate(
    query_title: &str,
    query_author: Option<&str>,
    books: Vec<ScrapedBook>,
) -> Option<ScrapedBook> {
    books
        .into_iter()
        .map(|book| {
            let score = score_candidate(query_title, query_author, &book);
            (book, score)
        })
        .filter(|(_, score)| *score >= CANDIDATE_FLOOR)
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(book, _)| book)
}

fn partial_from_scrape(book: ScrapedBook) -> BookPartial {
    let mut partial = BookPartial::new(Source::Goodreads);

    let extracted = matcher::extract_series_from_title(&book.title);
    partial.title = Some(extracted.clean_title);
    if let Some(name) = extracted.series_name {
        partial.series = Some(SeriesInfo {
            name,
            position: extracted.series_position,
        });
    }

    partial.authors = book.author.into_iter().collect();
    partial.cover_url = book.cover_url;

    if let Some(average) = book.rating_average {
        partial.rating = Some(SourceRating {
            source: Source::Goodreads,
            average,
            count: book.rating_count,
        });
    }

    if let Some(url) = &book.url {
        partial.identifier = BOOK_ID
            .captures(url)
            .map(|caps| caps[1].to_string());
    }
    partial.source_url = book.url;

    partial
}
