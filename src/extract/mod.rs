//! Bibliographic metadata extraction from web archives
//!
//! Every field is resolved through an ordered chain of candidate sources
//! (meta tags, JSON-LD, canonical link, container headers); the first value
//! that is non-empty after whitespace normalization wins.

pub mod json_ld;

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::date::{normalize_date, to_iso};
use crate::error::{Error, Result};
use crate::mime::{self, Archive};
use crate::text::{clean_text, first_nonempty};

pub use json_ld::{extract_json_ld, JsonLdFields};

#[allow(clippy::expect_used)]
static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta").expect("valid selector"));

#[allow(clippy::expect_used)]
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link[rel]").expect("valid selector"));

#[allow(clippy::expect_used)]
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));

/// Confidence marker recorded for heuristically derived metadata
pub const CONFIDENCE_DERIVED: &str = "derived";

/// Container-level values used as the last links of some chains
#[derive(Debug, Clone, Default)]
pub struct ArchiveHints {
    /// `Content-Location` of the HTML part
    pub part_location: Option<String>,
    /// Capture URL from the top-level headers
    pub capture_url: Option<String>,
    /// Capture date from the top-level headers
    pub capture_date: Option<String>,
}

impl ArchiveHints {
    pub fn from_archive(archive: &Archive) -> Self {
        Self {
            part_location: archive.html_location.clone(),
            capture_url: archive.capture_url(),
            capture_date: archive.capture_date(),
        }
    }
}

/// Fields resolved from the page markup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    /// Publish date exactly as found, before normalization
    pub published_raw: Option<String>,
    pub source_url: Option<String>,
    pub keywords: Option<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
}

/// Metadata for one archive; serialized as the audit sidecar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub published_date_iso: Option<String>,
    pub source_url: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub archive_capture_iso: Option<String>,
    pub source_mime: Option<String>,
    pub content_sha256: Option<String>,
    pub filename: Option<String>,
    pub source_path: Option<String>,
    pub confidence: String,
}

impl Default for ExtractedMetadata {
    fn default() -> Self {
        Self {
            title: None,
            author: None,
            published_date_iso: None,
            source_url: None,
            subject: None,
            keywords: None,
            language: None,
            publisher: None,
            archive_capture_iso: None,
            source_mime: None,
            content_sha256: None,
            filename: None,
            source_path: None,
            confidence: CONFIDENCE_DERIVED.to_string(),
        }
    }
}

/// `content` of the first `<meta>` whose `attr` equals `key` (case-insensitive)
///
/// The first match decides: if it has no `content`, the lookup yields `None`
/// rather than moving on to later tags.
fn meta_content<'a>(doc: &'a Html, attr: &str, key: &str) -> Option<&'a str> {
    doc.select(&META_SELECTOR)
        .find(|meta| {
            meta.value()
                .attr(attr)
                .is_some_and(|value| value.eq_ignore_ascii_case(key))
        })
        .and_then(|meta| meta.value().attr("content"))
}

/// `href` of the first `<link>` whose `rel` mentions `canonical`
fn canonical_href(doc: &Html) -> Option<&str> {
    doc.select(&LINK_SELECTOR)
        .find(|link| {
            link.value()
                .attr("rel")
                .is_some_and(|rel| rel.to_ascii_lowercase().contains("canonical"))
        })
        .and_then(|link| link.value().attr("href"))
}

fn title_text(doc: &Html) -> Option<String> {
    doc.select(&TITLE_SELECTOR)
        .next()
        .map(|title: ElementRef<'_>| title.text().collect())
}

/// Resolve every metadata field from page markup plus container hints
pub fn extract_html(html: &str, hints: &ArchiveHints) -> HtmlMetadata {
    let doc = Html::parse_document(html);
    let ld = extract_json_ld(&doc);
    let meta = |attr: &str, key: &str| meta_content(&doc, attr, key);

    let title = first_nonempty([
        meta("property", "og:title").map(str::to_string),
        meta("name", "twitter:title").map(str::to_string),
        meta("name", "title").map(str::to_string),
        ld.headline.clone(),
        title_text(&doc),
    ]);

    let author = first_nonempty([
        meta("name", "author"),
        meta("property", "article:author"),
        meta("name", "parsely-author"),
        meta("name", "byline"),
        ld.author.as_deref(),
    ]);

    let published_raw = first_nonempty([
        meta("property", "article:published_time"),
        meta("name", "pubdate"),
        meta("name", "publishdate"),
        meta("name", "date"),
        meta("property", "og:published_time"),
        ld.date_published.as_deref(),
        hints.capture_date.as_deref(),
    ]);

    let source_url = first_nonempty([
        canonical_href(&doc),
        meta("property", "og:url"),
        ld.url.as_deref(),
        hints.part_location.as_deref(),
        hints.capture_url.as_deref(),
    ]);

    let keywords = first_nonempty([meta("name", "keywords"), meta("property", "article:tag")]);

    let publisher = first_nonempty([
        meta("property", "article:publisher"),
        meta("name", "publisher"),
        ld.publisher.as_deref(),
    ]);

    let language = doc.root_element().value().attr("lang").and_then(clean_text);

    let description = first_nonempty([
        meta("name", "description"),
        meta("property", "og:description"),
    ]);

    HtmlMetadata {
        title,
        author,
        published_raw,
        source_url,
        keywords,
        publisher,
        language,
        description,
    }
}

/// Lowercase hex SHA-256 of the raw archive bytes
pub fn content_sha256(raw: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    format!("{:x}", hasher.finalize())
}

/// Extract metadata from archive bytes already in memory
///
/// File-system facts (`archive_capture_iso`, `filename`, `source_path`) are
/// left empty; [`extract_from_mht`] fills the capture time.
pub fn extract_from_bytes(raw: &[u8]) -> ExtractedMetadata {
    let archive = mime::unpack(raw);
    if !archive.has_html_part {
        debug!(mime = %archive.source_mime(), "No HTML part found, reading the archive as text");
    }
    let found = extract_html(&archive.html, &ArchiveHints::from_archive(&archive));

    let published_date_iso = found
        .published_raw
        .as_deref()
        .and_then(normalize_date)
        .map(|dt| to_iso(&dt));

    ExtractedMetadata {
        title: found.title,
        author: found.author,
        published_date_iso,
        source_url: found.source_url,
        subject: found.description,
        keywords: found.keywords,
        language: found.language,
        publisher: found.publisher,
        source_mime: Some(archive.source_mime().to_string()),
        content_sha256: Some(content_sha256(raw)),
        ..ExtractedMetadata::default()
    }
}

/// Read an MHT/MHTML file and extract its metadata
pub fn extract_from_mht(path: &Path) -> Result<ExtractedMetadata> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let raw = fs::read(path)?;
    let mut meta = extract_from_bytes(&raw);
    meta.archive_capture_iso = Some(to_iso(&source_file_time(path)?));
    Ok(meta)
}

/// Creation time of a file, or its modification time where the platform
/// does not record creation
pub fn source_file_time(path: &Path) -> Result<DateTime<Utc>> {
    let stat = fs::metadata(path)?;
    let time = stat.created().or_else(|_| stat.modified())?;
    Ok(DateTime::<Utc>::from(time))
}
