//! PDF document metadata: writing the info dictionary and XMP packet, and
//! reading them back

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::date::{parse_iso, to_iso, to_pdf_date};
use crate::error::{Error, Result};
use crate::extract::{source_file_time, ExtractedMetadata};
use crate::pdf::xmp::build_packet;

/// `/Creator` written into every converted document
pub const CREATOR: &str = "mht2pdf metadata pipeline";

/// `/Producer` written into every converted document
pub const PRODUCER: &str = "mht2pdf + lopdf";

/// Subjects longer than this many characters are cut
const MAX_SUBJECT_CHARS: usize = 2000;

/// Final metadata values for one PDF, after fallbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: String,
    pub author: String,
    pub subject: String,
    pub keywords: Option<String>,
    /// Publish date, or the source file time when the page had none
    pub published: DateTime<Utc>,
    /// Conversion time
    pub modified: DateTime<Utc>,
    pub source_url: Option<String>,
    pub source_file: String,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub archive_capture_iso: Option<String>,
    pub content_sha256: Option<String>,
    pub source_mime: Option<String>,
    pub creator: String,
    pub producer: String,
}

impl DocumentMetadata {
    /// Resolve the values to embed for `source_file`
    ///
    /// - title falls back to the source file stem
    /// - author falls back to `"Unknown"`
    /// - the publish date falls back to the source file's creation time
    /// - the subject joins the description, source URL and publish date with `" | "`
    pub fn from_extracted(
        meta: &ExtractedMetadata,
        source_file: &Path,
        converted_at: DateTime<Utc>,
    ) -> Result<Self> {
        let published = match meta.published_date_iso.as_deref().and_then(parse_iso) {
            Some(published) => published,
            None => source_file_time(source_file)?,
        };

        let title = meta.title.clone().unwrap_or_else(|| {
            source_file
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        let mut subject_parts = Vec::new();
        if let Some(description) = &meta.subject {
            subject_parts.push(description.clone());
        }
        if let Some(url) = &meta.source_url {
            subject_parts.push(format!("Source URL: {}", url));
        }
        subject_parts.push(format!("Published: {}", to_iso(&published)));
        let subject: String = subject_parts
            .join(" | ")
            .chars()
            .take(MAX_SUBJECT_CHARS)
            .collect();

        Ok(Self {
            title,
            author: meta.author.clone().unwrap_or_else(|| "Unknown".to_string()),
            subject,
            keywords: meta.keywords.clone(),
            published,
            modified: converted_at,
            source_url: meta.source_url.clone(),
            source_file: source_file.display().to_string(),
            publisher: meta.publisher.clone(),
            language: meta.language.clone(),
            archive_capture_iso: meta.archive_capture_iso.clone(),
            content_sha256: meta.content_sha256.clone(),
            source_mime: meta.source_mime.clone(),
            creator: CREATOR.to_string(),
            producer: PRODUCER.to_string(),
        })
    }

    /// Info dictionary entries, in the order they are written
    pub fn info_entries(&self) -> Vec<(&'static str, String)> {
        let or_empty = |value: &Option<String>| value.clone().unwrap_or_default();
        vec![
            ("Title", self.title.clone()),
            ("Author", self.author.clone()),
            ("Subject", self.subject.clone()),
            ("Keywords", or_empty(&self.keywords)),
            ("Creator", self.creator.clone()),
            ("Producer", self.producer.clone()),
            ("CreationDate", to_pdf_date(&self.published)),
            ("ModDate", to_pdf_date(&self.modified)),
            ("SourceURL", or_empty(&self.source_url)),
            ("SourceFile", self.source_file.clone()),
            ("Publisher", or_empty(&self.publisher)),
            ("Language", or_empty(&self.language)),
            ("ArchiveCaptureDate", or_empty(&self.archive_capture_iso)),
            ("ContentSHA256", or_empty(&self.content_sha256)),
            ("SourceMIME", or_empty(&self.source_mime)),
        ]
    }
}

/// Encode a PDF text string: ASCII as a literal, anything else as UTF-16BE with BOM
pub fn encode_text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Decode a PDF text string (UTF-16BE with BOM, UTF-8, or single-byte)
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Object id of the document catalog
fn catalog_id(doc: &Document) -> Result<ObjectId> {
    doc.trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| Error::General("No Root reference in trailer".to_string()))
}

/// Object id of the info dictionary, creating one if the document has none
///
/// An info dictionary stored directly in the trailer is moved into its own
/// object so it can be updated like any other.
fn info_dictionary_id(doc: &mut Document) -> ObjectId {
    match doc.trailer.get(b"Info").ok().cloned() {
        Some(Object::Reference(id)) if doc.get_object(id).and_then(Object::as_dict).is_ok() => {
            return id;
        }
        Some(Object::Dictionary(inline)) => {
            let id = doc.add_object(inline);
            doc.trailer.set("Info", Object::Reference(id));
            return id;
        }
        _ => {}
    }

    let id = doc.add_object(Dictionary::new());
    doc.trailer.set("Info", Object::Reference(id));
    id
}

/// Point the catalog at a fresh XMP stream, reusing the old packet's object id
fn set_xmp_packet(doc: &mut Document, packet: String) -> Result<()> {
    let root = catalog_id(doc)?;

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"Metadata".to_vec()));
    dict.set("Subtype", Object::Name(b"XML".to_vec()));
    let mut stream = Stream::new(dict, packet.into_bytes());
    stream.allows_compression = false;

    let existing = doc
        .get_object(root)
        .and_then(Object::as_dict)
        .and_then(|catalog| catalog.get(b"Metadata"))
        .and_then(Object::as_reference)
        .ok()
        .filter(|id| doc.objects.contains_key(id));

    match existing {
        Some(id) => {
            doc.objects.insert(id, Object::Stream(stream));
        }
        None => {
            let id = doc.add_object(stream);
            doc.get_object_mut(root)?
                .as_dict_mut()?
                .set("Metadata", Object::Reference(id));
        }
    }
    Ok(())
}

/// Stamp metadata into a PDF in place
///
/// Info dictionary keys are merged over whatever the renderer wrote; the XMP
/// packet is replaced. The document is saved next to the original as
/// `<stem>.tmp.pdf` and then renamed over it.
pub fn apply_metadata(pdf_path: &Path, meta: &DocumentMetadata) -> Result<()> {
    if !pdf_path.exists() {
        return Err(Error::FileNotFound(pdf_path.to_path_buf()));
    }

    let mut doc = Document::load(pdf_path)?;

    let info_id = info_dictionary_id(&mut doc);
    let info = doc.get_object_mut(info_id)?.as_dict_mut()?;
    for (key, value) in meta.info_entries() {
        info.set(key, encode_text_string(&value));
    }

    set_xmp_packet(&mut doc, build_packet(meta))?;

    let tmp_path = pdf_path.with_extension("tmp.pdf");
    doc.compress();
    doc.save(&tmp_path)?;
    fs::rename(&tmp_path, pdf_path)?;

    Ok(())
}

/// Count pages by reading the Count field from the Pages dictionary
fn count_pages_from_catalog(doc: &Document) -> Result<usize> {
    let catalog = doc.get_object(catalog_id(doc)?)?.as_dict()?;
    let pages_id = catalog
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| Error::General("No Pages reference in catalog".to_string()))?;
    let count = doc
        .get_object(pages_id)?
        .as_dict()?
        .get(b"Count")
        .and_then(Object::as_i64)
        .map_err(|_| Error::General("No integer Count in Pages".to_string()))?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Metadata read back from a PDF
#[derive(Debug, Clone, Default)]
pub struct PdfInfo {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Info dictionary entries with string values, decoded
    pub entries: BTreeMap<String, String>,
    /// The XMP packet, if the catalog references one
    pub xmp: Option<String>,
}

impl PdfInfo {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

/// Read page count, info dictionary and XMP packet from a PDF file
pub fn read_info(path: &Path) -> Result<PdfInfo> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    let page_count = count_pages_from_catalog(&doc)?;

    let mut entries = BTreeMap::new();
    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_object(*id).and_then(Object::as_dict).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };
    if let Some(info) = info {
        for (key, value) in info.iter() {
            if let Object::String(bytes, _) = value {
                entries.insert(
                    String::from_utf8_lossy(key).into_owned(),
                    decode_text_string(bytes),
                );
            }
        }
    }

    let xmp = doc
        .get_object(catalog_id(&doc)?)
        .and_then(Object::as_dict)
        .and_then(|catalog| catalog.get(b"Metadata"))
        .and_then(Object::as_reference)
        .and_then(|id| doc.get_object(id))
        .ok()
        .and_then(|object| match object {
            Object::Stream(stream) => {
                let bytes = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                Some(String::from_utf8_lossy(&bytes).into_owned())
            }
            _ => None,
        });

    Ok(PdfInfo {
        page_count,
        entries,
        xmp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lopdf::dictionary;
    use tempfile::TempDir;

    /// One blank page, optionally with a renderer-style info dictionary
    fn write_blank_pdf(path: &Path, with_info: bool) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        if with_info {
            let info_id = doc.add_object(dictionary! {
                "Creator" => Object::string_literal("Chromium"),
                "Producer" => Object::string_literal("Skia/PDF m120"),
                "Trapped" => "False",
            });
            doc.trailer.set("Info", info_id);
        }
        doc.save(path).unwrap();
    }

    fn extracted() -> ExtractedMetadata {
        ExtractedMetadata {
            title: Some("Café reviews".to_string()),
            author: Some("Ann Author".to_string()),
            published_date_iso: Some("2024-01-02T15:00:00+00:00".to_string()),
            source_url: Some("https://example.com/cafe".to_string()),
            subject: Some("Where to eat".to_string()),
            keywords: Some("food, coffee".to_string()),
            language: Some("fr".to_string()),
            publisher: Some("Le Journal".to_string()),
            archive_capture_iso: Some("2024-02-01T00:00:00+00:00".to_string()),
            source_mime: Some("multipart/related".to_string()),
            content_sha256: Some("ab".repeat(32)),
            ..ExtractedMetadata::default()
        }
    }

    fn converted_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_text_string_encoding() {
        match encode_text_string("plain") {
            Object::String(bytes, StringFormat::Literal) => assert_eq!(bytes, b"plain"),
            other => panic!("Expected literal string, got {:?}", other),
        }
        match encode_text_string("é") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(bytes, vec![0xFE, 0xFF, 0x00, 0xE9]);
            }
            other => panic!("Expected hex string, got {:?}", other),
        }
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0xE9]), "é");
        assert_eq!(decode_text_string(b"ascii"), "ascii");
        assert_eq!(decode_text_string(&[0x41, 0xE9]), "Aé");
    }

    #[test]
    fn test_from_extracted_uses_page_values() {
        let meta = DocumentMetadata::from_extracted(
            &extracted(),
            Path::new("/archive/cafe.mht"),
            converted_at(),
        )
        .unwrap();
        assert_eq!(meta.title, "Café reviews");
        assert_eq!(meta.author, "Ann Author");
        assert_eq!(
            meta.subject,
            "Where to eat | Source URL: https://example.com/cafe | Published: 2024-01-02T15:00:00+00:00"
        );
        assert_eq!(meta.published, Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap());
        assert_eq!(meta.source_file, "/archive/cafe.mht");
    }

    #[test]
    fn test_from_extracted_fallbacks() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("Saved Page.mht");
        fs::write(&source, b"x").unwrap();

        let meta = DocumentMetadata::from_extracted(
            &ExtractedMetadata::default(),
            &source,
            converted_at(),
        )
        .unwrap();
        assert_eq!(meta.title, "Saved Page");
        assert_eq!(meta.author, "Unknown");
        assert_eq!(meta.published, source_file_time(&source).unwrap());
        assert!(meta.subject.starts_with("Published: "));
    }

    #[test]
    fn test_subject_is_truncated() {
        let meta = ExtractedMetadata {
            subject: Some("é".repeat(3000)),
            ..extracted()
        };
        let doc_meta =
            DocumentMetadata::from_extracted(&meta, Path::new("x.mht"), converted_at()).unwrap();
        assert_eq!(doc_meta.subject.chars().count(), 2000);
    }

    #[test]
    fn test_info_entries_order_and_dates() {
        let meta =
            DocumentMetadata::from_extracted(&extracted(), Path::new("a.mht"), converted_at())
                .unwrap();
        let entries = meta.info_entries();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                "Title", "Author", "Subject", "Keywords", "Creator", "Producer",
                "CreationDate", "ModDate", "SourceURL", "SourceFile", "Publisher",
                "Language", "ArchiveCaptureDate", "ContentSHA256", "SourceMIME",
            ]
        );
        let lookup: BTreeMap<_, _> = entries.into_iter().collect();
        assert_eq!(lookup["CreationDate"], "D:20240102150000+00'00'");
        assert_eq!(lookup["ModDate"], "D:20240601080000+00'00'");
    }

    #[test]
    fn test_apply_metadata_round_trip() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("out.pdf");
        write_blank_pdf(&pdf, true);

        let meta =
            DocumentMetadata::from_extracted(&extracted(), Path::new("a.mht"), converted_at())
                .unwrap();
        apply_metadata(&pdf, &meta).unwrap();

        assert!(!dir.path().join("out.tmp.pdf").exists());

        let info = read_info(&pdf).unwrap();
        assert_eq!(info.page_count, 1);
        assert_eq!(info.get("Title"), Some("Café reviews"));
        assert_eq!(info.get("Author"), Some("Ann Author"));
        assert_eq!(info.get("Creator"), Some(CREATOR));
        assert_eq!(info.get("Producer"), Some(PRODUCER));
        assert_eq!(info.get("SourceURL"), Some("https://example.com/cafe"));
        assert_eq!(info.get("Language"), Some("fr"));
        assert_eq!(info.get("CreationDate"), Some("D:20240102150000+00'00'"));

        let xmp = info.xmp.expect("xmp packet");
        assert!(xmp.contains("Café reviews"));
        assert!(xmp.contains("<rdf:li>coffee</rdf:li>"));
    }

    #[test]
    fn test_apply_metadata_twice_reuses_packet_object() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("again.pdf");
        write_blank_pdf(&pdf, false);

        let meta =
            DocumentMetadata::from_extracted(&extracted(), Path::new("a.mht"), converted_at())
                .unwrap();
        apply_metadata(&pdf, &meta).unwrap();
        let first_count = Document::load(&pdf).unwrap().objects.len();

        let retitled = DocumentMetadata {
            title: "Second pass".to_string(),
            ..meta
        };
        apply_metadata(&pdf, &retitled).unwrap();
        let doc = Document::load(&pdf).unwrap();
        assert_eq!(doc.objects.len(), first_count);

        let info = read_info(&pdf).unwrap();
        assert_eq!(info.get("Title"), Some("Second pass"));
        assert!(info.xmp.unwrap().contains("Second pass"));
    }

    #[test]
    fn test_apply_metadata_missing_file() {
        let meta =
            DocumentMetadata::from_extracted(&extracted(), Path::new("a.mht"), converted_at())
                .unwrap();
        let result = apply_metadata(Path::new("missing.pdf"), &meta);
        assert!(matches!(result.unwrap_err(), Error::FileNotFound(_)));
    }

    #[test]
    fn test_read_info_nonexistent_file() {
        let result = read_info(Path::new("nonexistent.pdf"));
        assert!(matches!(result.unwrap_err(), Error::FileNotFound(_)));
    }
}
