//! MIME unpacking for MHT/MHTML web archives
//!
//! Only what the metadata pipeline needs: the top-level header block and the
//! first HTML body part, decoded to text. Everything else in the container
//! (images, stylesheets, frames) is ignored.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use encoding_rs::{Encoding, UTF_8};

use crate::text::first_nonempty;

/// Nested multiparts deeper than this are not searched
const MAX_MULTIPART_DEPTH: usize = 8;

/// Base64 decoder that tolerates missing or extra padding
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Header block of a MIME entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Parse an RFC 822 style header block, unfolding continuation lines
    pub fn parse(block: &[u8]) -> Self {
        let text = String::from_utf8_lossy(block);
        let mut entries: Vec<(String, String)> = Vec::new();

        for line in text.lines() {
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = entries.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if !name.is_empty() && !name.contains(char::is_whitespace) {
                    entries.push((name.to_string(), value.trim().to_string()));
                }
            }
        }

        Self { entries }
    }

    /// Case-insensitive lookup; a repeated header resolves to its last value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Parsed `Content-Type` header value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Lowercased `type/subtype`
    pub mime: String,
    /// Parameters with lowercased names and unquoted values
    pub params: Vec<(String, String)>,
}

impl Default for ContentType {
    fn default() -> Self {
        Self {
            mime: "text/plain".to_string(),
            params: Vec::new(),
        }
    }
}

impl ContentType {
    /// Parse a header value like `multipart/related; boundary="----=_Part"; type="text/html"`
    ///
    /// A missing or malformed value falls back to `text/plain`.
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };

        let mut segments = split_params(value).into_iter();
        let mime = segments
            .next()
            .map(|m| m.trim().to_ascii_lowercase())
            .unwrap_or_default();
        if !mime.contains('/') {
            return Self::default();
        }

        let params = segments
            .filter_map(|segment| {
                let (name, value) = segment.split_once('=')?;
                let name = name.trim().to_ascii_lowercase();
                if name.is_empty() {
                    return None;
                }
                Some((name, unquote(value.trim())))
            })
            .collect();

        Self { mime, params }
    }

    /// Content type of an entity, from its headers
    pub fn from_headers(headers: &Headers) -> Self {
        Self::parse(headers.get("Content-Type"))
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_multipart(&self) -> bool {
        self.mime.starts_with("multipart/")
    }

    pub fn is_html(&self) -> bool {
        self.mime == "text/html"
    }
}

/// Split on `;` outside double quotes
fn split_params(value: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in value.chars() {
        match c {
            _ if escaped => {
                current.push(c);
                escaped = false;
            }
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                in_quotes = !in_quotes;
            }
            ';' if !in_quotes => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

fn unquote(value: &str) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => value.to_string(),
    }
}

/// Split an entity into its header block and body at the first empty line
fn split_head_body(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut pos = 0;
    while pos < raw.len() {
        let line_end = raw[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(raw.len(), |i| pos + i);
        let line = &raw[pos..line_end];
        if line.is_empty() || line == b"\r" {
            let body_start = (line_end + 1).min(raw.len());
            return (&raw[..pos], &raw[body_start..]);
        }
        pos = line_end + 1;
    }
    (raw, &[])
}

/// Split a multipart body into its raw parts (headers + body each)
///
/// The preamble and epilogue are dropped. A missing close delimiter keeps
/// whatever follows the last delimiter as the final part.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();
    let mut current: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i);
        let next = (line_end + 1).min(body.len());
        let line = body[pos..line_end].trim_ascii_end();

        if let Some(rest) = line.strip_prefix(delimiter) {
            let closing = rest == b"--";
            if rest.is_empty() || closing {
                if let Some(start) = current.take() {
                    parts.push(strip_line_break(&body[start..pos]));
                }
                if closing {
                    return parts;
                }
                current = Some(next);
            }
        }
        pos = next;
    }

    if let Some(start) = current {
        parts.push(&body[start..]);
    }
    parts
}

/// The line break before a delimiter belongs to the delimiter
fn strip_line_break(part: &[u8]) -> &[u8] {
    part.strip_suffix(b"\r\n")
        .or_else(|| part.strip_suffix(b"\n"))
        .unwrap_or(part)
}

/// Undo the `Content-Transfer-Encoding`
///
/// Returns `None` when the body cannot be decoded.
fn decode_transfer(headers: &Headers, body: &[u8]) -> Option<Vec<u8>> {
    let encoding = headers
        .get("Content-Transfer-Encoding")
        .map(|e| e.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match encoding.as_str() {
        "base64" => {
            let compact: Vec<u8> = body
                .iter()
                .copied()
                .filter(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
                .collect();
            let trimmed = compact
                .iter()
                .position(|&b| b == b'=')
                .map_or(&compact[..], |i| &compact[..i]);
            LENIENT_BASE64.decode(trimmed).ok()
        }
        "quoted-printable" => Some(decode_quoted_printable(body)),
        _ => Some(body.to_vec()),
    }
}

/// Decode quoted-printable, dropping soft line breaks
fn decode_quoted_printable(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        if input[i] != b'=' {
            out.push(input[i]);
            i += 1;
            continue;
        }

        let rest = &input[i + 1..];
        if rest.starts_with(b"\r\n") {
            i += 3;
        } else if rest.starts_with(b"\n") {
            i += 2;
        } else if let Some(byte) = rest.get(..2).and_then(hex_pair) {
            out.push(byte);
            i += 3;
        } else {
            // Trailing whitespace before a soft break
            let ws = rest.iter().take_while(|b| matches!(b, b' ' | b'\t')).count();
            let after = &rest[ws..];
            if ws > 0 && (after.starts_with(b"\r\n") || after.starts_with(b"\n")) {
                i += 1 + ws + if after.starts_with(b"\r\n") { 2 } else { 1 };
            } else {
                out.push(b'=');
                i += 1;
            }
        }
    }
    out
}

fn hex_pair(pair: &[u8]) -> Option<u8> {
    if !pair.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let text = std::str::from_utf8(pair).ok()?;
    u8::from_str_radix(text, 16).ok()
}

/// Decode an HTML part body to text using its declared charset
fn decode_text(headers: &Headers, content_type: &ContentType, body: &[u8]) -> Option<String> {
    let bytes = decode_transfer(headers, body)?;
    if bytes.is_empty() {
        return None;
    }
    let encoding = content_type
        .param("charset")
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(&bytes);
    if text.trim().is_empty() {
        None
    } else {
        Some(text.into_owned())
    }
}

/// HTML body found inside a container
#[derive(Debug, Clone, PartialEq, Eq)]
struct HtmlBody {
    html: String,
    location: Option<String>,
}

fn first_html_part(body: &[u8], boundary: &str, depth: usize) -> Option<HtmlBody> {
    for part in split_multipart(body, boundary) {
        let (head, content) = split_head_body(part);
        let headers = Headers::parse(head);
        let content_type = ContentType::from_headers(&headers);

        if content_type.is_multipart() {
            if depth < MAX_MULTIPART_DEPTH {
                if let Some(found) = content_type
                    .param("boundary")
                    .and_then(|b| first_html_part(content, b, depth + 1))
                {
                    return Some(found);
                }
            }
            continue;
        }

        if content_type.is_html() {
            if let Some(html) = decode_text(&headers, &content_type, content) {
                let location = first_nonempty([headers.get("Content-Location")]);
                return Some(HtmlBody { html, location });
            }
        }
    }
    None
}

/// An unpacked web archive
#[derive(Debug, Clone)]
pub struct Archive {
    /// Top-level headers
    pub headers: Headers,
    /// Top-level content type
    pub content_type: ContentType,
    /// Primary HTML document (the raw container as text when no HTML part exists)
    pub html: String,
    /// Whether `html` came from a real `text/html` body
    pub has_html_part: bool,
    /// `Content-Location` of the HTML part
    pub html_location: Option<String>,
}

impl Archive {
    /// URL the snapshot was captured from, per the container headers
    pub fn capture_url(&self) -> Option<String> {
        first_nonempty([
            self.headers.get("Snapshot-Content-Location"),
            self.headers.get("Content-Location"),
            self.headers.get("X-Original-URL"),
            self.headers.get("X-Source-URL"),
        ])
    }

    /// Capture date string, per the container headers
    pub fn capture_date(&self) -> Option<String> {
        first_nonempty([
            self.headers.get("Date"),
            self.headers.get("X-MSFileLastModified"),
        ])
    }

    /// Top-level MIME type, e.g. `multipart/related`
    pub fn source_mime(&self) -> &str {
        &self.content_type.mime
    }
}

/// Unpack the raw bytes of an MHT/MHTML file
///
/// Never fails: malformed containers degrade to treating the whole file as
/// HTML text.
pub fn unpack(raw: &[u8]) -> Archive {
    let (head, body) = split_head_body(raw);
    let headers = Headers::parse(head);
    let content_type = ContentType::from_headers(&headers);

    let found = if content_type.is_multipart() {
        content_type
            .param("boundary")
            .and_then(|boundary| first_html_part(body, boundary, 0))
    } else if content_type.is_html() {
        decode_text(&headers, &content_type, body).map(|html| HtmlBody {
            html,
            location: None,
        })
    } else {
        None
    };

    match found {
        Some(HtmlBody { html, location }) => Archive {
            headers,
            content_type,
            html,
            has_html_part: true,
            html_location: location,
        },
        None => Archive {
            headers,
            content_type,
            html: String::from_utf8_lossy(raw).into_owned(),
            has_html_part: false,
            html_location: None,
        },
    }
}
