//! JSON-LD structured data
//!
//! Pulls the handful of Schema.org properties the metadata chains consume
//! out of `<script type="application/ld+json">` blocks.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::{Map, Value};

#[allow(clippy::expect_used)]
static SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script[type]").expect("valid selector"));

/// Values found across all JSON-LD blocks of a page, first one wins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonLdFields {
    pub headline: Option<String>,
    pub date_published: Option<String>,
    pub url: Option<String>,
    pub publisher: Option<String>,
    pub author: Option<String>,
}

impl JsonLdFields {
    fn absorb(&mut self, node: &Map<String, Value>) {
        fill(&mut self.headline, node.get("headline").and_then(Value::as_str));
        fill(&mut self.date_published, node.get("datePublished").and_then(Value::as_str));
        fill(&mut self.url, node.get("url").and_then(Value::as_str));

        if is_missing(&self.publisher) {
            if let Some(name) = node
                .get("publisher")
                .and_then(Value::as_object)
                .and_then(|p| p.get("name"))
                .and_then(Value::as_str)
            {
                self.publisher = Some(name.to_string());
            }
        }

        if is_missing(&self.author) {
            if let Some(author) = node.get("author").and_then(author_names) {
                self.author = Some(author);
            }
        }
    }
}

fn is_missing(slot: &Option<String>) -> bool {
    slot.as_deref().map_or(true, str::is_empty)
}

fn fill(slot: &mut Option<String>, value: Option<&str>) {
    if let Some(value) = value {
        if is_missing(slot) {
            *slot = Some(value.to_string());
        }
    }
}

/// `author` as an object with `name`, a plain string, or a list of either
///
/// Lists are deduplicated in first-seen order and joined with `", "`.
fn author_names(author: &Value) -> Option<String> {
    match author {
        Value::String(name) => Some(name.clone()),
        Value::Object(person) => person.get("name").and_then(Value::as_str).map(str::to_string),
        Value::Array(entries) => {
            let mut names: Vec<&str> = Vec::new();
            for entry in entries {
                let name = match entry {
                    Value::String(name) => Some(name.as_str()),
                    Value::Object(person) => person.get("name").and_then(Value::as_str),
                    _ => None,
                };
                if let Some(name) = name {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
            if names.is_empty() {
                None
            } else {
                Some(names.join(", "))
            }
        }
        _ => None,
    }
}

/// Object nodes of a payload: the top level (or each array element), each
/// followed by the members of its `@graph`
fn object_nodes(payload: &Value) -> Vec<&Map<String, Value>> {
    let top: Vec<&Value> = match payload {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut nodes = Vec::new();
    for value in top {
        let Some(object) = value.as_object() else {
            continue;
        };
        nodes.push(object);
        if let Some(graph) = object.get("@graph").and_then(Value::as_array) {
            nodes.extend(graph.iter().filter_map(Value::as_object));
        }
    }
    nodes
}

/// Collect JSON-LD fields from every structured-data script in the document
///
/// Scripts that are not valid JSON are skipped.
pub fn extract_json_ld(doc: &Html) -> JsonLdFields {
    let mut fields = JsonLdFields::default();

    for script in doc.select(&SCRIPT_SELECTOR) {
        let is_json_ld = script
            .value()
            .attr("type")
            .is_some_and(|t| t.to_ascii_lowercase().contains("ld+json"));
        if !is_json_ld {
            continue;
        }

        let text: String = script.text().collect();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let Ok(payload) = serde_json::from_str::<Value>(text) else {
            continue;
        };

        for node in object_nodes(&payload) {
            fields.absorb(node);
        }
    }

    fields
}
