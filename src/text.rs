//! Whitespace normalization and first-non-empty selection

/// Collapse every whitespace run to a single space and trim the ends
///
/// Returns `None` when nothing is left.
pub fn clean_text(value: &str) -> Option<String> {
    let cleaned = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Take the first candidate that is non-empty after [`clean_text`]
///
/// Candidates are examined in order; this is how every metadata field
/// resolves its priority chain.
pub fn first_nonempty<I, S>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| clean_text(candidate.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  Hello \n\t  world  "), Some("Hello world".to_string()));
        assert_eq!(clean_text("\u{a0}x\u{a0}"), Some("x".to_string()));
    }

    #[test]
    fn test_clean_text_empty() {
        assert_eq!(clean_text(""), None);
        assert_eq!(clean_text(" \r\n "), None);
    }

    #[test]
    fn test_first_nonempty_skips_blank_and_missing() {
        let picked = first_nonempty([None, Some("   "), Some(" second  choice "), Some("third")]);
        assert_eq!(picked, Some("second choice".to_string()));
    }

    #[test]
    fn test_first_nonempty_all_missing() {
        assert_eq!(first_nonempty::<_, &str>([None, None]), None);
        assert_eq!(first_nonempty([Some(String::new())]), None);
    }
}
