//! Keyword link replacement and the additive AI merge.

use std::collections::HashSet;

use shared_types::{KeywordInput, KeywordSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordLink {
    /// Normalized keyword name
    pub name: String,
    pub source: KeywordSource,
}

/// Trimmed, single-spaced, lowercase form used as the global keyword key.
pub fn normalize_keyword(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Links that replace the current set, or `None` when no list was submitted.
/// Blank entries are skipped; the first occurrence of a name decides its
/// source.
pub fn plan_keywords(incoming: Option<&[KeywordInput]>) -> Option<Vec<KeywordLink>> {
    let incoming = incoming?;
    let mut seen = HashSet::new();

    let links = incoming
        .iter()
        .filter_map(|k| {
            let name = normalize_keyword(&k.text);
            if name.is_empty() || !seen.insert(name.clone()) {
                return None;
            }
            Some(KeywordLink {
                name,
                source: KeywordSource::from_label(k.source.as_deref()),
            })
        })
        .collect();

    Some(links)
}

/// AI keywords to add on top of the names already linked to a result.
pub fn plan_ai_keywords<'a>(
    existing: impl IntoIterator<Item = &'a str>,
    ai_keywords: &[String],
) -> Vec<KeywordLink> {
    let mut seen: HashSet<String> = existing.into_iter().map(normalize_keyword).collect();

    ai_keywords
        .iter()
        .filter_map(|text| {
            let name = normalize_keyword(text);
            if name.is_empty() || !seen.insert(name.clone()) {
                return None;
            }
            Some(KeywordLink {
                name,
                source: KeywordSource::Ai,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(text: &str, source: &str) -> KeywordInput {
        KeywordInput {
            text: text.to_string(),
            source: Some(source.to_string()),
        }
    }

    #[test]
    fn test_normalize_keyword() {
        assert_eq!(normalize_keyword("  Budget "), "budget");
        assert_eq!(normalize_keyword("Q3   Road\tMap"), "q3 road map");
        assert_eq!(normalize_keyword("   "), "");
    }

    #[test]
    fn test_first_occurrence_wins() {
        let links = plan_keywords(Some(&[kw("budget", "USER"), kw(" Budget ", "AI")])).unwrap();
        assert_eq!(
            links,
            vec![KeywordLink {
                name: "budget".into(),
                source: KeywordSource::User
            }]
        );
    }

    #[test]
    fn test_resubmitting_is_idempotent() {
        let input = [kw("hiring", "ai"), kw("Hiring", "user"), kw("roadmap", "")];
        let first = plan_keywords(Some(&input)).unwrap();
        let second = plan_keywords(Some(&input)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].source, KeywordSource::Ai);
        assert_eq!(first[1].source, KeywordSource::User);
    }

    #[test]
    fn test_absent_and_empty_lists() {
        assert_eq!(plan_keywords(None), None);
        assert_eq!(plan_keywords(Some(&[])), Some(vec![]));
        assert_eq!(plan_keywords(Some(&[kw("  ", "USER")])), Some(vec![]));
    }

    #[test]
    fn test_ai_merge_skips_existing_names() {
        let existing = ["budget"];
        let ai = vec!["Budget".to_string(), "launch".to_string(), "LAUNCH ".to_string()];
        let links = plan_ai_keywords(existing, &ai);
        assert_eq!(
            links,
            vec![KeywordLink {
                name: "launch".into(),
                source: KeywordSource::Ai
            }]
        );
    }
}
