//! Entity name normalization and resolution (C1).
//!
//! Pure and deterministic: prevents duplicate entity nodes by normalizing a
//! raw mention and, given a set of already-canonical names, fuzzy-matching it
//! against them before falling back to the normalized form itself.

use std::collections::HashSet;
use std::sync::LazyLock;

pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_NAME_LENGTH: usize = 100;
pub const FUZZY_THRESHOLD: f64 = 0.85;

/// Generic stopwords — names that should never become graph nodes. Roughly
/// 80 terms covering articles, auxiliaries, and conversational noise; this is
/// the mechanism, not a corpus-specific alias table (those live with the
/// deployment, not the crate).
pub static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "a", "an", "is", "was", "are", "were", "be", "been", "being", "have", "has", "had",
        "do", "does", "did", "will", "would", "could", "should", "may", "might", "shall", "can",
        "must", "that", "this", "these", "those", "it", "its", "they", "them", "their", "we",
        "our", "you", "your", "he", "his", "she", "her", "if", "then", "else", "when", "where",
        "how", "what", "which", "who", "whom", "why", "not", "no", "yes", "ok", "done", "true",
        "false", "null", "none", "just", "also", "very", "too", "only", "even", "still",
        "already", "system", "user", "agent", "tool", "command", "output", "input", "result",
        "error", "warning", "info", "debug", "log", "data", "file", "path", "name", "type",
        "value", "key", "id", "status", "ping", "pong", "convo", "conversation", "session",
        "turn", "message", "response", "request", "query", "search",
    ]
    .into_iter()
    .collect()
});

/// Lowercase, strip a leading article, collapse internal whitespace, trim
/// trailing punctuation.
pub fn normalize_entity_name(name: &str) -> String {
    let mut s = name.trim().to_lowercase();

    for article in ["the ", "a ", "an "] {
        if let Some(rest) = s.strip_prefix(article) {
            s = rest.to_string();
            break;
        }
    }

    let collapsed: String = s.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(['.', ',', ';', ':', '!', '?'])
        .to_string()
}

/// Reject stopwords, out-of-range lengths, and pure-digit strings.
pub fn is_valid_entity(name: &str) -> bool {
    let normalized = normalize_entity_name(name);
    let len = normalized.chars().count();
    if len < MIN_NAME_LENGTH || len > MAX_NAME_LENGTH {
        return false;
    }
    if STOPWORDS.contains(normalized.as_str()) {
        return false;
    }
    if !normalized.is_empty() && normalized.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    true
}

/// Direct alias map — deployment-specific equivalences (e.g. nicknames,
/// organization short forms) supplied by the caller rather than hardcoded,
/// since they are corpus data, not part of the resolution mechanism.
pub type AliasMap = std::collections::HashMap<String, String>;

/// Resolve a raw mention to its canonical form, or `None` if it should be
/// skipped entirely (stopword, too short/long, pure digits).
///
/// Order: alias table, then fuzzy match against `existing` canonicals using a
/// longest-common-subsequence-style similarity ratio, accepting the first
/// match at or above [`FUZZY_THRESHOLD`]; otherwise the normalized form.
pub fn resolve_entity(
    name: &str,
    aliases: &AliasMap,
    existing: &[String],
) -> Option<String> {
    if !is_valid_entity(name) {
        return None;
    }

    let normalized = normalize_entity_name(name);

    if let Some(canonical) = aliases.get(&normalized) {
        return Some(canonical.clone());
    }

    for candidate in existing {
        let candidate_norm = normalize_entity_name(candidate);
        if lcs_ratio(&normalized, &candidate_norm) >= FUZZY_THRESHOLD {
            return Some(candidate_norm);
        }
    }

    Some(normalized)
}

/// Longest-common-subsequence ratio: `2 * lcs_len / (len(a) + len(b))`, 1.0
/// for identical strings, 0.0 for disjoint character sets.
fn lcs_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ai in &a {
        for (j, bj) in b.iter().enumerate() {
            curr[j + 1] = if ai == bj {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let lcs_len = prev[b.len()];

    (2 * lcs_len) as f64 / (a.len() + b.len()) as f64
}

/// Heuristic entity extraction from free text: capitalized multi-word spans,
/// hyphen/underscore technical terms, and quoted strings. Shared by retrieval
/// (graph-enhanced search), the temporal engine (episode mention linking),
/// and the ingestion engine (retraction cascade).
pub fn extract_entities(text: &str, max: usize) -> Vec<String> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();

    // Quoted strings first — most likely to be precise.
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '"' {
            if let Some(end) = text[i + 1..].find('"') {
                let candidate = &text[i + 1..i + 1 + end];
                push_unique(&mut found, &mut seen, candidate, max);
            }
        }
    }

    // Hyphen/underscore technical terms: tokens containing `-` or `_` with
    // at least one alphabetic character on each side.
    for token in text.split_whitespace() {
        let trimmed = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '_');
        if (trimmed.contains('-') || trimmed.contains('_'))
            && trimmed.chars().any(|c| c.is_alphabetic())
        {
            push_unique(&mut found, &mut seen, trimmed, max);
        }
    }

    // Capitalized multi-word spans: runs of Title-Case words.
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut i = 0;
    while i < words.len() {
        if starts_capitalized(words[i]) {
            let start = i;
            while i < words.len() && starts_capitalized(words[i]) {
                i += 1;
            }
            if i > start {
                let span = words[start..i]
                    .iter()
                    .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
                    .collect::<Vec<_>>()
                    .join(" ");
                if !span.is_empty() {
                    push_unique(&mut found, &mut seen, &span, max);
                }
            }
        } else {
            i += 1;
        }
    }

    found
}

fn starts_capitalized(word: &str) -> bool {
    word.chars()
        .find(|c| c.is_alphabetic())
        .is_some_and(|c| c.is_uppercase())
}

fn push_unique(found: &mut Vec<String>, seen: &mut HashSet<String>, candidate: &str, max: usize) {
    if found.len() >= max {
        return;
    }
    let key = candidate.to_lowercase();
    if key.is_empty() || seen.contains(&key) {
        return;
    }
    seen.insert(key);
    found.push(candidate.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_article_and_punctuation() {
        assert_eq!(normalize_entity_name("The  Aletheia System.  "), "aletheia system");
    }

    #[test]
    fn stopwords_are_invalid() {
        assert!(!is_valid_entity("the"));
        assert!(!is_valid_entity("system"));
    }

    #[test]
    fn pure_digits_are_invalid() {
        assert!(!is_valid_entity("12345"));
    }

    #[test]
    fn too_short_or_long_is_invalid() {
        assert!(!is_valid_entity("x"));
        assert!(!is_valid_entity(&"x".repeat(101)));
    }

    #[test]
    fn resolve_uses_alias_table_first() {
        let mut aliases = AliasMap::new();
        aliases.insert("ck".to_string(), "cody".to_string());
        let resolved = resolve_entity("CK", &aliases, &[]);
        assert_eq!(resolved, Some("cody".to_string()));
    }

    #[test]
    fn resolve_fuzzy_matches_existing_canonical() {
        let aliases = AliasMap::new();
        let existing = vec!["aletheia system".to_string()];
        let resolved = resolve_entity("aletheia systme", &aliases, &existing);
        assert_eq!(resolved, Some("aletheia system".to_string()));
    }

    #[test]
    fn resolve_fixpoint() {
        let aliases = AliasMap::new();
        let existing = vec![];
        let once = resolve_entity("Cody Kickertz", &aliases, &existing).unwrap();
        let twice = resolve_entity(&once, &aliases, &existing).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn extract_entities_finds_quoted_and_capitalized() {
        let text = r#"Cody Kickertz mentioned "Project Chimera" and the ut-austin program."#;
        let found = extract_entities(text, 10);
        assert!(found.iter().any(|e| e == "Cody Kickertz"));
        assert!(found.iter().any(|e| e == "Project Chimera"));
        assert!(found.iter().any(|e| e == "ut-austin"));
    }

    #[test]
    fn extract_entities_respects_cap() {
        let text = "Alpha Beta Gamma Delta Epsilon Zeta Eta Theta Iota Kappa Lambda";
        let found = extract_entities(text, 3);
        assert!(found.len() <= 3);
    }
}
