//! Controlled relationship-type vocabulary (C1).
//!
//! `normalize_type` is pure and deterministic: no I/O, no mutable state. The
//! background/endpoint normalization pass (see `evolution::normalize_all_relationships`
//! in the sidecar's graph gateway usage) calls this for every non-vocabulary
//! edge type found in the graph.

/// The closed set of relationship types, `RELATES_TO` is the fallback used
/// when nothing else matches.
pub const CONTROLLED_VOCAB: &[&str] = &[
    "KNOWS",
    "LIVES_IN",
    "WORKS_AT",
    "OWNS",
    "USES",
    "PREFERS",
    "STUDIES",
    "MANAGES",
    "MEMBER_OF",
    "INTERESTED_IN",
    "SKILLED_IN",
    "CREATED",
    "MAINTAINS",
    "DEPENDS_ON",
    "LOCATED_IN",
    "PART_OF",
    "SCHEDULED_FOR",
    "DIAGNOSED_WITH",
    "PRESCRIBED",
    "TREATS",
    "VEHICLE_IS",
    "INSTALLED_ON",
    "COMPATIBLE_WITH",
    "CONNECTED_TO",
    "COMMUNICATES_VIA",
    "CONFIGURED_WITH",
    "RUNS_ON",
    "SERVES",
    "RELATES_TO",
];

pub const FALLBACK_TYPE: &str = "RELATES_TO";

/// Direct alias map `A` — lowercase, underscored source form → canonical type.
fn alias_map() -> &'static [(&'static str, &'static str)] {
    &[
        ("knows", "KNOWS"),
        ("is_friends_with", "KNOWS"),
        ("friend_of", "KNOWS"),
        ("lives_in", "LIVES_IN"),
        ("resides_in", "LIVES_IN"),
        ("works_at", "WORKS_AT"),
        ("works_on", "WORKS_AT"),
        ("employed_by", "WORKS_AT"),
        ("owns", "OWNS"),
        ("has", "OWNS"),
        ("possesses", "OWNS"),
        ("uses", "USES"),
        ("utilizes", "USES"),
        ("prefers", "PREFERS"),
        ("likes", "PREFERS"),
        ("studies", "STUDIES"),
        ("studied_at", "STUDIES"),
        ("manages", "MANAGES"),
        ("leads", "MANAGES"),
        ("member_of", "MEMBER_OF"),
        ("belongs_to", "MEMBER_OF"),
        ("interested_in", "INTERESTED_IN"),
        ("skilled_in", "SKILLED_IN"),
        ("proficient_in", "SKILLED_IN"),
        ("created", "CREATED"),
        ("authored", "CREATED"),
        ("built", "CREATED"),
        ("maintains", "MAINTAINS"),
        ("depends_on", "DEPENDS_ON"),
        ("requires", "DEPENDS_ON"),
        ("located_in", "LOCATED_IN"),
        ("part_of", "PART_OF"),
        ("scheduled_for", "SCHEDULED_FOR"),
        ("diagnosed_with", "DIAGNOSED_WITH"),
        ("prescribed", "PRESCRIBED"),
        ("treats", "TREATS"),
        ("vehicle_is", "VEHICLE_IS"),
        ("drives", "VEHICLE_IS"),
        ("installed_on", "INSTALLED_ON"),
        ("compatible_with", "COMPATIBLE_WITH"),
        ("connected_to", "CONNECTED_TO"),
        ("communicates_via", "COMMUNICATES_VIA"),
        ("configured_with", "CONFIGURED_WITH"),
        ("runs_on", "RUNS_ON"),
        ("serves", "SERVES"),
    ]
}

/// Keyword-substring map `K`, applied in declared order — the first hit wins.
fn keyword_map() -> &'static [(&'static str, &'static str)] {
    &[
        ("friend", "KNOWS"),
        ("live", "LIVES_IN"),
        ("work", "WORKS_AT"),
        ("employ", "WORKS_AT"),
        ("own", "OWNS"),
        ("has_", "OWNS"),
        ("use", "USES"),
        ("prefer", "PREFERS"),
        ("like", "PREFERS"),
        ("stud", "STUDIES"),
        ("manag", "MANAGES"),
        ("lead", "MANAGES"),
        ("member", "MEMBER_OF"),
        ("belong", "MEMBER_OF"),
        ("interest", "INTERESTED_IN"),
        ("skill", "SKILLED_IN"),
        ("creat", "CREATED"),
        ("author", "CREATED"),
        ("build", "CREATED"),
        ("maintain", "MAINTAINS"),
        ("depend", "DEPENDS_ON"),
        ("require", "DEPENDS_ON"),
        ("locat", "LOCATED_IN"),
        ("part", "PART_OF"),
        ("schedul", "SCHEDULED_FOR"),
        ("diagnos", "DIAGNOSED_WITH"),
        ("prescri", "PRESCRIBED"),
        ("treat", "TREATS"),
        ("vehicle", "VEHICLE_IS"),
        ("drive", "VEHICLE_IS"),
        ("install", "INSTALLED_ON"),
        ("compatib", "COMPATIBLE_WITH"),
        ("connect", "CONNECTED_TO"),
        ("communicat", "COMMUNICATES_VIA"),
        ("config", "CONFIGURED_WITH"),
        ("run", "RUNS_ON"),
        ("serv", "SERVES"),
    ]
}

/// Normalize a raw relationship type into the controlled vocabulary.
///
/// 1. If already in `V`, return it unchanged.
/// 2. Lowercase/trim, collapse `[\s-]` to `_`; if in the alias map, return the mapping.
/// 3. Walk the keyword map in order; the first substring hit wins.
/// 4. Otherwise fall back to `RELATES_TO`.
pub fn normalize_type(raw: &str) -> &'static str {
    if let Some(&v) = CONTROLLED_VOCAB.iter().find(|&&v| v == raw) {
        return v;
    }

    let normalized: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c })
        .collect();

    if let Some(&(_, canonical)) = alias_map().iter().find(|&&(k, _)| k == normalized) {
        return canonical;
    }

    for &(kw, canonical) in keyword_map() {
        if normalized.contains(kw) {
            return canonical;
        }
    }

    FALLBACK_TYPE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocab_types_pass_through_unchanged() {
        assert_eq!(normalize_type("WORKS_AT"), "WORKS_AT");
    }

    #[test]
    fn alias_hit_maps_to_canonical() {
        assert_eq!(normalize_type("works_on"), "WORKS_AT");
        assert_eq!(normalize_type("works-on"), "WORKS_AT");
        assert_eq!(normalize_type("Works On"), "WORKS_AT");
    }

    #[test]
    fn keyword_fallback_matches_substring() {
        assert_eq!(normalize_type("best_friend_forever"), "KNOWS");
    }

    #[test]
    fn unmatched_falls_back_to_relates_to() {
        assert_eq!(normalize_type("xyz_totally_unknown"), "RELATES_TO");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["works_on", "best_friend", "xyz", "OWNS"] {
            let once = normalize_type(raw);
            let twice = normalize_type(once);
            assert_eq!(once, twice);
        }
    }
}
