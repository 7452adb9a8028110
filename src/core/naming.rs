//! Host name normalization and component matching
//!
//! Hosts decorate component names: instance counters (`Marker-1`), display
//! aliases in brackets, configuration markers (`^Pose`), mate references
//! (`<1>`) and sub-assembly paths. The rules below undo those decorations in
//! a fixed order. Each rule is a separate value so it can be tested alone.
//!
//! Every rule leaves its output trimmed and never reintroduces a decoration
//! an earlier rule removed, which makes [`normalize`] idempotent.

use serde::Serialize;

/// One decoration-stripping rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRule {
    /// `Part [Alias]` -> `Alias`
    BracketAlias,
    /// `SubAsm-1/Part-2` -> `Part-2`
    PathPrefix,
    /// `Part^Config` -> `Part`
    ConfigurationMarker,
    /// `Part<1>` -> `Part`
    MateReference,
    /// `Part-12` -> `Part`
    InstanceCounter,
}

/// Rules in application order
pub const NORMALIZE_RULES: [NameRule; 5] = [
    NameRule::BracketAlias,
    NameRule::PathPrefix,
    NameRule::ConfigurationMarker,
    NameRule::MateReference,
    NameRule::InstanceCounter,
];

impl NameRule {
    pub fn apply<'a>(&self, name: &'a str) -> &'a str {
        let out = match self {
            NameRule::BracketAlias => bracket_interior(name).unwrap_or(name),
            NameRule::PathPrefix => name.rsplit('/').next().unwrap_or(name),
            NameRule::ConfigurationMarker => truncate_at(name, '^'),
            NameRule::MateReference => truncate_at(name, '<'),
            NameRule::InstanceCounter => {
                let mut current = name.trim();
                while let Some(stripped) = strip_counter(current) {
                    current = stripped.trim();
                }
                current
            }
        };
        out.trim()
    }
}

fn bracket_interior(name: &str) -> Option<&str> {
    let open = name.find('[')?;
    let close = name[open + 1..].find(']')? + open + 1;
    Some(&name[open + 1..close])
}

fn truncate_at(name: &str, marker: char) -> &str {
    match name.find(marker) {
        Some(i) => &name[..i],
        None => name,
    }
}

/// Strip one trailing `-<digits>`
fn strip_counter(name: &str) -> Option<&str> {
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let rest = &name[..name.len() - digits];
    rest.strip_suffix('-')
}

/// Strip host decorations from a component name
pub fn normalize(name: &str) -> String {
    NORMALIZE_RULES
        .iter()
        .fold(name.trim(), |current, rule| rule.apply(current))
        .to_string()
}

/// How a candidate matched, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    /// Raw host name equals the identity
    Exact,
    /// Normalized name equals the identity
    Normalized,
    /// Normalized name starts with the identity
    Prefix,
    /// Normalized name contains the identity
    Contains,
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchTier::Exact => write!(f, "exact"),
            MatchTier::Normalized => write!(f, "normalized"),
            MatchTier::Prefix => write!(f, "prefix"),
            MatchTier::Contains => write!(f, "contains"),
        }
    }
}

/// A matched candidate and the tier that found it
#[derive(Debug, Clone, Copy)]
pub struct NameMatch<'a, T> {
    pub candidate: &'a T,
    pub tier: MatchTier,
}

/// Find the candidate whose host name best matches `identity`
///
/// Tiers are tried in order across the whole list, so an exact match is
/// never shadowed by a looser match appearing earlier in the list.
pub fn find_match<'a, T, F>(candidates: &'a [T], identity: &str, name_of: F) -> Option<NameMatch<'a, T>>
where
    F: Fn(&T) -> &str,
{
    if identity.trim().is_empty() {
        return None;
    }

    if let Some(c) = candidates.iter().find(|c| name_of(*c) == identity) {
        return Some(NameMatch {
            candidate: c,
            tier: MatchTier::Exact,
        });
    }

    let target = normalize(identity);
    let normalized: Vec<(usize, String)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, normalize(name_of(c))))
        .collect();

    for tier in [MatchTier::Normalized, MatchTier::Prefix, MatchTier::Contains] {
        let hit = normalized.iter().find(|(_, name)| match tier {
            MatchTier::Exact | MatchTier::Normalized => *name == target,
            MatchTier::Prefix => name.starts_with(target.as_str()),
            MatchTier::Contains => name.contains(target.as_str()),
        });
        if let Some((i, _)) = hit {
            return Some(NameMatch {
                candidate: &candidates[*i],
                tier,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names<'a>(list: &'a [&'a str]) -> &'a [&'a str] {
        list
    }

    #[test]
    fn test_individual_rules() {
        assert_eq!(NameRule::BracketAlias.apply("Marker-1 [CHAS_LowFor_FRONT]"), "CHAS_LowFor_FRONT");
        assert_eq!(NameRule::PathPrefix.apply("Sub-1/P1_FRONT-1"), "P1_FRONT-1");
        assert_eq!(NameRule::ConfigurationMarker.apply("P1_FRONT^Pose A"), "P1_FRONT");
        assert_eq!(NameRule::MateReference.apply("P1_FRONT-1<1>"), "P1_FRONT-1");
        assert_eq!(NameRule::InstanceCounter.apply("P1_FRONT-12"), "P1_FRONT");
    }

    #[test]
    fn test_instance_counter_needs_digits() {
        assert_eq!(NameRule::InstanceCounter.apply("Upright-"), "Upright-");
        assert_eq!(NameRule::InstanceCounter.apply("A-Arm"), "A-Arm");
        assert_eq!(NameRule::InstanceCounter.apply("Part7"), "Part7");
    }

    #[test]
    fn test_normalize_combined_decorations() {
        assert_eq!(normalize("UPRI_LowPnt_FRONT-1"), "UPRI_LowPnt_FRONT");
        assert_eq!(normalize("UPRI_LowPnt_FRONT-1<2>"), "UPRI_LowPnt_FRONT");
        assert_eq!(normalize("UPRI_LowPnt_FRONT^Static-1"), "UPRI_LowPnt_FRONT");
        assert_eq!(normalize("Marker-3 [FL_wheel_FRONT]"), "FL_wheel_FRONT");
        assert_eq!(normalize("  P1_REAR-1  "), "P1_REAR");
    }

    #[test]
    fn test_alias_is_taken_before_the_path_is_stripped() {
        assert_eq!(NORMALIZE_RULES[0], NameRule::BracketAlias);
        assert_eq!(NORMALIZE_RULES[1], NameRule::PathPrefix);
        assert_eq!(normalize("Marker-1 [Sub/P1_FRONT-2]"), "P1_FRONT");
        assert_eq!(normalize("Sub-1/Marker-1 [P1_FRONT]"), "P1_FRONT");
        assert_eq!(normalize("Sub-1/ P1_FRONT-1 "), "P1_FRONT");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "P1_FRONT-1",
            "A-1-2",
            "a-1 -2",
            "[[a]]",
            "x [A/B-1]",
            "a]^[b",
            "Folder/[CHAS_x^cfg]<1>-4",
            "q^[a]",
            "-5",
            "",
            "  spaced name-3 ",
            "Part-<1>",
            "UPRI_Front",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_exact_match_beats_contains() {
        // The contains-candidate comes first in the list on purpose
        let list = names(&["UPRI_Front", "Front"]);
        let m = find_match(list, "Front", |s| *s).unwrap();
        assert_eq!(m.tier, MatchTier::Exact);

        let list = names(&["X_UPRI_Front-1", "UPRI_Front-1"]);
        let m = find_match(list, "UPRI_Front", |s| *s).unwrap();
        assert_eq!(*m.candidate, "UPRI_Front-1");
        assert_eq!(m.tier, MatchTier::Normalized);
    }

    #[test]
    fn test_match_tiers_in_order() {
        let list = names(&["P1_FRONT_old-1"]);
        assert_eq!(find_match(list, "P1_FRONT", |s| *s).unwrap().tier, MatchTier::Prefix);

        let list = names(&["copy of P1_FRONT_old-1"]);
        assert_eq!(find_match(list, "P1_FRONT", |s| *s).unwrap().tier, MatchTier::Contains);

        let list = names(&["P2_FRONT-1"]);
        assert!(find_match(list, "P1_FRONT", |s| *s).is_none());
    }

    #[test]
    fn test_empty_identity_never_matches() {
        let list = names(&["anything"]);
        assert!(find_match(list, "", |s| *s).is_none());
    }
}
