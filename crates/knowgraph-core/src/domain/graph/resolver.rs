//! Entity identity resolution
//!
//! Decides whether two entity records denote the same real-world entity.
//! This is a pairwise heuristic, not an equivalence relation: `a ~ b` and
//! `b ~ c` do not imply `a ~ c`. Consolidation relies on first-match order
//! rather than clustering.

use super::entity::Entity;
use super::similarity::similarity;

/// Label similarity must exceed this for a fuzzy label match
pub const LABEL_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Alias similarity must exceed this for a fuzzy alias match
pub const ALIAS_SIMILARITY_THRESHOLD: f64 = 0.90;

/// Which rule established that two entities are the same
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// Identical ids
    ExactId,
    /// Labels equal ignoring case
    ExactLabel,
    /// Label bigram similarity above [`LABEL_SIMILARITY_THRESHOLD`]
    FuzzyLabel,
    /// Some alias pair equal ignoring case, or above [`ALIAS_SIMILARITY_THRESHOLD`]
    AliasOverlap,
}

impl MatchRule {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactId => "exact_id",
            Self::ExactLabel => "exact_label",
            Self::FuzzyLabel => "fuzzy_label",
            Self::AliasOverlap => "alias_overlap",
        }
    }
}

impl std::fmt::Display for MatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether `a` and `b` denote the same entity
pub fn same_entity(a: &Entity, b: &Entity) -> bool {
    match_rule(a, b).is_some()
}

/// The first rule under which `a` and `b` match, if any
///
/// Rules are tried in order: exact id, case-insensitive label, fuzzy label,
/// alias overlap. Every rule is symmetric.
pub fn match_rule(a: &Entity, b: &Entity) -> Option<MatchRule> {
    if a.id == b.id {
        return Some(MatchRule::ExactId);
    }

    if eq_ignore_case(&a.label, &b.label) {
        return Some(MatchRule::ExactLabel);
    }

    if similarity(&a.label, &b.label) > LABEL_SIMILARITY_THRESHOLD {
        return Some(MatchRule::FuzzyLabel);
    }

    if aliases_overlap(&a.aliases, &b.aliases) {
        return Some(MatchRule::AliasOverlap);
    }

    None
}

fn aliases_overlap(a: &[String], b: &[String]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }

    a.iter().any(|x| {
        b.iter()
            .any(|y| eq_ignore_case(x, y) || similarity(x, y) > ALIAS_SIMILARITY_THRESHOLD)
    })
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
