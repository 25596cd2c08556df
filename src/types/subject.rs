//! Canonical subject set
//!
//! Every raw subject identifier found in exam records must resolve to one of
//! these seven subjects. Identifiers that resolve to none of them are carried
//! as `NormalizedSubject::Unrecognized` rather than dropped, so callers can
//! log the miss and the value stays visible in stored sets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of subjects a phase is evaluated over
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalSubject {
    Mathematics,
    Language,
    SocialSciences,
    Biology,
    Chemistry,
    Physics,
    English,
}

impl CanonicalSubject {
    /// Number of canonical subjects; a phase is complete at exactly this many
    pub const COUNT: usize = 7;

    /// All canonical subjects
    pub const ALL: [CanonicalSubject; 7] = [
        CanonicalSubject::Mathematics,
        CanonicalSubject::Language,
        CanonicalSubject::SocialSciences,
        CanonicalSubject::Biology,
        CanonicalSubject::Chemistry,
        CanonicalSubject::Physics,
        CanonicalSubject::English,
    ];

    /// Stable lowercase name, used as the set-membership key in stored
    /// progress documents
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalSubject::Mathematics => "mathematics",
            CanonicalSubject::Language => "language",
            CanonicalSubject::SocialSciences => "social_sciences",
            CanonicalSubject::Biology => "biology",
            CanonicalSubject::Chemistry => "chemistry",
            CanonicalSubject::Physics => "physics",
            CanonicalSubject::English => "english",
        }
    }
}

impl fmt::Display for CanonicalSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of normalizing a raw subject identifier
///
/// Normalization is total: unresolvable input is echoed back trimmed and
/// tagged, never dropped and never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedSubject {
    Canonical(CanonicalSubject),
    Unrecognized(String),
}

impl NormalizedSubject {
    /// Lowercased key used for set membership in progress documents and
    /// reconciliation sets
    pub fn key(&self) -> String {
        match self {
            NormalizedSubject::Canonical(subject) => subject.name().to_string(),
            NormalizedSubject::Unrecognized(raw) => raw.trim().to_lowercase(),
        }
    }

    /// The canonical subject, when one was resolved
    pub fn canonical(&self) -> Option<CanonicalSubject> {
        match self {
            NormalizedSubject::Canonical(subject) => Some(*subject),
            NormalizedSubject::Unrecognized(_) => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, NormalizedSubject::Canonical(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_has_exactly_seven() {
        assert_eq!(CanonicalSubject::ALL.len(), CanonicalSubject::COUNT);
    }

    #[test]
    fn test_names_are_distinct() {
        let mut names: Vec<_> = CanonicalSubject::ALL.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CanonicalSubject::COUNT);
    }

    #[test]
    fn test_unrecognized_key_is_trimmed_lowercase() {
        let n = NormalizedSubject::Unrecognized("  XX99 ".to_string());
        assert_eq!(n.key(), "xx99");
        assert!(!n.is_recognized());
    }
}
