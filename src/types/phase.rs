//! Evaluation phases and per-student phase status
//!
//! Phases are totally ordered: `First < Second < Third`. A student may only
//! enter phase N+1 after completing phase N, and no phase may be skipped.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three ordered evaluation stages a grade progresses through
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Diagnostic
    First,
    /// Remediation
    Second,
    /// Final simulation
    Third,
}

impl Phase {
    /// All phases, in progression order
    pub const ALL: [Phase; 3] = [Phase::First, Phase::Second, Phase::Third];

    /// Stable identifier used in document keys
    pub fn slug(&self) -> &'static str {
        match self {
            Phase::First => "first",
            Phase::Second => "second",
            Phase::Third => "third",
        }
    }

    /// The phase that must be completed before this one, if any
    pub fn previous(&self) -> Option<Phase> {
        match self {
            Phase::First => None,
            Phase::Second => Some(Phase::First),
            Phase::Third => Some(Phase::Second),
        }
    }

    /// The phase that follows this one, if any
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::First => Some(Phase::Second),
            Phase::Second => Some(Phase::Third),
            Phase::Third => None,
        }
    }

    /// Every collection name raw exam results have historically been filed
    /// under for this phase.
    ///
    /// Result entries for the second phase exist under two names because the
    /// bucket was renamed in production without migrating old documents. Only
    /// the second phase is known to have a legacy alias; the lookup is
    /// deliberately not generalized to the other phases.
    pub fn bucket_aliases(&self) -> &'static [&'static str] {
        match self {
            Phase::First => &["first"],
            Phase::Second => &["second", "intermediate"],
            Phase::Third => &["third"],
        }
    }

    /// Parse a phase from its slug or ordinal ("first", "2", ...)
    pub fn parse(s: &str) -> Option<Phase> {
        match s.trim().to_lowercase().as_str() {
            "first" | "1" => Some(Phase::First),
            "second" | "2" => Some(Phase::Second),
            "third" | "3" => Some(Phase::Third),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// Derived status of a student within one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// No subject attempted yet
    #[default]
    Available,
    /// At least one subject attempted, fewer than all completed
    InProgress,
    /// All seven canonical subjects completed
    Completed,
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseStatus::Available => write!(f, "available"),
            PhaseStatus::InProgress => write!(f, "in_progress"),
            PhaseStatus::Completed => write!(f, "completed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_ordering() {
        assert!(Phase::First < Phase::Second);
        assert!(Phase::Second < Phase::Third);
    }

    #[test]
    fn test_previous_chain() {
        assert_eq!(Phase::First.previous(), None);
        assert_eq!(Phase::Second.previous(), Some(Phase::First));
        assert_eq!(Phase::Third.previous(), Some(Phase::Second));
    }

    #[test]
    fn test_only_second_has_legacy_bucket() {
        assert_eq!(Phase::First.bucket_aliases().len(), 1);
        assert_eq!(Phase::Second.bucket_aliases(), &["second", "intermediate"]);
        assert_eq!(Phase::Third.bucket_aliases().len(), 1);
    }

    #[test]
    fn test_parse() {
        assert_eq!(Phase::parse("second"), Some(Phase::Second));
        assert_eq!(Phase::parse(" THIRD "), Some(Phase::Third));
        assert_eq!(Phase::parse("1"), Some(Phase::First));
        assert_eq!(Phase::parse("fourth"), None);
    }
}
