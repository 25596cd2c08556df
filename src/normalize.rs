//! Subject identifier normalization
//!
//! Exam records carry subject identifiers in at least three incompatible
//! conventions: full names with and without accents ("QUÍMICA", "QUIMICA"),
//! short subject-grade-sequence codes ("BI11464035"), and free-form keys that
//! merely contain a subject word ("exam_lengua_001"). Matching runs in that
//! order and the first tier that resolves wins.
//!
//! Normalization never fails. Input that resolves to no canonical subject is
//! echoed back trimmed as `Unrecognized` so callers can detect and log the
//! miss; a miss silently keeps a student from ever reaching 7/7 completion,
//! so every caller is expected to make it observable.

use crate::types::{CanonicalSubject, NormalizedSubject};

/// Map a raw subject identifier to a canonical subject.
///
/// Comparisons are trimmed and case-insensitive throughout.
pub fn normalize(raw: &str) -> NormalizedSubject {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return NormalizedSubject::Unrecognized(String::new());
    }

    let upper = trimmed.to_uppercase();

    // Tier 1: exact canonical-name match, accented and unaccented variants
    if let Some(subject) = exact_match(&upper) {
        return NormalizedSubject::Canonical(subject);
    }

    // Tier 2: two-character prefix match for subject-grade-sequence codes
    let prefix: String = upper.chars().take(2).collect();
    if let Some(subject) = prefix_match(&prefix) {
        return NormalizedSubject::Canonical(subject);
    }

    // Tier 3: keyword match for free-form keys
    if let Some(subject) = keyword_match(&upper) {
        return NormalizedSubject::Canonical(subject);
    }

    NormalizedSubject::Unrecognized(trimmed.to_string())
}

fn exact_match(upper: &str) -> Option<CanonicalSubject> {
    match upper {
        "MATEMATICAS" | "MATEMÁTICAS" | "MATHEMATICS" => Some(CanonicalSubject::Mathematics),
        "LENGUA" | "LENGUAJE" | "LENGUA CASTELLANA" | "LANGUAGE" => {
            Some(CanonicalSubject::Language)
        }
        "SOCIALES" | "CIENCIAS SOCIALES" | "SOCIAL SCIENCES" => {
            Some(CanonicalSubject::SocialSciences)
        }
        "BIOLOGIA" | "BIOLOGÍA" | "BIOLOGY" => Some(CanonicalSubject::Biology),
        "QUIMICA" | "QUÍMICA" | "CHEMISTRY" => Some(CanonicalSubject::Chemistry),
        "FISICA" | "FÍSICA" | "PHYSICS" => Some(CanonicalSubject::Physics),
        "INGLES" | "INGLÉS" | "ENGLISH" => Some(CanonicalSubject::English),
        _ => None,
    }
}

fn prefix_match(prefix: &str) -> Option<CanonicalSubject> {
    match prefix {
        "MA" => Some(CanonicalSubject::Mathematics),
        "LE" | "LC" => Some(CanonicalSubject::Language),
        "SO" | "CS" => Some(CanonicalSubject::SocialSciences),
        "BI" => Some(CanonicalSubject::Biology),
        "QU" => Some(CanonicalSubject::Chemistry),
        "FI" => Some(CanonicalSubject::Physics),
        "IN" | "EN" => Some(CanonicalSubject::English),
        _ => None,
    }
}

fn keyword_match(upper: &str) -> Option<CanonicalSubject> {
    const KEYWORDS: [(&str, CanonicalSubject); 10] = [
        ("MATEMAT", CanonicalSubject::Mathematics),
        ("MATH", CanonicalSubject::Mathematics),
        ("LENGUA", CanonicalSubject::Language),
        ("CASTELLAN", CanonicalSubject::Language),
        ("SOCIAL", CanonicalSubject::SocialSciences),
        ("BIOLOG", CanonicalSubject::Biology),
        ("QUIMIC", CanonicalSubject::Chemistry),
        ("FISIC", CanonicalSubject::Physics),
        ("INGLES", CanonicalSubject::English),
        ("ENGLISH", CanonicalSubject::English),
    ];

    KEYWORDS
        .iter()
        .find(|(keyword, _)| upper.contains(keyword))
        .map(|(_, subject)| *subject)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_accented_and_unaccented() {
        assert_eq!(
            normalize("QUIMICA"),
            NormalizedSubject::Canonical(CanonicalSubject::Chemistry)
        );
        assert_eq!(
            normalize("QUÍMICA"),
            NormalizedSubject::Canonical(CanonicalSubject::Chemistry)
        );
        assert_eq!(
            normalize("  biología "),
            NormalizedSubject::Canonical(CanonicalSubject::Biology)
        );
    }

    #[test]
    fn test_prefix_codes() {
        assert_eq!(
            normalize("BI11464035"),
            NormalizedSubject::Canonical(CanonicalSubject::Biology)
        );
        assert_eq!(
            normalize("MA11464021"),
            NormalizedSubject::Canonical(CanonicalSubject::Mathematics)
        );
        assert_eq!(
            normalize("qu09120044"),
            NormalizedSubject::Canonical(CanonicalSubject::Chemistry)
        );
    }

    #[test]
    fn test_keyword_fallback() {
        assert_eq!(
            normalize("exam_lengua_001"),
            NormalizedSubject::Canonical(CanonicalSubject::Language)
        );
        assert_eq!(
            normalize("prueba_sociales_11"),
            NormalizedSubject::Canonical(CanonicalSubject::SocialSciences)
        );
    }

    #[test]
    fn test_tier_order_exact_wins() {
        // "LENGUAJE" would also hit the "LE" prefix tier; exact resolves first
        assert_eq!(
            normalize("LENGUAJE"),
            NormalizedSubject::Canonical(CanonicalSubject::Language)
        );
    }

    #[test]
    fn test_miss_echoes_trimmed_original() {
        assert_eq!(
            normalize("  XX99 "),
            NormalizedSubject::Unrecognized("XX99".to_string())
        );
        assert_eq!(normalize("   "), NormalizedSubject::Unrecognized(String::new()));
    }
}
