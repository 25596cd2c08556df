//! Grade completion reconciler
//!
//! The cached progress tracker can drift from ground truth (a client that
//! crashed mid-update, a legacy bucket that was never migrated), so the
//! numbers administrators use to unlock the next phase for a cohort are
//! recomputed here from the raw exam-result store instead.
//!
//! The per-student scan is the dominant cost and is embarrassingly parallel:
//! fetches fan out with a bounded concurrency and a per-student timeout. One
//! student failing or timing out degrades that student to pending and never
//! aborts the aggregate; a roster failure is fatal to the whole call.

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::events::{EventBus, PassageEvent};
use crate::normalize::normalize;
use crate::types::{CanonicalSubject, Phase, Result};

// ============================================================================
// Collaborator traits (for dependency injection)
// ============================================================================

/// Active student row from the roster service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A raw exam-result entry as filed by the submission pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamResult {
    pub subject: String,
    pub completed: bool,
}

/// Student-roster collaborator
#[async_trait::async_trait]
pub trait RosterService: Send + Sync {
    async fn active_students(&self, grade_id: &str) -> Result<Vec<Student>>;
}

/// Raw exam-result store collaborator
#[async_trait::async_trait]
pub trait ExamResultStore: Send + Sync {
    /// All result entries filed for `student_id` under one phase bucket name
    async fn results(&self, student_id: &str, bucket: &str) -> Result<Vec<ExamResult>>;
}

// ============================================================================
// Configuration
// ============================================================================

/// Tuning knobs for the reconciliation scan
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Maximum in-flight per-student fetches
    pub max_concurrent_fetches: usize,
    /// Budget for one student's fetch across all bucket aliases
    pub fetch_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 8,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl ReconcilerConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let max_concurrent = std::env::var("RECONCILE_MAX_CONCURRENT_FETCHES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8);

        let timeout_ms = std::env::var("RECONCILE_FETCH_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10_000);

        Self {
            max_concurrent_fetches: max_concurrent,
            fetch_timeout: Duration::from_millis(timeout_ms),
        }
    }
}

// ============================================================================
// Aggregate view
// ============================================================================

/// Derived, non-persisted cohort completion view
#[derive(Debug, Clone, Serialize)]
pub struct GradePhaseCompletion {
    pub grade_id: String,
    pub phase: Phase,
    pub total_students: u32,
    pub completed_students: u32,
    pub in_progress_students: u32,
    pub pending_students: u32,
    pub completion_percentage: f64,
    pub all_completed: bool,
    pub last_updated: DateTime<Utc>,
}

/// Where one student landed in the scan. `Pending` covers both "no result
/// entries at all" and "could not be resolved"; the aggregate treats them
/// identically as the conservative residual.
enum StudentStanding {
    Completed,
    InProgress,
    Pending,
}

struct ReconcilerStats {
    students_scanned: AtomicU64,
    fetch_errors: AtomicU64,
    normalization_misses: AtomicU64,
}

/// Serializable counters snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ReconcilerStatsSnapshot {
    pub students_scanned: u64,
    pub fetch_errors: u64,
    pub normalization_misses: u64,
}

// ============================================================================
// Reconciler
// ============================================================================

/// Recomputes grade-level completion from raw exam results
pub struct GradeReconciler<R: RosterService, E: ExamResultStore> {
    roster: Arc<R>,
    results: Arc<E>,
    config: ReconcilerConfig,
    events: EventBus,
    stats: ReconcilerStats,
}

impl<R: RosterService, E: ExamResultStore> GradeReconciler<R, E> {
    pub fn new(roster: Arc<R>, results: Arc<E>, config: ReconcilerConfig, events: EventBus) -> Self {
        Self {
            roster,
            results,
            config,
            events,
            stats: ReconcilerStats {
                students_scanned: AtomicU64::new(0),
                fetch_errors: AtomicU64::new(0),
                normalization_misses: AtomicU64::new(0),
            },
        }
    }

    /// Recompute the authoritative completion view for a grade and phase.
    ///
    /// `total_students` is the cohort size the percentages are computed
    /// against; pending is its residual, floor-clamped at zero.
    pub async fn check_grade_completion(
        &self,
        grade_id: &str,
        phase: Phase,
        total_students: u32,
    ) -> Result<GradePhaseCompletion> {
        // Roster failure is fatal; per-student failures below are not.
        let students = self.roster.active_students(grade_id).await?;

        debug!(
            grade_id,
            phase = %phase,
            roster_size = students.len(),
            "Reconciliation scan started"
        );

        let standings: Vec<StudentStanding> = stream::iter(students)
            .map(|student| self.classify_student(student, phase))
            .buffer_unordered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let completed_students = standings
            .iter()
            .filter(|s| matches!(s, StudentStanding::Completed))
            .count() as u32;
        let in_progress_students = standings
            .iter()
            .filter(|s| matches!(s, StudentStanding::InProgress))
            .count() as u32;
        let pending_students =
            total_students.saturating_sub(completed_students + in_progress_students);

        let completion_percentage = if total_students == 0 {
            0.0
        } else {
            f64::from(completed_students) / f64::from(total_students) * 100.0
        };
        let all_completed = total_students > 0 && completed_students == total_students;

        info!(
            grade_id,
            phase = %phase,
            completed = completed_students,
            in_progress = in_progress_students,
            pending = pending_students,
            total = total_students,
            all_completed,
            "Reconciliation scan finished"
        );

        Ok(GradePhaseCompletion {
            grade_id: grade_id.to_string(),
            phase,
            total_students,
            completed_students,
            in_progress_students,
            pending_students,
            completion_percentage,
            all_completed,
            last_updated: Utc::now(),
        })
    }

    async fn classify_student(&self, student: Student, phase: Phase) -> StudentStanding {
        self.stats.students_scanned.fetch_add(1, Ordering::Relaxed);

        let fetch = self.fetch_results(&student.id, phase);
        match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(Ok(entries)) => self.classify_entries(&student.id, phase, entries),
            Ok(Err(e)) => {
                self.stats.fetch_errors.fetch_add(1, Ordering::Relaxed);
                warn!(student_id = %student.id, phase = %phase, error = %e, "Student unresolved");
                self.events.emit(PassageEvent::StudentUnresolved {
                    student_id: student.id,
                    phase,
                    error: e.to_string(),
                });
                StudentStanding::Pending
            }
            Err(_) => {
                self.stats.fetch_errors.fetch_add(1, Ordering::Relaxed);
                warn!(student_id = %student.id, phase = %phase, "Student fetch timed out");
                self.events.emit(PassageEvent::StudentUnresolved {
                    student_id: student.id,
                    phase,
                    error: "fetch timed out".to_string(),
                });
                StudentStanding::Pending
            }
        }
    }

    /// Queries every historical bucket name for the phase and merges the
    /// result sets before filtering.
    async fn fetch_results(&self, student_id: &str, phase: Phase) -> Result<Vec<ExamResult>> {
        let mut merged = Vec::new();
        for bucket in phase.bucket_aliases() {
            merged.extend(self.results.results(student_id, bucket).await?);
        }
        Ok(merged)
    }

    fn classify_entries(
        &self,
        student_id: &str,
        phase: Phase,
        entries: Vec<ExamResult>,
    ) -> StudentStanding {
        // Historical rule, relied on by cohort dashboards: a student with
        // result entries but nothing qualifying still counts as in progress;
        // only a student with no entries at all falls into pending.
        if entries.is_empty() {
            return StudentStanding::Pending;
        }

        let mut seen: BTreeSet<String> = BTreeSet::new();
        for entry in &entries {
            if !entry.completed || entry.subject.trim().is_empty() {
                continue;
            }
            let normalized = normalize(&entry.subject);
            if !normalized.is_recognized() {
                self.stats.normalization_misses.fetch_add(1, Ordering::Relaxed);
                self.events.emit(PassageEvent::NormalizationMiss {
                    raw: entry.subject.trim().to_string(),
                    context: format!("reconcile:{}:{}", student_id, phase.slug()),
                });
            }
            seen.insert(normalized.key());
        }

        // Set cardinality after dedup is the real check; duplicate raw codes
        // for one subject collapse to a single canonical key above.
        let complete = CanonicalSubject::ALL
            .iter()
            .all(|subject| seen.contains(subject.name()));

        if complete {
            StudentStanding::Completed
        } else {
            StudentStanding::InProgress
        }
    }

    pub fn stats(&self) -> ReconcilerStatsSnapshot {
        ReconcilerStatsSnapshot {
            students_scanned: self.stats.students_scanned.load(Ordering::Relaxed),
            fetch_errors: self.stats.fetch_errors.load(Ordering::Relaxed),
            normalization_misses: self.stats.normalization_misses.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// In-memory collaborators
// ============================================================================

/// Simple in-memory roster
#[derive(Default)]
pub struct InMemoryRoster {
    students: RwLock<HashMap<String, Vec<Student>>>,
}

impl InMemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_student(&self, grade_id: &str, student_id: &str) {
        self.students
            .write()
            .await
            .entry(grade_id.to_string())
            .or_default()
            .push(Student {
                id: student_id.to_string(),
                name: String::new(),
            });
    }
}

#[async_trait::async_trait]
impl RosterService for InMemoryRoster {
    async fn active_students(&self, grade_id: &str) -> Result<Vec<Student>> {
        Ok(self
            .students
            .read()
            .await
            .get(grade_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Simple in-memory exam-result store, keyed by `(student, bucket)`
#[derive(Default)]
pub struct InMemoryExamResults {
    entries: RwLock<HashMap<(String, String), Vec<ExamResult>>>,
}

impl InMemoryExamResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn file_result(&self, student_id: &str, bucket: &str, subject: &str, completed: bool) {
        self.entries
            .write()
            .await
            .entry((student_id.to_string(), bucket.to_string()))
            .or_default()
            .push(ExamResult {
                subject: subject.to_string(),
                completed,
            });
    }
}

#[async_trait::async_trait]
impl ExamResultStore for InMemoryExamResults {
    async fn results(&self, student_id: &str, bucket: &str) -> Result<Vec<ExamResult>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&(student_id.to_string(), bucket.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PassageError;

    const SUBJECTS: [&str; 7] = [
        "MATEMATICAS",
        "LENGUAJE",
        "SOCIALES",
        "BIOLOGÍA",
        "QUIMICA",
        "FISICA",
        "INGLES",
    ];

    fn reconciler(
        roster: Arc<InMemoryRoster>,
        results: Arc<InMemoryExamResults>,
    ) -> GradeReconciler<InMemoryRoster, InMemoryExamResults> {
        GradeReconciler::new(roster, results, ReconcilerConfig::default(), EventBus::new())
    }

    async fn complete_all(results: &InMemoryExamResults, student_id: &str, bucket: &str) {
        for subject in SUBJECTS {
            results.file_result(student_id, bucket, subject, true).await;
        }
    }

    #[tokio::test]
    async fn test_scenario_two_complete_one_partial() {
        let roster = Arc::new(InMemoryRoster::new());
        let results = Arc::new(InMemoryExamResults::new());

        for id in ["s1", "s2", "s3"] {
            roster.add_student("g1", id).await;
        }

        // s1 completes via plain names, s2 via mixed raw codes
        complete_all(&results, "s1", "first").await;
        for subject in [
            "MA11464021",
            "exam_lengua_001",
            "SO11464099",
            "BI11464035",
            "QUÍMICA",
            "FI11464012",
            "ENGLISH",
        ] {
            results.file_result("s2", "first", subject, true).await;
        }
        for subject in &SUBJECTS[..3] {
            results.file_result("s3", "first", subject, true).await;
        }

        let view = reconciler(roster, results)
            .check_grade_completion("g1", Phase::First, 3)
            .await
            .unwrap();

        assert_eq!(view.completed_students, 2);
        assert_eq!(view.in_progress_students, 1);
        assert_eq!(view.pending_students, 0);
        assert!((view.completion_percentage - 66.666).abs() < 0.1);
        assert!(!view.all_completed);
    }

    #[tokio::test]
    async fn test_conservation_with_absent_students() {
        let roster = Arc::new(InMemoryRoster::new());
        let results = Arc::new(InMemoryExamResults::new());

        roster.add_student("g1", "s1").await;
        roster.add_student("g1", "s2").await;
        complete_all(&results, "s1", "first").await;
        // s2 has no result entries at all

        let view = reconciler(roster, results)
            .check_grade_completion("g1", Phase::First, 4)
            .await
            .unwrap();

        assert_eq!(view.completed_students, 1);
        assert_eq!(view.in_progress_students, 0);
        assert_eq!(view.pending_students, 3);
        assert_eq!(
            view.completed_students + view.in_progress_students + view.pending_students,
            view.total_students
        );
    }

    #[tokio::test]
    async fn test_non_qualifying_entries_count_as_in_progress() {
        let roster = Arc::new(InMemoryRoster::new());
        let results = Arc::new(InMemoryExamResults::new());

        roster.add_student("g1", "s1").await;
        // Entries exist but none qualify: one incomplete, one with no subject
        results.file_result("s1", "first", "QUIMICA", false).await;
        results.file_result("s1", "first", "  ", true).await;

        let view = reconciler(roster, results)
            .check_grade_completion("g1", Phase::First, 1)
            .await
            .unwrap();

        assert_eq!(view.in_progress_students, 1);
        assert_eq!(view.pending_students, 0);
    }

    #[tokio::test]
    async fn test_duplicates_do_not_inflate_completion() {
        let roster = Arc::new(InMemoryRoster::new());
        let results = Arc::new(InMemoryExamResults::new());

        roster.add_student("g1", "s1").await;
        // Seven entries, but two are the same subject under different codes
        for subject in ["BIOLOGÍA", "BI11464035", "MATEMATICAS", "LENGUAJE", "SOCIALES", "QUIMICA", "FISICA"] {
            results.file_result("s1", "first", subject, true).await;
        }

        let view = reconciler(roster, results)
            .check_grade_completion("g1", Phase::First, 1)
            .await
            .unwrap();

        assert_eq!(view.completed_students, 0);
        assert_eq!(view.in_progress_students, 1);
    }

    #[tokio::test]
    async fn test_second_phase_merges_legacy_bucket() {
        let roster = Arc::new(InMemoryRoster::new());
        let results = Arc::new(InMemoryExamResults::new());

        roster.add_student("g1", "s1").await;
        for subject in &SUBJECTS[..4] {
            results.file_result("s1", "second", subject, true).await;
        }
        for subject in &SUBJECTS[4..] {
            results.file_result("s1", "intermediate", subject, true).await;
        }

        let view = reconciler(roster, results)
            .check_grade_completion("g1", Phase::Second, 1)
            .await
            .unwrap();

        assert_eq!(view.completed_students, 1);
        assert!(view.all_completed);
    }

    #[tokio::test]
    async fn test_empty_cohort() {
        let roster = Arc::new(InMemoryRoster::new());
        let results = Arc::new(InMemoryExamResults::new());

        let view = reconciler(roster, results)
            .check_grade_completion("g1", Phase::First, 0)
            .await
            .unwrap();

        assert_eq!(view.completion_percentage, 0.0);
        assert!(!view.all_completed);
        assert_eq!(view.pending_students, 0);
    }

    struct FailingFor {
        inner: Arc<InMemoryExamResults>,
        failing_student: String,
    }

    #[async_trait::async_trait]
    impl ExamResultStore for FailingFor {
        async fn results(&self, student_id: &str, bucket: &str) -> Result<Vec<ExamResult>> {
            if student_id == self.failing_student {
                return Err(PassageError::Store("socket closed".to_string()));
            }
            self.inner.results(student_id, bucket).await
        }
    }

    #[tokio::test]
    async fn test_per_student_failure_degrades_to_pending() {
        let roster = Arc::new(InMemoryRoster::new());
        let inner = Arc::new(InMemoryExamResults::new());

        roster.add_student("g1", "s1").await;
        roster.add_student("g1", "s2").await;
        complete_all(&inner, "s1", "first").await;
        complete_all(&inner, "s2", "first").await;

        let results = Arc::new(FailingFor {
            inner,
            failing_student: "s2".to_string(),
        });
        let reconciler = GradeReconciler::new(
            roster,
            results,
            ReconcilerConfig::default(),
            EventBus::new(),
        );
        let mut rx = reconciler.events.subscribe();

        let view = reconciler
            .check_grade_completion("g1", Phase::First, 2)
            .await
            .unwrap();

        assert_eq!(view.completed_students, 1);
        assert_eq!(view.in_progress_students, 0);
        assert_eq!(view.pending_students, 1);
        assert_eq!(reconciler.stats().fetch_errors, 1);

        let mut saw_unresolved = false;
        while let Ok(event) = rx.try_recv() {
            if let PassageEvent::StudentUnresolved { student_id, .. } = event {
                assert_eq!(student_id, "s2");
                saw_unresolved = true;
            }
        }
        assert!(saw_unresolved);
    }

    struct SlowResults;

    #[async_trait::async_trait]
    impl ExamResultStore for SlowResults {
        async fn results(&self, _: &str, _: &str) -> Result<Vec<ExamResult>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_pending() {
        let roster = Arc::new(InMemoryRoster::new());
        roster.add_student("g1", "s1").await;

        let config = ReconcilerConfig {
            fetch_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let reconciler =
            GradeReconciler::new(roster, Arc::new(SlowResults), config, EventBus::new());

        let view = reconciler
            .check_grade_completion("g1", Phase::First, 1)
            .await
            .unwrap();

        assert_eq!(view.pending_students, 1);
        assert_eq!(reconciler.stats().fetch_errors, 1);
    }

    struct BrokenRoster;

    #[async_trait::async_trait]
    impl RosterService for BrokenRoster {
        async fn active_students(&self, _: &str) -> Result<Vec<Student>> {
            Err(PassageError::Roster("roster unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_roster_failure_is_fatal() {
        let reconciler = GradeReconciler::new(
            Arc::new(BrokenRoster),
            Arc::new(InMemoryExamResults::new()),
            ReconcilerConfig::default(),
            EventBus::new(),
        );

        let err = reconciler
            .check_grade_completion("g1", Phase::First, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, PassageError::Roster(_)));
    }
}
