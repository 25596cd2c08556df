//! Student phase progress tracker
//!
//! The only place engine state is mutated incrementally. Every subject
//! attempt flows through `record_subject_outcome`, which keeps the completed
//! and in-progress sets disjoint, recomputes the derived status, and stamps
//! `completed_at` exactly once. Replaying the same outcome is a no-op.
//!
//! Writers to the same `(student, phase)` key must be serialized by the
//! caller; the read-modify-write here relies on the store's per-document
//! write ordering, matching how the submission pipeline invokes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::events::{EventBus, PassageEvent};
use crate::normalize::normalize;
use crate::store::{DocumentStore, PROGRESS_COLLECTION};
use crate::types::{CanonicalSubject, Phase, PhaseStatus, Result};

/// Cached per-student, per-phase progress document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentPhaseProgress {
    pub student_id: String,
    pub grade_id: String,
    pub phase: Phase,
    pub status: PhaseStatus,
    /// Lowercased subject keys. Canonical names once normalized, but sets
    /// written before normalization existed may still hold raw legacy keys;
    /// those never count toward completion and are healed on re-recording.
    pub subjects_completed: BTreeSet<String>,
    pub subjects_in_progress: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,
}

impl StudentPhaseProgress {
    fn empty(student_id: &str, grade_id: &str, phase: Phase) -> Self {
        Self {
            student_id: student_id.to_string(),
            grade_id: grade_id.to_string(),
            phase,
            status: PhaseStatus::Available,
            subjects_completed: BTreeSet::new(),
            subjects_in_progress: BTreeSet::new(),
            completed_at: None,
            overall_score: None,
        }
    }

    /// Distinct canonical subjects present in `subjects_completed`. Junk
    /// keys inflate set size but not this count.
    pub fn canonical_completed_count(&self) -> usize {
        CanonicalSubject::ALL
            .iter()
            .filter(|subject| self.subjects_completed.contains(subject.name()))
            .count()
    }

    /// All seven canonical subjects completed
    pub fn is_complete(&self) -> bool {
        self.canonical_completed_count() == CanonicalSubject::COUNT
    }
}

fn progress_key(student_id: &str, phase: Phase) -> String {
    format!("{}_{}", student_id, phase.slug())
}

struct TrackerStats {
    records_written: AtomicU64,
    completions_stamped: AtomicU64,
    normalization_misses: AtomicU64,
}

/// Serializable counters snapshot
#[derive(Debug, Clone, Serialize)]
pub struct TrackerStatsSnapshot {
    pub records_written: u64,
    pub completions_stamped: u64,
    pub normalization_misses: u64,
}

/// Maintains per-(student, phase) progress over the document store
pub struct ProgressTracker<S: DocumentStore> {
    store: Arc<S>,
    events: EventBus,
    stats: TrackerStats,
}

impl<S: DocumentStore> ProgressTracker<S> {
    pub fn new(store: Arc<S>, events: EventBus) -> Self {
        Self {
            store,
            events,
            stats: TrackerStats {
                records_written: AtomicU64::new(0),
                completions_stamped: AtomicU64::new(0),
                normalization_misses: AtomicU64::new(0),
            },
        }
    }

    /// Load progress for `(student, phase)`. Absence is a valid state.
    pub async fn load(
        &self,
        student_id: &str,
        phase: Phase,
    ) -> Result<Option<StudentPhaseProgress>> {
        match self
            .store
            .get(PROGRESS_COLLECTION, &progress_key(student_id, phase))
            .await?
        {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Record a subject attempt or completion and return the updated record.
    pub async fn record_subject_outcome(
        &self,
        student_id: &str,
        grade_id: &str,
        phase: Phase,
        raw_subject: &str,
        completed: bool,
    ) -> Result<StudentPhaseProgress> {
        let normalized = normalize(raw_subject);
        if !normalized.is_recognized() {
            self.stats.normalization_misses.fetch_add(1, Ordering::Relaxed);
            warn!(
                raw = raw_subject,
                student_id,
                phase = %phase,
                "Unrecognized subject identifier"
            );
            self.events.emit(PassageEvent::NormalizationMiss {
                raw: raw_subject.trim().to_string(),
                context: format!("progress:{}:{}", student_id, phase.slug()),
            });
        }
        let subject_key = normalized.key();
        let raw_key = raw_subject.trim().to_lowercase();

        let mut progress = self
            .load(student_id, phase)
            .await?
            .unwrap_or_else(|| StudentPhaseProgress::empty(student_id, grade_id, phase));
        progress.grade_id = grade_id.to_string();

        // Keep the sets disjoint. Removing both the normalized and the raw
        // form from the opposite set heals entries keyed before
        // normalization existed.
        if completed {
            progress.subjects_completed.insert(subject_key.clone());
            progress.subjects_in_progress.remove(&subject_key);
            progress.subjects_in_progress.remove(&raw_key);
        } else {
            progress.subjects_in_progress.insert(subject_key.clone());
            progress.subjects_completed.remove(&subject_key);
            progress.subjects_completed.remove(&raw_key);
        }

        progress.status = if progress.is_complete() {
            PhaseStatus::Completed
        } else if !progress.subjects_completed.is_empty()
            || !progress.subjects_in_progress.is_empty()
        {
            PhaseStatus::InProgress
        } else {
            PhaseStatus::Available
        };

        // Stamped on the first 7/7 transition only, never overwritten
        if progress.status == PhaseStatus::Completed && progress.completed_at.is_none() {
            progress.completed_at = Some(Utc::now());
            self.stats.completions_stamped.fetch_add(1, Ordering::Relaxed);
            info!(student_id, phase = %phase, "All subjects completed for phase");
            self.events.emit(PassageEvent::PhaseCompleted {
                student_id: student_id.to_string(),
                phase,
            });
        }

        let fields = serde_json::to_value(&progress)?;
        self.store
            .upsert(PROGRESS_COLLECTION, &progress_key(student_id, phase), fields)
            .await?;
        self.stats.records_written.fetch_add(1, Ordering::Relaxed);

        debug!(
            student_id,
            phase = %phase,
            subject = %subject_key,
            completed,
            status = %progress.status,
            "Subject outcome recorded"
        );

        Ok(progress)
    }

    pub fn stats(&self) -> TrackerStatsSnapshot {
        TrackerStatsSnapshot {
            records_written: self.stats.records_written.load(Ordering::Relaxed),
            completions_stamped: self.stats.completions_stamped.load(Ordering::Relaxed),
            normalization_misses: self.stats.normalization_misses.load(Ordering::Relaxed),
        }
    }
}
