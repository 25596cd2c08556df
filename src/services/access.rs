//! Phase access decisions
//!
//! Pure decision function over the authorization store and the progress
//! tracker. Authorization is checked first (one cheap lookup); for non-first
//! phases the immediately preceding phase must be completed by the student.
//! Denials carry a human-readable reason distinguishing "not authorized"
//! from "previous phase incomplete".

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::events::{EventBus, PassageEvent};
use crate::services::authorization::AuthorizationStore;
use crate::services::progress::ProgressTracker;
use crate::store::DocumentStore;
use crate::types::{Phase, PhaseStatus, Result};

/// Outcome of an access check
#[derive(Debug, Clone, Serialize)]
pub struct AccessDecision {
    pub can_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Composes authorization and progress into allow/deny decisions
pub struct AccessPolicy<S: DocumentStore> {
    authorizations: Arc<AuthorizationStore<S>>,
    progress: Arc<ProgressTracker<S>>,
    events: EventBus,
}

impl<S: DocumentStore> AccessPolicy<S> {
    pub fn new(
        authorizations: Arc<AuthorizationStore<S>>,
        progress: Arc<ProgressTracker<S>>,
        events: EventBus,
    ) -> Self {
        Self {
            authorizations,
            progress,
            events,
        }
    }

    /// Decide whether a student may enter a phase. No side effects beyond
    /// the emitted decision event.
    pub async fn can_access_phase(
        &self,
        student_id: &str,
        grade_id: &str,
        phase: Phase,
    ) -> Result<AccessDecision> {
        if !self.authorizations.is_authorized(grade_id, phase).await? {
            return Ok(self.decide(
                student_id,
                phase,
                false,
                Some(format!("phase {} is not authorized for your grade", phase)),
            ));
        }

        if let Some(previous) = phase.previous() {
            let previous_completed = self
                .progress
                .load(student_id, previous)
                .await?
                .map(|p| p.status == PhaseStatus::Completed)
                .unwrap_or(false);

            if !previous_completed {
                return Ok(self.decide(
                    student_id,
                    phase,
                    false,
                    Some(format!("must complete the {} phase first", previous)),
                ));
            }
        }

        Ok(self.decide(student_id, phase, true, None))
    }

    fn decide(
        &self,
        student_id: &str,
        phase: Phase,
        allowed: bool,
        reason: Option<String>,
    ) -> AccessDecision {
        debug!(student_id, phase = %phase, allowed, reason = ?reason, "Access decision");
        self.events.emit(PassageEvent::AccessDecided {
            student_id: student_id.to_string(),
            phase,
            allowed,
            reason: reason.clone(),
        });
        AccessDecision {
            can_access: allowed,
            reason,
        }
    }
}
