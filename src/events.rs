//! Observability event bus
//!
//! Services report the signals that matter operationally — normalization
//! misses, students left unresolved during reconciliation, access decisions,
//! phase completions — over a broadcast channel so callers and tests can
//! subscribe and assert on them instead of scraping logs.
//!
//! Downstream reactions to `PhaseCompleted` (e.g. kicking off AI analysis)
//! are the subscriber's job; the engine never calls collaborators itself.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::Phase;

/// Buffered events per subscriber before lagging receivers drop messages
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Structured events emitted by the engine
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PassageEvent {
    /// A subject identifier resolved to no canonical subject
    NormalizationMiss { raw: String, context: String },
    /// A student first reached 7/7 completed subjects for a phase
    PhaseCompleted { student_id: String, phase: Phase },
    /// A student's raw results could not be fetched during reconciliation;
    /// the student was counted toward pending
    StudentUnresolved {
        student_id: String,
        phase: Phase,
        error: String,
    },
    /// Outcome of an access check
    AccessDecided {
        student_id: String,
        phase: Phase,
        allowed: bool,
        reason: Option<String>,
    },
}

/// Cloneable handle to the engine's broadcast channel
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PassageEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PassageEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Having no subscribers is normal and not an error.
    pub fn emit(&self, event: PassageEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_receives_emitted_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(PassageEvent::PhaseCompleted {
            student_id: "s1".to_string(),
            phase: Phase::First,
        });

        match rx.recv().await.unwrap() {
            PassageEvent::PhaseCompleted { student_id, phase } => {
                assert_eq!(student_id, "s1");
                assert_eq!(phase, Phase::First);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.emit(PassageEvent::NormalizationMiss {
            raw: "XX99".to_string(),
            context: "test".to_string(),
        });
    }
}
