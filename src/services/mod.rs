//! Engine services
//!
//! Each service takes its collaborators by `Arc` at construction; nothing is
//! reached through globals, so every service runs against in-memory fakes in
//! tests.

pub mod access;
pub mod authorization;
pub mod progress;
pub mod reconcile;

pub use access::{AccessDecision, AccessPolicy};
pub use authorization::{AuthorizationStore, AuthorizeRequest, PhaseAuthorization};
pub use progress::{ProgressTracker, StudentPhaseProgress, TrackerStatsSnapshot};
pub use reconcile::{
    ExamResult, ExamResultStore, GradePhaseCompletion, GradeReconciler, InMemoryExamResults,
    InMemoryRoster, ReconcilerConfig, ReconcilerStatsSnapshot, RosterService, Student,
};
