//! Passage - phase progression and authorization engine
//!
//! Students move through three ordered evaluation phases (diagnostic,
//! remediation, final simulation). An administrator unlocks each phase per
//! grade, a student enters a phase only after completing all seven canonical
//! subjects of the previous one, and cohort-level completion is recomputed
//! from raw exam results rather than trusted from cached progress.
//!
//! ## Components
//!
//! - **Normalizer**: maps heterogeneous raw subject identifiers to the seven
//!   canonical subjects
//! - **Authorization**: per-(grade, phase) admin authorization records,
//!   default-deny
//! - **Progress**: per-(student, phase) completed/in-progress subject sets
//!   with a derived status
//! - **Reconciler**: authoritative grade completion recomputed from the raw
//!   exam-result store
//! - **Access**: allow/deny decisions composing authorization and progress

pub mod config;
pub mod events;
pub mod normalize;
pub mod services;
pub mod store;
pub mod types;

pub use config::Args;
pub use events::{EventBus, PassageEvent};
pub use types::{CanonicalSubject, NormalizedSubject, PassageError, Phase, PhaseStatus, Result};
