//! Core types for Passage

mod error;
mod phase;
mod subject;

pub use error::{PassageError, Result};
pub use phase::{Phase, PhaseStatus};
pub use subject::{CanonicalSubject, NormalizedSubject};
