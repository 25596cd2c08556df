//! Document store boundary
//!
//! The engine talks to persistence through a narrow `get`/`upsert`/`query`
//! interface so every service can be exercised against the in-memory store
//! without a network dependency. `MongoStore` is the production backend;
//! `MemoryStore` backs tests and local development.

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::{MongoExamResults, MongoRoster, MongoStore};

use serde_json::Value;

use crate::types::Result;

/// Collection holding one `PhaseAuthorization` per `(grade, phase)`
pub const AUTHORIZATION_COLLECTION: &str = "phase_authorizations";

/// Collection holding one `StudentPhaseProgress` per `(student, phase)`
pub const PROGRESS_COLLECTION: &str = "student_phase_progress";

/// Equality filter on a top-level document field
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Narrow persistence interface the engine is written against
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by key. `None` means the document does not exist,
    /// which is a valid state everywhere in the engine, never an error.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>>;

    /// Merge `fields` into the document at `key`, creating it when absent.
    ///
    /// Merge semantics, not overwrite: top-level fields absent from `fields`
    /// are left untouched, so concurrent partial updates from different
    /// callers cannot clobber unrelated fields.
    async fn upsert(&self, collection: &str, key: &str, fields: Value) -> Result<()>;

    /// All documents in `collection` matching every filter
    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Value>>;
}
