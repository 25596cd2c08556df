//! MongoDB document store backend
//!
//! Documents carry a `_key` field holding the engine's logical key
//! (`"{grade}_{phase}"`, `"{student}_{phase}"`). Upserts are `$set` merges so
//! partial updates never clobber sibling fields.

use bson::{doc, Document};
use futures_util::{Stream, StreamExt};
use mongodb::Client;
use serde_json::Value;
use tracing::info;

use super::{DocumentStore, Filter};
use crate::services::reconcile::{ExamResult, ExamResultStore, RosterService, Student};
use crate::types::{PassageError, Result};

/// Collection the roster backend reads active students from
pub const STUDENT_COLLECTION: &str = "students";

/// Collection raw exam-result entries are filed in
pub const EXAM_RESULT_COLLECTION: &str = "exam_results";

/// MongoDB-backed document store
#[derive(Clone)]
pub struct MongoStore {
    db: mongodb::Database,
}

impl MongoStore {
    /// Connect and verify the connection with a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| PassageError::Store(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| PassageError::Store(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            db: client.database(db_name),
        })
    }

    pub fn database(&self) -> &mongodb::Database {
        &self.db
    }
}

fn document_to_value(mut doc: Document) -> Result<Value> {
    doc.remove("_id");
    serde_json::to_value(&doc)
        .map_err(|e| PassageError::Store(format!("Document decode failed: {}", e)))
}

/// Drain a cursor into a Vec. A mid-stream read failure fails the whole
/// call: returning the rows read so far as `Ok` would hand callers partial
/// data — truncated result sets would misclassify students during
/// reconciliation and silently omit authorization records.
async fn collect_documents<S>(mut cursor: S) -> mongodb::error::Result<Vec<Document>>
where
    S: Stream<Item = mongodb::error::Result<Document>> + Unpin,
{
    let mut docs = Vec::new();
    while let Some(next) = cursor.next().await {
        docs.push(next?);
    }
    Ok(docs)
}

#[async_trait::async_trait]
impl DocumentStore for MongoStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let doc = self
            .db
            .collection::<Document>(collection)
            .find_one(doc! { "_key": key })
            .await
            .map_err(|e| PassageError::Store(format!("Find failed: {}", e)))?;

        doc.map(document_to_value).transpose()
    }

    async fn upsert(&self, collection: &str, key: &str, fields: Value) -> Result<()> {
        let fields_doc = bson::to_document(&fields)
            .map_err(|e| PassageError::Store(format!("Document encode failed: {}", e)))?;

        self.db
            .collection::<Document>(collection)
            .update_one(doc! { "_key": key }, doc! { "$set": fields_doc })
            .upsert(true)
            .await
            .map_err(|e| PassageError::Store(format!("Upsert failed: {}", e)))?;

        Ok(())
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        let mut filter_doc = Document::new();
        for filter in filters {
            let value = bson::to_bson(&filter.value)
                .map_err(|e| PassageError::Store(format!("Filter encode failed: {}", e)))?;
            filter_doc.insert(&filter.field, value);
        }

        let cursor = self
            .db
            .collection::<Document>(collection)
            .find(filter_doc)
            .await
            .map_err(|e| PassageError::Store(format!("Find failed: {}", e)))?;

        collect_documents(cursor)
            .await
            .map_err(|e| PassageError::Store(format!("Cursor read failed: {}", e)))?
            .into_iter()
            .map(document_to_value)
            .collect()
    }
}

/// Roster backend reading active students from the shared database
#[derive(Clone)]
pub struct MongoRoster {
    db: mongodb::Database,
}

impl MongoRoster {
    pub fn new(store: &MongoStore) -> Self {
        Self {
            db: store.database().clone(),
        }
    }
}

#[async_trait::async_trait]
impl RosterService for MongoRoster {
    async fn active_students(&self, grade_id: &str) -> Result<Vec<Student>> {
        let cursor = self
            .db
            .collection::<Document>(STUDENT_COLLECTION)
            .find(doc! { "grade_id": grade_id, "active": true })
            .await
            .map_err(|e| PassageError::Roster(format!("Roster fetch failed: {}", e)))?;

        collect_documents(cursor)
            .await
            .map_err(|e| PassageError::Roster(format!("Roster read failed: {}", e)))?
            .into_iter()
            .map(|doc| {
                bson::from_document(doc)
                    .map_err(|e| PassageError::Roster(format!("Student decode failed: {}", e)))
            })
            .collect()
    }
}

/// Raw exam-result backend reading per-student phase buckets
#[derive(Clone)]
pub struct MongoExamResults {
    db: mongodb::Database,
}

impl MongoExamResults {
    pub fn new(store: &MongoStore) -> Self {
        Self {
            db: store.database().clone(),
        }
    }
}

#[async_trait::async_trait]
impl ExamResultStore for MongoExamResults {
    async fn results(&self, student_id: &str, bucket: &str) -> Result<Vec<ExamResult>> {
        let cursor = self
            .db
            .collection::<Document>(EXAM_RESULT_COLLECTION)
            .find(doc! { "student_id": student_id, "bucket": bucket })
            .await
            .map_err(|e| PassageError::Store(format!("Result fetch failed: {}", e)))?;

        collect_documents(cursor)
            .await
            .map_err(|e| PassageError::Store(format!("Cursor read failed: {}", e)))?
            .into_iter()
            .map(|doc| {
                bson::from_document(doc)
                    .map_err(|e| PassageError::Store(format!("Result decode failed: {}", e)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    // Store round-trips need a running MongoDB instance; the engine's
    // services are covered against MemoryStore instead. Cursor draining is
    // covered here over in-memory streams.

    #[tokio::test]
    async fn test_collect_documents_drains_clean_stream() {
        let items = vec![Ok(doc! { "a": 1 }), Ok(doc! { "a": 2 })];
        let docs = collect_documents(stream::iter(items)).await.unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_mid_stream_error_fails_whole_read() {
        // A cursor failure after some rows must not surface as Ok(partial)
        let items = vec![
            Ok(doc! { "subject": "QUIMICA", "completed": true }),
            Err(mongodb::error::Error::custom("connection reset")),
            Ok(doc! { "subject": "FISICA", "completed": true }),
        ];
        assert!(collect_documents(stream::iter(items)).await.is_err());
    }
}
