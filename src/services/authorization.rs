//! Phase authorization store
//!
//! Administrators unlock a phase for an entire grade. One record exists per
//! `(grade, phase)`, upserted in place; revoking flips `authorized` to false
//! and nothing is ever physically deleted. Absence of a record means
//! "not authorized" — default deny.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::store::{DocumentStore, Filter, AUTHORIZATION_COLLECTION};
use crate::types::{Phase, Result};

/// Administrator-granted permission unlocking a phase for a grade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseAuthorization {
    pub grade_id: String,
    pub grade_name: String,
    pub phase: Phase,
    pub authorized: bool,
    pub authorized_by: String,
    pub authorized_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campus_id: Option<String>,
}

/// Input for an authorize action
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub grade_id: String,
    pub grade_name: String,
    pub phase: Phase,
    pub actor_id: String,
    pub institution_id: Option<String>,
    pub campus_id: Option<String>,
}

fn record_key(grade_id: &str, phase: Phase) -> String {
    format!("{}_{}", grade_id, phase.slug())
}

/// CRUD over phase authorization records
pub struct AuthorizationStore<S: DocumentStore> {
    store: Arc<S>,
}

impl<S: DocumentStore> AuthorizationStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Upsert an authorization keyed by `(grade, phase)`. Calling it twice
    /// leaves one record with `authorized = true`.
    pub async fn authorize(&self, req: AuthorizeRequest) -> Result<PhaseAuthorization> {
        let record = PhaseAuthorization {
            grade_id: req.grade_id,
            grade_name: req.grade_name,
            phase: req.phase,
            authorized: true,
            authorized_by: req.actor_id,
            authorized_at: Utc::now(),
            institution_id: req.institution_id,
            campus_id: req.campus_id,
        };

        let key = record_key(&record.grade_id, record.phase);
        let fields = serde_json::to_value(&record)?;
        self.store
            .upsert(AUTHORIZATION_COLLECTION, &key, fields)
            .await?;

        info!(
            grade_id = %record.grade_id,
            phase = %record.phase,
            actor = %record.authorized_by,
            "Phase authorized"
        );

        Ok(record)
    }

    /// Flip `authorized` to false. No record means the phase was never
    /// authorized, so revoking is a no-op.
    pub async fn revoke(&self, grade_id: &str, phase: Phase) -> Result<()> {
        let key = record_key(grade_id, phase);
        if self
            .store
            .get(AUTHORIZATION_COLLECTION, &key)
            .await?
            .is_none()
        {
            debug!(grade_id, phase = %phase, "Revoke on absent record, nothing to do");
            return Ok(());
        }

        self.store
            .upsert(
                AUTHORIZATION_COLLECTION,
                &key,
                serde_json::json!({ "authorized": false }),
            )
            .await?;

        info!(grade_id, phase = %phase, "Phase authorization revoked");
        Ok(())
    }

    /// Default-deny: absent record reads as not authorized. A store failure
    /// is propagated, never folded into `false`.
    pub async fn is_authorized(&self, grade_id: &str, phase: Phase) -> Result<bool> {
        let key = record_key(grade_id, phase);
        match self.store.get(AUTHORIZATION_COLLECTION, &key).await? {
            Some(doc) => Ok(doc
                .get("authorized")
                .and_then(Value::as_bool)
                .unwrap_or(false)),
            None => Ok(false),
        }
    }

    /// All authorization records for a grade, any phase
    pub async fn list_for_grade(&self, grade_id: &str) -> Result<Vec<PhaseAuthorization>> {
        let docs = self
            .store
            .query(AUTHORIZATION_COLLECTION, &[Filter::eq("grade_id", grade_id)])
            .await?;

        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(Into::into))
            .collect()
    }
}
