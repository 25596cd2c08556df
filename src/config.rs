//! Configuration for Passage
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, Subcommand};
use std::time::Duration;
use uuid::Uuid;

use crate::services::ReconcilerConfig;

/// Passage - phase progression and authorization engine
#[derive(Parser, Debug, Clone)]
#[command(name = "passage")]
#[command(about = "Phase progression and authorization engine for staged student evaluations")]
pub struct Args {
    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "passage")]
    pub mongodb_db: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Maximum in-flight per-student fetches during reconciliation
    #[arg(long, env = "RECONCILE_MAX_CONCURRENT_FETCHES", default_value = "8")]
    pub max_concurrent_fetches: usize,

    /// Per-student fetch budget during reconciliation, in milliseconds
    #[arg(long, env = "RECONCILE_FETCH_TIMEOUT_MS", default_value = "10000")]
    pub fetch_timeout_ms: u64,

    /// Actor identifier recorded on authorize actions
    #[arg(long, env = "PASSAGE_ACTOR_ID", default_value_t = Uuid::new_v4().to_string())]
    pub actor_id: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authorize a phase for a grade
    Authorize {
        grade_id: String,
        /// Phase: first, second, or third
        phase: String,
        /// Display name of the grade; defaults to the grade id
        #[arg(long)]
        grade_name: Option<String>,
        #[arg(long)]
        institution_id: Option<String>,
        #[arg(long)]
        campus_id: Option<String>,
    },
    /// Revoke a previously authorized phase
    Revoke { grade_id: String, phase: String },
    /// List phase authorizations for a grade
    Status { grade_id: String },
    /// Recompute grade completion from raw exam results
    Reconcile {
        grade_id: String,
        /// Phase: first, second, or third
        phase: String,
        /// Cohort size the percentages are computed against
        #[arg(long)]
        total_students: u32,
    },
}

impl Args {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_fetches == 0 {
            return Err("max_concurrent_fetches must be at least 1".to_string());
        }
        if self.fetch_timeout_ms == 0 {
            return Err("fetch_timeout_ms must be positive".to_string());
        }
        Ok(())
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            max_concurrent_fetches: self.max_concurrent_fetches,
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
        }
    }
}
