//! Passage admin CLI
//!
//! Composition root wiring the MongoDB-backed store into the engine for
//! on-demand administrator operations: authorize or revoke a phase for a
//! grade, list a grade's authorizations, and run a reconciliation scan.

use anyhow::{anyhow, Context};
use clap::Parser;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use passage::{
    config::{Args, Command},
    services::{AuthorizationStore, AuthorizeRequest, GradeReconciler},
    store::{MongoExamResults, MongoRoster, MongoStore},
    EventBus, Phase,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("passage={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let store = Arc::new(
        MongoStore::new(&args.mongodb_uri, &args.mongodb_db)
            .await
            .context("MongoDB connection failed")?,
    );

    match args.command.clone() {
        Command::Authorize {
            grade_id,
            phase,
            grade_name,
            institution_id,
            campus_id,
        } => {
            let phase = parse_phase(&phase)?;
            let authorizations = AuthorizationStore::new(store);
            let record = authorizations
                .authorize(AuthorizeRequest {
                    grade_name: grade_name.unwrap_or_else(|| grade_id.clone()),
                    grade_id,
                    phase,
                    actor_id: args.actor_id.clone(),
                    institution_id,
                    campus_id,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Command::Revoke { grade_id, phase } => {
            let phase = parse_phase(&phase)?;
            let authorizations = AuthorizationStore::new(store);
            authorizations.revoke(&grade_id, phase).await?;
            println!("revoked {} for grade {}", phase, grade_id);
        }

        Command::Status { grade_id } => {
            let authorizations = AuthorizationStore::new(store);
            let records = authorizations.list_for_grade(&grade_id).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }

        Command::Reconcile {
            grade_id,
            phase,
            total_students,
        } => {
            let phase = parse_phase(&phase)?;
            let roster = Arc::new(MongoRoster::new(&store));
            let results = Arc::new(MongoExamResults::new(&store));
            let reconciler = GradeReconciler::new(
                roster,
                results,
                args.reconciler_config(),
                EventBus::new(),
            );
            let view = reconciler
                .check_grade_completion(&grade_id, phase, total_students)
                .await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
            println!(
                "completion: {:.1}% ({}/{} students)",
                view.completion_percentage, view.completed_students, view.total_students
            );
        }
    }

    Ok(())
}

fn parse_phase(s: &str) -> anyhow::Result<Phase> {
    Phase::parse(s).ok_or_else(|| anyhow!("unknown phase '{}', expected first|second|third", s))
}
