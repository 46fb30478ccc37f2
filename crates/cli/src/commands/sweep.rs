use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::commands::CommandResult;
use funil_core::config::{AppConfig, LoadOptions};
use funil_core::pipeline::StageTransitionService;
use funil_core::sweep::StagnationSweeper;
use funil_db::repositories::{SqlActivityLog, SqlDealStore};
use funil_db::{connect_with_settings, migrations};

#[derive(Debug, Serialize)]
struct CandidateLine {
    deal_id: String,
    stage: &'static str,
    contact_attempts: u32,
    last_contact_at: Option<String>,
}

pub fn run(dry_run: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "sweep",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "sweep",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let deals = Arc::new(SqlDealStore::new(pool.clone()));
        let activity = Arc::new(SqlActivityLog::new(pool.clone()));
        let transitions = Arc::new(StageTransitionService::new(deals.clone(), activity));
        let sweeper = StagnationSweeper::new(deals, transitions);

        let message = if dry_run {
            let candidates = sweeper
                .candidates(Utc::now())
                .await
                .map_err(|error| ("sweep_query", error.to_string(), 5u8))?;
            let lines: Vec<CandidateLine> = candidates
                .iter()
                .map(|deal| CandidateLine {
                    deal_id: deal.id.0.clone(),
                    stage: deal.stage.as_str(),
                    contact_attempts: deal.contact_attempts,
                    last_contact_at: deal.last_contact_at.map(|at| at.to_rfc3339()),
                })
                .collect();
            format!(
                "dry run: {} candidate(s) would be archived: {}",
                lines.len(),
                serde_json::to_string(&lines).unwrap_or_else(|_| "[]".to_string())
            )
        } else {
            let report = sweeper
                .run(Utc::now())
                .await
                .map_err(|error| ("sweep_execution", error.to_string(), 5u8))?;
            format!(
                "sweep finished: examined {}, archived {}, failed {}",
                report.examined, report.archived, report.failed
            )
        };

        pool.close().await;
        Ok::<String, (&'static str, String, u8)>(message)
    });

    match result {
        Ok(message) => CommandResult::success("sweep", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("sweep", error_class, message, exit_code)
        }
    }
}
