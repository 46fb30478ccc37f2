use serde::Serialize;

use crate::commands::CommandResult;
use funil_core::config::{AppConfig, LoadOptions};
use funil_db::{connect_with_settings, migrations, DemoSeedDataset};

#[derive(Debug, Serialize)]
struct SeedOutput {
    campaign_stages: usize,
    followup_stages: usize,
    deals: usize,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
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
                "seed",
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

        let seed_result = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<SeedOutput, (&'static str, String, u8)> = if !verification
            .all_present
        {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            Err((
                "seed_verification",
                format!("seed verification failed for checks: {}", failed_checks.join(", ")),
                6u8,
            ))
        } else {
            Ok(SeedOutput {
                campaign_stages: seed_result.campaign_stages,
                followup_stages: seed_result.followup_stages,
                deals: seed_result.deals,
            })
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(output) => CommandResult::success(
            "seed",
            format!(
                "seeded demo dataset: {} campaign stages, {} follow-up stages, {} deals",
                output.campaign_stages, output.followup_stages, output.deals
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
