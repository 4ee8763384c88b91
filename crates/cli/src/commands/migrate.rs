use helsesjekk_core::config::{AppConfig, LoadOptions};
use helsesjekk_db::{connect_with_settings, migrations};
use serde::Serialize;

use crate::commands::{CommandFailure, CommandResult};

#[derive(Debug, Serialize)]
struct MigrateReport {
    applied: usize,
    schema_version: Option<i64>,
}

pub fn run() -> CommandResult {
    match execute() {
        Ok(report) => {
            let version = report
                .schema_version
                .map(|version| version.to_string())
                .unwrap_or_else(|| "none".into());
            let message = format!(
                "applied {} pending migration(s); schema version {version}",
                report.applied
            );
            CommandResult::success("migrate", &message, report)
        }
        Err(failure) => CommandResult::failure("migrate", &failure),
    }
}

fn execute() -> Result<MigrateReport, CommandFailure> {
    let config = AppConfig::load(LoadOptions::default())
        .map_err(|error| CommandFailure::Config(format!("configuration issue: {error}")))?;

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |error| CommandFailure::Runtime(format!("failed to initialize async runtime: {error}")),
    )?;

    runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| CommandFailure::Database(error.to_string()))?;

        let pending = migrations::pending_versions(&pool)
            .await
            .map_err(|error| CommandFailure::Migration(error.to_string()))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandFailure::Migration(error.to_string()))?;
        let schema_version = migrations::applied_versions(&pool)
            .await
            .map_err(|error| CommandFailure::Migration(error.to_string()))?
            .last()
            .copied();

        pool.close().await;
        Ok::<_, CommandFailure>(MigrateReport { applied: pending.len(), schema_version })
    })
}
