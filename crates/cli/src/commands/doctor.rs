use helsesjekk_core::config::{AppConfig, LoadOptions};
use helsesjekk_db::{connect_with_settings, migrations};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
struct CheckCounts {
    passed: usize,
    failed: usize,
    skipped: usize,
}

impl CheckCounts {
    fn tally(checks: &[DoctorCheck]) -> Self {
        checks.iter().fold(Self::default(), |mut counts, check| {
            match check.status {
                CheckStatus::Pass => counts.passed += 1,
                CheckStatus::Fail => counts.failed += 1,
                CheckStatus::Skipped => counts.skipped += 1,
            }
            counts
        })
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    counts: CheckCounts,
    checks: Vec<DoctorCheck>,
}

const DOCTOR_FAILURE_EXIT_CODE: u8 = 6;

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code =
        if report.overall_status == CheckStatus::Pass { 0 } else { DOCTOR_FAILURE_EXIT_CODE };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            serde_json::json!({
                "overall_status": "fail",
                "summary": "doctor serialization failed",
                "error": error.to_string(),
            })
            .to_string()
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_slack_tokens(&config));
            checks.push(check_runtime_mode(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in
                ["slack_token_readiness", "runtime_mode", "database_connectivity", "schema_version"]
            {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let counts = CheckCounts::tally(&checks);
    let all_pass = counts.failed == 0 && counts.skipped == 0;
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        format!("doctor: all readiness checks passed ({} checks)", counts.passed)
    } else {
        format!(
            "doctor: one or more readiness checks failed ({} passed, {} failed, {} skipped)",
            counts.passed, counts.failed, counts.skipped
        )
    };

    DoctorReport { overall_status, summary, counts, checks }
}

fn check_slack_tokens(config: &AppConfig) -> DoctorCheck {
    DoctorCheck {
        name: "slack_token_readiness",
        status: CheckStatus::Pass,
        details: format!(
            "app and bot token formats validated by config contract; web API at `{}`",
            config.slack.api_base_url
        ),
    }
}

fn check_runtime_mode(config: &AppConfig) -> DoctorCheck {
    let debug = if config.runtime.debug_commands_enabled() { "enabled" } else { "disabled" };
    DoctorCheck {
        name: "runtime_mode",
        status: CheckStatus::Pass,
        details: format!(
            "environment `{}`; mention debug commands {debug}",
            config.runtime.environment
        ),
    }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: format!("failed to initialize async runtime: {error}"),
                },
                skipped_schema_check(),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck {
                        name: "database_connectivity",
                        status: CheckStatus::Fail,
                        details: format!("failed to connect to database: {error}"),
                    },
                    skipped_schema_check(),
                ];
            }
        };

        let connectivity = DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        };

        let schema = match migrations::pending_versions(&pool).await {
            Ok(pending) if pending.is_empty() => DoctorCheck {
                name: "schema_version",
                status: CheckStatus::Pass,
                details: "all migrations applied".to_string(),
            },
            Ok(pending) => DoctorCheck {
                name: "schema_version",
                status: CheckStatus::Fail,
                details: format!(
                    "{} pending migration(s); run `helsesjekk migrate`",
                    pending.len()
                ),
            },
            Err(error) => DoctorCheck {
                name: "schema_version",
                status: CheckStatus::Fail,
                details: format!("failed to read migration state: {error}"),
            },
        };

        pool.close().await;
        vec![connectivity, schema]
    })
}

fn skipped_schema_check() -> DoctorCheck {
    DoctorCheck {
        name: "schema_version",
        status: CheckStatus::Skipped,
        details: "skipped because the database is unreachable".to_string(),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
