use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use helsesjekk_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct ConfigField {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<ConfigField> {
    let debug_commands = match config.runtime.debug_commands {
        Some(explicit) => explicit.to_string(),
        None => format!("{} (implied by environment)", config.runtime.debug_commands_enabled()),
    };

    vec![
        ConfigField {
            key_path: "database.url",
            env_keys: &["HELSESJEKK_DATABASE_URL"],
            value: config.database.url.clone(),
        },
        ConfigField {
            key_path: "database.max_connections",
            env_keys: &["HELSESJEKK_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
        },
        ConfigField {
            key_path: "database.timeout_secs",
            env_keys: &["HELSESJEKK_DATABASE_TIMEOUT_SECS"],
            value: config.database.timeout_secs.to_string(),
        },
        ConfigField {
            key_path: "slack.app_token",
            env_keys: &["HELSESJEKK_SLACK_APP_TOKEN"],
            value: redact_token(config.slack.app_token.expose_secret()),
        },
        ConfigField {
            key_path: "slack.bot_token",
            env_keys: &["HELSESJEKK_SLACK_BOT_TOKEN"],
            value: redact_token(config.slack.bot_token.expose_secret()),
        },
        ConfigField {
            key_path: "slack.api_base_url",
            env_keys: &["HELSESJEKK_SLACK_API_BASE_URL"],
            value: config.slack.api_base_url.clone(),
        },
        ConfigField {
            key_path: "runtime.environment",
            env_keys: &["HELSESJEKK_ENVIRONMENT"],
            value: config.runtime.environment.to_string(),
        },
        ConfigField {
            key_path: "runtime.debug_commands",
            env_keys: &["HELSESJEKK_DEBUG_COMMANDS"],
            value: debug_commands,
        },
        ConfigField {
            key_path: "server.bind_address",
            env_keys: &["HELSESJEKK_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        ConfigField {
            key_path: "server.health_check_port",
            env_keys: &["HELSESJEKK_SERVER_HEALTH_CHECK_PORT"],
            value: config.server.health_check_port.to_string(),
        },
        ConfigField {
            key_path: "server.graceful_shutdown_secs",
            env_keys: &["HELSESJEKK_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            value: config.server.graceful_shutdown_secs.to_string(),
        },
        ConfigField {
            key_path: "logging.level",
            env_keys: &["HELSESJEKK_LOGGING_LEVEL", "HELSESJEKK_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        ConfigField {
            key_path: "logging.format",
            env_keys: &["HELSESJEKK_LOGGING_FORMAT", "HELSESJEKK_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("helsesjekk.toml"), PathBuf::from("config/helsesjekk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
