pub mod config;
pub mod doctor;
pub mod migrate;

use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// Why a command stopped early. Each kind maps to a fixed exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandFailure {
    Config(String),
    Runtime(String),
    Database(String),
    Migration(String),
}

impl CommandFailure {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_validation",
            Self::Runtime(_) => "runtime_init",
            Self::Database(_) => "db_connectivity",
            Self::Migration(_) => "migration",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Runtime(_) => 3,
            Self::Database(_) => 4,
            Self::Migration(_) => 5,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Config(message)
            | Self::Runtime(message)
            | Self::Database(message)
            | Self::Migration(message) => message,
        }
    }
}

#[derive(Debug, Serialize)]
struct Payload<'a, T: Serialize> {
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'static str>,
    message: &'a str,
    #[serde(flatten)]
    details: Option<T>,
}

impl CommandResult {
    /// Success payload; the fields of `details` sit next to `message`.
    pub fn success<T: Serialize>(command: &str, message: &str, details: T) -> Self {
        let payload =
            Payload { command, status: "ok", error_class: None, message, details: Some(details) };
        Self { exit_code: 0, output: render(&payload) }
    }

    pub fn failure(command: &str, failure: &CommandFailure) -> Self {
        let payload = Payload::<()> {
            command,
            status: "error",
            error_class: Some(failure.error_class()),
            message: failure.message(),
            details: None,
        };
        Self { exit_code: failure.exit_code(), output: render(&payload) }
    }
}

fn render<T: Serialize>(payload: &Payload<'_, T>) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        json!({
            "command": payload.command,
            "status": "error",
            "error_class": "serialization",
            "message": error.to_string(),
        })
        .to_string()
    })
}
