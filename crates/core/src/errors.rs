use thiserror::Error;

/// Reply posted into a conversation when a mention could not be handled.
pub const SUPPORT_APOLOGY: &str =
    "Oi! Noe gikk galt i botten. :( Dersom det skjer igjen, ta kontakt i #helsesjekk-bot.";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Users only ever see the apology; the detail stays in the logs.
    pub fn user_message(&self) -> &'static str {
        SUPPORT_APOLOGY
    }

    pub fn class(&self) -> &'static str {
        match self {
            Self::Persistence(_) => "persistence",
            Self::Integration(_) => "integration",
            Self::Configuration(_) => "configuration",
        }
    }
}
