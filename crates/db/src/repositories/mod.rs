use async_trait::async_trait;
use thiserror::Error;

use helsesjekk_core::domain::answer::Answer;
use helsesjekk_core::domain::ask::{Ask, AskId, NewAsk};
use helsesjekk_core::domain::team::{Team, TeamId};
use helsesjekk_core::errors::ApplicationError;

pub mod answer;
pub mod ask;
pub mod memory;
pub mod team;

pub use answer::SqlAnswerRepository;
pub use ask::SqlAskRepository;
pub use memory::{InMemoryAnswerRepository, InMemoryAskRepository, InMemoryTeamRepository};
pub use team::SqlTeamRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("record not found: {0}")]
    NotFound(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn find_by_id(&self, id: &TeamId) -> Result<Option<Team>, RepositoryError>;

    /// Creates the team, or returns the existing row if another caller won the race.
    async fn create(&self, id: &TeamId, name: &str) -> Result<Team, RepositoryError>;
}

#[async_trait]
pub trait AskRepository: Send + Sync {
    async fn insert(&self, ask: NewAsk) -> Result<Ask, RepositoryError>;

    async fn find_by_id(&self, id: AskId) -> Result<Option<Ask>, RepositoryError>;

    /// Most recent ask for the team by timestamp, revealed or not.
    async fn find_latest_for_team(&self, team_id: &TeamId)
        -> Result<Option<Ask>, RepositoryError>;

    /// Most recent ask for the team that is still collecting answers.
    async fn find_active_for_team(&self, team_id: &TeamId)
        -> Result<Option<Ask>, RepositoryError>;

    async fn set_revealed(&self, id: AskId, revealed: bool) -> Result<(), RepositoryError>;

    async fn set_message_ts(&self, id: AskId, message_ts: &str) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AnswerRepository: Send + Sync {
    async fn save(&self, answer: Answer) -> Result<(), RepositoryError>;
    async fn list_for_ask(&self, ask_id: AskId) -> Result<Vec<Answer>, RepositoryError>;
    async fn count_respondents(&self, ask_id: AskId) -> Result<usize, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use helsesjekk_core::errors::{ApplicationError, SUPPORT_APOLOGY};

    use super::RepositoryError;

    #[test]
    fn repository_errors_surface_as_persistence_failures() {
        let error: ApplicationError = RepositoryError::NotFound("ask 7".to_owned()).into();

        assert_eq!(error.class(), "persistence");
        assert_eq!(error.user_message(), SUPPORT_APOLOGY);
    }
}
