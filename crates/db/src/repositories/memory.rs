use std::collections::HashMap;

use tokio::sync::RwLock;

use helsesjekk_core::domain::answer::Answer;
use helsesjekk_core::domain::ask::{self, Ask, AskId, NewAsk};
use helsesjekk_core::domain::team::{Team, TeamId};

use super::{AnswerRepository, AskRepository, RepositoryError, TeamRepository};

#[derive(Default)]
pub struct InMemoryTeamRepository {
    teams: RwLock<HashMap<String, Team>>,
}

impl InMemoryTeamRepository {
    pub async fn insert(&self, team: Team) {
        self.teams.write().await.insert(team.id.0.clone(), team);
    }

    pub async fn len(&self) -> usize {
        self.teams.read().await.len()
    }
}

#[async_trait::async_trait]
impl TeamRepository for InMemoryTeamRepository {
    async fn find_by_id(&self, id: &TeamId) -> Result<Option<Team>, RepositoryError> {
        let teams = self.teams.read().await;
        Ok(teams.get(&id.0).cloned())
    }

    async fn create(&self, id: &TeamId, name: &str) -> Result<Team, RepositoryError> {
        let mut teams = self.teams.write().await;
        let team = teams.entry(id.0.clone()).or_insert_with(|| Team::new(id.clone(), name));
        Ok(team.clone())
    }
}

#[derive(Default)]
pub struct InMemoryAskRepository {
    state: RwLock<AskState>,
}

#[derive(Default)]
struct AskState {
    next_id: i64,
    asks: Vec<Ask>,
}

impl InMemoryAskRepository {
    /// Inserts a fully formed ask, keeping its id.
    pub async fn insert_existing(&self, ask: Ask) {
        let mut state = self.state.write().await;
        state.next_id = state.next_id.max(ask.id.0);
        state.asks.push(ask);
    }

    pub async fn get(&self, id: AskId) -> Option<Ask> {
        self.state.read().await.asks.iter().find(|ask| ask.id == id).cloned()
    }
}

#[async_trait::async_trait]
impl AskRepository for InMemoryAskRepository {
    async fn insert(&self, new_ask: NewAsk) -> Result<Ask, RepositoryError> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let ask = Ask {
            id: AskId(state.next_id),
            team_id: new_ask.team_id,
            timestamp: new_ask.timestamp,
            revealed: false,
            message_ts: None,
        };
        state.asks.push(ask.clone());
        Ok(ask)
    }

    async fn find_by_id(&self, id: AskId) -> Result<Option<Ask>, RepositoryError> {
        Ok(self.get(id).await)
    }

    async fn find_latest_for_team(
        &self,
        team_id: &TeamId,
    ) -> Result<Option<Ask>, RepositoryError> {
        let state = self.state.read().await;
        Ok(ask::latest(state.asks.iter().filter(|ask| &ask.team_id == team_id)).cloned())
    }

    async fn find_active_for_team(
        &self,
        team_id: &TeamId,
    ) -> Result<Option<Ask>, RepositoryError> {
        let state = self.state.read().await;
        let candidates = state.asks.iter().filter(|ask| &ask.team_id == team_id && ask.is_active());
        Ok(ask::latest(candidates).cloned())
    }

    async fn set_revealed(&self, id: AskId, revealed: bool) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let ask = state
            .asks
            .iter_mut()
            .find(|ask| ask.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("ask {id}")))?;
        if revealed {
            ask.reveal();
        } else {
            ask.unlock();
        }
        Ok(())
    }

    async fn set_message_ts(&self, id: AskId, message_ts: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let ask = state
            .asks
            .iter_mut()
            .find(|ask| ask.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("ask {id}")))?;
        ask.message_ts = Some(message_ts.to_owned());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAnswerRepository {
    answers: RwLock<Vec<Answer>>,
}

#[async_trait::async_trait]
impl AnswerRepository for InMemoryAnswerRepository {
    async fn save(&self, answer: Answer) -> Result<(), RepositoryError> {
        let mut answers = self.answers.write().await;
        answers.retain(|existing| {
            !(existing.ask_id == answer.ask_id
                && existing.user_id == answer.user_id
                && existing.question_id == answer.question_id)
        });
        answers.push(answer);
        Ok(())
    }

    async fn list_for_ask(&self, ask_id: AskId) -> Result<Vec<Answer>, RepositoryError> {
        let answers = self.answers.read().await;
        Ok(answers.iter().filter(|answer| answer.ask_id == ask_id).cloned().collect())
    }

    async fn count_respondents(&self, ask_id: AskId) -> Result<usize, RepositoryError> {
        let answers = self.answers.read().await;
        let mut users: Vec<&str> = answers
            .iter()
            .filter(|answer| answer.ask_id == ask_id)
            .map(|answer| answer.user_id.as_str())
            .collect();
        users.sort_unstable();
        users.dedup();
        Ok(users.len())
    }
}
