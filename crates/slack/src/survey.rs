use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use helsesjekk_core::domain::answer::Answer;
use helsesjekk_core::domain::ask::{Ask, AskId, NewAsk};
use helsesjekk_core::domain::team::{Team, TeamId};
use helsesjekk_core::errors::ApplicationError;
use helsesjekk_core::scoring::{score_answers, ScoreSummary};
use helsesjekk_db::{AnswerRepository, AskRepository, TeamRepository};

use crate::api::SlackWebApi;
use crate::blocks;
use crate::events::{
    EventContext, EventHandler, EventHandlerError, HandlerResult, SlackEnvelope, SlackEvent,
    SlackEventType,
};

/// The survey round lifecycle as seen from the routers.
#[async_trait]
pub trait SurveyWorkflow: Send + Sync {
    /// Starts a new round and posts it to the team channel.
    async fn post_to_team(&self, team: &Team) -> Result<(), ApplicationError>;
    /// Marks the latest round revealed and posts its results.
    async fn reveal_team(&self, team: &Team) -> Result<(), ApplicationError>;
    /// Re-renders the latest round's message with the current respondent count.
    async fn update_response_count(&self, team: &Team) -> Result<(), ApplicationError>;
    /// Re-renders one posted round with its current respondent count.
    async fn refresh_round(&self, team: &Team, ask: &Ask) -> Result<(), ApplicationError>;
}

pub struct SlackSurveyWorkflow {
    api: Arc<dyn SlackWebApi>,
    asks: Arc<dyn AskRepository>,
    answers: Arc<dyn AnswerRepository>,
}

impl SlackSurveyWorkflow {
    pub fn new(
        api: Arc<dyn SlackWebApi>,
        asks: Arc<dyn AskRepository>,
        answers: Arc<dyn AnswerRepository>,
    ) -> Self {
        Self { api, asks, answers }
    }
}

#[async_trait]
impl SurveyWorkflow for SlackSurveyWorkflow {
    async fn post_to_team(&self, team: &Team) -> Result<(), ApplicationError> {
        let ask = self.asks.insert(NewAsk::now(team.id.clone())).await?;
        let message = blocks::survey_message(team, &ask, 0);
        let posted = self.api.chat_post_message(team.id.as_str(), &message).await?;
        self.asks.set_message_ts(ask.id, &posted.ts).await?;

        info!(
            event_name = "survey.round.posted",
            team_id = %team.id,
            ask_id = %ask.id,
            message_ts = %posted.ts,
            "posted survey round"
        );
        Ok(())
    }

    async fn reveal_team(&self, team: &Team) -> Result<(), ApplicationError> {
        let Some(mut ask) = self.asks.find_latest_for_team(&team.id).await? else {
            warn!(
                event_name = "survey.round.reveal_skipped",
                team_id = %team.id,
                "no round to reveal"
            );
            return Ok(());
        };

        self.asks.set_revealed(ask.id, true).await?;
        ask.reveal();
        let summary = score_answers(&self.answers.list_for_ask(ask.id).await?);

        if let Some(message_ts) = ask.message_ts.as_deref() {
            let closed = blocks::survey_message(team, &ask, summary.respondents);
            self.api.chat_update(team.id.as_str(), message_ts, &closed).await?;
        }
        let message = blocks::reveal_message(team, &summary);
        self.api.chat_post_message(team.id.as_str(), &message).await?;

        info!(
            event_name = "survey.round.revealed",
            team_id = %team.id,
            ask_id = %ask.id,
            respondents = summary.respondents,
            "revealed survey round"
        );
        Ok(())
    }

    async fn update_response_count(&self, team: &Team) -> Result<(), ApplicationError> {
        match self.asks.find_latest_for_team(&team.id).await? {
            Some(ask) => self.refresh_round(team, &ask).await,
            None => Ok(()),
        }
    }

    async fn refresh_round(&self, team: &Team, ask: &Ask) -> Result<(), ApplicationError> {
        let Some(message_ts) = ask.message_ts.as_deref() else {
            debug!(team_id = %team.id, ask_id = %ask.id, "survey round was never posted");
            return Ok(());
        };

        let respondents = self.answers.count_respondents(ask.id).await?;
        let message = blocks::survey_message(team, ask, respondents);
        self.api.chat_update(team.id.as_str(), message_ts, &message).await?;
        Ok(())
    }
}

#[async_trait]
pub trait QuestionScorer: Send + Sync {
    async fn score_questions(&self, ask: Ask) -> Result<ScoreSummary, ApplicationError>;
}

pub struct RepositoryQuestionScorer {
    answers: Arc<dyn AnswerRepository>,
}

impl RepositoryQuestionScorer {
    pub fn new(answers: Arc<dyn AnswerRepository>) -> Self {
        Self { answers }
    }
}

#[async_trait]
impl QuestionScorer for RepositoryQuestionScorer {
    async fn score_questions(&self, ask: Ask) -> Result<ScoreSummary, ApplicationError> {
        let summary = score_answers(&self.answers.list_for_ask(ask.id).await?);

        for question in &summary.questions {
            info!(
                event_name = "survey.score.question",
                ask_id = %ask.id,
                question_id = %question.question_id,
                responses = question.responses,
                average = question.average,
                "scored question"
            );
        }
        Ok(summary)
    }
}

/// Submits scoring as a detached task. The caller never waits on the result.
pub fn spawn_scoring(scorer: Arc<dyn QuestionScorer>, ask: Ask) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ask_id = ask.id;
        match scorer.score_questions(ask).await {
            Ok(summary) => info!(
                event_name = "survey.score.completed",
                ask_id = %ask_id,
                respondents = summary.respondents,
                overall_average = summary.overall_average().unwrap_or_default(),
                "scoring finished"
            ),
            Err(error) => error!(
                event_name = "survey.score.failed",
                ask_id = %ask_id,
                error = %error,
                "scoring failed"
            ),
        }
    })
}

/// Records answer button clicks from survey messages.
/// Clicks on revealed rounds or on rounds from another channel are ignored.
pub struct AnswerActionHandler {
    teams: Arc<dyn TeamRepository>,
    asks: Arc<dyn AskRepository>,
    answers: Arc<dyn AnswerRepository>,
    workflow: Arc<dyn SurveyWorkflow>,
}

impl AnswerActionHandler {
    pub fn new(
        teams: Arc<dyn TeamRepository>,
        asks: Arc<dyn AskRepository>,
        answers: Arc<dyn AnswerRepository>,
        workflow: Arc<dyn SurveyWorkflow>,
    ) -> Self {
        Self { teams, asks, answers, workflow }
    }
}

#[async_trait]
impl EventHandler for AnswerActionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(action) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some((question_id, level)) = blocks::parse_answer_action(&action.action_id) else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(ask_id) = action.value.as_deref().and_then(|value| value.parse::<i64>().ok())
        else {
            warn!(action_id = %action.action_id, "answer action without ask id");
            return Ok(HandlerResult::Ignored);
        };

        let team_id = TeamId::channel(&action.channel_id);
        let Some(ask) = self.asks.find_by_id(AskId(ask_id)).await? else {
            warn!(ask_id, team_id = %team_id, "answer action for unknown round");
            return Ok(HandlerResult::Ignored);
        };
        if ask.team_id != team_id {
            warn!(
                ask_id = %ask.id,
                ask_team_id = %ask.team_id,
                team_id = %team_id,
                "answer action from another channel"
            );
            return Ok(HandlerResult::Ignored);
        }
        if !ask.is_active() {
            info!(
                event_name = "survey.answer.rejected_revealed",
                ask_id = %ask.id,
                team_id = %team_id,
                "answer arrived after results were revealed"
            );
            return Ok(HandlerResult::Ignored);
        }

        self.answers
            .save(Answer {
                ask_id: ask.id,
                user_id: action.user_id.clone(),
                question_id: question_id.to_owned(),
                level,
            })
            .await?;

        if let Some(team) = self.teams.find_by_id(&team_id).await? {
            if let Err(error) = self.workflow.refresh_round(&team, &ask).await {
                warn!(team_id = %team.id, error = %error, "failed to refresh response count");
            }
        }
        Ok(HandlerResult::Processed)
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use helsesjekk_core::domain::answer::{Answer, AnswerLevel};
    use helsesjekk_core::domain::ask::{AskId, NewAsk};
    use helsesjekk_core::domain::question::QUESTIONS;
    use helsesjekk_core::domain::team::{Team, TeamId};
    use helsesjekk_db::{
        AnswerRepository, AskRepository, InMemoryAnswerRepository, InMemoryAskRepository,
        InMemoryTeamRepository,
    };
    use tokio::sync::mpsc;

    use super::testing::{ChannelScorer, RecordingWorkflow, WorkflowCall};
    use super::{
        spawn_scoring, AnswerActionHandler, QuestionScorer, RepositoryQuestionScorer,
        SlackSurveyWorkflow, SurveyWorkflow,
    };
    use crate::api::testing::RecordingWebApi;
    use crate::blocks::{answer_action_id, Block};
    use crate::events::{
        BlockActionEvent, EventContext, EventHandler, HandlerResult, SlackEnvelope, SlackEvent,
    };

    struct Fixture {
        api: Arc<RecordingWebApi>,
        asks: Arc<InMemoryAskRepository>,
        answers: Arc<InMemoryAnswerRepository>,
        workflow: SlackSurveyWorkflow,
    }

    fn fixture() -> Fixture {
        let api = Arc::new(RecordingWebApi::default());
        let asks = Arc::new(InMemoryAskRepository::default());
        let answers = Arc::new(InMemoryAnswerRepository::default());
        let workflow = SlackSurveyWorkflow::new(api.clone(), asks.clone(), answers.clone());
        Fixture { api, asks, answers, workflow }
    }

    #[tokio::test]
    async fn post_to_team_records_round_and_message_ts() {
        let fixture = fixture();
        let team = Team::new(TeamId::channel("C1"), "Plattform");

        fixture.workflow.post_to_team(&team).await.expect("post");

        let ask = fixture
            .asks
            .find_latest_for_team(&team.id)
            .await
            .expect("query")
            .expect("round created");
        assert!(!ask.revealed);
        assert_eq!(ask.message_ts.as_deref(), Some("1730000000.0001"));
        assert_eq!(fixture.api.posted_texts().await, vec!["Ukentlig helsesjekk for Plattform"]);
    }

    #[tokio::test]
    async fn reveal_team_marks_latest_round_and_posts_results() {
        let fixture = fixture();
        let team = Team::new(TeamId::channel("C1"), "Plattform");
        let ask = fixture.asks.insert(NewAsk::now(team.id.clone())).await.expect("ask");
        fixture
            .answers
            .save(Answer {
                ask_id: ask.id,
                user_id: "U1".to_owned(),
                question_id: QUESTIONS[0].id.to_owned(),
                level: AnswerLevel::Good,
            })
            .await
            .expect("answer");

        fixture.workflow.reveal_team(&team).await.expect("reveal");

        assert_eq!(fixture.asks.get(ask.id).await.map(|ask| ask.revealed), Some(true));
        assert_eq!(fixture.api.posted_texts().await, vec!["Resultater for Plattform"]);
    }

    #[tokio::test]
    async fn update_response_count_edits_posted_message() {
        let fixture = fixture();
        let team = Team::new(TeamId::channel("C1"), "Plattform");
        fixture.workflow.post_to_team(&team).await.expect("post");

        fixture.workflow.update_response_count(&team).await.expect("update");

        let state = fixture.api.state.lock().await;
        assert_eq!(state.updated.len(), 1);
        assert_eq!(state.updated[0].1, "1730000000.0001");
    }

    #[tokio::test]
    async fn update_response_count_without_rounds_is_a_noop() {
        let fixture = fixture();
        let team = Team::new(TeamId::channel("C1"), "Plattform");

        fixture.workflow.update_response_count(&team).await.expect("update");

        assert!(fixture.api.state.lock().await.updated.is_empty());
    }

    #[tokio::test]
    async fn repository_scorer_aggregates_answers() {
        let answers = Arc::new(InMemoryAnswerRepository::default());
        let asks = InMemoryAskRepository::default();
        let ask = asks.insert(NewAsk::now(TeamId::channel("C1"))).await.expect("ask");
        for (user, level) in [("U1", AnswerLevel::Good), ("U2", AnswerLevel::Medium)] {
            answers
                .save(Answer {
                    ask_id: ask.id,
                    user_id: user.to_owned(),
                    question_id: QUESTIONS[1].id.to_owned(),
                    level,
                })
                .await
                .expect("answer");
        }

        let summary =
            RepositoryQuestionScorer::new(answers).score_questions(ask).await.expect("score");

        assert_eq!(summary.respondents, 2);
        assert_eq!(summary.questions[0].average, 2.5);
    }

    #[tokio::test]
    async fn spawned_scoring_runs_independently() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let asks = InMemoryAskRepository::default();
        let ask = asks.insert(NewAsk::now(TeamId::channel("C1"))).await.expect("ask");

        let _detached = spawn_scoring(Arc::new(ChannelScorer { scored: tx }), ask.clone());

        let scored = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("scoring should run")
            .expect("scored ask");
        assert_eq!(scored.id, ask.id);
    }

    struct AnswerHarness {
        asks: Arc<InMemoryAskRepository>,
        answers: Arc<InMemoryAnswerRepository>,
        workflow: Arc<RecordingWorkflow>,
        handler: AnswerActionHandler,
    }

    async fn answer_harness() -> AnswerHarness {
        let teams = Arc::new(InMemoryTeamRepository::default());
        let asks = Arc::new(InMemoryAskRepository::default());
        let answers = Arc::new(InMemoryAnswerRepository::default());
        let workflow = Arc::new(RecordingWorkflow::default());
        teams.insert(Team::new(TeamId::channel("C1"), "Plattform")).await;
        teams.insert(Team::new(TeamId::channel("C2"), "Data")).await;
        let handler =
            AnswerActionHandler::new(teams, asks.clone(), answers.clone(), workflow.clone());
        AnswerHarness { asks, answers, workflow, handler }
    }

    fn answer_click(channel: &str, ask_id: AskId, level: AnswerLevel) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: "env-1".to_owned(),
            event: SlackEvent::BlockAction(BlockActionEvent {
                channel_id: channel.to_owned(),
                user_id: "U1".to_owned(),
                action_id: answer_action_id(QUESTIONS[0].id, level),
                value: Some(ask_id.to_string()),
            }),
        }
    }

    #[tokio::test]
    async fn answer_clicks_are_saved_and_refresh_the_clicked_round() {
        let harness = answer_harness().await;
        let clicked = harness.asks.insert(NewAsk::now(TeamId::channel("C1"))).await.expect("ask");
        harness.asks.insert(NewAsk::now(TeamId::channel("C1"))).await.expect("newer ask");

        let result = harness
            .handler
            .handle(&answer_click("C1", clicked.id, AnswerLevel::Bad), &EventContext::default())
            .await
            .expect("handle");

        assert_eq!(result, HandlerResult::Processed);
        let saved = harness.answers.list_for_ask(clicked.id).await.expect("list");
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].level, AnswerLevel::Bad);
        assert_eq!(
            harness.workflow.calls().await,
            vec![WorkflowCall::RefreshRound("C1".to_owned(), clicked.id.0)]
        );
    }

    #[tokio::test]
    async fn answers_from_another_channel_are_ignored() {
        let harness = answer_harness().await;
        let ask = harness.asks.insert(NewAsk::now(TeamId::channel("C1"))).await.expect("ask");

        let result = harness
            .handler
            .handle(&answer_click("C2", ask.id, AnswerLevel::Good), &EventContext::default())
            .await
            .expect("handle");

        assert_eq!(result, HandlerResult::Ignored);
        assert!(harness.answers.list_for_ask(ask.id).await.expect("list").is_empty());
        assert!(harness.workflow.calls().await.is_empty());
    }

    #[tokio::test]
    async fn answers_for_unknown_rounds_are_ignored() {
        let harness = answer_harness().await;

        let result = harness
            .handler
            .handle(&answer_click("C1", AskId(7), AnswerLevel::Good), &EventContext::default())
            .await
            .expect("handle");

        assert_eq!(result, HandlerResult::Ignored);
        assert!(harness.answers.list_for_ask(AskId(7)).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn reveal_closes_the_survey_message_and_late_answers_are_dropped() {
        let fixture = fixture();
        let teams = Arc::new(InMemoryTeamRepository::default());
        let team = Team::new(TeamId::channel("C1"), "Plattform");
        teams.insert(team.clone()).await;
        let workflow = Arc::new(SlackSurveyWorkflow::new(
            fixture.api.clone(),
            fixture.asks.clone(),
            fixture.answers.clone(),
        ));
        let handler = AnswerActionHandler::new(
            teams,
            fixture.asks.clone(),
            fixture.answers.clone(),
            workflow.clone(),
        );

        workflow.post_to_team(&team).await.expect("post");
        workflow.reveal_team(&team).await.expect("reveal");
        let ask = fixture
            .asks
            .find_latest_for_team(&team.id)
            .await
            .expect("query")
            .expect("round");

        {
            let state = fixture.api.state.lock().await;
            assert_eq!(state.updated.len(), 1);
            let (_, ts, closed) = &state.updated[0];
            assert_eq!(Some(ts.as_str()), ask.message_ts.as_deref());
            assert!(!closed.blocks.iter().any(|block| matches!(block, Block::Actions { .. })));
        }

        let result = handler
            .handle(&answer_click("C1", ask.id, AnswerLevel::Bad), &EventContext::default())
            .await
            .expect("handle");

        assert_eq!(result, HandlerResult::Ignored);
        assert!(fixture.answers.list_for_ask(ask.id).await.expect("list").is_empty());
        assert_eq!(fixture.api.state.lock().await.updated.len(), 1);
    }

    #[tokio::test]
    async fn unrelated_block_actions_are_ignored() {
        let handler = AnswerActionHandler::new(
            Arc::new(InMemoryTeamRepository::default()),
            Arc::new(InMemoryAskRepository::default()),
            Arc::new(InMemoryAnswerRepository::default()),
            Arc::new(RecordingWorkflow::default()),
        );
        let envelope = SlackEnvelope {
            envelope_id: "env-2".to_owned(),
            event: SlackEvent::BlockAction(BlockActionEvent {
                channel_id: "C1".to_owned(),
                user_id: "U1".to_owned(),
                action_id: "settings.open".to_owned(),
                value: None,
            }),
        };

        let result = handler.handle(&envelope, &EventContext::default()).await.expect("handle");

        assert_eq!(result, HandlerResult::Ignored);
    }
}
