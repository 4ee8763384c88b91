use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use helsesjekk_core::domain::team::{Team, TeamId};
use helsesjekk_core::errors::ApplicationError;
use helsesjekk_db::{AskRepository, TeamRepository};

use crate::api::SlackWebApi;
use crate::blocks::MessageTemplate;
use crate::events::{
    AppMentionEvent, EventContext, EventHandler, EventHandlerError, HandlerResult, SlackEnvelope,
    SlackEvent, SlackEventType,
};
use crate::survey::{spawn_scoring, QuestionScorer, SurveyWorkflow};

/// Collaborators the mention shortcuts drive.
pub struct MentionCollaborators {
    pub teams: Arc<dyn TeamRepository>,
    pub asks: Arc<dyn AskRepository>,
    pub workflow: Arc<dyn SurveyWorkflow>,
    pub scorer: Arc<dyn QuestionScorer>,
    pub api: Arc<dyn SlackWebApi>,
}

/// Keyword shortcuts on `app_mention` for driving the survey by hand outside production.
///
/// Every failure is logged and answered with a single apology in the channel; nothing escapes.
pub struct MentionRouter {
    debug_commands_enabled: bool,
    environment: String,
    collaborators: MentionCollaborators,
}

impl MentionRouter {
    pub fn new(
        debug_commands_enabled: bool,
        environment: impl Into<String>,
        collaborators: MentionCollaborators,
    ) -> Self {
        Self { debug_commands_enabled, environment: environment.into(), collaborators }
    }

    pub async fn route(&self, event: &AppMentionEvent) -> HandlerResult {
        info!(
            event_name = "slack.mention.received",
            environment = %self.environment,
            channel_id = %event.channel,
            "user mentioned the bot"
        );

        match self.run_shortcuts(event).await {
            Ok(()) => HandlerResult::Processed,
            Err(failure) => {
                error!(
                    event_name = "slack.mention.failed",
                    channel_id = %event.channel,
                    error_class = failure.class(),
                    error = %failure,
                    "mention handling failed"
                );
                self.say(&event.channel, failure.user_message()).await;
                HandlerResult::Contained
            }
        }
    }

    async fn say(&self, channel: &str, text: &str) {
        if let Err(error) =
            self.collaborators.api.chat_post_message(channel, &MessageTemplate::text(text)).await
        {
            error!(
                event_name = "slack.mention.reply_failed",
                channel_id = %channel,
                error = %error,
                "failed to post apology"
            );
        }
    }

    async fn run_shortcuts(&self, event: &AppMentionEvent) -> Result<(), ApplicationError> {
        if !self.debug_commands_enabled {
            return Ok(());
        }

        let text = event.text.as_str();
        let team_id = TeamId::channel(&event.channel);

        if text.ends_with("post") {
            if let Some(team) = self.team(&team_id).await? {
                self.collaborators.workflow.post_to_team(&team).await?;
            }
        }

        if text.ends_with("lock") {
            if let Some(team) = self.team(&team_id).await? {
                self.collaborators.workflow.reveal_team(&team).await?;
            }
        }

        if text.ends_with("unlock") {
            if let Some(team) = self.team(&team_id).await? {
                let Some(ask) = self.collaborators.asks.find_latest_for_team(&team.id).await? else {
                    return Ok(());
                };

                self.collaborators.asks.set_revealed(ask.id, false).await?;
                info!(
                    event_name = "slack.mention.unlocked",
                    team_id = %team.id,
                    ask_id = %ask.id,
                    "Unlocked {} ({})",
                    team.name,
                    team.id
                );
                self.collaborators.workflow.update_response_count(&team).await?;
            }
        }

        if text.ends_with("debug") {
            let Some(ask) = self.collaborators.asks.find_active_for_team(&team_id).await? else {
                return Ok(());
            };
            spawn_scoring(self.collaborators.scorer.clone(), ask);
        }

        Ok(())
    }

    async fn team(&self, id: &TeamId) -> Result<Option<Team>, ApplicationError> {
        Ok(self.collaborators.teams.find_by_id(id).await?)
    }
}

#[async_trait]
impl EventHandler for MentionRouter {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::AppMention
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::AppMention(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        Ok(self.route(event).await)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{Duration as ChronoDuration, Utc};
    use tokio::sync::mpsc;

    use helsesjekk_core::domain::ask::{Ask, AskId, NewAsk};
    use helsesjekk_core::domain::team::{Team, TeamId};
    use helsesjekk_core::errors::{ApplicationError, SUPPORT_APOLOGY};
    use helsesjekk_db::{AskRepository, InMemoryAskRepository, InMemoryTeamRepository};

    use super::{MentionCollaborators, MentionRouter};
    use crate::api::testing::RecordingWebApi;
    use crate::events::{AppMentionEvent, HandlerResult};
    use crate::survey::testing::{ChannelScorer, RecordingWorkflow, WorkflowCall};

    struct Harness {
        router: MentionRouter,
        api: Arc<RecordingWebApi>,
        asks: Arc<InMemoryAskRepository>,
        workflow: Arc<RecordingWorkflow>,
        scored: mpsc::UnboundedReceiver<Ask>,
    }

    async fn harness(
        debug_enabled: bool,
        workflow: RecordingWorkflow,
        api: RecordingWebApi,
    ) -> Harness {
        let teams = Arc::new(InMemoryTeamRepository::default());
        teams.insert(Team::new(TeamId::channel("C1"), "Plattform")).await;
        let asks = Arc::new(InMemoryAskRepository::default());
        let workflow = Arc::new(workflow);
        let api = Arc::new(api);
        let (tx, scored) = mpsc::unbounded_channel();

        let router = MentionRouter::new(
            debug_enabled,
            if debug_enabled { "development" } else { "production" },
            MentionCollaborators {
                teams,
                asks: asks.clone(),
                workflow: workflow.clone(),
                scorer: Arc::new(ChannelScorer { scored: tx }),
                api: api.clone(),
            },
        );
        Harness { router, api, asks, workflow, scored }
    }

    fn mention(channel: &str, text: &str) -> AppMentionEvent {
        AppMentionEvent {
            channel: channel.to_owned(),
            user_id: Some("U1".to_owned()),
            text: text.to_owned(),
        }
    }

    #[tokio::test]
    async fn post_keyword_posts_exactly_once_to_the_team() {
        let harness = harness(true, RecordingWorkflow::default(), RecordingWebApi::default()).await;

        let result = harness.router.route(&mention("C1", "<@B1> post")).await;

        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(harness.workflow.calls().await, vec![WorkflowCall::Post("C1".to_owned())]);
    }

    #[tokio::test]
    async fn production_mode_makes_no_collaborator_calls() {
        let mut harness = harness(false, RecordingWorkflow::default(), RecordingWebApi::default()).await;
        harness.asks.insert(NewAsk::now(TeamId::channel("C1"))).await.expect("ask");

        for text in ["<@B1> post", "<@B1> lock", "<@B1> unlock", "<@B1> debug"] {
            let result = harness.router.route(&mention("C1", text)).await;
            assert_eq!(result, HandlerResult::Processed);
        }
        tokio::task::yield_now().await;

        assert!(harness.workflow.calls().await.is_empty());
        assert!(harness.api.posted_texts().await.is_empty());
        assert!(harness.scored.try_recv().is_err());
    }

    #[tokio::test]
    async fn mentions_for_unknown_teams_do_nothing() {
        let harness = harness(true, RecordingWorkflow::default(), RecordingWebApi::default()).await;

        harness.router.route(&mention("C-unknown", "<@B1> post")).await;
        harness.router.route(&mention("C-unknown", "<@B1> lock")).await;

        assert!(harness.workflow.calls().await.is_empty());
    }

    #[tokio::test]
    async fn unlock_without_rounds_returns_before_refreshing_count() {
        let harness = harness(true, RecordingWorkflow::default(), RecordingWebApi::default()).await;

        let result = harness.router.route(&mention("C1", "<@B1> unlock")).await;

        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(harness.workflow.calls().await, vec![WorkflowCall::Reveal("C1".to_owned())]);
    }

    #[tokio::test]
    async fn unlock_clears_only_the_most_recent_round() {
        let harness = harness(true, RecordingWorkflow::default(), RecordingWebApi::default()).await;
        let now = Utc::now();
        let team_id = TeamId::channel("C1");
        for (id, age_days) in [(1, 14), (3, 0), (2, 7)] {
            harness
                .asks
                .insert_existing(Ask {
                    id: AskId(id),
                    team_id: team_id.clone(),
                    timestamp: now - ChronoDuration::days(age_days),
                    revealed: true,
                    message_ts: None,
                })
                .await;
        }

        harness.router.route(&mention("C1", "<@B1> unlock")).await;

        assert_eq!(harness.asks.get(AskId(3)).await.map(|ask| ask.revealed), Some(false));
        assert_eq!(harness.asks.get(AskId(2)).await.map(|ask| ask.revealed), Some(true));
        assert_eq!(harness.asks.get(AskId(1)).await.map(|ask| ask.revealed), Some(true));
        assert_eq!(
            harness.workflow.calls().await,
            vec![
                WorkflowCall::Reveal("C1".to_owned()),
                WorkflowCall::UpdateResponseCount("C1".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn debug_without_active_round_never_scores() {
        let mut harness = harness(true, RecordingWorkflow::default(), RecordingWebApi::default()).await;

        let result = harness.router.route(&mention("C1", "<@B1> debug")).await;
        tokio::task::yield_now().await;

        assert_eq!(result, HandlerResult::Processed);
        assert!(harness.scored.try_recv().is_err());
    }

    #[tokio::test]
    async fn debug_with_active_round_submits_scoring() {
        let mut harness = harness(true, RecordingWorkflow::default(), RecordingWebApi::default()).await;
        let ask = harness.asks.insert(NewAsk::now(TeamId::channel("C1"))).await.expect("ask");

        harness.router.route(&mention("C1", "<@B1> debug")).await;

        let scored = tokio::time::timeout(Duration::from_secs(1), harness.scored.recv())
            .await
            .expect("scoring submitted")
            .expect("ask");
        assert_eq!(scored.id, ask.id);
    }

    #[tokio::test]
    async fn collaborator_failure_is_answered_with_one_apology_and_routing_continues() {
        let harness = harness(
            true,
            RecordingWorkflow::failing(ApplicationError::Persistence("database is locked".to_owned())),
            RecordingWebApi::default(),
        )
        .await;

        let failed = harness.router.route(&mention("C1", "<@B1> post")).await;
        let next = harness.router.route(&mention("C1", "<@B1> hei")).await;

        assert_eq!(failed, HandlerResult::Contained);
        assert_eq!(next, HandlerResult::Processed);
        assert_eq!(harness.api.posted_texts().await, vec![SUPPORT_APOLOGY.to_owned()]);
    }

    #[tokio::test]
    async fn failing_apology_is_swallowed() {
        let harness = harness(
            true,
            RecordingWorkflow::failing(ApplicationError::Integration("chat.postMessage".to_owned())),
            RecordingWebApi::failing_posts(),
        )
        .await;

        let result = harness.router.route(&mention("C1", "<@B1> lock")).await;

        assert_eq!(result, HandlerResult::Contained);
        assert_eq!(harness.api.posted_texts().await.len(), 1);
    }
}
