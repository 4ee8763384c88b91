use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use helsesjekk_core::domain::team::{Team, TeamId};
use helsesjekk_db::TeamRepository;

use crate::api::SlackWebApi;
use crate::blocks;
use crate::events::{
    EventContext, EventHandler, EventHandlerError, HandlerResult, SlackEnvelope, SlackEvent,
    SlackEventType,
};
use crate::membership::MembershipVerifier;

/// Handles `/helsesjekk` with any arguments by opening the team settings modal.
///
/// Failures after the acknowledgement are returned to the dispatcher unhandled.
pub struct CommandRouter {
    verifier: MembershipVerifier,
    teams: Arc<dyn TeamRepository>,
    api: Arc<dyn SlackWebApi>,
}

impl CommandRouter {
    pub fn new(api: Arc<dyn SlackWebApi>, teams: Arc<dyn TeamRepository>) -> Self {
        Self { verifier: MembershipVerifier::new(api.clone()), teams, api }
    }

    async fn find_or_create_team(&self, channel_id: &str) -> Result<Team, EventHandlerError> {
        let id = TeamId::channel(channel_id);
        if let Some(team) = self.teams.find_by_id(&id).await? {
            return Ok(team);
        }

        let team = self.teams.create(&id, Team::PLACEHOLDER_NAME).await?;
        info!(event_name = "slack.command.team_created", team_id = %team.id, "created team");
        Ok(team)
    }
}

#[async_trait]
impl EventHandler for CommandRouter {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        info!(
            event_name = "slack.command.received",
            command = %payload.command,
            channel_id = %payload.channel_id,
            correlation_id = %ctx.correlation_id,
            "user used settings command"
        );

        let eligibility = self.verifier.verify(&payload.channel_id).await;
        if !eligibility.is_eligible() {
            warn!(
                event_name = "slack.command.declined",
                channel_id = %payload.channel_id,
                eligibility = eligibility.tag(),
                correlation_id = %ctx.correlation_id,
                "settings command used in a DM or a channel the bot hasn't been added to"
            );
            ctx.acknowledger.acknowledge().await?;
            return Ok(HandlerResult::Declined(eligibility));
        }

        ctx.acknowledger.acknowledge().await?;
        let team = self.find_or_create_team(&payload.channel_id).await?;
        self.api.views_open(&payload.trigger_id, &blocks::settings_modal(&team)).await?;

        Ok(HandlerResult::Processed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use helsesjekk_core::domain::team::{Team, TeamId};
    use helsesjekk_db::{InMemoryTeamRepository, TeamRepository};

    use super::CommandRouter;
    use crate::api::testing::RecordingWebApi;
    use crate::api::{ChannelInfo, ConversationsInfoResponse, SlackApiError};
    use crate::events::{
        Acknowledger, EventContext, EventHandler, EventHandlerError, HandlerResult, SlackEnvelope,
        SlackEvent, SlashCommandPayload,
    };
    use crate::membership::Eligibility;
    use crate::socket::TransportError;

    #[derive(Default)]
    struct CountingAcknowledger {
        count: Mutex<usize>,
    }

    #[async_trait]
    impl Acknowledger for CountingAcknowledger {
        async fn acknowledge(&self) -> Result<(), TransportError> {
            *self.count.lock().await += 1;
            Ok(())
        }
    }

    fn command(channel_id: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: "env-cmd".to_owned(),
            event: SlackEvent::SlashCommand(SlashCommandPayload {
                command: "/helsesjekk".to_owned(),
                text: "whatever args".to_owned(),
                channel_id: channel_id.to_owned(),
                user_id: "U1".to_owned(),
                trigger_id: "trigger-1".to_owned(),
            }),
        }
    }

    fn context(ack: &Arc<CountingAcknowledger>) -> EventContext {
        EventContext { correlation_id: "env-cmd".to_owned(), acknowledger: ack.clone() }
    }

    #[tokio::test]
    async fn ineligible_channels_are_acked_without_side_effects() {
        let outcomes = vec![
            (
                Ok(ConversationsInfoResponse { ok: false, error: None, channel: None }),
                Eligibility::NotInPrivateChannel,
            ),
            (
                Ok(ConversationsInfoResponse {
                    ok: true,
                    error: None,
                    channel: Some(ChannelInfo { id: None, is_member: Some(false), is_private: None }),
                }),
                Eligibility::NotInPublicChannel,
            ),
            (
                Err(SlackApiError::Transport {
                    method: "conversations.info",
                    detail: "connection refused".to_owned(),
                }),
                Eligibility::Unknown,
            ),
        ];

        for (outcome, expected) in outcomes {
            let api = Arc::new(RecordingWebApi::with_channel_info(outcome));
            let teams = Arc::new(InMemoryTeamRepository::default());
            let ack = Arc::new(CountingAcknowledger::default());
            let router = CommandRouter::new(api.clone(), teams.clone());

            let result = router.handle(&command("C1"), &context(&ack)).await.expect("handled");

            assert_eq!(result, HandlerResult::Declined(expected));
            assert_eq!(*ack.count.lock().await, 1);
            assert_eq!(teams.len().await, 0);
            assert_eq!(api.views_opened().await, 0);
        }
    }

    #[tokio::test]
    async fn eligible_channel_creates_placeholder_team_once_then_opens_settings() {
        let api = Arc::new(RecordingWebApi::default());
        let teams = Arc::new(InMemoryTeamRepository::default());
        let ack = Arc::new(CountingAcknowledger::default());
        let router = CommandRouter::new(api.clone(), teams.clone());

        let result = router.handle(&command("C7"), &context(&ack)).await.expect("handled");

        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(*ack.count.lock().await, 1);
        assert_eq!(teams.len().await, 1);
        let team = teams.find_by_id(&TeamId::channel("C7")).await.expect("find").expect("team");
        assert_eq!(team.name, Team::PLACEHOLDER_NAME);
        let state = api.state.lock().await;
        assert_eq!(state.views_opened.len(), 1);
        assert_eq!(state.views_opened[0].0, "trigger-1");
        assert_eq!(state.views_opened[0].1.private_metadata, "C7");
    }

    #[tokio::test]
    async fn existing_team_is_reused() {
        let api = Arc::new(RecordingWebApi::default());
        let teams = Arc::new(InMemoryTeamRepository::default());
        teams.insert(Team::new(TeamId::channel("C8"), "Plattform")).await;
        let router = CommandRouter::new(api.clone(), teams.clone());

        router.handle(&command("C8"), &EventContext::default()).await.expect("handled");

        assert_eq!(teams.len().await, 1);
        assert_eq!(api.views_opened().await, 1);
    }

    #[tokio::test]
    async fn modal_failure_propagates_after_ack() {
        struct RejectingViews(RecordingWebApi);

        #[async_trait]
        impl crate::api::SlackWebApi for RejectingViews {
            async fn conversations_info(
                &self,
                channel_id: &str,
            ) -> Result<ConversationsInfoResponse, SlackApiError> {
                self.0.conversations_info(channel_id).await
            }

            async fn views_open(
                &self,
                _trigger_id: &str,
                _view: &crate::blocks::ModalView,
            ) -> Result<(), SlackApiError> {
                Err(SlackApiError::Platform {
                    method: "views.open",
                    error: "expired_trigger_id".to_owned(),
                })
            }

            async fn chat_post_message(
                &self,
                channel: &str,
                message: &crate::blocks::MessageTemplate,
            ) -> Result<crate::api::PostedMessage, SlackApiError> {
                self.0.chat_post_message(channel, message).await
            }

            async fn chat_update(
                &self,
                channel: &str,
                ts: &str,
                message: &crate::blocks::MessageTemplate,
            ) -> Result<(), SlackApiError> {
                self.0.chat_update(channel, ts, message).await
            }
        }

        let ack = Arc::new(CountingAcknowledger::default());
        let router = CommandRouter::new(
            Arc::new(RejectingViews(RecordingWebApi::default())),
            Arc::new(InMemoryTeamRepository::default()),
        );

        let error = router.handle(&command("C9"), &context(&ack)).await.expect_err("propagates");

        assert!(matches!(error, EventHandlerError::SlackApi(SlackApiError::Platform { .. })));
        assert_eq!(*ack.count.lock().await, 1);
    }
}
