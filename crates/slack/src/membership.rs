use std::sync::Arc;

use tracing::{error, info};

use crate::api::{ConversationsInfoResponse, SlackApiError, SlackWebApi};

/// Whether the bot can act in a channel, as far as `conversations.info` can tell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Eligibility {
    Eligible,
    /// Slack answered `ok: false`. Covers DMs and private channels the bot was never added to,
    /// and any other refusal; the label is coarse.
    NotInPrivateChannel,
    NotInPublicChannel,
    Unknown,
}

impl Eligibility {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Eligible => "eligible",
            Self::NotInPrivateChannel => "not_in_private",
            Self::NotInPublicChannel => "not_in_public",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_eligible(self) -> bool {
        self == Self::Eligible
    }
}

impl std::fmt::Display for Eligibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Maps the three outcomes of `conversations.info` onto an eligibility.
///
/// A successful response without a channel object counts as eligible.
pub fn classify(outcome: &Result<ConversationsInfoResponse, SlackApiError>) -> Eligibility {
    match outcome {
        Err(_) => Eligibility::Unknown,
        Ok(response) if !response.ok => Eligibility::NotInPrivateChannel,
        Ok(response) => match &response.channel {
            Some(channel) if channel.is_member != Some(true) => Eligibility::NotInPublicChannel,
            _ => Eligibility::Eligible,
        },
    }
}

pub struct MembershipVerifier {
    api: Arc<dyn SlackWebApi>,
}

impl MembershipVerifier {
    pub fn new(api: Arc<dyn SlackWebApi>) -> Self {
        Self { api }
    }

    pub async fn verify(&self, channel_id: &str) -> Eligibility {
        let outcome = self.api.conversations_info(channel_id).await;

        match &outcome {
            Ok(response) if !response.ok => info!(
                event_name = "slack.membership.channel_info_refused",
                channel_id,
                error = response.error.as_deref().unwrap_or("No error"),
                "unable to get channel info, bot not in channel or this is a DM"
            ),
            Err(cause) => error!(
                event_name = "slack.membership.channel_info_failed",
                channel_id,
                error = %cause,
                "couldn't get channel info"
            ),
            Ok(_) => {}
        }

        classify(&outcome)
    }
}
