use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::team::TeamId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AskId(pub i64);

impl std::fmt::Display for AskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One round of the survey posted to a team.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ask {
    pub id: AskId,
    pub team_id: TeamId,
    pub timestamp: DateTime<Utc>,
    pub revealed: bool,
    /// Slack `ts` of the posted survey message, once it has been posted.
    pub message_ts: Option<String>,
}

/// An ask that has not been persisted yet and therefore has no id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAsk {
    pub team_id: TeamId,
    pub timestamp: DateTime<Utc>,
}

impl NewAsk {
    pub fn now(team_id: TeamId) -> Self {
        Self { team_id, timestamp: Utc::now() }
    }
}

impl Ask {
    /// An ask collects answers until its results have been revealed.
    pub fn is_active(&self) -> bool {
        !self.revealed
    }

    pub fn reveal(&mut self) {
        self.revealed = true;
    }

    pub fn unlock(&mut self) {
        self.revealed = false;
    }
}

/// Picks the most recent ask by timestamp. Ties resolve to the highest id.
pub fn latest<'a, I>(asks: I) -> Option<&'a Ask>
where
    I: IntoIterator<Item = &'a Ask>,
{
    asks.into_iter().max_by(|left, right| {
        left.timestamp.cmp(&right.timestamp).then_with(|| left.id.0.cmp(&right.id.0))
    })
}
