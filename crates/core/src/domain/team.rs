use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Teams are keyed by the Slack channel they were enrolled from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub String);

impl TeamId {
    pub fn channel(channel_id: impl Into<String>) -> Self {
        Self(channel_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Team {
    /// Name given to teams created from the settings command before anyone configures them.
    pub const PLACEHOLDER_NAME: &'static str = "[Ditt Team]";

    pub fn new(id: TeamId, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), active: true, created_at: Utc::now() }
    }

    pub fn has_placeholder_name(&self) -> bool {
        self.name == Self::PLACEHOLDER_NAME
    }
}
