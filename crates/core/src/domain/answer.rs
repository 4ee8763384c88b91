use serde::{Deserialize, Serialize};

use crate::domain::ask::AskId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerLevel {
    Good,
    Medium,
    Bad,
}

impl AnswerLevel {
    pub fn points(self) -> u32 {
        match self {
            Self::Good => 3,
            Self::Medium => 2,
            Self::Bad => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Medium => "medium",
            Self::Bad => "bad",
        }
    }
}

impl std::str::FromStr for AnswerLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "good" => Ok(Self::Good),
            "medium" => Ok(Self::Medium),
            "bad" => Ok(Self::Bad),
            other => Err(format!("unknown answer level `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub ask_id: AskId,
    pub user_id: String,
    pub question_id: String,
    pub level: AnswerLevel,
}
