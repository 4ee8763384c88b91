pub mod config;
pub mod domain;
pub mod errors;
pub mod scoring;

pub use domain::answer::{Answer, AnswerLevel};
pub use domain::ask::{Ask, AskId, NewAsk};
pub use domain::question::{Question, QUESTIONS};
pub use domain::team::{Team, TeamId};
pub use errors::{ApplicationError, SUPPORT_APOLOGY};
pub use scoring::{score_answers, QuestionScore, ScoreSummary};
