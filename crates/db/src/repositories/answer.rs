use sqlx::Row;

use helsesjekk_core::domain::answer::{Answer, AnswerLevel};
use helsesjekk_core::domain::ask::AskId;

use super::{AnswerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAnswerRepository {
    pool: DbPool,
}

impl SqlAnswerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_answer(row: &sqlx::sqlite::SqliteRow) -> Result<Answer, RepositoryError> {
    let ask_id: i64 = row.try_get("ask_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let question_id: String =
        row.try_get("question_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let level: String = row.try_get("level").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Answer {
        ask_id: AskId(ask_id),
        user_id,
        question_id,
        level: level.parse::<AnswerLevel>().map_err(RepositoryError::Decode)?,
    })
}

#[async_trait::async_trait]
impl AnswerRepository for SqlAnswerRepository {
    async fn save(&self, answer: Answer) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO answer (ask_id, user_id, question_id, level)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(ask_id, user_id, question_id) DO UPDATE SET level = excluded.level",
        )
        .bind(answer.ask_id.0)
        .bind(&answer.user_id)
        .bind(&answer.question_id)
        .bind(answer.level.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_ask(&self, ask_id: AskId) -> Result<Vec<Answer>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT ask_id, user_id, question_id, level
             FROM answer WHERE ask_id = ?
             ORDER BY question_id ASC, user_id ASC",
        )
        .bind(ask_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_answer).collect::<Result<Vec<_>, _>>()
    }

    async fn count_respondents(&self, ask_id: AskId) -> Result<usize, RepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(DISTINCT user_id) FROM answer WHERE ask_id = ?")
                .bind(ask_id.0)
                .fetch_one(&self.pool)
                .await?;

        usize::try_from(count).map_err(|e| RepositoryError::Decode(e.to_string()))
    }
}
