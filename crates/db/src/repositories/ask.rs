use chrono::DateTime;
use sqlx::Row;

use helsesjekk_core::domain::ask::{Ask, AskId, NewAsk};
use helsesjekk_core::domain::team::TeamId;

use super::{AskRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAskRepository {
    pool: DbPool,
}

impl SqlAskRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_ask(row: &sqlx::sqlite::SqliteRow) -> Result<Ask, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let team_id: String =
        row.try_get("team_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let timestamp_ms: i64 =
        row.try_get("timestamp_ms").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let revealed: bool =
        row.try_get("revealed").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let message_ts: Option<String> =
        row.try_get("message_ts").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let timestamp = DateTime::from_timestamp_millis(timestamp_ms).ok_or_else(|| {
        RepositoryError::Decode(format!("ask {id} has out-of-range timestamp {timestamp_ms}"))
    })?;

    Ok(Ask { id: AskId(id), team_id: TeamId(team_id), timestamp, revealed, message_ts })
}

#[async_trait::async_trait]
impl AskRepository for SqlAskRepository {
    async fn insert(&self, ask: NewAsk) -> Result<Ask, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO ask (team_id, timestamp_ms, revealed, message_ts) VALUES (?, ?, 0, NULL)",
        )
        .bind(&ask.team_id.0)
        .bind(ask.timestamp.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(Ask {
            id: AskId(result.last_insert_rowid()),
            team_id: ask.team_id,
            timestamp: ask.timestamp,
            revealed: false,
            message_ts: None,
        })
    }

    async fn find_by_id(&self, id: AskId) -> Result<Option<Ask>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, team_id, timestamp_ms, revealed, message_ts FROM ask WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_ask).transpose()
    }

    async fn find_latest_for_team(
        &self,
        team_id: &TeamId,
    ) -> Result<Option<Ask>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, team_id, timestamp_ms, revealed, message_ts
             FROM ask WHERE team_id = ?
             ORDER BY timestamp_ms DESC, id DESC
             LIMIT 1",
        )
        .bind(&team_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_ask).transpose()
    }

    async fn find_active_for_team(
        &self,
        team_id: &TeamId,
    ) -> Result<Option<Ask>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, team_id, timestamp_ms, revealed, message_ts
             FROM ask WHERE team_id = ? AND revealed = 0
             ORDER BY timestamp_ms DESC, id DESC
             LIMIT 1",
        )
        .bind(&team_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_ask).transpose()
    }

    async fn set_revealed(&self, id: AskId, revealed: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE ask SET revealed = ? WHERE id = ?")
            .bind(revealed)
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("ask {id}")));
        }
        Ok(())
    }

    async fn set_message_ts(&self, id: AskId, message_ts: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE ask SET message_ts = ? WHERE id = ?")
            .bind(message_ts)
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("ask {id}")));
        }
        Ok(())
    }
}
