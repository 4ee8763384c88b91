use chrono::{DateTime, Utc};
use sqlx::Row;

use helsesjekk_core::domain::team::{Team, TeamId};

use super::{RepositoryError, TeamRepository};
use crate::DbPool;

pub struct SqlTeamRepository {
    pool: DbPool,
}

impl SqlTeamRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_team(row: &sqlx::sqlite::SqliteRow) -> Result<Team, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let active: bool =
        row.try_get("active").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("team {id} created_at: {e}")))?;

    Ok(Team { id: TeamId(id), name, active, created_at })
}

#[async_trait::async_trait]
impl TeamRepository for SqlTeamRepository {
    async fn find_by_id(&self, id: &TeamId) -> Result<Option<Team>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, active, created_at FROM team WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_team).transpose()
    }

    async fn create(&self, id: &TeamId, name: &str) -> Result<Team, RepositoryError> {
        let team = Team::new(id.clone(), name);

        sqlx::query(
            "INSERT INTO team (id, name, active, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&team.id.0)
        .bind(&team.name)
        .bind(team.active)
        .bind(team.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("team {id} after insert")))
    }
}
