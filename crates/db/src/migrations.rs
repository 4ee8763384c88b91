use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Versions recorded as successfully applied. Empty when the bookkeeping table is absent.
pub async fn applied_versions(pool: &DbPool) -> Result<Vec<i64>, sqlx::Error> {
    let (tracked,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;
    if tracked == 0 {
        return Ok(Vec::new());
    }

    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(version,)| version).collect())
}

pub async fn pending_versions(pool: &DbPool) -> Result<Vec<i64>, sqlx::Error> {
    let applied = applied_versions(pool).await?;
    Ok(MIGRATOR
        .iter()
        .map(|migration| migration.version)
        .filter(|version| !applied.contains(version))
        .collect())
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{applied_versions, pending_versions, run_pending, MIGRATOR};
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] =
        &["team", "ask", "answer", "idx_ask_team_timestamp", "idx_answer_ask_id"];

    #[tokio::test]
    async fn migrations_create_survey_tables_and_indexes() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for object in MANAGED_SCHEMA_OBJECTS {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE name = ?",
            )
            .bind(object)
            .fetch_one(&pool)
            .await
            .expect("check schema object")
            .get::<i64, _>("count");

            assert_eq!(count, 1, "expected schema object `{object}` to exist");
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");

        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");

        pool.close().await;
    }

    #[tokio::test]
    async fn pending_versions_shrink_to_empty_after_running() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");

        assert!(applied_versions(&pool).await.expect("applied").is_empty());
        let pending = pending_versions(&pool).await.expect("pending");
        assert_eq!(pending.len(), MIGRATOR.iter().count());

        run_pending(&pool).await.expect("run migrations");

        assert!(pending_versions(&pool).await.expect("pending").is_empty());
        assert_eq!(applied_versions(&pool).await.expect("applied"), pending);

        pool.close().await;
    }

    #[tokio::test]
    async fn answer_level_is_constrained() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        sqlx::query("INSERT INTO team (id, name, active, created_at) VALUES ('C1', 'T', 1, 'now')")
            .execute(&pool)
            .await
            .expect("insert team");
        sqlx::query("INSERT INTO ask (team_id, timestamp_ms, revealed) VALUES ('C1', 1, 0)")
            .execute(&pool)
            .await
            .expect("insert ask");

        let result = sqlx::query(
            "INSERT INTO answer (ask_id, user_id, question_id, level) VALUES (1, 'U1', 'q', 'great')",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err(), "unknown answer level should violate the check constraint");
        pool.close().await;
    }
}
