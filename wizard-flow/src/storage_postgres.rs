use async_trait::async_trait;
use sqlx::{PgPool, Row, types::Json};
use tracing::info;

use crate::{
    error::{GraphError, Result},
    storage::{Session, SessionStorage},
};

/// Session storage backed by a single Postgres table holding each session as JSONB.
pub struct PostgresSessionStorage {
    pool: PgPool,
}

impl PostgresSessionStorage {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wizard_sessions (
                id TEXT PRIMARY KEY,
                graph_id TEXT NOT NULL,
                current_task_id TEXT NOT NULL,
                data JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(storage_error)?;
        info!("Postgres session storage ready");
        Ok(())
    }
}

#[async_trait]
impl SessionStorage for PostgresSessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wizard_sessions (id, graph_id, current_task_id, data, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (id) DO UPDATE
            SET graph_id = EXCLUDED.graph_id,
                current_task_id = EXCLUDED.current_task_id,
                data = EXCLUDED.data,
                updated_at = NOW()
            "#,
        )
        .bind(&session.id)
        .bind(&session.graph_id)
        .bind(&session.current_task_id)
        .bind(Json(&session))
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT data FROM wizard_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.map(|row| {
            row.try_get::<Json<Session>, _>("data")
                .map(|Json(session)| session)
                .map_err(storage_error)
        })
        .transpose()
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM wizard_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}

fn storage_error(e: sqlx::Error) -> GraphError {
    GraphError::StorageError(e.to_string())
}
