//! Per-user LLM settings repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use papyrus_core::{Error, LlmSettings, Result, UserSettingsRepository};

/// PostgreSQL implementation of UserSettingsRepository.
pub struct PgUserSettingsRepository {
    pool: Pool<Postgres>,
}

impl PgUserSettingsRepository {
    /// Create a new PgUserSettingsRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserSettingsRepository for PgUserSettingsRepository {
    async fn get_llm_settings(&self, user_id: Uuid) -> Result<Option<LlmSettings>> {
        let row = sqlx::query("SELECT api_key, model_name FROM user_llm_settings WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|row| LlmSettings {
            api_key: row.get("api_key"),
            model_name: row.get("model_name"),
        }))
    }

    async fn set_llm_settings(&self, user_id: Uuid, settings: LlmSettings) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_llm_settings (user_id, api_key, model_name, updated_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id)
             DO UPDATE SET api_key = EXCLUDED.api_key,
                           model_name = EXCLUDED.model_name,
                           updated_at = EXCLUDED.updated_at",
        )
        .bind(user_id)
        .bind(&settings.api_key)
        .bind(&settings.model_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}
