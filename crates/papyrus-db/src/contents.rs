//! Generated document content repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use papyrus_core::{ContentRepository, ContentType, DocumentContent, Error, Result};

/// PostgreSQL implementation of ContentRepository.
pub struct PgContentRepository {
    pool: Pool<Postgres>,
}

impl PgContentRepository {
    /// Create a new PgContentRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_content_row(row: PgRow) -> Result<DocumentContent> {
        let content_type: String = row.get("content_type");
        Ok(DocumentContent {
            file_id: row.get("file_id"),
            content_type: content_type.parse().map_err(Error::Internal)?,
            content: row.get("content"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl ContentRepository for PgContentRepository {
    async fn upsert(
        &self,
        file_id: Uuid,
        content_type: ContentType,
        content: JsonValue,
    ) -> Result<DocumentContent> {
        let now = Utc::now();
        let row = sqlx::query(
            "INSERT INTO document_content (file_id, content_type, content, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             ON CONFLICT (file_id, content_type)
             DO UPDATE SET content = EXCLUDED.content, updated_at = EXCLUDED.updated_at
             RETURNING file_id, content_type, content, created_at, updated_at",
        )
        .bind(file_id)
        .bind(content_type.as_str())
        .bind(&content)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::parse_content_row(row)
    }

    async fn get(
        &self,
        file_id: Uuid,
        content_type: ContentType,
    ) -> Result<Option<DocumentContent>> {
        let row = sqlx::query(
            "SELECT file_id, content_type, content, created_at, updated_at
             FROM document_content
             WHERE file_id = $1 AND content_type = $2",
        )
        .bind(file_id)
        .bind(content_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_content_row).transpose()
    }
}
