//! Document file repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use papyrus_core::{
    new_v7, DocumentFile, DocumentRepository, Error, FileType, NewDocumentFile, Result,
};

const FILE_COLUMNS: &str =
    "id, user_id, filename, file_type, mime_type, size_bytes, storage_path, created_at";

/// PostgreSQL implementation of DocumentRepository.
pub struct PgDocumentRepository {
    pool: Pool<Postgres>,
}

impl PgDocumentRepository {
    /// Create a new PgDocumentRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_file_row(row: PgRow) -> DocumentFile {
        DocumentFile {
            id: row.get("id"),
            user_id: row.get("user_id"),
            filename: row.get("filename"),
            file_type: row.get("file_type"),
            mime_type: row.get("mime_type"),
            size_bytes: row.get("size_bytes"),
            storage_path: row.get("storage_path"),
            created_at: row.get("created_at"),
        }
    }
}

/// Lower-cased extension of a filename, used as the stored `file_type`.
pub(crate) fn extension_of(filename: &str) -> String {
    FileType::from_filename(filename)
        .map(|t| t.as_str().to_string())
        .unwrap_or_else(|| {
            std::path::Path::new(filename)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_lowercase()
        })
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn insert(&self, req: NewDocumentFile) -> Result<DocumentFile> {
        let row = sqlx::query(&format!(
            "INSERT INTO document_file
                 (id, user_id, filename, file_type, mime_type, size_bytes, storage_path, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {FILE_COLUMNS}"
        ))
        .bind(new_v7())
        .bind(req.user_id)
        .bind(&req.filename)
        .bind(extension_of(&req.filename))
        .bind(&req.mime_type)
        .bind(req.size_bytes)
        .bind(&req.storage_path)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_file_row(row))
    }

    async fn get(&self, file_id: Uuid, user_id: Uuid) -> Result<Option<DocumentFile>> {
        let row = sqlx::query(&format!(
            "SELECT {FILE_COLUMNS} FROM document_file WHERE id = $1 AND user_id = $2"
        ))
        .bind(file_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_file_row))
    }

    async fn get_unscoped(&self, file_id: Uuid) -> Result<Option<DocumentFile>> {
        let row = sqlx::query(&format!(
            "SELECT {FILE_COLUMNS} FROM document_file WHERE id = $1"
        ))
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_file_row))
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<DocumentFile>> {
        let rows = sqlx::query(&format!(
            "SELECT {FILE_COLUMNS} FROM document_file
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_file_row).collect())
    }
}
