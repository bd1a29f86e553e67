//! # papyrus-db
//!
//! PostgreSQL database layer for papyrus.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for tasks, documents, generated content and
//!   per-user LLM settings
//! - In-memory repositories with the same semantics for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use papyrus_db::{Database, NewTask, TaskRepository, TaskType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/papyrus").await?;
//!
//!     let task = db.tasks.create(NewTask {
//!         user_id: uuid::Uuid::new_v4(),
//!         file_id: None,
//!         task_type: TaskType::Extract,
//!         options: None,
//!     }).await?;
//!
//!     println!("Created task: {}", task.task_id);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod contents;
pub mod documents;
pub mod memory;
pub mod pool;
pub mod tasks;
pub mod user_settings;

// Re-export core types
pub use papyrus_core::*;

pub use contents::PgContentRepository;
pub use documents::PgDocumentRepository;
pub use memory::{
    MemoryContentRepository, MemoryDatabase, MemoryDocumentRepository, MemoryTaskRepository,
    MemoryUserSettingsRepository,
};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use tasks::PgTaskRepository;
pub use user_settings::PgUserSettingsRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Task record repository.
    pub tasks: Arc<PgTaskRepository>,
    /// Uploaded document repository.
    pub documents: Arc<PgDocumentRepository>,
    /// Generated content repository.
    pub contents: Arc<PgContentRepository>,
    /// Per-user LLM settings repository.
    pub user_settings: Arc<PgUserSettingsRepository>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            tasks: Arc::new(PgTaskRepository::new(pool.clone())),
            documents: Arc::new(PgDocumentRepository::new(pool.clone())),
            contents: Arc::new(PgContentRepository::new(pool.clone())),
            user_settings: Arc::new(PgUserSettingsRepository::new(pool.clone())),
            pool,
        }
    }

    /// Connect to the database with default pool settings.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Connect to the database with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Trait-object handles to every repository.
    pub fn repositories(&self) -> Repositories {
        Repositories {
            tasks: self.tasks.clone(),
            documents: self.documents.clone(),
            contents: self.contents.clone(),
            user_settings: self.user_settings.clone(),
        }
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            tasks: self.tasks.clone(),
            documents: self.documents.clone(),
            contents: self.contents.clone(),
            user_settings: self.user_settings.clone(),
        }
    }
}
