//! Redis-backed job queue.
//!
//! ## Layout
//!
//! - `papyrus:queue:tasks` - list of pending job ids (FIFO)
//! - `papyrus:job:<id>` - hash with `task_id`, `task_type`, `status`,
//!   `enqueued_at` and `error`
//! - `papyrus:jobs:<status>` - sorted set of job ids per status, scored by
//!   the time the job entered that status
//!
//! Finished, failed and canceled job hashes expire after 24 hours.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `USE_REDIS`: Set to "true" to enable the queue (default: false)
//! - `REDIS_URL`: Full connection URL; overrides the individual settings below
//! - `REDIS_HOST` / `REDIS_PORT` / `REDIS_DB` / `REDIS_PASSWORD`

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info, warn};
use uuid::Uuid;

use papyrus_core::defaults::{
    JOB_RESULT_TTL_SECS, QUEUE_KEY_PREFIX, QUEUE_NAME, REDIS_DB, REDIS_HOST, REDIS_PORT,
};
use papyrus_core::{Error, QueueJobStatus, QueueStats, QueuedJob, Result, TaskType};

use super::JobQueue;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Redis connection settings.
#[derive(Clone)]
pub struct RedisConfig {
    pub enabled: bool,
    /// Explicit connection URL, when given.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            host: REDIS_HOST.to_string(),
            port: REDIS_PORT,
            db: REDIS_DB,
            password: None,
        }
    }
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("enabled", &self.enabled)
            .field("url", &self.url.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl RedisConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            enabled: std::env::var("USE_REDIS")
                .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(defaults.enabled),
            url: non_empty("REDIS_URL"),
            host: non_empty("REDIS_HOST").unwrap_or(defaults.host),
            port: std::env::var("REDIS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            db: std::env::var("REDIS_DB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.db),
            password: non_empty("REDIS_PASSWORD"),
        }
    }

    /// Enable or disable the queue.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Connection URL, built from host/port/db/password unless given explicitly.
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

fn pending_key() -> String {
    format!("{}:queue:{}", QUEUE_KEY_PREFIX, QUEUE_NAME)
}

fn job_key(job_id: &str) -> String {
    format!("{}:job:{}", QUEUE_KEY_PREFIX, job_id)
}

fn status_key(status: QueueJobStatus) -> String {
    format!("{}:jobs:{}", QUEUE_KEY_PREFIX, status.as_str())
}

/// Rebuild a job from its metadata hash.
fn job_from_hash(job_id: &str, fields: &HashMap<String, String>) -> Result<QueuedJob> {
    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| Error::Queue(format!("Job {} is missing field '{}'", job_id, name)))
    };
    let task_id = Uuid::parse_str(field("task_id")?)
        .map_err(|e| Error::Queue(format!("Job {} has invalid task_id: {}", job_id, e)))?;
    let task_type = field("task_type")?
        .parse::<TaskType>()
        .map_err(Error::Queue)?;
    let enqueued_at = DateTime::parse_from_rfc3339(field("enqueued_at")?)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(QueuedJob {
        job_id: job_id.to_string(),
        task_id,
        task_type,
        enqueued_at,
    })
}

/// Job queue stored in Redis.
#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
}

impl RedisJobQueue {
    /// Connect using the given configuration.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.connection_url())?;
        let conn = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                Error::Queue(format!(
                    "Timed out connecting to Redis after {}s",
                    CONNECT_TIMEOUT.as_secs()
                ))
            })??;
        Ok(Self { conn })
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    fn name(&self) -> &str {
        "redis"
    }

    async fn enqueue(&self, job: &QueuedJob) -> Result<String> {
        let mut conn = self.conn.clone();
        let key = job_key(&job.job_id);
        let fields = [
            ("task_id", job.task_id.to_string()),
            ("task_type", job.task_type.as_str().to_string()),
            ("status", QueueJobStatus::Queued.as_str().to_string()),
            ("enqueued_at", job.enqueued_at.to_rfc3339()),
        ];

        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(&key, &fields)
            .ignore()
            .zadd(
                status_key(QueueJobStatus::Queued),
                &job.job_id,
                job.enqueued_at.timestamp(),
            )
            .ignore()
            .rpush(pending_key(), &job.job_id)
            .ignore()
            .query_async(&mut conn)
            .await?;

        debug!(
            subsystem = "queue",
            component = "redis_queue",
            op = "enqueue",
            job_id = %job.job_id,
            task_id = %job.task_id,
            task_type = %job.task_type,
            "Job enqueued"
        );
        Ok(job.job_id.clone())
    }

    async fn dequeue(&self) -> Result<Option<QueuedJob>> {
        let mut conn = self.conn.clone();
        loop {
            let job_id: Option<String> = conn.lpop(pending_key(), None).await?;
            let Some(job_id) = job_id else {
                return Ok(None);
            };

            let fields: HashMap<String, String> = conn.hgetall(job_key(&job_id)).await?;
            if fields.is_empty() {
                warn!(
                    subsystem = "queue",
                    component = "redis_queue",
                    job_id = %job_id,
                    "Dropping job without metadata"
                );
                continue;
            }
            if fields.get("status").map(String::as_str) != Some(QueueJobStatus::Queued.as_str()) {
                continue;
            }
            return job_from_hash(&job_id, &fields).map(Some);
        }
    }

    async fn job_status(&self, job_id: &str) -> Result<Option<QueueJobStatus>> {
        let mut conn = self.conn.clone();
        let status: Option<String> = conn.hget(job_key(job_id), "status").await?;
        status
            .map(|s| s.parse::<QueueJobStatus>().map_err(Error::Queue))
            .transpose()
    }

    async fn job_error(&self, job_id: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let error: Option<String> = conn.hget(job_key(job_id), "error").await?;
        Ok(error.filter(|e| !e.is_empty()))
    }

    async fn set_job_status(
        &self,
        job_id: &str,
        status: QueueJobStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = job_key(job_id);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset(&key, "status", status.as_str())
            .ignore();
        if let Some(error) = error {
            pipe.hset(&key, "error", error).ignore();
        }
        for other in QueueJobStatus::ALL.iter().filter(|s| **s != status) {
            pipe.zrem(status_key(*other), job_id).ignore();
        }
        pipe.zadd(status_key(status), job_id, Utc::now().timestamp())
            .ignore();
        if status.is_final() {
            pipe.expire(&key, JOB_RESULT_TTL_SECS as i64).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn cancel(&self, job_id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.lrem(pending_key(), 0, job_id).await?;
        if removed == 0 {
            return Ok(false);
        }
        self.set_job_status(job_id, QueueJobStatus::Canceled, None)
            .await?;
        debug!(
            subsystem = "queue",
            component = "redis_queue",
            op = "cancel",
            job_id,
            "Queued job cancelled"
        );
        Ok(true)
    }

    async fn stats(&self) -> Result<QueueStats> {
        let mut conn = self.conn.clone();
        let cutoff = Utc::now().timestamp() - JOB_RESULT_TTL_SECS as i64;

        let mut counts = HashMap::new();
        for status in QueueJobStatus::ALL {
            let key = status_key(status);
            if status.is_final() {
                let _: i64 = conn.zrembyscore(&key, "-inf", cutoff).await?;
            }
            let count: i64 = conn.zcard(&key).await?;
            counts.insert(status, count);
        }
        let size: i64 = conn.llen(pending_key()).await?;
        let count = |status| counts.get(&status).copied().unwrap_or(0);

        Ok(QueueStats {
            size,
            started: count(QueueJobStatus::Started),
            finished: count(QueueJobStatus::Finished),
            failed: count(QueueJobStatus::Failed),
            canceled: count(QueueJobStatus::Canceled),
        })
    }

    async fn is_available(&self) -> bool {
        let mut conn = self.conn.clone();
        let ping = async {
            let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(pong)
        };
        matches!(tokio::time::timeout(PING_TIMEOUT, ping).await, Ok(Ok(_)))
    }
}

/// Build the queue described by `config`.
///
/// Returns `None` when the queue is disabled or Redis cannot be reached, in
/// which case tasks run synchronously.
pub async fn build_queue(config: &RedisConfig) -> Option<Arc<dyn JobQueue>> {
    if !config.enabled {
        info!(
            subsystem = "queue",
            queue_mode = "memory",
            "Redis queue disabled via USE_REDIS, tasks run in-process"
        );
        return None;
    }

    match RedisJobQueue::connect(config).await {
        Ok(queue) => {
            info!(
                subsystem = "queue",
                queue_mode = "redis",
                host = %config.host,
                port = config.port,
                db = config.db,
                "Redis queue connected"
            );
            Some(Arc::new(queue))
        }
        Err(e) => {
            warn!(
                subsystem = "queue",
                queue_mode = "memory",
                error = %e,
                "Failed to connect to Redis, falling back to synchronous execution"
            );
            None
        }
    }
}
