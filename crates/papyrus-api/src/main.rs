//! papyrus-api - HTTP API server for papyrus

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, Method};
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use papyrus_api::{router, AppState, MakeRequestUuidV7};
use papyrus_core::defaults::{
    CORS_MAX_AGE_SECS, MAX_BODY_SIZE_BYTES, SERVER_PORT, UPLOAD_DIR, USER_ID_HEADER,
};
use papyrus_core::GenerationProvider;
use papyrus_db::{log_pool_metrics, Database};
use papyrus_inference::OpenAIProvider;
use papyrus_jobs::{
    build_queue, ExtractionRegistry, JobWorker, RedisConfig, TaskExecutor, WorkerConfig,
    WorkerEvent,
};

fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str =
        std::env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "http://localhost:8501".to_string());

    if origins_str.trim().is_empty() {
        return vec![HeaderValue::from_static("http://localhost:8501")];
    }

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

/// Resolves on ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}

/// Log worker lifecycle events until the worker stops.
async fn log_worker_events(mut events: broadcast::Receiver<WorkerEvent>) {
    loop {
        match events.recv().await {
            Ok(WorkerEvent::TaskStarted {
                task_id,
                task_type,
                job_id,
            }) => debug!(
                subsystem = "jobs",
                task_id = %task_id,
                %task_type,
                job_id = %job_id,
                "Worker picked up task"
            ),
            Ok(WorkerEvent::TaskFailed {
                task_id,
                task_type,
                error,
            }) => warn!(
                subsystem = "jobs",
                task_id = %task_id,
                %task_type,
                %error,
                "Worker task failed"
            ),
            Ok(WorkerEvent::WorkerStopped) => break,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Worker event listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "papyrus_api=debug,papyrus_jobs=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("papyrus-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/papyrus".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(SERVER_PORT);
    let max_body_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(MAX_BODY_SIZE_BYTES);
    let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| UPLOAD_DIR.to_string());
    tokio::fs::create_dir_all(&upload_dir).await?;

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");
    log_pool_metrics(db.pool());

    // Generation provider (server-wide key is optional; users may supply their own)
    let provider = Arc::new(OpenAIProvider::from_env()?);
    if !provider.has_default_key() {
        warn!("DASHSCOPE_API_KEY not set, LLM tasks require a per-user API key");
    }

    let registry = Arc::new(ExtractionRegistry::with_defaults());
    for (file_type, healthy) in registry.health_check_all().await {
        if !healthy {
            warn!(%file_type, "Extraction tool unavailable, extraction of this type will fail");
        }
    }

    let executor = Arc::new(TaskExecutor::with_default_handlers(
        db.repositories(),
        provider,
        registry,
    ));

    // Queue (falls back to synchronous execution when Redis is disabled or down)
    let redis_config = RedisConfig::from_env();
    let queue = build_queue(&redis_config).await;

    let worker_config = WorkerConfig::from_env();
    let worker_handle = match (&queue, worker_config.enabled) {
        (Some(queue), true) => {
            info!("Starting queue worker...");
            let worker = JobWorker::new(queue.clone(), executor.clone(), worker_config);
            tokio::spawn(log_worker_events(worker.events()));
            let handle = worker.start();
            info!("Queue worker started");
            Some(handle)
        }
        (Some(_), false) => {
            info!("Queue worker disabled");
            None
        }
        (None, _) => {
            info!("No queue configured, tasks run synchronously");
            None
        }
    };

    let state = AppState::new(executor, queue, redis_config)
        .with_upload_dir(&upload_dir)
        .with_max_upload_bytes(max_body_bytes);

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer({
            let allowed_origins = parse_allowed_origins();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    HeaderName::from_static(USER_ID_HEADER),
                ])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(CORS_MAX_AGE_SECS))
        })
        .layer(RequestBodyLimitLayer::new(max_body_bytes.saturating_add(64 * 1024)))
        .layer(CatchPanicLayer::new());

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Jobs already popped from the queue run to completion before exit.
    if let Some(handle) = worker_handle {
        info!("Stopping queue worker...");
        if let Err(e) = handle.shutdown_and_wait().await {
            warn!(error = %e, "Queue worker did not stop cleanly");
        }
    }
    info!("Server stopped");

    Ok(())
}
