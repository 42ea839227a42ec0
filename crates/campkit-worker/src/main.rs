//! Submission processing worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use campkit_platform::PlatformClient;
use campkit_queue::{JobQueue, RedisConnectionRegistry};
use campkit_storage::R2Client;
use campkit_worker::{JobExecutor, ProcessingContext, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("campkit=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting campkit-worker");

    // FFmpeg is a hard requirement; fail fast when it is missing
    if let Err(e) = campkit_media::check_ffmpeg() {
        error!("FFmpeg not available: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = campkit_media::check_ffprobe() {
        error!("FFprobe not available: {}", e);
        std::process::exit(1);
    }

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let platform = match PlatformClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create platform client: {}", e);
            std::process::exit(1);
        }
    };

    let storage = match R2Client::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create storage client: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = storage.check_connectivity().await {
        error!("Object storage unreachable: {}", e);
        std::process::exit(1);
    }

    let registry = match RedisConnectionRegistry::from_env() {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to create connection registry: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    let ctx = Arc::new(ProcessingContext::production(
        &config, platform, storage, registry,
    ));
    let executor = Arc::new(JobExecutor::new(config, queue, ctx));

    // Graceful shutdown on Ctrl-C
    let shutdown_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
