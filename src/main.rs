//! Render Worker Service
//!
//! This worker consumes document render jobs from a Redis queue, renders
//! their HTML to PDF or image bytes in a headless Chromium process, and
//! uploads the output to S3-compatible object storage.
//!
//! ## Architecture
//!
//! - **Queue**: Redis list (`docgen:render:queue`) with a delayed set for
//!   backoff retries
//! - **Status/results**: Redis keys (`docgen:render:status:{job_id}`,
//!   `docgen:render:result:{job_id}`)
//! - **Renderer**: one headless Chromium process per job via chromiumoxide
//! - **Storage**: S3 `put_object` with deterministic public URLs
//! - **Telemetry**: OpenTelemetry OTLP export
//!
//! ## Configuration
//!
//! Environment variables:
//! - `REDIS_URL`: Redis connection string (default: redis://127.0.0.1/)
//! - `WORKER_CONCURRENCY`: Number of concurrent workers (default: 4)
//! - `RENDER_QUEUE`: Queue key prefix (default: docgen:render)
//! - `MAX_ATTEMPTS` / `BACKOFF_BASE_MS`: Retry policy (default: 3 / 5000)
//! - `CHROME_PATH`: Chromium binary; platform detection when unset
//! - `NAVIGATION_TIMEOUT_MS`: Content settle timeout (default: 30000)
//! - `S3_BUCKET` (required), `S3_REGION`, `S3_ENDPOINT`, `STORAGE_PUBLIC_URL`
//! - `RUST_LOG`: Log level (default: info)

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::Client;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use worker_render::chromium::ChromiumEngine;
use worker_render::config::WorkerConfig;
use worker_render::job::RenderJob;
use worker_render::processor::JobProcessor;
use worker_render::queue::{QueueConfig, RenderQueue};
use worker_render::renderer::Renderer;
use worker_render::storage::{S3BlobStore, Uploader};
use worker_render::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Initialize OpenTelemetry
    if let Err(e) = telemetry::init_telemetry() {
        warn!("Failed to initialize telemetry: {}", e);
    }

    info!("Starting render worker service");

    let config = WorkerConfig::from_env()?;
    info!(
        redis_url = %config.redis_url,
        concurrency = config.concurrency,
        queue = %config.queue.name,
        bucket = %config.storage.bucket,
        "Configuration loaded"
    );

    // Connect to Redis
    let client =
        Client::open(config.redis_url.as_str()).context("Failed to create Redis client")?;
    let conn = ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;

    info!("Connected to Redis");

    // Build the S3 client
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.storage.region.clone()))
        .load()
        .await;
    let mut s3_config = aws_sdk_s3::config::Builder::from(&aws_config);
    if let Some(endpoint) = &config.storage.endpoint {
        s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
    }
    let s3 = aws_sdk_s3::Client::from_conf(s3_config.build());

    // Create shared resources
    let store = Arc::new(S3BlobStore::new(
        s3,
        config.storage.bucket.clone(),
        config.storage.public_base(),
    ));
    let engine = Arc::new(ChromiumEngine::new(config.engine.clone()));
    let processor = Arc::new(JobProcessor::new(
        Renderer::new(engine),
        Uploader::new(store),
        config.queue.name.clone(),
    ));
    let semaphore = Arc::new(Semaphore::new(config.concurrency));

    // Spawn worker tasks
    let mut handles = vec![];
    for worker_id in 0..config.concurrency {
        let conn = conn.clone();
        let queue_config = config.queue.clone();
        let semaphore = semaphore.clone();
        let processor = processor.clone();

        let handle = tokio::spawn(async move {
            worker_loop(worker_id, conn, queue_config, semaphore, processor).await
        });
        handles.push(handle);
    }

    // Wait for shutdown signal
    info!("Worker service ready, press Ctrl+C to shutdown");
    signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("Received shutdown signal, waiting for workers to finish...");

    for handle in handles {
        let _ = handle.await;
    }

    info!("Worker service shutdown complete");
    Ok(())
}

/// Main worker loop that processes jobs from the queue.
///
/// Runs indefinitely until the process is terminated. A semaphore bounds
/// concurrent job processing across all loops.
async fn worker_loop(
    worker_id: usize,
    conn: ConnectionManager,
    queue_config: QueueConfig,
    semaphore: Arc<Semaphore>,
    processor: Arc<JobProcessor>,
) {
    let mut queue = RenderQueue::new(conn.clone(), queue_config.clone());

    info!("Worker {} started", worker_id);

    loop {
        // Dequeue next job (blocks with timeout)
        let job = match queue.dequeue().await {
            Ok(Some(job)) => job,
            Ok(None) => {
                // Timeout, no job available
                continue;
            }
            Err(e) => {
                error!("Worker {} failed to dequeue job: {}", worker_id, e);
                tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                continue;
            }
        };

        // Acquire semaphore permit
        let permit = semaphore.clone().acquire_owned().await.unwrap();

        // Spawn job processing task
        let mut job_queue = RenderQueue::new(conn.clone(), queue_config.clone());
        let processor = processor.clone();

        tokio::spawn(async move {
            process_job(job, &mut job_queue, &processor).await;
            drop(permit); // Release semaphore
        });

        // Record heartbeat every 10 jobs
        if let Ok(queue_len) = queue.queue_length().await {
            if queue_len % 10 == 0 {
                telemetry::record_worker_heartbeat(queue_len);
            }
        }
    }
}

/// Processes a single render job.
///
/// Handles the complete job lifecycle: mark processing, run the pipeline,
/// persist the result or hand the failure to the queue's retry policy, and
/// record telemetry.
async fn process_job(mut job: RenderJob, queue: &mut RenderQueue, processor: &JobProcessor) {
    // Mark as processing
    job.start_processing();
    if let Err(e) = queue.update_status(&job).await {
        error!("Failed to update job status: {}", e);
    }

    match processor.process(&job).await {
        Ok(result) => {
            if let Err(e) = queue.store_result(&job.id, &result).await {
                error!("Failed to store job result: {}", e);
            }

            job.mark_complete();
            if let Err(e) = queue.update_status(&job).await {
                error!("Failed to update job status: {}", e);
            }

            info!(
                "Job completed: job_id={}, duration_ms={:?}",
                job.id,
                job.processing_duration_ms()
            );
        }
        Err(e) => {
            let error_msg = format!("{:#}", e);
            job.mark_failed(error_msg.clone());

            // Hand the failed attempt to the queue's retry policy
            match queue.retry_job(job.clone(), error_msg).await {
                Ok(true) => {
                    info!(
                        "Job re-queued for retry: job_id={}, attempts_made={}",
                        job.id,
                        job.attempts_made + 1
                    );
                }
                Ok(false) => {
                    warn!(
                        "Job failed permanently: job_id={}, max attempts exceeded",
                        job.id
                    );
                }
                Err(e) => {
                    error!("Failed to retry job: {}", e);
                }
            }
        }
    }

    // Record telemetry
    telemetry::record_job_telemetry(&job);
}
