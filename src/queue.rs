//! Redis-based job queue for render tasks.
//!
//! Jobs are stored as JSON in a Redis list, with separate status and result
//! keys for client polling. Failed attempts are parked in a delayed sorted
//! set scored by their ready time and promoted back onto the list once the
//! exponential backoff has elapsed. Completed and failed records are kept
//! for 24 hours.

use crate::job::{JobResult, JobStatus, RenderJob};
use anyhow::{Context, Result};
use chrono::Utc;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::time::Duration;
use tracing::{debug, error, info};

/// Record TTL in seconds (24 hours).
const JOB_TTL_SECONDS: u64 = 86400;

/// How many delayed jobs are promoted per dequeue pass.
const PROMOTE_BATCH: isize = 16;

/// Retry and naming policy for one queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Key prefix, e.g. `docgen:render`.
    pub name: String,
    /// Total attempts per job, first run included.
    pub max_attempts: u32,
    /// Base delay for exponential backoff.
    pub backoff_base: Duration,
}

/// Redis-backed queue manager.
pub struct RenderQueue {
    pub conn: ConnectionManager,
    config: QueueConfig,
}

/// Backoff before attempt `attempts_made + 1`: `base * 2^(attempts_made-1)`.
pub fn backoff_delay(base: Duration, attempts_made: u32) -> Duration {
    let exponent = attempts_made.saturating_sub(1).min(16);
    base.saturating_mul(2u32.saturating_pow(exponent))
}

impl RenderQueue {
    pub fn new(conn: ConnectionManager, config: QueueConfig) -> Self {
        Self { conn, config }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn queue_key(&self) -> String {
        format!("{}:queue", self.config.name)
    }

    fn delayed_key(&self) -> String {
        format!("{}:delayed", self.config.name)
    }

    fn status_key(&self, job_id: &str) -> String {
        format!("{}:status:{}", self.config.name, job_id)
    }

    fn result_key(&self, job_id: &str) -> String {
        format!("{}:result:{}", self.config.name, job_id)
    }

    /// Enqueues a new render job and creates its status record.
    pub async fn enqueue(&mut self, job: &RenderJob) -> Result<()> {
        let job_json = serde_json::to_string(job).context("Failed to serialize job")?;

        // RPUSH for FIFO order.
        self.conn
            .rpush::<_, _, ()>(self.queue_key(), &job_json)
            .await
            .context("Failed to push job to queue")?;

        self.conn
            .set_ex::<_, _, ()>(self.status_key(&job.id), &job_json, JOB_TTL_SECONDS)
            .await
            .context("Failed to set job status")?;

        info!(
            job_id = %job.id,
            queue = %self.config.name,
            document_type = %job.document.kind(),
            "enqueued render job"
        );
        Ok(())
    }

    /// Dequeues the next ready job, blocking up to five seconds. Due
    /// delayed jobs are promoted onto the ready list first.
    pub async fn dequeue(&mut self) -> Result<Option<RenderJob>> {
        self.promote_due_jobs().await?;

        let result: Option<(String, String)> = self
            .conn
            .blpop(self.queue_key(), 5.0)
            .await
            .context("Failed to pop job from queue")?;

        match result {
            Some((_key, job_json)) => {
                let job: RenderJob =
                    serde_json::from_str(&job_json).context("Failed to deserialize job")?;
                debug!(job_id = %job.id, "dequeued job");
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    async fn promote_due_jobs(&mut self) -> Result<()> {
        let now_ms = Utc::now().timestamp_millis();
        let due: Vec<String> = self
            .conn
            .zrangebyscore_limit(self.delayed_key(), "-inf", now_ms, 0, PROMOTE_BATCH)
            .await
            .context("Failed to read delayed jobs")?;

        for job_json in due {
            let removed: i64 = self
                .conn
                .zrem(self.delayed_key(), &job_json)
                .await
                .context("Failed to remove delayed job")?;
            // Another worker may have promoted it concurrently.
            if removed == 0 {
                continue;
            }
            self.conn
                .rpush::<_, _, ()>(self.queue_key(), &job_json)
                .await
                .context("Failed to promote delayed job")?;
            debug!(queue = %self.config.name, "promoted delayed job");
        }
        Ok(())
    }

    /// Writes the job's current state to its status key.
    pub async fn update_status(&mut self, job: &RenderJob) -> Result<()> {
        let job_json = serde_json::to_string(job).context("Failed to serialize job status")?;
        self.conn
            .set_ex::<_, _, ()>(self.status_key(&job.id), &job_json, JOB_TTL_SECONDS)
            .await
            .context("Failed to update job status")?;

        debug!(job_id = %job.id, status = %job.status, "updated job status");
        Ok(())
    }

    /// Reads a job's status record, if still retained.
    pub async fn get_status(&mut self, job_id: &str) -> Result<Option<RenderJob>> {
        let job_json: Option<String> = self
            .conn
            .get(self.status_key(job_id))
            .await
            .context("Failed to get job status")?;

        match job_json {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("Failed to deserialize job status")?,
            )),
            None => Ok(None),
        }
    }

    /// Persists the result of a completed job for producer inspection.
    pub async fn store_result(&mut self, job_id: &str, result: &JobResult) -> Result<()> {
        let result_json = serde_json::to_string(result).context("Failed to serialize result")?;
        self.conn
            .set_ex::<_, _, ()>(self.result_key(job_id), &result_json, JOB_TTL_SECONDS)
            .await
            .context("Failed to store job result")?;
        Ok(())
    }

    /// Reads a completed job's result, if still retained.
    pub async fn get_result(&mut self, job_id: &str) -> Result<Option<JobResult>> {
        let result_json: Option<String> = self
            .conn
            .get(self.result_key(job_id))
            .await
            .context("Failed to get job result")?;

        match result_json {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("Failed to deserialize job result")?,
            )),
            None => Ok(None),
        }
    }

    /// Schedules a retry for a failed attempt, or marks the job failed
    /// once its attempt budget is exhausted.
    ///
    /// Returns `Ok(true)` when a retry was scheduled.
    pub async fn retry_job(&mut self, mut job: RenderJob, error_msg: String) -> Result<bool> {
        job.attempts_made += 1;

        if job.attempts_made < self.config.max_attempts {
            job.status = JobStatus::Queued;
            job.error = Some(error_msg);
            job.updated_at = Utc::now();

            let delay = backoff_delay(self.config.backoff_base, job.attempts_made);
            let ready_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;
            let job_json = serde_json::to_string(&job).context("Failed to serialize job")?;

            self.conn
                .zadd::<_, _, _, ()>(self.delayed_key(), &job_json, ready_at)
                .await
                .context("Failed to schedule retry")?;
            self.update_status(&job).await?;

            info!(
                job_id = %job.id,
                attempts_made = job.attempts_made,
                delay_ms = delay.as_millis() as u64,
                "scheduled job retry"
            );
            Ok(true)
        } else {
            job.mark_failed(error_msg);
            self.update_status(&job).await?;
            error!(
                job_id = %job.id,
                attempts_made = job.attempts_made,
                error = ?job.error,
                "job failed after max attempts"
            );
            Ok(false)
        }
    }

    /// Returns the number of ready jobs.
    pub async fn queue_length(&mut self) -> Result<usize> {
        let len: usize = self
            .conn
            .llen(self.queue_key())
            .await
            .context("Failed to get queue length")?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::DocumentPayload;
    use pretty_assertions::assert_eq;

    fn test_config() -> QueueConfig {
        QueueConfig {
            name: "docgen:render:test".to_string(),
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
        }
    }

    fn test_job() -> RenderJob {
        RenderJob::new(
            "user-1".to_string(),
            DocumentPayload::Pdf { options: None },
            "<p/>".to_string(),
            "out/q.pdf".to_string(),
            None,
        )
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 4), Duration::from_millis(4000));
    }

    #[test]
    fn backoff_is_capped_instead_of_overflowing() {
        let base = Duration::from_secs(1);
        assert!(backoff_delay(base, 200) >= backoff_delay(base, 100));
    }

    // The following tests require a running Redis instance.
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore]
    async fn enqueue_dequeue_round_trip() {
        let client = redis::Client::open("redis://127.0.0.1/").unwrap();
        let conn = ConnectionManager::new(client).await.unwrap();
        let mut queue = RenderQueue::new(conn, test_config());

        let job = test_job();
        queue.enqueue(&job).await.unwrap();

        let dequeued = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(dequeued.id, job.id);
        assert_eq!(dequeued.status, JobStatus::Queued);
    }

    #[tokio::test]
    #[ignore]
    async fn status_tracking() {
        let client = redis::Client::open("redis://127.0.0.1/").unwrap();
        let conn = ConnectionManager::new(client).await.unwrap();
        let mut queue = RenderQueue::new(conn, test_config());

        let mut job = test_job();
        queue.enqueue(&job).await.unwrap();

        let status = queue.get_status(&job.id).await.unwrap().unwrap();
        assert_eq!(status.status, JobStatus::Queued);

        job.start_processing();
        queue.update_status(&job).await.unwrap();

        let updated = queue.get_status(&job.id).await.unwrap().unwrap();
        assert_eq!(updated.status, JobStatus::Processing);
    }

    #[tokio::test]
    #[ignore]
    async fn retry_exhausts_attempt_budget() {
        let client = redis::Client::open("redis://127.0.0.1/").unwrap();
        let conn = ConnectionManager::new(client).await.unwrap();
        let mut queue = RenderQueue::new(conn, test_config());

        let mut job = test_job();
        queue.enqueue(&job).await.unwrap();

        // Attempts 1 and 2 reschedule, attempt 3 is terminal.
        assert!(queue
            .retry_job(job.clone(), "boom".to_string())
            .await
            .unwrap());
        job.attempts_made = 1;
        assert!(queue
            .retry_job(job.clone(), "boom".to_string())
            .await
            .unwrap());
        job.attempts_made = 2;
        assert!(!queue.retry_job(job.clone(), "boom".to_string()).await.unwrap());

        let status = queue.get_status(&job.id).await.unwrap().unwrap();
        assert_eq!(status.status, JobStatus::Failed);
        assert_eq!(status.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    #[ignore]
    async fn stores_and_reads_result() {
        let client = redis::Client::open("redis://127.0.0.1/").unwrap();
        let conn = ConnectionManager::new(client).await.unwrap();
        let mut queue = RenderQueue::new(conn, test_config());

        let job = test_job();
        let result = JobResult {
            url: "https://cdn.example.com/out/q.pdf".to_string(),
            user_id: job.user_id.clone(),
            completed_at: Utc::now(),
            meta_data: None,
        };
        queue.store_result(&job.id, &result).await.unwrap();

        let read = queue.get_result(&job.id).await.unwrap().unwrap();
        assert_eq!(read.url, result.url);
        assert_eq!(read.user_id, "user-1");
    }
}
