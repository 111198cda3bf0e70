//! Job pipeline orchestration: render, upload, assemble the result.
//!
//! The processor performs no retries and swallows no errors: a failure from
//! the render or upload step is logged with job context and re-raised
//! unchanged, which is what drives the queue's retry and failure handling.

use crate::job::{DocumentPayload, JobResult, RenderJob};
use crate::renderer::Renderer;
use crate::storage::Uploader;
use anyhow::Result;
use chrono::Utc;
use tracing::{error, info};

pub struct JobProcessor {
    renderer: Renderer,
    uploader: Uploader,
    queue_name: String,
}

impl JobProcessor {
    pub fn new(renderer: Renderer, uploader: Uploader, queue_name: String) -> Self {
        Self {
            renderer,
            uploader,
            queue_name,
        }
    }

    /// Processes one job to a terminal outcome: a [`JobResult`] after a
    /// successful upload, or the original render/upload error.
    pub async fn process(&self, job: &RenderJob) -> Result<JobResult> {
        info!(
            job_id = %job.id,
            queue = %self.queue_name,
            document_type = %job.document.kind(),
            storage_key = %job.storage_key,
            user_id = %job.user_id,
            "processing render job"
        );

        match self.run(job).await {
            Ok(result) => {
                info!(job_id = %job.id, url = %result.url, "render job completed");
                Ok(result)
            }
            Err(err) => {
                error!(
                    job_id = %job.id,
                    queue = %self.queue_name,
                    error = format!("{err:#}"),
                    "render job failed"
                );
                Err(err)
            }
        }
    }

    async fn run(&self, job: &RenderJob) -> Result<JobResult> {
        let bytes = match &job.document {
            DocumentPayload::Pdf { options } => {
                self.renderer
                    .render_pdf(&job.html_content, options.as_ref())
                    .await?
            }
            DocumentPayload::Image { options } => {
                self.renderer
                    .render_image(&job.html_content, options.as_ref())
                    .await?
            }
        };
        info!(job_id = %job.id, bytes = bytes.len(), "render complete");

        let url = self
            .uploader
            .upload(&job.storage_key, bytes, job.document.kind())
            .await?;

        Ok(JobResult {
            url,
            user_id: job.user_id.clone(),
            completed_at: Utc::now(),
            meta_data: job.meta_data.clone(),
        })
    }
}
