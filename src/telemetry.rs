//! Telemetry and structured logging for the render worker.

use crate::job::{JobStatus, RenderJob};
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::{global, KeyValue};
use tracing::{info, warn};

/// Renders involving a full browser launch are expected to stay under this.
const SLOW_JOB_THRESHOLD_MS: i64 = 30_000;

/// Records telemetry for a completed or failed job: duration, outcome,
/// attempt count and error message where present.
pub fn record_job_telemetry(job: &RenderJob) {
    let tracer = global::tracer("render-worker");
    let mut span = tracer.start("render_job");

    span.set_attribute(KeyValue::new("job_id", job.id.clone()));
    span.set_attribute(KeyValue::new(
        "document_type",
        job.document.kind().to_string(),
    ));
    span.set_attribute(KeyValue::new("status", job.status.to_string()));
    span.set_attribute(KeyValue::new("attempts_made", job.attempts_made as i64));

    if let Some(duration_ms) = job.processing_duration_ms() {
        span.set_attribute(KeyValue::new("duration_ms", duration_ms));

        info!(
            job_id = %job.id,
            document_type = %job.document.kind(),
            duration_ms = duration_ms,
            status = %job.status,
            "render job finished"
        );

        if duration_ms > SLOW_JOB_THRESHOLD_MS {
            warn!(
                job_id = %job.id,
                duration_ms = duration_ms,
                "render job exceeded performance threshold"
            );
        }
    }

    if job.status == JobStatus::Failed {
        if let Some(ref error) = job.error {
            span.set_attribute(KeyValue::new("error", error.clone()));
            warn!(
                job_id = %job.id,
                error = %error,
                attempts_made = job.attempts_made,
                "render job failed"
            );
        }
    }

    span.end();
}

/// Records a worker heartbeat for monitoring worker health.
pub fn record_worker_heartbeat(queue_length: usize) {
    let tracer = global::tracer("render-worker");
    let mut span = tracer.start("worker_heartbeat");
    span.set_attribute(KeyValue::new("queue_length", queue_length as i64));
    span.end();

    info!(queue_length = queue_length, "Worker heartbeat");
}

/// Initializes OpenTelemetry with an OTLP exporter.
///
/// Reads `OTEL_EXPORTER_OTLP_ENDPOINT` (default http://localhost:4317) and
/// `OTEL_SERVICE_NAME` (default render-worker). Call once at startup.
pub fn init_telemetry() -> Result<(), Box<dyn std::error::Error>> {
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::Config;

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());
    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "render-worker".to_string());

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(&endpoint),
        )
        .with_trace_config(Config::default().with_resource(
            opentelemetry_sdk::Resource::new(vec![
                KeyValue::new("service.name", service_name),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ]),
        ))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    global::set_tracer_provider(tracer.provider().unwrap());

    info!("Telemetry initialized: endpoint={}", endpoint);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::DocumentPayload;

    fn test_job() -> RenderJob {
        RenderJob::new(
            "user-1".to_string(),
            DocumentPayload::Pdf { options: None },
            "<p/>".to_string(),
            "out/t.pdf".to_string(),
            None,
        )
    }

    #[test]
    fn records_completed_job() {
        let mut job = test_job();
        job.mark_complete();

        // Should not panic without an initialized exporter.
        record_job_telemetry(&job);
    }

    #[test]
    fn records_failed_job() {
        let mut job = test_job();
        job.mark_failed("engine crashed".to_string());

        record_job_telemetry(&job);
    }
}
