//! Job models and state management for the render queue.
//!
//! The wire schema is shared with the job producer (the API tier) and must
//! stay stable: camelCase field names, `documentType` selecting the render
//! path, and `metaData` present in the result only when the job carried it.

use crate::options::{ImageOptions, PdfOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Render path selected by the job, with the matching option shape.
///
/// Internally tagged on `documentType` so dispatch is exhaustive and a job
/// can never carry options that do not match its kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "documentType", rename_all = "lowercase")]
pub enum DocumentPayload {
    Pdf {
        #[serde(
            rename = "pdfOptions",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        options: Option<PdfOptions>,
    },
    Image {
        #[serde(
            rename = "imageOptions",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        options: Option<ImageOptions>,
    },
}

impl DocumentPayload {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentPayload::Pdf { .. } => DocumentKind::Pdf,
            DocumentPayload::Image { .. } => DocumentKind::Image,
        }
    }
}

/// Document kind without the attached options, used where only the
/// pdf/image distinction matters (upload content-type, logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Pdf => write!(f, "pdf"),
            DocumentKind::Image => write!(f, "image"),
        }
    }
}

/// Render job request delivered by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(flatten)]
    pub document: DocumentPayload,
    #[serde(rename = "htmlContent")]
    pub html_content: String,
    #[serde(rename = "storageKey")]
    pub storage_key: String,
    /// Opaque producer metadata, round-tripped verbatim into the result.
    #[serde(
        rename = "metaData",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub meta_data: Option<serde_json::Value>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(rename = "attemptsMade", default)]
    pub attempts_made: u32,
    #[serde(rename = "createdAt", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result persisted by the queue after a successful render and upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub url: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "completedAt")]
    pub completed_at: DateTime<Utc>,
    /// Present iff the job carried metadata; the key is omitted entirely
    /// otherwise, never serialized as null.
    #[serde(
        rename = "metaData",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub meta_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Complete,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl RenderJob {
    pub fn new(
        user_id: String,
        document: DocumentPayload,
        html_content: String,
        storage_key: String,
        meta_data: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            document,
            html_content,
            storage_key,
            meta_data,
            status: JobStatus::Queued,
            attempts_made: 0,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    pub fn start_processing(&mut self) {
        self.status = JobStatus::Processing;
        self.updated_at = Utc::now();
    }

    pub fn mark_complete(&mut self) {
        self.status = JobStatus::Complete;
        self.updated_at = Utc::now();
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.updated_at = Utc::now();
        self.error = Some(error);
    }

    pub fn processing_duration_ms(&self) -> Option<i64> {
        if self.status == JobStatus::Complete || self.status == JobStatus::Failed {
            Some(
                self.updated_at
                    .signed_duration_since(self.created_at)
                    .num_milliseconds(),
            )
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_pdf_job_payload() {
        let payload = json!({
            "id": "job-1",
            "userId": "user-9",
            "documentType": "pdf",
            "htmlContent": "<html><body>hi</body></html>",
            "storageKey": "invoices/inv-1.pdf",
            "pdfOptions": { "landscape": true },
            "metaData": { "invoiceId": "INV-1" }
        });

        let job: RenderJob = serde_json::from_value(payload).unwrap();
        assert_eq!(job.user_id, "user-9");
        assert_eq!(job.document.kind(), DocumentKind::Pdf);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.attempts_made, 0);
        match &job.document {
            DocumentPayload::Pdf { options } => {
                assert_eq!(options.as_ref().unwrap().landscape, Some(true));
            }
            other => panic!("expected pdf payload, got {other:?}"),
        }
    }

    #[test]
    fn parses_image_job_without_options() {
        let payload = json!({
            "id": "job-2",
            "userId": "user-9",
            "documentType": "image",
            "htmlContent": "<p>snapshot</p>",
            "storageKey": "shots/s-2.png"
        });

        let job: RenderJob = serde_json::from_value(payload).unwrap();
        match &job.document {
            DocumentPayload::Image { options } => assert!(options.is_none()),
            other => panic!("expected image payload, got {other:?}"),
        }
        assert!(job.meta_data.is_none());
    }

    #[test]
    fn rejects_unknown_document_type() {
        let payload = json!({
            "id": "job-3",
            "userId": "u",
            "documentType": "docx",
            "htmlContent": "<p/>",
            "storageKey": "k"
        });
        assert!(serde_json::from_value::<RenderJob>(payload).is_err());
    }

    #[test]
    fn result_omits_absent_metadata_key() {
        let result = JobResult {
            url: "https://cdn.example.com/k".to_string(),
            user_id: "user-9".to_string(),
            completed_at: Utc::now(),
            meta_data: None,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("metaData").is_none());
        assert!(value.get("url").is_some());
    }

    #[test]
    fn result_round_trips_metadata_verbatim() {
        let meta = json!({ "invoiceId": "INV-1", "nested": { "n": 1 } });
        let result = JobResult {
            url: "https://cdn.example.com/k".to_string(),
            user_id: "user-9".to_string(),
            completed_at: Utc::now(),
            meta_data: Some(meta.clone()),
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["metaData"], meta);
    }

    #[test]
    fn completed_at_serializes_as_rfc3339() {
        let result = JobResult {
            url: "u".to_string(),
            user_id: "x".to_string(),
            completed_at: Utc::now(),
            meta_data: None,
        };

        let value = serde_json::to_value(&result).unwrap();
        let raw = value["completedAt"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(raw).is_ok());
    }

    #[test]
    fn job_state_transitions() {
        let mut job = RenderJob::new(
            "user-1".to_string(),
            DocumentPayload::Pdf { options: None },
            "<p/>".to_string(),
            "out/a.pdf".to_string(),
            None,
        );

        job.start_processing();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.processing_duration_ms().is_none());

        job.mark_complete();
        assert_eq!(job.status, JobStatus::Complete);
        assert!(job.processing_duration_ms().is_some());

        job.mark_failed("engine crashed".to_string());
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("engine crashed"));
    }
}
