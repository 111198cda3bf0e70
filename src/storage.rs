//! Blob store boundary and the upload adapter.

use crate::error::StorageError;
use crate::job::DocumentKind;
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;
use tracing::debug;

/// Object store consumed by the pipeline. Upload failures propagate
/// opaquely; there is no retry at this layer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores the bytes under `key` and returns the public URL.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;
}

/// S3-backed blob store. The public URL is derived deterministically from
/// the configured base and the object key; no extra round trip is needed.
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    public_base: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: String, public_base: String) -> Self {
        Self {
            client,
            bucket,
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|err| StorageError::Put {
                key: key.to_string(),
                message: format!("{}", DisplayErrorContext(&err)),
            })?;

        debug!(bucket = %self.bucket, key, "object stored");
        Ok(join_url(&self.public_base, key))
    }
}

fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base, key.trim_start_matches('/'))
}

/// Thin call-through to the blob store that owns the content-type rule.
pub struct Uploader {
    store: Arc<dyn BlobStore>,
}

impl Uploader {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Image uploads are always tagged `image/png` regardless of the
    /// requested capture format; existing producers depend on this.
    pub fn content_type(kind: DocumentKind) -> &'static str {
        match kind {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Image => "image/png",
        }
    }

    pub async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        kind: DocumentKind,
    ) -> Result<String, StorageError> {
        self.store.put(key, bytes, Self::content_type(kind)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn content_type_follows_document_kind() {
        assert_eq!(Uploader::content_type(DocumentKind::Pdf), "application/pdf");
        assert_eq!(Uploader::content_type(DocumentKind::Image), "image/png");
    }

    #[test]
    fn url_join_is_deterministic() {
        assert_eq!(
            join_url("https://cdn.example.com", "a/b.pdf"),
            "https://cdn.example.com/a/b.pdf"
        );
        assert_eq!(
            join_url("https://cdn.example.com", "/a/b.pdf"),
            "https://cdn.example.com/a/b.pdf"
        );
    }

    #[tokio::test]
    async fn upload_passes_derived_content_type_to_store() {
        let mut store = MockBlobStore::new();
        store
            .expect_put()
            .withf(|key, bytes, content_type| {
                key == "out/report.pdf"
                    && bytes.as_slice() == b"%PDF-".as_slice()
                    && content_type == "application/pdf"
            })
            .times(1)
            .returning(|key, _, _| Ok(format!("https://cdn.example.com/{key}")));

        let uploader = Uploader::new(Arc::new(store));
        let url = uploader
            .upload("out/report.pdf", b"%PDF-".to_vec(), DocumentKind::Pdf)
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/out/report.pdf");
    }

    #[tokio::test]
    async fn store_failure_propagates_unchanged() {
        let mut store = MockBlobStore::new();
        store.expect_put().times(1).returning(|key, _, _| {
            Err(StorageError::Put {
                key: key.to_string(),
                message: "access denied".to_string(),
            })
        });

        let uploader = Uploader::new(Arc::new(store));
        let err = uploader
            .upload("k", vec![1], DocumentKind::Image)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("access denied"));
    }
}
