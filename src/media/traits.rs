use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

use crate::error::ProcessingError;
use crate::media::registry::Category;

/// Normalized description of one inbound media attachment, derived from a
/// media-kind message before any network work.
#[derive(Debug, Clone)]
pub struct MediaDescriptor {
    /// Platform-assigned opaque media id. Never empty.
    pub media_id: String,
    /// MIME type declared in the webhook payload. Used for pre-network
    /// registry validation only; the acquired type wins for storage.
    pub mime_type: String,
    pub category: Category,
    pub caption: Option<String>,
    /// Platform-reported size. Not verified until the bytes arrive.
    pub declared_size: Option<u64>,
}

/// Short-lived download handle obtained by exchanging a media id (hop 1).
#[derive(Debug, Clone)]
pub struct ResolvedDownload {
    pub url: String,
    /// Platform-confirmed MIME type, when the metadata call returned one.
    pub mime_type: Option<String>,
    pub size_bytes: Option<u64>,
}

/// Raw response body from the binary fetch (hop 2).
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

/// Output of a completed acquisition. `size_bytes` always equals
/// `data.len()` and is never zero.
#[derive(Debug, Clone)]
pub struct AcquiredMedia {
    pub data: Vec<u8>,
    /// Resolved MIME type: platform-confirmed from hop 1, falling back to
    /// the response Content-Type, then the descriptor's declared type.
    pub mime_type: String,
    pub size_bytes: u64,
}

/// Record of one persisted media file. Created exactly once per successful
/// acquisition and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMediaRecord {
    pub path: PathBuf,
    pub filename: String,
    pub category: Category,
    pub mime_type: String,
    pub size_bytes: u64,
    pub stored_at: chrono::DateTime<chrono::Utc>,
}

/// The two authenticated hops against the platform's media API. Kept as a
/// seam so the pipeline can run against a mock transport in tests.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Exchange a media id for a short-lived download URL plus
    /// platform-confirmed metadata.
    async fn resolve_download(&self, media_id: &str)
        -> Result<ResolvedDownload, ProcessingError>;

    /// Fetch the binary content behind a resolved URL, fully buffered.
    async fn fetch_binary(&self, url: &str) -> Result<FetchedBody, ProcessingError>;

    fn name(&self) -> &str;
}

/// Persistence seam for acquired media.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn persist(
        &self,
        media: &AcquiredMedia,
        category: Category,
    ) -> Result<StoredMediaRecord, ProcessingError>;

    fn name(&self) -> &str;
}
