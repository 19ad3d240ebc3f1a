use thiserror::Error;

/// Typed failure taxonomy for the inbound processing pipeline.
///
/// Every variant maps to one failure class the router can report as a
/// processing outcome; none of them is allowed to escape past the router.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Structural defect in the inbound delivery (missing media id, MIME
    /// type, coordinates, ...). Not retryable.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// MIME type outside the supported registry table. Not retryable
    /// without a code change.
    #[error("unsupported MIME type: {0}")]
    UnsupportedMimeType(String),

    /// The metadata call exchanging a media id for a download URL failed.
    /// Carries the upstream HTTP status when one was received (expired
    /// tokens and garbage-collected media ids surface here).
    #[error("media URL resolution failed{}: {detail}", fmt_status(.status))]
    MediaUrlResolutionFailed { status: Option<u16>, detail: String },

    /// The binary fetch failed: non-success response, empty body, or a
    /// length mismatch against the platform-declared size.
    #[error("media download failed{}: {detail}", fmt_status(.status))]
    MediaDownloadFailed { status: Option<u16>, detail: String },

    /// Local filesystem write failed. Fatal for the current message only.
    #[error("storage write failed: {0}")]
    StorageWriteFailed(#[from] std::io::Error),

    /// Message kind the pipeline does not understand. Modeled as a failure
    /// outcome so the webhook boundary can still acknowledge the delivery.
    #[error("unrecognized message kind: {0}")]
    UnrecognizedMessageKind(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (upstream status {code})"),
        None => String::new(),
    }
}

impl ProcessingError {
    /// Short stable label for logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "malformed_payload",
            Self::UnsupportedMimeType(_) => "unsupported_mime_type",
            Self::MediaUrlResolutionFailed { .. } => "media_url_resolution_failed",
            Self::MediaDownloadFailed { .. } => "media_download_failed",
            Self::StorageWriteFailed(_) => "storage_write_failed",
            Self::UnrecognizedMessageKind(_) => "unrecognized_message_kind",
        }
    }

    /// Whether a caller-side retry could plausibly succeed without a code
    /// or payload change. The pipeline itself never retries the binary
    /// fetch; see `MediaAcquirer` for the one sanctioned retry knob.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::MediaUrlResolutionFailed { .. } | Self::MediaDownloadFailed { .. }
        )
    }
}
