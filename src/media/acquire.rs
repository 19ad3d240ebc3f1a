use std::sync::Arc;

use crate::error::ProcessingError;
use crate::media::traits::{AcquiredMedia, MediaDescriptor, MediaTransport};

/// Two-hop media acquisition: resolve the short-lived download URL, then
/// fetch the bytes. Strictly sequential per descriptor; the binary fetch is
/// never attempted when resolution fails.
pub struct MediaAcquirer {
    transport: Arc<dyn MediaTransport>,
    /// Extra attempts for the metadata hop only. The download URL may be
    /// single-use, so hop 2 is never retried here; callers own any backoff.
    metadata_retries: u32,
}

impl MediaAcquirer {
    pub fn new(transport: Arc<dyn MediaTransport>, metadata_retries: u32) -> Self {
        Self {
            transport,
            metadata_retries,
        }
    }

    pub async fn acquire(
        &self,
        descriptor: &MediaDescriptor,
    ) -> Result<AcquiredMedia, ProcessingError> {
        let resolved = self.resolve_with_retries(&descriptor.media_id).await?;

        let body = self.transport.fetch_binary(&resolved.url).await?;

        if body.data.is_empty() {
            return Err(ProcessingError::MediaDownloadFailed {
                status: None,
                detail: "response body was empty".to_string(),
            });
        }

        let expected = resolved.size_bytes.or(descriptor.declared_size);
        if let Some(expected) = expected {
            let actual = body.data.len() as u64;
            if expected != actual {
                return Err(ProcessingError::MediaDownloadFailed {
                    status: None,
                    detail: format!(
                        "content length mismatch: platform declared {expected} bytes, received {actual}"
                    ),
                });
            }
        }

        // The platform-confirmed MIME type wins over whatever the webhook
        // payload declared; extension resolution downstream must never see
        // the declared type.
        let mime_type = resolved
            .mime_type
            .or(body.content_type)
            .unwrap_or_else(|| descriptor.mime_type.clone());

        Ok(AcquiredMedia {
            size_bytes: body.data.len() as u64,
            data: body.data,
            mime_type,
        })
    }

    async fn resolve_with_retries(
        &self,
        media_id: &str,
    ) -> Result<crate::media::traits::ResolvedDownload, ProcessingError> {
        let mut attempt = 0;
        loop {
            match self.transport.resolve_download(media_id).await {
                Ok(resolved) => return Ok(resolved),
                Err(err @ ProcessingError::MediaUrlResolutionFailed { .. })
                    if attempt < self.metadata_retries =>
                {
                    attempt += 1;
                    tracing::warn!(
                        media_id,
                        attempt,
                        error = %err,
                        "media URL resolution failed, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::registry::Category;
    use crate::media::traits::{FetchedBody, ResolvedDownload};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockTransport {
        resolve_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
        resolve_result: Box<dyn Fn(usize) -> Result<ResolvedDownload, ProcessingError> + Send + Sync>,
        fetch_result: Box<dyn Fn() -> Result<FetchedBody, ProcessingError> + Send + Sync>,
    }

    impl MockTransport {
        fn ok(data: Vec<u8>, mime: Option<&str>, size: Option<u64>) -> Self {
            let mime = mime.map(ToString::to_string);
            Self {
                resolve_calls: AtomicUsize::new(0),
                fetch_calls: AtomicUsize::new(0),
                resolve_result: Box::new(move |_| {
                    Ok(ResolvedDownload {
                        url: "https://cdn.example/blob".to_string(),
                        mime_type: mime.clone(),
                        size_bytes: size,
                    })
                }),
                fetch_result: Box::new(move || {
                    Ok(FetchedBody {
                        data: data.clone(),
                        content_type: None,
                    })
                }),
            }
        }
    }

    #[async_trait]
    impl MediaTransport for MockTransport {
        async fn resolve_download(
            &self,
            _media_id: &str,
        ) -> Result<ResolvedDownload, ProcessingError> {
            let n = self.resolve_calls.fetch_add(1, Ordering::SeqCst);
            (self.resolve_result)(n)
        }

        async fn fetch_binary(&self, _url: &str) -> Result<FetchedBody, ProcessingError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            (self.fetch_result)()
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn descriptor() -> MediaDescriptor {
        MediaDescriptor {
            media_id: "M1".to_string(),
            mime_type: "image/jpeg".to_string(),
            category: Category::Image,
            caption: None,
            declared_size: None,
        }
    }

    fn resolution_failure() -> ProcessingError {
        ProcessingError::MediaUrlResolutionFailed {
            status: Some(404),
            detail: "media id expired".to_string(),
        }
    }

    #[tokio::test]
    async fn successful_acquisition_returns_bytes_and_resolved_mime() {
        let transport = Arc::new(MockTransport::ok(
            vec![7u8; 1024],
            Some("image/jpeg"),
            Some(1024),
        ));
        let acquirer = MediaAcquirer::new(transport.clone(), 0);

        let media = acquirer.acquire(&descriptor()).await.unwrap();
        assert_eq!(media.size_bytes, 1024);
        assert_eq!(media.data.len(), 1024);
        assert_eq!(media.mime_type, "image/jpeg");
        assert_eq!(transport.resolve_calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolution_failure_prevents_binary_fetch() {
        let mut transport = MockTransport::ok(vec![1], None, None);
        transport.resolve_result = Box::new(|_| Err(resolution_failure()));
        let transport = Arc::new(transport);
        let acquirer = MediaAcquirer::new(transport.clone(), 0);

        let err = acquirer.acquire(&descriptor()).await.unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::MediaUrlResolutionFailed { .. }
        ));
        assert_eq!(transport.resolve_calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn platform_confirmed_mime_wins_over_declared() {
        // Descriptor says jpeg, platform metadata says png.
        let transport = Arc::new(MockTransport::ok(vec![1, 2, 3], Some("image/png"), None));
        let acquirer = MediaAcquirer::new(transport, 0);

        let media = acquirer.acquire(&descriptor()).await.unwrap();
        assert_eq!(media.mime_type, "image/png");
    }

    #[tokio::test]
    async fn content_type_fallback_when_metadata_omits_mime() {
        let mut transport = MockTransport::ok(vec![1, 2, 3], None, None);
        transport.fetch_result = Box::new(|| {
            Ok(FetchedBody {
                data: vec![1, 2, 3],
                content_type: Some("image/webp".to_string()),
            })
        });
        let acquirer = MediaAcquirer::new(Arc::new(transport), 0);

        let media = acquirer.acquire(&descriptor()).await.unwrap();
        assert_eq!(media.mime_type, "image/webp");
    }

    #[tokio::test]
    async fn size_mismatch_is_a_download_failure() {
        let transport = Arc::new(MockTransport::ok(vec![0u8; 10], None, Some(1024)));
        let acquirer = MediaAcquirer::new(transport, 0);

        let err = acquirer.acquire(&descriptor()).await.unwrap_err();
        match err {
            ProcessingError::MediaDownloadFailed { detail, .. } => {
                assert!(detail.contains("mismatch"), "{detail}");
            }
            other => panic!("expected MediaDownloadFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn declared_size_used_when_metadata_omits_one() {
        let transport = Arc::new(MockTransport::ok(vec![0u8; 10], None, None));
        let acquirer = MediaAcquirer::new(transport, 0);
        let mut d = descriptor();
        d.declared_size = Some(11);

        assert!(matches!(
            acquirer.acquire(&d).await.unwrap_err(),
            ProcessingError::MediaDownloadFailed { .. }
        ));
    }

    #[tokio::test]
    async fn empty_body_is_a_download_failure() {
        let transport = Arc::new(MockTransport::ok(Vec::new(), None, None));
        let acquirer = MediaAcquirer::new(transport, 0);

        assert!(matches!(
            acquirer.acquire(&descriptor()).await.unwrap_err(),
            ProcessingError::MediaDownloadFailed { .. }
        ));
    }

    #[tokio::test]
    async fn metadata_retries_apply_to_resolution_only() {
        let mut transport = MockTransport::ok(vec![5, 5], None, None);
        // First attempt fails, second succeeds.
        transport.resolve_result = Box::new(|attempt| {
            if attempt == 0 {
                Err(resolution_failure())
            } else {
                Ok(ResolvedDownload {
                    url: "https://cdn.example/blob".to_string(),
                    mime_type: None,
                    size_bytes: None,
                })
            }
        });
        let transport = Arc::new(transport);
        let acquirer = MediaAcquirer::new(transport.clone(), 1);

        let media = acquirer.acquire(&descriptor()).await.unwrap();
        assert_eq!(media.data, vec![5, 5]);
        assert_eq!(transport.resolve_calls.load(Ordering::SeqCst), 2);
        assert_eq!(transport.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_retries_by_default() {
        let mut transport = MockTransport::ok(vec![1], None, None);
        transport.resolve_result = Box::new(|_| Err(resolution_failure()));
        let transport = Arc::new(transport);
        let acquirer = MediaAcquirer::new(transport.clone(), 0);

        let _ = acquirer.acquire(&descriptor()).await.unwrap_err();
        assert_eq!(transport.resolve_calls.load(Ordering::SeqCst), 1);
    }
}
