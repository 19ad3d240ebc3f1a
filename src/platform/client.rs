//! WhatsApp Cloud API (Graph) client.
//!
//! One client covers both directions: the authenticated media hops consumed
//! by the acquisition pipeline, and the send-side calls (text replies,
//! read receipts) used by the gateway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{AcquireConfig, WhatsAppConfig};
use crate::error::ProcessingError;
use crate::media::traits::{FetchedBody, MediaTransport, ResolvedDownload};

const DEFAULT_API_BASE: &str = "https://graph.facebook.com";

pub struct GraphClient {
    base_url: String,
    phone_number_id: String,
    access_token: String,
    metadata_timeout: Duration,
    download_timeout: Duration,
    max_download_bytes: u64,
    client: reqwest::Client,
}

/// Response of `GET /{version}/{media_id}`.
#[derive(Debug, Deserialize)]
struct MediaMetadataResponse {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    file_size: Option<u64>,
}

#[derive(Debug, Serialize)]
struct TextMessageRequest<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextContent<'a>,
}

#[derive(Debug, Serialize)]
struct TextContent<'a> {
    preview_url: bool,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct MarkReadRequest<'a> {
    messaging_product: &'static str,
    status: &'static str,
    message_id: &'a str,
}

impl GraphClient {
    pub fn new(whatsapp: &WhatsAppConfig, acquire: &AcquireConfig) -> Self {
        let base = whatsapp
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/');
        Self {
            base_url: format!("{base}/{}", whatsapp.api_version),
            phone_number_id: whatsapp.phone_number_id.clone(),
            access_token: whatsapp.access_token.clone(),
            metadata_timeout: Duration::from_secs(acquire.metadata_timeout_secs),
            download_timeout: Duration::from_secs(acquire.download_timeout_secs),
            max_download_bytes: acquire.max_download_bytes,
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.base_url, self.phone_number_id)
    }

    /// Send a plain text reply.
    pub async fn send_text(&self, to: &str, body: &str) -> anyhow::Result<()> {
        let request = TextMessageRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            kind: "text",
            text: TextContent {
                preview_url: false,
                body,
            },
        };

        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .timeout(self.metadata_timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("send message failed: {status} {body}");
        }
        Ok(())
    }

    /// Mark an inbound message as read. Best-effort; callers log failures
    /// and move on.
    pub async fn mark_read(&self, message_id: &str) -> anyhow::Result<()> {
        let request = MarkReadRequest {
            messaging_product: "whatsapp",
            status: "read",
            message_id,
        };

        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .timeout(self.metadata_timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("mark as read failed: {status} {body}");
        }
        Ok(())
    }
}

#[async_trait]
impl MediaTransport for GraphClient {
    async fn resolve_download(
        &self,
        media_id: &str,
    ) -> Result<ResolvedDownload, ProcessingError> {
        let url = format!("{}/{media_id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .timeout(self.metadata_timeout)
            .send()
            .await
            .map_err(|err| ProcessingError::MediaUrlResolutionFailed {
                status: None,
                detail: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProcessingError::MediaUrlResolutionFailed {
                status: Some(status.as_u16()),
                detail: body,
            });
        }

        let metadata: MediaMetadataResponse =
            response
                .json()
                .await
                .map_err(|err| ProcessingError::MediaUrlResolutionFailed {
                    status: None,
                    detail: format!("invalid metadata response: {err}"),
                })?;

        let url = metadata
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ProcessingError::MediaUrlResolutionFailed {
                status: None,
                detail: "metadata response carried no download URL".to_string(),
            })?;

        Ok(ResolvedDownload {
            url,
            mime_type: metadata.mime_type,
            size_bytes: metadata.file_size,
        })
    }

    async fn fetch_binary(&self, url: &str) -> Result<FetchedBody, ProcessingError> {
        // The download URL is transport-level unauthenticated but the
        // platform still requires the same bearer context.
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|err| ProcessingError::MediaDownloadFailed {
                status: None,
                detail: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProcessingError::MediaDownloadFailed {
                status: Some(status.as_u16()),
                detail: body,
            });
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_download_bytes {
                return Err(ProcessingError::MediaDownloadFailed {
                    status: None,
                    detail: format!(
                        "declared content length {declared} exceeds limit {}",
                        self.max_download_bytes
                    ),
                });
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        let data = response
            .bytes()
            .await
            .map_err(|err| ProcessingError::MediaDownloadFailed {
                status: None,
                detail: err.to_string(),
            })?
            .to_vec();

        if data.len() as u64 > self.max_download_bytes {
            return Err(ProcessingError::MediaDownloadFailed {
                status: None,
                detail: format!(
                    "body of {} bytes exceeds limit {}",
                    data.len(),
                    self.max_download_bytes
                ),
            });
        }

        Ok(FetchedBody { data, content_type })
    }

    fn name(&self) -> &str {
        "graph"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> GraphClient {
        let whatsapp = WhatsAppConfig {
            access_token: "token".to_string(),
            phone_number_id: "12345".to_string(),
            verify_token: "verify".to_string(),
            api_version: "v21.0".to_string(),
            api_base_url: None,
        };
        GraphClient::new(&whatsapp, &AcquireConfig::default())
    }

    #[test]
    fn messages_url_includes_version_and_phone_number_id() {
        let client = test_client();
        assert_eq!(
            client.messages_url(),
            "https://graph.facebook.com/v21.0/12345/messages"
        );
    }

    #[test]
    fn base_url_override_strips_trailing_slash() {
        let whatsapp = WhatsAppConfig {
            access_token: String::new(),
            phone_number_id: "12345".to_string(),
            verify_token: String::new(),
            api_version: "v21.0".to_string(),
            api_base_url: Some("http://127.0.0.1:9000/".to_string()),
        };
        let client = GraphClient::new(&whatsapp, &AcquireConfig::default());
        assert_eq!(client.base_url, "http://127.0.0.1:9000/v21.0");
    }

    #[test]
    fn text_message_request_matches_platform_shape() {
        let request = TextMessageRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: "15551234567",
            kind: "text",
            text: TextContent {
                preview_url: false,
                body: "hello",
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messaging_product"], "whatsapp");
        assert_eq!(value["type"], "text");
        assert_eq!(value["text"]["body"], "hello");
        assert_eq!(value["text"]["preview_url"], false);
    }

    #[test]
    fn mark_read_request_matches_platform_shape() {
        let request = MarkReadRequest {
            messaging_product: "whatsapp",
            status: "read",
            message_id: "wamid.1",
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["status"], "read");
        assert_eq!(value["message_id"], "wamid.1");
    }

    #[test]
    fn metadata_response_parses_platform_payload() {
        let metadata: MediaMetadataResponse = serde_json::from_str(
            r#"{"messaging_product": "whatsapp", "url": "https://cdn/blob",
                "mime_type": "image/jpeg", "sha256": "abc", "file_size": 1024,
                "id": "media123"}"#,
        )
        .unwrap();
        assert_eq!(metadata.url.as_deref(), Some("https://cdn/blob"));
        assert_eq!(metadata.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(metadata.file_size, Some(1024));
    }
}
