use crate::error::ProcessingError;
use crate::media::registry;
use crate::media::traits::MediaDescriptor;
use crate::message::{InboundMessage, MediaAttachment, MessagePayload};

/// Derive a media descriptor from an inbound message.
///
/// Returns `Ok(None)` for non-media kinds; that is a normal branch, not a
/// failure. For media kinds, a missing media id or MIME type is a
/// `MalformedPayload` defect, and a MIME type outside the registry is
/// rejected here so no network call is ever made for it.
pub fn extract(msg: &InboundMessage) -> Result<Option<MediaDescriptor>, ProcessingError> {
    let attachment = match &msg.payload {
        MessagePayload::Image { image } => image,
        MessagePayload::Audio { audio } => audio,
        MessagePayload::Video { video } => video,
        MessagePayload::Document { document } => document,
        _ => return Ok(None),
    };
    build_descriptor(msg.kind().as_str(), attachment).map(Some)
}

fn build_descriptor(
    kind: &str,
    attachment: &MediaAttachment,
) -> Result<MediaDescriptor, ProcessingError> {
    let media_id = attachment
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ProcessingError::MalformedPayload(format!("{kind} message is missing a media id"))
        })?;

    let mime_type = attachment
        .mime_type
        .as_deref()
        .map(str::trim)
        .filter(|mime| !mime.is_empty())
        .ok_or_else(|| {
            ProcessingError::MalformedPayload(format!("{kind} message is missing a MIME type"))
        })?;

    let (_, category) = registry::resolve(mime_type)?;

    Ok(MediaDescriptor {
        media_id: media_id.to_string(),
        mime_type: mime_type.to_string(),
        category,
        caption: attachment.caption.clone(),
        declared_size: attachment.file_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::registry::Category;
    use crate::message::TextBody;

    fn message(payload: MessagePayload) -> InboundMessage {
        InboundMessage {
            sender: "15551234567".to_string(),
            sender_name: None,
            message_id: Some("wamid.test".to_string()),
            payload,
        }
    }

    fn attachment(id: Option<&str>, mime: Option<&str>) -> MediaAttachment {
        MediaAttachment {
            id: id.map(ToString::to_string),
            mime_type: mime.map(ToString::to_string),
            ..MediaAttachment::default()
        }
    }

    #[test]
    fn non_media_kind_yields_none() {
        let msg = message(MessagePayload::Text {
            text: Some(TextBody {
                body: "hello".to_string(),
            }),
        });
        assert!(extract(&msg).unwrap().is_none());

        let msg = message(MessagePayload::Unknown);
        assert!(extract(&msg).unwrap().is_none());
    }

    #[test]
    fn image_yields_descriptor() {
        let mut att = attachment(Some("media123"), Some("image/jpeg"));
        att.caption = Some("holiday pic".to_string());
        att.file_size = Some(2048);
        let msg = message(MessagePayload::Image { image: att });

        let descriptor = extract(&msg).unwrap().expect("descriptor");
        assert_eq!(descriptor.media_id, "media123");
        assert_eq!(descriptor.mime_type, "image/jpeg");
        assert_eq!(descriptor.category, Category::Image);
        assert_eq!(descriptor.caption.as_deref(), Some("holiday pic"));
        assert_eq!(descriptor.declared_size, Some(2048));
    }

    #[test]
    fn missing_media_id_is_malformed() {
        let msg = message(MessagePayload::Document {
            document: attachment(None, Some("application/pdf")),
        });
        match extract(&msg).unwrap_err() {
            ProcessingError::MalformedPayload(detail) => {
                assert!(detail.contains("media id"), "{detail}");
            }
            other => panic!("expected MalformedPayload, got {other:?}"),
        }
    }

    #[test]
    fn blank_media_id_is_malformed() {
        let msg = message(MessagePayload::Audio {
            audio: attachment(Some("   "), Some("audio/mpeg")),
        });
        assert!(matches!(
            extract(&msg).unwrap_err(),
            ProcessingError::MalformedPayload(_)
        ));
    }

    #[test]
    fn missing_mime_type_is_malformed() {
        let msg = message(MessagePayload::Video {
            video: attachment(Some("media456"), None),
        });
        assert!(matches!(
            extract(&msg).unwrap_err(),
            ProcessingError::MalformedPayload(_)
        ));
    }

    #[test]
    fn unsupported_mime_type_is_rejected_before_network() {
        let msg = message(MessagePayload::Document {
            document: attachment(Some("media789"), Some("application/x-unknown")),
        });
        assert!(matches!(
            extract(&msg).unwrap_err(),
            ProcessingError::UnsupportedMimeType(_)
        ));
    }

    #[test]
    fn missing_caption_is_not_a_failure() {
        let msg = message(MessagePayload::Image {
            image: attachment(Some("media123"), Some("image/png")),
        });
        let descriptor = extract(&msg).unwrap().expect("descriptor");
        assert!(descriptor.caption.is_none());
    }
}
