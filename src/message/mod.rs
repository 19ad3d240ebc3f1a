//! Typed model of a WhatsApp Cloud API webhook delivery.
//!
//! The platform delivers one JSON body per callback with the shape
//! `entry[].changes[].value.{contacts, messages, statuses}`. Instead of
//! poking into nested maps, each message kind is a closed tagged variant
//! validated once at the deserialization boundary; downstream code matches
//! on the variant and never re-checks structure.

use serde::Deserialize;

/// Top-level webhook delivery body.
#[derive(Debug, Deserialize)]
pub struct WebhookDelivery {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub value: ChangeValue,
    #[serde(default)]
    pub field: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    /// Delivery/read receipts. Present means this callback is a status
    /// update, not an inbound message.
    #[serde(default)]
    pub statuses: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct Contact {
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
}

/// One message object as delivered inside a change value. The `type` field
/// selects the payload variant; everything else is kind-independent.
#[derive(Debug, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub payload: MessagePayload,
}

/// Kind-dependent message payload. Unknown `type` values deserialize to
/// `Unknown` rather than failing the whole delivery.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePayload {
    Text {
        #[serde(default)]
        text: Option<TextBody>,
    },
    Image {
        #[serde(default)]
        image: MediaAttachment,
    },
    Audio {
        #[serde(default)]
        audio: MediaAttachment,
    },
    Video {
        #[serde(default)]
        video: MediaAttachment,
    },
    Document {
        #[serde(default)]
        document: MediaAttachment,
    },
    Location {
        #[serde(default)]
        location: LocationData,
    },
    Interactive {
        #[serde(default)]
        interactive: InteractivePayload,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub body: String,
}

/// Media attachment reference. All fields optional at the wire level; the
/// extractor decides which absences are defects.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaAttachment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub caption: Option<String>,
    /// Client-supplied name on document messages. Never trusted for
    /// storage; kept only for reply text.
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub voice: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationData {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractivePayload {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub button_reply: Option<ButtonReply>,
    #[serde(default)]
    pub list_reply: Option<ListReply>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ButtonReply {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListReply {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Coarse message kind, derived from the payload variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Video,
    Document,
    Location,
    Interactive,
    Unknown,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Document => "document",
            Self::Location => "location",
            Self::Interactive => "interactive",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_media(self) -> bool {
        matches!(
            self,
            Self::Image | Self::Audio | Self::Video | Self::Document
        )
    }
}

impl MessagePayload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::Image { .. } => MessageKind::Image,
            Self::Audio { .. } => MessageKind::Audio,
            Self::Video { .. } => MessageKind::Video,
            Self::Document { .. } => MessageKind::Document,
            Self::Location { .. } => MessageKind::Location,
            Self::Interactive { .. } => MessageKind::Interactive,
            Self::Unknown => MessageKind::Unknown,
        }
    }
}

/// One webhook-delivered message normalized for the router: sender identity
/// resolved from the message `from` field or the delivery's contact entry.
#[derive(Debug)]
pub struct InboundMessage {
    pub sender: String,
    pub sender_name: Option<String>,
    pub message_id: Option<String>,
    pub payload: MessagePayload,
}

impl InboundMessage {
    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }
}

impl WebhookDelivery {
    /// True when the delivery carries only delivery/read receipts.
    pub fn is_status_update(&self) -> bool {
        let mut saw_statuses = false;
        for entry in &self.entry {
            for change in &entry.changes {
                if !change.value.messages.is_empty() {
                    return false;
                }
                if !change.value.statuses.is_empty() {
                    saw_statuses = true;
                }
            }
        }
        saw_statuses
    }

    /// Flatten the delivery into router-facing messages, pairing each with
    /// the sender profile from the change's contact list.
    pub fn into_messages(self) -> Vec<InboundMessage> {
        let mut out = Vec::new();
        for entry in self.entry {
            for change in entry.changes {
                let contact = change.value.contacts.into_iter().next();
                let contact_wa_id = contact.as_ref().map(|c| c.wa_id.clone());
                let contact_name = contact
                    .and_then(|c| c.profile)
                    .and_then(|p| p.name);
                for raw in change.value.messages {
                    let sender = raw
                        .from
                        .or_else(|| contact_wa_id.clone())
                        .unwrap_or_default();
                    out.push(InboundMessage {
                        sender,
                        sender_name: contact_name.clone(),
                        message_id: raw.id,
                        payload: raw.payload,
                    });
                }
            }
        }
        out
    }
}
