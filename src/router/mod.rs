//! Per-message classification and orchestration.
//!
//! One router invocation owns one inbound message: classify it, and for
//! media kinds run extract -> acquire -> persist. Every path ends in a
//! `ProcessingOutcome`; nothing escapes as an error, so the webhook
//! boundary can always acknowledge the delivery.

use std::sync::Arc;

use crate::error::ProcessingError;
use crate::media::registry::Category;
use crate::media::traits::{MediaStore, StoredMediaRecord};
use crate::media::{extract, MediaAcquirer};
use crate::message::{InboundMessage, MessagePayload};

/// Recognized text commands, parsed case-insensitively from the message
/// body. Unrecognized text is echoed, never failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCommand {
    Greeting,
    Help,
    SendSample(Category),
}

impl TextCommand {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "hello" | "hi" => Some(Self::Greeting),
            "help" => Some(Self::Help),
            "send image" => Some(Self::SendSample(Category::Image)),
            "send audio" => Some(Self::SendSample(Category::Audio)),
            "send video" => Some(Self::SendSample(Category::Video)),
            "send document" | "send doc" => Some(Self::SendSample(Category::Document)),
            _ => None,
        }
    }
}

/// Pipeline stage a media message failed in. Classification failures use
/// `Classify`; the three media stages map one-to-one to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Classify,
    Extract,
    Acquire,
    Persist,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classify => "classify",
            Self::Extract => "extract",
            Self::Acquire => "acquire",
            Self::Persist => "persist",
        }
    }
}

/// Result of processing one inbound message, consumed by the reply layer.
#[derive(Debug)]
pub enum ProcessingOutcome {
    Command {
        command: TextCommand,
    },
    Echo {
        text: String,
    },
    MediaStored {
        record: StoredMediaRecord,
        caption: Option<String>,
    },
    Location {
        latitude: f64,
        longitude: f64,
        name: Option<String>,
        address: Option<String>,
    },
    InteractiveReply {
        id: String,
        title: Option<String>,
        description: Option<String>,
    },
    Failure {
        stage: PipelineStage,
        error: ProcessingError,
    },
}

impl ProcessingOutcome {
    fn fail(stage: PipelineStage, error: ProcessingError) -> Self {
        Self::Failure { stage, error }
    }
}

pub struct MessageRouter {
    acquirer: MediaAcquirer,
    store: Arc<dyn MediaStore>,
}

impl MessageRouter {
    pub fn new(acquirer: MediaAcquirer, store: Arc<dyn MediaStore>) -> Self {
        Self { acquirer, store }
    }

    pub async fn process(&self, msg: &InboundMessage) -> ProcessingOutcome {
        let outcome = match &msg.payload {
            MessagePayload::Text { text } => {
                let body = text.as_ref().map(|t| t.body.as_str()).unwrap_or_default();
                match TextCommand::parse(body) {
                    Some(command) => ProcessingOutcome::Command { command },
                    None => ProcessingOutcome::Echo {
                        text: body.to_string(),
                    },
                }
            }

            MessagePayload::Image { .. }
            | MessagePayload::Audio { .. }
            | MessagePayload::Video { .. }
            | MessagePayload::Document { .. } => self.process_media(msg).await,

            MessagePayload::Location { location } => {
                match (location.latitude, location.longitude) {
                    (Some(latitude), Some(longitude)) => ProcessingOutcome::Location {
                        latitude,
                        longitude,
                        name: location.name.clone(),
                        address: location.address.clone(),
                    },
                    _ => ProcessingOutcome::fail(
                        PipelineStage::Classify,
                        ProcessingError::MalformedPayload(
                            "location message is missing coordinates".to_string(),
                        ),
                    ),
                }
            }

            MessagePayload::Interactive { interactive } => {
                if let Some(button) = &interactive.button_reply {
                    ProcessingOutcome::InteractiveReply {
                        id: button.id.clone(),
                        title: button.title.clone(),
                        description: None,
                    }
                } else if let Some(list) = &interactive.list_reply {
                    ProcessingOutcome::InteractiveReply {
                        id: list.id.clone(),
                        title: list.title.clone(),
                        description: list.description.clone(),
                    }
                } else {
                    ProcessingOutcome::fail(
                        PipelineStage::Classify,
                        ProcessingError::MalformedPayload(
                            "interactive message carries no reply selection".to_string(),
                        ),
                    )
                }
            }

            MessagePayload::Unknown => ProcessingOutcome::fail(
                PipelineStage::Classify,
                ProcessingError::UnrecognizedMessageKind("unknown".to_string()),
            ),
        };

        if let ProcessingOutcome::Failure { stage, error } = &outcome {
            tracing::warn!(
                sender = %msg.sender,
                kind = msg.kind().as_str(),
                stage = stage.as_str(),
                error_kind = error.kind(),
                error = %error,
                "message processing failed"
            );
        }
        outcome
    }

    async fn process_media(&self, msg: &InboundMessage) -> ProcessingOutcome {
        let descriptor = match extract(msg) {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => {
                return ProcessingOutcome::fail(
                    PipelineStage::Extract,
                    ProcessingError::MalformedPayload(
                        "media-kind message carries no attachment".to_string(),
                    ),
                );
            }
            Err(error) => return ProcessingOutcome::fail(PipelineStage::Extract, error),
        };

        tracing::info!(
            sender = %msg.sender,
            media_id = %descriptor.media_id,
            mime_type = %descriptor.mime_type,
            category = %descriptor.category,
            "media message received"
        );

        let acquired = match self.acquirer.acquire(&descriptor).await {
            Ok(acquired) => acquired,
            Err(error) => return ProcessingOutcome::fail(PipelineStage::Acquire, error),
        };

        match self.store.persist(&acquired, descriptor.category).await {
            Ok(record) => {
                tracing::info!(
                    sender = %msg.sender,
                    media_id = %descriptor.media_id,
                    path = %record.path.display(),
                    size_bytes = record.size_bytes,
                    "media stored"
                );
                ProcessingOutcome::MediaStored {
                    record,
                    caption: descriptor.caption,
                }
            }
            Err(error) => ProcessingOutcome::fail(PipelineStage::Persist, error),
        }
    }
}
