//! Maps a processing outcome to the text reply sent back to the sender.
//!
//! Internal error detail never reaches the user; failures collapse to a
//! generic apology while the router's log line carries the specifics.

use crate::error::ProcessingError;
use crate::router::{ProcessingOutcome, TextCommand};

const HELP_TEXT: &str = "Available commands:\n\
    hello - get a greeting\n\
    help - show this message\n\
    send image / send audio / send video / send document - request a sample file\n\
    Send me any media and I'll archive it!";

/// Compose the reply for one outcome. Always returns something; the
/// platform expects an acknowledgment even on failure.
pub fn compose_reply(outcome: &ProcessingOutcome, sender_name: Option<&str>) -> String {
    match outcome {
        ProcessingOutcome::Command { command } => match command {
            TextCommand::Greeting => {
                let name = sender_name.unwrap_or("there");
                format!("Hello {name}! How can I help you today?")
            }
            TextCommand::Help => HELP_TEXT.to_string(),
            TextCommand::SendSample(category) => {
                format!("Sample {category} sending is not configured on this server.")
            }
        },

        ProcessingOutcome::Echo { text } => {
            format!("You said: {}", text.to_uppercase())
        }

        ProcessingOutcome::MediaStored { record, caption } => {
            let mut parts = vec![
                format!("Got your {}!", record.category),
                format!("Saved as: {}", record.path.display()),
                format!("Size: {} bytes", record.size_bytes),
            ];
            if let Some(caption) = caption {
                parts.push(format!("Caption: {caption}"));
            }
            parts.join("\n")
        }

        ProcessingOutcome::Location {
            latitude,
            longitude,
            name,
            address,
        } => {
            let mut parts = vec![
                "Thanks for sharing your location!".to_string(),
                format!("Coordinates: {latitude}, {longitude}"),
            ];
            if let Some(name) = name {
                parts.push(format!("Name: {name}"));
            }
            if let Some(address) = address {
                parts.push(format!("Address: {address}"));
            }
            parts.join("\n")
        }

        ProcessingOutcome::InteractiveReply {
            id,
            title,
            description,
        } => {
            let label = title.as_deref().unwrap_or(id);
            let mut parts = vec![format!("You selected: {label} (id: {id})")];
            if let Some(description) = description {
                parts.push(format!("Description: {description}"));
            }
            parts.join("\n")
        }

        ProcessingOutcome::Failure { error, .. } => match error {
            ProcessingError::UnrecognizedMessageKind(_) => {
                "Sorry, I don't support that message type yet. Try sending text, \
                 images, audio, video, documents, or locations!"
                    .to_string()
            }
            ProcessingError::UnsupportedMimeType(_)
            | ProcessingError::MalformedPayload(_)
            | ProcessingError::MediaUrlResolutionFailed { .. }
            | ProcessingError::MediaDownloadFailed { .. }
            | ProcessingError::StorageWriteFailed(_) => {
                "Sorry, I couldn't process your media. Please try again.".to_string()
            }
        },
    }
}
