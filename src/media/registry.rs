use serde::{Deserialize, Serialize};

use crate::error::ProcessingError;

/// Coarse media category, used for storage partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Image,
    Audio,
    Video,
    Document,
}

impl Category {
    /// Directory name under the storage root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Document => "document",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Closed table of platform-supported MIME types. Adding a type is a pure
/// data edit; nothing else dispatches on MIME strings.
const MIME_TABLE: &[(&str, &str, Category)] = &[
    ("image/jpeg", "jpg", Category::Image),
    ("image/png", "png", Category::Image),
    ("image/gif", "gif", Category::Image),
    ("image/webp", "webp", Category::Image),
    ("audio/mpeg", "mp3", Category::Audio),
    ("audio/mp4", "m4a", Category::Audio),
    ("audio/amr", "amr", Category::Audio),
    ("audio/ogg", "ogg", Category::Audio),
    ("video/mp4", "mp4", Category::Video),
    ("video/3gpp", "3gp", Category::Video),
    ("application/pdf", "pdf", Category::Document),
    ("application/msword", "doc", Category::Document),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
        Category::Document,
    ),
    ("application/vnd.ms-excel", "xls", Category::Document),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
        Category::Document,
    ),
    ("application/vnd.ms-powerpoint", "ppt", Category::Document),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "pptx",
        Category::Document,
    ),
    ("text/plain", "txt", Category::Document),
];

/// Resolve a MIME type to its canonical extension and category.
///
/// Matching is case-insensitive and ignores parameters after `;`
/// (e.g. `audio/ogg; codecs=opus`).
pub fn resolve(mime_type: &str) -> Result<(&'static str, Category), ProcessingError> {
    let normalized = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    MIME_TABLE
        .iter()
        .find(|(mime, _, _)| *mime == normalized)
        .map(|&(_, ext, category)| (ext, category))
        .ok_or_else(|| ProcessingError::UnsupportedMimeType(mime_type.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_common_types() {
        let cases = [
            ("image/jpeg", "jpg", Category::Image),
            ("image/png", "png", Category::Image),
            ("audio/mpeg", "mp3", Category::Audio),
            ("video/mp4", "mp4", Category::Video),
            ("application/pdf", "pdf", Category::Document),
            ("text/plain", "txt", Category::Document),
        ];
        for (mime, ext, category) in cases {
            let (got_ext, got_category) = resolve(mime).unwrap();
            assert_eq!(got_ext, ext, "extension for {mime}");
            assert_eq!(got_category, category, "category for {mime}");
        }
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let (ext, category) = resolve("Image/JPEG").unwrap();
        assert_eq!(ext, "jpg");
        assert_eq!(category, Category::Image);
    }

    #[test]
    fn resolve_strips_parameters() {
        let (ext, category) = resolve("audio/ogg; codecs=opus").unwrap();
        assert_eq!(ext, "ogg");
        assert_eq!(category, Category::Audio);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = resolve("application/x-unknown").unwrap_err();
        match err {
            ProcessingError::UnsupportedMimeType(mime) => {
                assert_eq!(mime, "application/x-unknown");
            }
            other => panic!("expected UnsupportedMimeType, got {other:?}"),
        }
    }

    #[test]
    fn every_table_entry_round_trips() {
        for (mime, _, _) in super::MIME_TABLE {
            assert!(resolve(mime).is_ok(), "{mime} should resolve");
        }
    }
}
