use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::registry::{self, Category};
use super::traits::{AcquiredMedia, MediaStore, StoredMediaRecord};
use crate::error::ProcessingError;

const CATEGORIES: [Category; 4] = [
    Category::Image,
    Category::Audio,
    Category::Video,
    Category::Document,
];

/// Local filesystem media store. Files land under
/// `root/{category}/{uuid}.{ext}` with UUID-based filenames so concurrent
/// persists never collide and no payload-supplied name ever reaches the
/// filesystem.
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage root and category directories. Called once at
    /// startup; `persist` assumes the layout exists.
    pub async fn init(&self) -> anyhow::Result<()> {
        for category in CATEGORIES {
            let dir = self.root.join(category.dir_name());
            fs::create_dir_all(&dir).await.map_err(|err| {
                anyhow::anyhow!("failed to create storage directory {}: {err}", dir.display())
            })?;
        }
        Ok(())
    }

    /// Write bytes to a temp file in the target directory, fsync, then
    /// rename into place so a concurrent reader never observes a partial
    /// file at the final path.
    async fn write_atomic(&self, final_path: &Path, data: &[u8]) -> std::io::Result<()> {
        let dir = final_path.parent().unwrap_or(self.root.as_path());
        let file_name = final_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("media");
        let temp_path = dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let result = async {
            let mut temp_file = OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&temp_path)
                .await?;
            temp_file.write_all(data).await?;
            temp_file.sync_all().await?;
            drop(temp_file);
            fs::rename(&temp_path, final_path).await
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&temp_path).await;
        }
        result
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn persist(
        &self,
        media: &AcquiredMedia,
        category: Category,
    ) -> Result<StoredMediaRecord, ProcessingError> {
        // Extension comes from the resolved MIME type, never from a
        // payload-supplied filename or the webhook-declared type.
        let (extension, _) = registry::resolve(&media.mime_type)?;

        let filename = format!("{}.{extension}", uuid::Uuid::new_v4());
        let path = self.root.join(category.dir_name()).join(&filename);

        self.write_atomic(&path, &media.data).await?;

        tracing::debug!(
            path = %path.display(),
            size_bytes = media.size_bytes,
            %category,
            "media persisted"
        );

        Ok(StoredMediaRecord {
            path,
            filename,
            category,
            mime_type: media.mime_type.clone(),
            size_bytes: media.size_bytes,
            stored_at: chrono::Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "local"
    }
}
