//! File-transfer delivery into a drop directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use vpress_models::JobMetadata;

use crate::error::{DeliveryError, DeliveryResult};
use crate::sink::DeliverySink;

/// Copies the artifact into `drop_dir` and writes the metadata next to it
/// as `<file name>.json`.
///
/// The copy goes to `<file name>.part` first and is renamed into place
/// after the metadata is written, so the consumer never picks up a
/// half-written artifact or one without its metadata.
#[derive(Debug, Clone)]
pub struct DirectoryDeliverySink {
    drop_dir: PathBuf,
}

impl DirectoryDeliverySink {
    pub fn new(drop_dir: impl Into<PathBuf>) -> Self {
        Self {
            drop_dir: drop_dir.into(),
        }
    }
}

#[async_trait]
impl DeliverySink for DirectoryDeliverySink {
    async fn deliver(&self, file: &Path, metadata: &JobMetadata) -> DeliveryResult<()> {
        let name = file
            .file_name()
            .ok_or_else(|| DeliveryError::ArtifactMissing(file.to_path_buf()))?;
        if !tokio::fs::try_exists(file).await.unwrap_or(false) {
            return Err(DeliveryError::ArtifactMissing(file.to_path_buf()));
        }

        tokio::fs::create_dir_all(&self.drop_dir).await?;

        let target = self.drop_dir.join(name);
        let partial = with_suffix(&target, ".part");
        tokio::fs::copy(file, &partial).await?;

        let sidecar = with_suffix(&target, ".json");
        tokio::fs::write(&sidecar, serde_json::to_vec_pretty(metadata)?).await?;
        tokio::fs::rename(&partial, &target).await?;

        debug!(target = %target.display(), "Artifact dropped");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("dir:{}", self.drop_dir.display())
    }
}

/// `path` with `suffix` appended to the whole file name.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
