//! The delivery sink seam.

use std::path::Path;

use async_trait::async_trait;

use vpress_models::JobMetadata;

use crate::error::DeliveryResult;

/// Hands a compressed artifact to the downstream consumer.
///
/// `Ok(())` means the consumer acknowledged receipt of this attempt;
/// anything else is a failed attempt.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, file: &Path, metadata: &JobMetadata) -> DeliveryResult<()>;

    /// Short description of the destination for logs.
    fn describe(&self) -> String;
}
