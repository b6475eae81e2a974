//! HTTP multipart delivery sink.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

use vpress_models::JobMetadata;

use crate::error::{DeliveryError, DeliveryResult};
use crate::sink::DeliverySink;

/// Header carrying the shared service key.
pub const SERVICE_KEY_HEADER: &str = "X-Internal-Service-Key";

/// Longest response body kept in a rejection error.
const MAX_ERROR_BODY: usize = 512;

/// POSTs the artifact as `multipart/form-data`.
///
/// Every metadata entry becomes a text field and the artifact is sent as
/// the `file` part. Each attempt is bounded by the client timeout.
pub struct HttpDeliverySink {
    http: Client,
    url: String,
    service_key: Option<String>,
}

impl HttpDeliverySink {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        service_key: Option<String>,
    ) -> DeliveryResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
            service_key,
        })
    }

    async fn build_form(&self, file: &Path, metadata: &JobMetadata) -> DeliveryResult<Form> {
        let handle = match tokio::fs::File::open(file).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DeliveryError::ArtifactMissing(file.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        let len = handle.metadata().await?.len();
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());

        let part = Part::stream_with_length(reqwest::Body::from(handle), len)
            .file_name(file_name)
            .mime_str(mime_for(file))?;

        let mut form = Form::new();
        for (key, value) in metadata {
            form = form.text(key.clone(), value.clone());
        }
        Ok(form.part("file", part))
    }
}

#[async_trait]
impl DeliverySink for HttpDeliverySink {
    async fn deliver(&self, file: &Path, metadata: &JobMetadata) -> DeliveryResult<()> {
        let form = self.build_form(file, metadata).await?;

        let mut request = self.http.post(&self.url).multipart(form);
        if let Some(key) = &self.service_key {
            request = request.header(SERVICE_KEY_HEADER, key);
        }

        debug!(url = %self.url, file = %file.display(), "Posting artifact");
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DeliveryError::Timeout
            } else {
                DeliveryError::Network(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body: truncate_on_char_boundary(body, MAX_ERROR_BODY),
        })
    }

    fn describe(&self) -> String {
        format!("http:{}", self.url)
    }
}

/// Cut `text` to at most `max` bytes without splitting a character.
fn truncate_on_char_boundary(mut text: String, max: usize) -> String {
    if text.len() > max {
        let mut cut = max;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
