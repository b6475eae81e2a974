//! Boundary validation for uploads.
//!
//! Everything here runs before a job record exists; a failure means the
//! request is rejected and nothing is stored.

use std::path::Path;

use crate::error::{ModelError, ModelResult};

/// Maximum job id length.
const MAX_JOB_ID_LENGTH: usize = 128;

/// Maximum length kept from an uploaded file name.
const MAX_FILE_NAME_LENGTH: usize = 120;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "webm", "avi", "m4v"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Broad media category, decided from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// Classify a path by its extension (case-insensitive).
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }
}

/// Validate job id format.
///
/// Valid format: 1-128 chars of ASCII alphanumerics, `-` and `_`.
pub fn validate_job_id(id: &str) -> ModelResult<()> {
    if id.is_empty() || id.len() > MAX_JOB_ID_LENGTH {
        return Err(ModelError::invalid_job_id(format!(
            "length must be 1-{} characters",
            MAX_JOB_ID_LENGTH
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ModelError::invalid_job_id(format!("'{}' contains invalid characters", id)));
    }
    Ok(())
}

/// Check an upload's name and size against the allowed types and limit.
pub fn validate_upload(file_name: &str, size: u64, max_bytes: u64) -> ModelResult<MediaKind> {
    let kind = MediaKind::from_path(file_name)
        .ok_or_else(|| ModelError::unsupported_file_type(file_name.to_string()))?;
    if size > max_bytes {
        return Err(ModelError::FileTooLarge {
            size,
            limit: max_bytes,
        });
    }
    Ok(kind)
}

/// Reduce a client-provided file name to a safe local name.
///
/// Path components are dropped and anything outside
/// `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        return "upload".to_string();
    }

    // Keep the extension when truncating
    if cleaned.len() > MAX_FILE_NAME_LENGTH {
        if let Some((stem, ext)) = cleaned.rsplit_once('.') {
            let keep = MAX_FILE_NAME_LENGTH.saturating_sub(ext.len() + 1);
            return format!("{}.{}", &stem[..keep.min(stem.len())], ext);
        }
        return cleaned[..MAX_FILE_NAME_LENGTH].to_string();
    }
    cleaned.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_validation() {
        assert!(validate_job_id("job-1").is_ok());
        assert!(validate_job_id("test_vid_123").is_ok());
        assert!(validate_job_id("").is_err());
        assert!(validate_job_id("has/slash").is_err());
        assert!(validate_job_id("has..dots").is_err());
        assert!(validate_job_id(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_media_kind() {
        assert_eq!(MediaKind::from_path("/tmp/in.MP4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_path("photo.jpeg"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_path("notes.txt"), None);
        assert_eq!(MediaKind::from_path("no_extension"), None);
    }

    #[test]
    fn test_validate_upload() {
        assert_eq!(validate_upload("clip.mov", 10, 100), Ok(MediaKind::Video));
        assert!(matches!(
            validate_upload("clip.exe", 10, 100),
            Err(ModelError::UnsupportedFileType(_))
        ));
        assert_eq!(
            validate_upload("clip.mp4", 101, 100),
            Err(ModelError::FileTooLarge { size: 101, limit: 100 })
        );
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("video.mp4"), "video.mp4");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\clips\\my clip.mp4"), "my_clip.mp4");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");

        let long = format!("{}.mp4", "x".repeat(300));
        let sanitized = sanitize_file_name(&long);
        assert!(sanitized.len() <= 120);
        assert!(sanitized.ends_with(".mp4"));
    }
}
