//! Shared data models for the vpress service.
//!
//! This crate provides Serde-serializable types for:
//! - Job records and the job status machine
//! - Caller-supplied job ids and metadata
//! - Boundary validation of uploads

pub mod error;
pub mod job;
pub mod status;
pub mod validation;

pub use error::{ModelError, ModelResult};
pub use job::{JobId, JobMetadata, JobRecord, StatusReport, StatusUpdate};
pub use status::JobStatus;
pub use validation::{sanitize_file_name, validate_job_id, validate_upload, MediaKind};
