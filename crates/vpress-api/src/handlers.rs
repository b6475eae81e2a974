//! HTTP handlers.

pub mod health;
pub mod jobs;

pub use health::health;
pub use jobs::{confirm_video, delete_video, receive_video, video_status};
