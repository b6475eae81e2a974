//! Delivery of compressed artifacts to the downstream consumer.
//!
//! This crate provides:
//! - The [`DeliverySink`] seam used by the dispatcher
//! - An HTTP multipart sink (the consumer's store endpoint)
//! - A directory sink for file-transfer style hand-off

pub mod config;
pub mod directory;
pub mod error;
pub mod http;
pub mod sink;

pub use config::{sink_from_config, DeliveryConfig, DeliveryMode};
pub use directory::DirectoryDeliverySink;
pub use error::{DeliveryError, DeliveryResult};
pub use http::HttpDeliverySink;
pub use sink::DeliverySink;
