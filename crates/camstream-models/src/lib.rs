//! Shared data models for the camstream supervisor.
//!
//! This crate provides:
//! - Validated source identifiers
//! - The ordered source-id → URL snapshot read from the source registry

pub mod error;
pub mod source;

pub use error::{ModelError, ModelResult};
pub use source::{SourceId, SourceMap, MAX_SOURCE_ID_LEN};
