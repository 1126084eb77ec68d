//! Model error types.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Source id is empty")]
    EmptySourceId,

    #[error("Source id too long ({len} > {max} chars)")]
    SourceIdTooLong { len: usize, max: usize },

    #[error("Source id contains invalid character {ch:?}: {id}")]
    InvalidSourceIdChar { id: String, ch: char },

    #[error("Source id must not start with '.': {0}")]
    HiddenSourceId(String),
}
