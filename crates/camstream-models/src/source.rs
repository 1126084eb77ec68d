//! Source identity and registry snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Maximum length of a source id.
pub const MAX_SOURCE_ID_LEN: usize = 128;

/// Stable identifier of one configured video source.
///
/// Source ids name files on disk (`<id>.m3u8`, `ffmpeg_<id>_error.log`), so
/// they are restricted to values that cannot escape or collide inside the
/// output and log directories. `%` is rejected because the id is also part
/// of FFmpeg's `<id>_%03d.ts` segment pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceId(String);

impl SourceId {
    /// Validate and wrap a source id.
    pub fn parse(id: impl Into<String>) -> ModelResult<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(ModelError::EmptySourceId);
        }

        let len = id.chars().count();
        if len > MAX_SOURCE_ID_LEN {
            return Err(ModelError::SourceIdTooLong {
                len,
                max: MAX_SOURCE_ID_LEN,
            });
        }

        if id.starts_with('.') {
            return Err(ModelError::HiddenSourceId(id));
        }

        if let Some(ch) = id
            .chars()
            .find(|c| matches!(c, '/' | '\\' | '\0' | '%') || c.is_control())
        {
            return Err(ModelError::InvalidSourceIdChar { id, ch });
        }

        Ok(Self(id))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SourceId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SourceId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SourceId> for String {
    fn from(id: SourceId) -> Self {
        id.0
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Snapshot of the source registry: source id → connection URL.
///
/// Ordered by id so every pass over the sources is deterministic.
pub type SourceMap = BTreeMap<SourceId, String>;
