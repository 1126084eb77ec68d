//! Output artifact probe.
//!
//! Reads only existence and modification time of a worker's playlist. The
//! content is never opened.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ProbeError;

/// Filesystem view of one output artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    /// The artifact does not exist (yet).
    Missing,
    /// The artifact exists and was last written at `modified`.
    Present { modified: DateTime<Utc> },
}

/// Inspects output artifacts.
#[async_trait]
pub trait OutputProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<OutputState, ProbeError>;
}

/// [`OutputProbe`] backed by filesystem metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

#[async_trait]
impl OutputProbe for FsProbe {
    async fn probe(&self, path: &Path) -> Result<OutputState, ProbeError> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(OutputState::Missing),
            Err(source) => {
                return Err(ProbeError {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let modified = metadata.modified().map_err(|source| ProbeError {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(OutputState::Present {
            modified: DateTime::<Utc>::from(modified),
        })
    }
}
