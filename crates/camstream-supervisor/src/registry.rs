//! Source registry: the operator-maintained id → URL mapping.
//!
//! The supervisor never writes the registry. It reads a fresh snapshot at
//! boot and again before every restart, so edits made while the supervisor
//! runs take effect on the next restart of the affected source.

use std::path::{Path, PathBuf};

use camstream_models::{SourceId, SourceMap};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::RegistryError;

/// Read access to the source mapping.
pub trait SourceRegistry: Send + Sync {
    /// Load a snapshot of the mapping.
    fn load(&self) -> Result<SourceMap, RegistryError>;

    /// Human-readable location, for log messages.
    fn describe(&self) -> String;
}

/// Load a snapshot, treating any registry failure as an empty mapping.
pub fn load_or_empty(registry: &dyn SourceRegistry) -> SourceMap {
    match registry.load() {
        Ok(sources) => sources,
        Err(e) => {
            error!("Error loading source registry: {}", e);
            SourceMap::new()
        }
    }
}

/// Load a snapshot that is safe to decommission against.
///
/// Returns `None` when the registry cannot be read or lists no sources. A
/// registry caught mid-write looks like either, and acting on it would drop
/// every source.
pub fn try_load(registry: &dyn SourceRegistry) -> Option<SourceMap> {
    match registry.load() {
        Ok(sources) if sources.is_empty() => {
            warn!("Source registry is empty, keeping current sources");
            None
        }
        Ok(sources) => Some(sources),
        Err(e) => {
            warn!("Source registry unreadable, keeping current sources: {}", e);
            None
        }
    }
}

/// Registry stored as a JSON object, e.g. `{"camA": "rtsp://10.0.0.5/stream1"}`.
#[derive(Debug, Clone)]
pub struct JsonFileRegistry {
    path: PathBuf,
}

impl JsonFileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse registry JSON. Entries with an invalid id or a non-string/empty URL are skipped.
    pub fn parse(path: &Path, content: &str) -> Result<SourceMap, RegistryError> {
        let value: Value = serde_json::from_str(content).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let Value::Object(entries) = value else {
            return Err(RegistryError::InvalidFormat(path.to_path_buf()));
        };

        let mut sources = SourceMap::new();
        for (id, url) in entries {
            let source_id = match SourceId::parse(id.as_str()) {
                Ok(source_id) => source_id,
                Err(e) => {
                    warn!(source_id = %id, "Skipping source with invalid id: {}", e);
                    continue;
                }
            };

            match url.as_str().map(str::trim) {
                Some(url) if !url.is_empty() => {
                    sources.insert(source_id, url.to_string());
                }
                _ => {
                    warn!(source_id = %source_id, "Skipping source without a URL");
                }
            }
        }

        Ok(sources)
    }
}

impl SourceRegistry for JsonFileRegistry {
    fn load(&self) -> Result<SourceMap, RegistryError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RegistryError::NotFound(self.path.clone()))
            }
            Err(source) => {
                return Err(RegistryError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let sources = Self::parse(&self.path, &content)?;
        info!("Loaded {} source configurations", sources.len());
        Ok(sources)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn id(s: &str) -> SourceId {
        SourceId::parse(s).unwrap()
    }

    #[test]
    fn test_load_registry_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("camera_config.json");
        std::fs::write(
            &path,
            r#"{"camB": "rtsp://10.0.0.6/stream1", "camA": "rtsp://10.0.0.5/stream1"}"#,
        )
        .unwrap();

        let registry = JsonFileRegistry::new(&path);
        let sources = assert_ok!(registry.load());

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[&id("camA")], "rtsp://10.0.0.5/stream1");
        assert_eq!(sources.keys().next(), Some(&id("camA")));
        assert_eq!(registry.describe(), path.display().to_string());
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        let sources = JsonFileRegistry::parse(
            Path::new("cams.json"),
            r#"{"../escape": "rtsp://x", "camA": "rtsp://a", "camB": 5, "camC": "  "}"#,
        )
        .unwrap();

        assert_eq!(sources.len(), 1);
        assert!(sources.contains_key(&id("camA")));
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let registry = JsonFileRegistry::new(temp_dir.path().join("absent.json"));

        assert!(matches!(registry.load(), Err(RegistryError::NotFound(_))));
        assert!(load_or_empty(&registry).is_empty());
    }

    #[test]
    fn test_malformed_json_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("camera_config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let registry = JsonFileRegistry::new(&path);

        assert!(matches!(registry.load(), Err(RegistryError::Parse { .. })));
        assert!(load_or_empty(&registry).is_empty());
        assert!(try_load(&registry).is_none());
    }

    #[test]
    fn test_try_load_only_returns_usable_snapshots() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("camera_config.json");
        let registry = JsonFileRegistry::new(&path);
        assert!(try_load(&registry).is_none());

        std::fs::write(&path, "{}").unwrap();
        assert!(try_load(&registry).is_none());

        std::fs::write(&path, r#"{"camA": "rtsp://a"}"#).unwrap();
        let sources = try_load(&registry).unwrap();
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn test_non_object_is_invalid() {
        let err = JsonFileRegistry::parse(Path::new("cams.json"), r#"["rtsp://a"]"#).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidFormat(_)));
    }

    #[test]
    fn test_reload_sees_edits() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("camera_config.json");
        std::fs::write(&path, r#"{"camA": "rtsp://old"}"#).unwrap();
        let registry = JsonFileRegistry::new(&path);
        assert_eq!(load_or_empty(&registry)[&id("camA")], "rtsp://old");

        std::fs::write(&path, r#"{"camA": "rtsp://new"}"#).unwrap();
        assert_eq!(load_or_empty(&registry)[&id("camA")], "rtsp://new");
    }
}
