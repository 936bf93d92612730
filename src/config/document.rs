//! Host configuration document.
//!
//! The service shares a JSON document with its host: a top-level
//! `platforms` list in which one entry, identified by its `platform`
//! field, holds this camera's settings. Only the `fingerprint` field of
//! that entry is ever written back.

use super::{CameraConfig, ConfigError};
use crate::identity::{FingerprintStore, StoreError};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Default location of the host configuration document.
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/homebridge/config.json";

/// Handle to the JSON configuration document on disk.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    path: PathBuf,
    platform: String,
}

impl ConfigDocument {
    /// Creates a handle for the entry `platform` in the document at `path`.
    pub fn new(path: impl Into<PathBuf>, platform: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            platform: platform.into(),
        }
    }

    /// Path of the underlying document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and validates this camera's entry.
    pub fn load(&self) -> Result<CameraConfig, ConfigError> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| ConfigError::FileReadError(format!("{}: {}", self.path.display(), e)))?;
        let document: Value =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        let platforms = document
            .get("platforms")
            .and_then(Value::as_array)
            .ok_or(ConfigError::MissingPlatforms)?;
        let entry = platforms
            .iter()
            .find(|p| self.matches(p))
            .ok_or_else(|| ConfigError::PlatformNotFound(self.platform.clone()))?;

        let config: CameraConfig = serde_json::from_value(entry.clone())
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.capture.validate()?;
        Ok(config)
    }

    fn matches(&self, entry: &Value) -> bool {
        entry.get("platform").and_then(Value::as_str) == Some(self.platform.as_str())
    }
}

impl FingerprintStore for ConfigDocument {
    /// Read-modify-write of the whole document, touching only the
    /// `fingerprint` field of the matching entry.
    ///
    /// A symlinked document is written through to its target, and the
    /// target keeps its permission bits.
    fn persist_fingerprint(&self, fingerprint: &str) -> Result<(), StoreError> {
        let target = std::fs::canonicalize(&self.path).map_err(StoreError::Read)?;
        let permissions = std::fs::metadata(&target)
            .map_err(StoreError::Read)?
            .permissions();
        let content = std::fs::read_to_string(&target).map_err(StoreError::Read)?;
        let mut document: Value = serde_json::from_str(&content)?;

        let platforms = document
            .get_mut("platforms")
            .and_then(Value::as_array_mut)
            .ok_or(StoreError::MissingPlatforms)?;
        let entry = platforms
            .iter_mut()
            .find(|p| p.get("platform").and_then(Value::as_str) == Some(self.platform.as_str()))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| StoreError::PlatformNotFound(self.platform.clone()))?;

        entry.insert(
            "fingerprint".to_string(),
            Value::String(fingerprint.to_string()),
        );

        let mut output = serde_json::to_string_pretty(&document)?;
        output.push('\n');

        let staging = target.with_extension("json.tmp");
        let replaced = std::fs::write(&staging, output)
            .and_then(|()| std::fs::set_permissions(&staging, permissions))
            .and_then(|()| std::fs::rename(&staging, &target));
        if let Err(e) = replaced {
            let _ = std::fs::remove_file(&staging);
            return Err(StoreError::Write(e));
        }

        tracing::debug!(path = %target.display(), "Updated fingerprint in config document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PLATFORM_ID;
    use tempfile::tempdir;

    const DOCUMENT: &str = r#"{
  "bridge": {
    "name": "Homebridge",
    "port": 51826
  },
  "platforms": [
    {
      "platform": "Other",
      "fingerprint": "untouched"
    },
    {
      "platform": "PrusaConnectCamera",
      "name": "Printer cam",
      "token": "abcdefghijklmnopqrstuvwxyz",
      "videoSource": "/dev/video1"
    }
  ]
}
"#;

    #[test]
    fn test_load_matching_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, DOCUMENT).unwrap();

        let config = ConfigDocument::new(&path, PLATFORM_ID).load().unwrap();
        assert_eq!(config.name, "Printer cam");
        assert_eq!(config.video_source, "/dev/video1");
        assert!(config.fingerprint.is_none());
    }

    #[test]
    fn test_load_missing_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, DOCUMENT).unwrap();

        let err = ConfigDocument::new(&path, "Nope").load().unwrap_err();
        assert!(matches!(err, ConfigError::PlatformNotFound(ref p) if p == "Nope"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = ConfigDocument::new(dir.path().join("absent.json"), PLATFORM_ID)
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError(_)));
    }

    #[test]
    fn test_persist_updates_only_fingerprint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, DOCUMENT).unwrap();

        let document = ConfigDocument::new(&path, PLATFORM_ID);
        document
            .persist_fingerprint("generated-fingerprint-0123456789")
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let expected = DOCUMENT.replace(
            "\"videoSource\": \"/dev/video1\"\n",
            "\"videoSource\": \"/dev/video1\",\n      \"fingerprint\": \"generated-fingerprint-0123456789\"\n",
        );
        assert_eq!(written, expected);

        let reloaded = document.load().unwrap();
        assert_eq!(reloaded.fingerprint(), "generated-fingerprint-0123456789");
    }

    #[cfg(unix)]
    #[test]
    fn test_persist_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, DOCUMENT).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();

        ConfigDocument::new(&path, PLATFORM_ID)
            .persist_fingerprint("generated-fingerprint-0123456789")
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!dir.path().join("config.json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_persist_through_symlink() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real-config.json");
        let link = dir.path().join("config.json");
        std::fs::write(&real, DOCUMENT).unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let document = ConfigDocument::new(&link, PLATFORM_ID);
        document
            .persist_fingerprint("generated-fingerprint-0123456789")
            .unwrap();

        assert!(std::fs::symlink_metadata(&link)
            .unwrap()
            .file_type()
            .is_symlink());
        assert!(std::fs::read_to_string(&real)
            .unwrap()
            .contains("generated-fingerprint-0123456789"));
        assert_eq!(
            document.load().unwrap().fingerprint(),
            "generated-fingerprint-0123456789"
        );
    }

    #[test]
    fn test_persist_without_platforms() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"bridge": {}}"#).unwrap();

        let err = ConfigDocument::new(&path, PLATFORM_ID)
            .persist_fingerprint("generated-fingerprint-0123456789")
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingPlatforms));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"bridge": {}}"#);
    }

    #[test]
    fn test_persist_unreadable_document() {
        let dir = tempdir().unwrap();
        let err = ConfigDocument::new(dir.path().join("absent.json"), PLATFORM_ID)
            .persist_fingerprint("generated-fingerprint-0123456789")
            .unwrap_err();
        assert!(matches!(err, StoreError::Read(_)));
    }
}
