//! Camera, capture and upload settings.
//!
//! One camera per process. The settings are read once at startup and
//! shared immutably afterwards; only the fingerprint is ever rewritten,
//! and only before the snapshot loop starts.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Identifier of the platform entry this service reads from the host
/// configuration document.
pub const PLATFORM_ID: &str = "PrusaConnectCamera";

/// Remote snapshot endpoint of the Prusa Connect camera API.
pub const DEFAULT_ENDPOINT: &str = "https://webcam.connect.prusa3d.com/c/snapshot";

/// Minimum length of a credential token accepted by the remote service.
pub const MIN_TOKEN_LEN: usize = 20;

const DEFAULT_VIDEO_SOURCE: &str = "/dev/video0";
const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Configuration of the single camera handled by this process.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConfig {
    /// Credential token issued by Prusa Connect for this camera.
    #[serde(default)]
    pub token: String,
    /// Opaque per-installation identifier; generated when invalid.
    #[serde(default)]
    pub fingerprint: Option<String>,
    /// Device path, or a full capture-tool input argument string.
    #[serde(default = "default_video_source")]
    pub video_source: String,
    /// Seconds to sleep between the end of one cycle and the next.
    #[serde(default = "default_interval", rename = "snapshotInterval")]
    pub snapshot_interval_secs: u64,
    /// Human readable name used in log lines.
    #[serde(default = "default_name")]
    pub name: String,
    /// Capture tool settings.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Upload settings.
    #[serde(default)]
    pub upload: UploadConfig,
}

fn default_video_source() -> String {
    DEFAULT_VIDEO_SOURCE.to_string()
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_name() -> String {
    PLATFORM_ID.to_string()
}

impl CameraConfig {
    /// Creates a configuration with the given token and defaults elsewhere.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            fingerprint: None,
            video_source: default_video_source(),
            snapshot_interval_secs: DEFAULT_INTERVAL_SECS,
            name: default_name(),
            capture: CaptureConfig::default(),
            upload: UploadConfig::default(),
        }
    }

    /// Checks the credential token.
    ///
    /// This is the only condition that keeps the snapshot loop from
    /// starting. The token must be long enough and sendable as an HTTP
    /// header value.
    pub fn validate_token(&self) -> Result<(), ConfigError> {
        let len = self.token.chars().count();
        if len < MIN_TOKEN_LEN {
            return Err(ConfigError::InvalidToken { len });
        }
        if !crate::identity::is_header_safe(&self.token) {
            return Err(ConfigError::TokenNotHeaderSafe);
        }
        Ok(())
    }

    /// Interval between cycles. Zero means unset and falls back to the
    /// default.
    pub fn snapshot_interval(&self) -> Duration {
        if self.snapshot_interval_secs == 0 {
            tracing::warn!(
                default_secs = DEFAULT_INTERVAL_SECS,
                "snapshotInterval of 0 is not allowed, using default"
            );
            return Duration::from_secs(DEFAULT_INTERVAL_SECS);
        }
        Duration::from_secs(self.snapshot_interval_secs)
    }

    /// Returns the fingerprint, or an empty string when none is set.
    pub fn fingerprint(&self) -> &str {
        self.fingerprint.as_deref().unwrap_or("")
    }
}

impl std::fmt::Debug for CameraConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraConfig")
            .field("name", &self.name)
            .field("token_len", &self.token.chars().count())
            .field("fingerprint", &self.fingerprint)
            .field("video_source", &self.video_source)
            .field("snapshot_interval_secs", &self.snapshot_interval_secs)
            .field("capture", &self.capture)
            .field("upload", &self.upload)
            .finish()
    }
}

/// Settings for the external capture tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Input format passed to the capture tool (`-f`).
    pub input_format: String,
    /// Capture tool executable.
    pub ffmpeg_path: PathBuf,
    /// Retries after a transient-busy failure (attempts = 1 + retries).
    pub max_retries: u32,
    /// Fixed delay between busy retries, in seconds.
    pub retry_delay_secs: u64,
    /// Upper bound for one capture tool run, in seconds.
    pub timeout_secs: u64,
    /// Directory for temporary snapshot files. Defaults to the OS temp dir.
    pub temp_dir: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            input_format: "v4l2".to_string(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            max_retries: 3,
            retry_delay_secs: 3,
            timeout_secs: 30,
            temp_dir: None,
        }
    }
}

impl CaptureConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// `WxH` string understood by the capture tool.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Delay between busy retries.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Timeout for a single capture tool run.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Directory that receives temporary snapshot files.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Settings for the snapshot upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadConfig {
    /// Endpoint receiving the snapshot PUT.
    pub endpoint: String,
    /// Whole-request timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 30,
        }
    }
}

impl UploadConfig {
    /// Whole-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("credential token must be at least 20 characters (got {len})")]
    InvalidToken { len: usize },
    #[error("credential token contains characters that cannot be sent in an HTTP header")]
    TokenNotHeaderSafe,
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("capture timeout must be at least one second")]
    InvalidTimeout,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
    #[error("config document has no platforms list")]
    MissingPlatforms,
    #[error("no platform entry named {0:?} in config document")]
    PlatformNotFound(String),
}
