//! Prusa Connect camera snapshot uploader.
//!
//! Periodically captures a still image from a local video device and
//! uploads it to the Prusa Connect webcam API.
//!
//! # Architecture
//!
//! ```text
//! identity (startup, once)
//!     ↓
//! capture → upload → sleep → capture → ...
//!     └──── orchestrator ────┘
//! ```
//!
//! # Design Principles
//!
//! - **One cycle at a time**: capture, upload and sleep never overlap
//! - **Self-healing**: capture and upload failures end the cycle, never the loop
//! - **Scoped files**: every temporary snapshot is deleted before the cycle ends
//! - **Explicit configuration**: settings are built once and passed by reference
//!
//! # Example
//!
//! ```no_run
//! use prusa_connect_cam::{
//!     config::{ConfigDocument, PLATFORM_ID},
//!     identity::ensure_fingerprint,
//!     orchestrator::SnapshotLoop,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let document = ConfigDocument::new("/var/lib/homebridge/config.json", PLATFORM_ID);
//! let mut config = document.load()?;
//! config.validate_token()?;
//! ensure_fingerprint(&mut config, &document);
//!
//! let (_stop, shutdown) = tokio::sync::watch::channel(false);
//! SnapshotLoop::from_config(&config)?.run(shutdown).await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod identity;
pub mod orchestrator;
pub mod upload;

// Re-export commonly used types at crate root
pub use capture::{CaptureOutcome, FfmpegGrabber, FrameCapturer, FrameGrabber};
pub use config::{CameraConfig, CaptureConfig, ConfigDocument, ConfigError};
pub use identity::{ensure_fingerprint, generate_random_fingerprint};
pub use orchestrator::{CycleReport, SnapshotLoop, StartupError};
pub use upload::{SnapshotUploader, UploadOutcome, UploadResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
