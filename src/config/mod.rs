//! Service configuration.
//!
//! Settings come from the platform entry of a host JSON document. The
//! resulting [`CameraConfig`] is built once at startup and passed by
//! reference to every component afterwards.

mod camera;
mod document;

pub use camera::{
    CameraConfig, CaptureConfig, ConfigError, UploadConfig, DEFAULT_ENDPOINT, MIN_TOKEN_LEN,
    PLATFORM_ID,
};
pub use document::{ConfigDocument, DEFAULT_CONFIG_PATH};
