//! Frame grabbing through an external capture tool.
//!
//! A [`FrameGrabber`] pulls exactly one frame from a video source into a
//! file. The production implementation shells out to ffmpeg; tests swap
//! in scripted grabbers.

use crate::config::CaptureConfig;
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Diagnostic substring (lowercase) reported when the device is held by
/// another reader.
const BUSY_MARKER: &str = "resource busy";

/// Errors from a single capture tool invocation.
#[derive(Debug, Error)]
pub enum GrabError {
    #[error("failed to start capture tool: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("capture tool failed ({status}): {diagnostic}")]
    Failed { status: String, diagnostic: String },
    #[error("capture tool timed out after {0:?}")]
    Timeout(Duration),
    #[error("capture tool produced no image at {0}")]
    NoOutput(PathBuf),
}

impl GrabError {
    /// True when the diagnostic output says the device is transiently busy.
    pub fn is_device_busy(&self) -> bool {
        match self {
            GrabError::Failed { diagnostic, .. } => is_busy_diagnostic(diagnostic),
            _ => false,
        }
    }
}

/// Case-insensitive check for the transient-busy marker.
pub fn is_busy_diagnostic(diagnostic: &str) -> bool {
    diagnostic.to_lowercase().contains(BUSY_MARKER)
}

/// Trait for frame grabbers.
///
/// This abstraction allows swapping the external capture tool for
/// scripted implementations in tests.
pub trait FrameGrabber {
    /// Writes one frame from `source` to `dest`, overwriting any existing
    /// file.
    fn grab(&self, source: &str, dest: &Path)
        -> impl Future<Output = Result<(), GrabError>> + Send;
}

/// Grabber that runs ffmpeg once per frame.
#[derive(Debug, Clone)]
pub struct FfmpegGrabber {
    program: PathBuf,
    input_format: String,
    resolution: String,
    timeout: Duration,
}

impl FfmpegGrabber {
    /// Creates a grabber from capture settings.
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            program: config.ffmpeg_path.clone(),
            input_format: config.input_format.clone(),
            resolution: config.resolution(),
            timeout: config.timeout(),
        }
    }

    /// Builds the argument list for one capture.
    ///
    /// A source starting with `-` is a complete input argument string and
    /// replaces the default `-f`/`-video_size`/`-i` triple.
    pub fn args(&self, source: &str, dest: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y"]
            .into_iter()
            .map(OsString::from)
            .collect();

        if source.trim_start().starts_with('-') {
            args.extend(source.split_whitespace().map(OsString::from));
            args.push("-s".into());
            args.push(self.resolution.clone().into());
        } else {
            args.push("-f".into());
            args.push(self.input_format.clone().into());
            args.push("-video_size".into());
            args.push(self.resolution.clone().into());
            args.push("-i".into());
            args.push(source.into());
        }

        args.push("-frames:v".into());
        args.push("1".into());
        args.push(dest.as_os_str().to_owned());
        args
    }
}

impl FrameGrabber for FfmpegGrabber {
    async fn grab(&self, source: &str, dest: &Path) -> Result<(), GrabError> {
        let child = Command::new(&self.program)
            .args(self.args(source, dest))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(GrabError::Spawn)?;

        // On timeout the child is dropped and kill_on_drop reaps ffmpeg.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| GrabError::Timeout(self.timeout))?
            .map_err(GrabError::Spawn)?;

        if !output.status.success() {
            return Err(GrabError::Failed {
                status: output.status.to_string(),
                diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        match tokio::fs::metadata(dest).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(GrabError::NoOutput(dest.to_path_buf())),
        }
    }
}
