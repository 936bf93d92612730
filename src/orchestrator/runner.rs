//! The capture → upload → sleep loop.

use crate::capture::{CaptureFileNamer, CaptureOutcome, FfmpegGrabber, FrameCapturer, FrameGrabber};
use crate::config::{CameraConfig, ConfigError};
use crate::upload::{SnapshotUploader, UploadError, UploadResult};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Conditions that keep the loop from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot prepare uploader: {0}")]
    Upload(#[from] UploadError),
}

/// What happened during one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// A frame was captured and an upload attempted.
    Uploaded(UploadResult),
    /// The camera stayed busy; nothing was uploaded.
    Skipped { attempts: u32 },
    /// The capture tool failed.
    CaptureFailed(String),
    /// The captured file could not be read.
    ReadFailed(String),
}

/// Single-camera snapshot loop.
///
/// Cycles never overlap: capture completes before upload starts, upload
/// completes before the sleep starts, and the next capture waits for the
/// sleep. The interval is measured from the end of one cycle.
pub struct SnapshotLoop<G> {
    camera: String,
    source: String,
    capturer: FrameCapturer<G>,
    uploader: SnapshotUploader,
    namer: CaptureFileNamer,
    interval: Duration,
}

impl SnapshotLoop<FfmpegGrabber> {
    /// Builds the production loop, capturing with ffmpeg.
    pub fn from_config(config: &CameraConfig) -> Result<Self, StartupError> {
        Self::new(config, FfmpegGrabber::new(&config.capture))
    }
}

impl<G: FrameGrabber> SnapshotLoop<G> {
    /// Builds a loop around `grabber`.
    ///
    /// Fails if the credential token is missing or too short; the
    /// fingerprint is expected to be provisioned already.
    pub fn new(config: &CameraConfig, grabber: G) -> Result<Self, StartupError> {
        config.validate_token()?;
        let uploader = SnapshotUploader::from_config(config)?;

        Ok(Self {
            camera: config.name.clone(),
            source: config.video_source.clone(),
            capturer: FrameCapturer::new(grabber, &config.capture),
            uploader,
            namer: CaptureFileNamer::new(config.capture.temp_dir()),
            interval: config.snapshot_interval(),
        })
    }

    /// Overrides the sleep between cycles.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs one capture and, if a frame was captured, one upload.
    ///
    /// Every failure is logged here and returned as a report.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let file = self.namer.next_file();

        match self.capturer.capture(&self.source, file.path()).await {
            CaptureOutcome::Success { attempts } => {
                tracing::debug!(camera = %self.camera, attempts, "Captured snapshot");
            }
            CaptureOutcome::Skipped { attempts } => {
                tracing::warn!(
                    camera = %self.camera,
                    attempts,
                    "Camera busy on every attempt, skipping this cycle"
                );
                return CycleReport::Skipped { attempts };
            }
            CaptureOutcome::Fatal(reason) => {
                tracing::error!(
                    camera = %self.camera,
                    source = %self.source,
                    error = %reason,
                    "Failed to capture image from camera"
                );
                return CycleReport::CaptureFailed(reason);
            }
        }

        match self.uploader.upload_file(file).await {
            Ok(result) => CycleReport::Uploaded(result),
            Err(e) => {
                tracing::error!(camera = %self.camera, error = %e, "Failed to read captured snapshot");
                CycleReport::ReadFailed(e.to_string())
            }
        }
    }

    /// Runs cycles until `shutdown` turns true or its sender is dropped.
    ///
    /// Returns the number of cycles completed.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        tracing::info!(
            camera = %self.camera,
            source = %self.source,
            interval = ?self.interval,
            "Starting snapshot loop"
        );

        let mut cycles = 0u64;
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = self.run_cycle() => cycles += 1,
                _ = shutdown_requested(&mut shutdown) => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        tracing::info!(camera = %self.camera, cycles, "Snapshot loop stopped");
        cycles
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A closed channel can never deliver a stop request; treat it as one.
    let _ = shutdown.wait_for(|&stop| stop).await;
}
