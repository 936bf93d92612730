//! Bounded busy-retry around a frame grabber.
//!
//! Camera devices are frequently held by another reader. A busy device
//! is retried a fixed number of times with a fixed delay; any other
//! failure ends the capture at once.

use super::grabber::{FrameGrabber, GrabError};
use crate::config::CaptureConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Result of a single capture tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The destination file holds one frame.
    Success,
    /// The device was busy; worth another try.
    TransientBusy,
    /// Anything else; not retried.
    Fatal(String),
}

/// One invocation of the capture tool.
#[derive(Debug, Clone)]
pub struct CaptureAttempt {
    /// File the tool was asked to write.
    pub target: PathBuf,
    /// 1-based attempt number within the current capture.
    pub number: u32,
    /// How the invocation ended.
    pub outcome: AttemptOutcome,
}

impl CaptureAttempt {
    fn classify(target: &Path, number: u32, result: Result<(), GrabError>) -> Self {
        let outcome = match result {
            Ok(()) => AttemptOutcome::Success,
            Err(e) if e.is_device_busy() => AttemptOutcome::TransientBusy,
            Err(e) => AttemptOutcome::Fatal(e.to_string()),
        };
        Self {
            target: target.to_path_buf(),
            number,
            outcome,
        }
    }
}

/// Final result of a capture, after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A frame was written after `attempts` invocations.
    Success { attempts: u32 },
    /// The device stayed busy for every attempt; nothing to upload.
    Skipped { attempts: u32 },
    /// The tool failed for a reason other than a busy device.
    Fatal(String),
}

/// Frame capturer with bounded busy-retry.
#[derive(Debug, Clone)]
pub struct FrameCapturer<G> {
    grabber: G,
    max_retries: u32,
    retry_delay: Duration,
}

impl<G: FrameGrabber> FrameCapturer<G> {
    /// Creates a capturer using the retry settings from `config`.
    pub fn new(grabber: G, config: &CaptureConfig) -> Self {
        Self::with_retry(grabber, config.max_retries, config.retry_delay())
    }

    /// Creates a capturer with explicit retry settings.
    pub fn with_retry(grabber: G, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            grabber,
            max_retries,
            retry_delay,
        }
    }

    /// Captures one frame from `source` into `dest`.
    ///
    /// Makes at most `1 + max_retries` attempts.
    pub async fn capture(&self, source: &str, dest: &Path) -> CaptureOutcome {
        let max_attempts = self.max_retries.saturating_add(1);
        let mut number = 0;

        loop {
            number += 1;
            let result = self.grabber.grab(source, dest).await;
            let attempt = CaptureAttempt::classify(dest, number, result);

            match attempt.outcome {
                AttemptOutcome::Success => {
                    tracing::debug!(attempt = attempt.number, path = %attempt.target.display(), "Frame captured");
                    return CaptureOutcome::Success { attempts: number };
                }
                AttemptOutcome::Fatal(reason) => {
                    return CaptureOutcome::Fatal(reason);
                }
                AttemptOutcome::TransientBusy if number >= max_attempts => {
                    return CaptureOutcome::Skipped { attempts: number };
                }
                AttemptOutcome::TransientBusy => {
                    tracing::info!(
                        attempt = number,
                        max_attempts,
                        delay = ?self.retry_delay,
                        "Camera busy, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}
