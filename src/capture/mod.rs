//! Frame capture from the local video device.
//!
//! One frame per loop iteration is pulled into a temporary file by an
//! external capture tool. Busy devices are retried with a fixed delay;
//! other failures are reported immediately.

mod capturer;
mod file;
mod grabber;

pub use capturer::{AttemptOutcome, CaptureAttempt, CaptureOutcome, FrameCapturer};
pub use file::{CaptureFile, CaptureFileNamer};
pub use grabber::{is_busy_diagnostic, FfmpegGrabber, FrameGrabber, GrabError};
