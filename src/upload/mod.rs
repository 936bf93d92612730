//! Snapshot upload to the remote camera endpoint.
//!
//! Each snapshot is sent as one authenticated PUT of the raw JPEG bytes.
//! The response is reduced to an [`UploadOutcome`]; no failure escapes
//! as an error once the request has been attempted.

mod client;
mod outcome;

pub use client::{SnapshotUploader, UploadError};
pub use outcome::{interpret_response, UploadOutcome, UploadResult};
