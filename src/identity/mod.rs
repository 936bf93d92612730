//! Installation identity.
//!
//! The remote service tells camera sources apart by a fingerprint that
//! is distinct from the credential token. This module makes sure one
//! exists before the snapshot loop starts.

mod fingerprint;

pub use fingerprint::{
    ensure_fingerprint, generate_random_fingerprint, is_header_safe, is_valid_fingerprint,
    FingerprintGenerator, FingerprintStore, StoreError, GENERATED_FINGERPRINT_LEN,
    MIN_FINGERPRINT_LEN,
};
