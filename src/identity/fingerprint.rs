//! Fingerprint generation and provisioning.
//!
//! The fingerprint travels verbatim in an HTTP header, so every value
//! produced here is restricted to the base64url alphabet.

use crate::config::CameraConfig;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand_chacha::ChaCha20Rng;
use rand_core::{OsRng, RngCore, SeedableRng};
use thiserror::Error;

/// Minimum accepted fingerprint length, in characters.
pub const MIN_FINGERPRINT_LEN: usize = 20;

/// Length of a fingerprint produced by [`FingerprintGenerator`].
pub const GENERATED_FINGERPRINT_LEN: usize = 32;

/// Namespace mixed into every generated fingerprint.
const FINGERPRINT_PREFIX: &str = "prusa-connect-cam-";

/// Key derivation context for generated fingerprints.
const FINGERPRINT_CONTEXT: &str = "prusa-connect-cam 2024 fingerprint v1";

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const RANDOM_COMPONENT_LEN: usize = 16;

/// Random bytes behind a fingerprint from [`generate_random_fingerprint`].
const RANDOM_FINGERPRINT_BYTES: usize = 18;

/// Errors raised while persisting a fingerprint.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read config document: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to write config document: {0}")]
    Write(#[source] std::io::Error),
    #[error("config document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config document has no platforms list")]
    MissingPlatforms,
    #[error("no platform entry named {0:?} in config document")]
    PlatformNotFound(String),
}

/// Durable storage for a generated fingerprint.
pub trait FingerprintStore {
    /// Writes the fingerprint so it survives a restart.
    fn persist_fingerprint(&self, fingerprint: &str) -> Result<(), StoreError>;
}

/// Returns true if `value` can be sent as-is in an HTTP header.
///
/// Accepts the same bytes as an HTTP field value: visible ASCII, space
/// and horizontal tab. Control characters, line breaks, DEL and
/// non-ASCII are rejected.
pub fn is_header_safe(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_graphic() || b == b' ' || b == b'\t')
}

/// Returns true if `value` is usable as a fingerprint.
pub fn is_valid_fingerprint(value: &str) -> bool {
    value.chars().count() >= MIN_FINGERPRINT_LEN && is_header_safe(value)
}

/// Generator for installation fingerprints.
///
/// A fingerprint is derived with BLAKE3 from a fixed namespace, a random
/// alphanumeric component and the current time, then base64url encoded.
pub struct FingerprintGenerator {
    rng: ChaCha20Rng,
}

impl FingerprintGenerator {
    /// Creates a generator seeded from the OS entropy source.
    pub fn from_os_entropy() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self {
            rng: ChaCha20Rng::from_seed(seed),
        }
    }

    /// Creates a generator from a known seed (for testing only).
    #[cfg(test)]
    pub(crate) fn from_seed_for_testing(seed: [u8; 32]) -> Self {
        Self {
            rng: ChaCha20Rng::from_seed(seed),
        }
    }

    /// Produces a new fingerprint of [`GENERATED_FINGERPRINT_LEN`] characters.
    pub fn generate(&mut self) -> String {
        self.generate_at(chrono::Utc::now().timestamp_millis())
    }

    fn generate_at(&mut self, timestamp_ms: i64) -> String {
        let material = format!(
            "{}{}{}",
            FINGERPRINT_PREFIX,
            self.random_alphanumeric(RANDOM_COMPONENT_LEN),
            timestamp_ms
        );
        let derived = blake3::derive_key(FINGERPRINT_CONTEXT, material.as_bytes());
        let mut encoded = URL_SAFE_NO_PAD.encode(derived);
        encoded.truncate(GENERATED_FINGERPRINT_LEN);
        encoded
    }

    fn random_alphanumeric(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| {
                let idx = self.rng.next_u32() as usize % ALPHANUMERIC.len();
                ALPHANUMERIC[idx] as char
            })
            .collect()
    }
}

/// Generates a fresh random fingerprint without touching any stored
/// configuration.
///
/// Backs the "generate fingerprint" action of companion tooling: 18 OS
/// random bytes encoded base64url without padding (24 characters).
pub fn generate_random_fingerprint() -> String {
    let mut bytes = [0u8; RANDOM_FINGERPRINT_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Makes sure `config` carries a valid fingerprint.
///
/// An absent or invalid fingerprint is replaced with a generated one,
/// which is then persisted through `store`. Persistence is best-effort:
/// a failure is logged and the generated value is still used for the
/// lifetime of this process.
pub fn ensure_fingerprint(config: &mut CameraConfig, store: &impl FingerprintStore) -> String {
    if let Some(existing) = config.fingerprint.as_deref() {
        if is_valid_fingerprint(existing) {
            return existing.to_string();
        }
    }

    let fingerprint = FingerprintGenerator::from_os_entropy().generate();
    tracing::warn!(
        camera = %config.name,
        fingerprint = %fingerprint,
        "No valid fingerprint configured, generated a new one"
    );

    match store.persist_fingerprint(&fingerprint) {
        Ok(()) => {
            tracing::info!(camera = %config.name, "Persisted generated fingerprint");
        }
        Err(e) => {
            tracing::error!(
                camera = %config.name,
                error = %e,
                "Could not persist generated fingerprint; it will be lost on restart"
            );
        }
    }

    config.fingerprint = Some(fingerprint.clone());
    fingerprint
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingStore {
        written: RefCell<Vec<String>>,
    }

    impl FingerprintStore for RecordingStore {
        fn persist_fingerprint(&self, fingerprint: &str) -> Result<(), StoreError> {
            self.written.borrow_mut().push(fingerprint.to_string());
            Ok(())
        }
    }

    struct FailingStore;

    impl FingerprintStore for FailingStore {
        fn persist_fingerprint(&self, _fingerprint: &str) -> Result<(), StoreError> {
            Err(StoreError::MissingPlatforms)
        }
    }

    fn config_with(fingerprint: Option<&str>) -> CameraConfig {
        let mut config = CameraConfig::with_token("abcdefghijklmnopqrstuvwxyz");
        config.fingerprint = fingerprint.map(str::to_string);
        config
    }

    #[test]
    fn test_valid_fingerprint_kept() {
        let store = RecordingStore::default();
        let mut config = config_with(Some("an-existing-fingerprint-value"));

        let fp = ensure_fingerprint(&mut config, &store);

        assert_eq!(fp, "an-existing-fingerprint-value");
        assert!(store.written.borrow().is_empty());
    }

    #[test]
    fn test_missing_fingerprint_generated_and_persisted() {
        let store = RecordingStore::default();
        let mut config = config_with(None);

        let fp = ensure_fingerprint(&mut config, &store);

        assert!(is_valid_fingerprint(&fp));
        assert_eq!(config.fingerprint.as_deref(), Some(fp.as_str()));
        assert_eq!(store.written.borrow().as_slice(), &[fp]);
    }

    #[test]
    fn test_fingerprint_with_spaces_kept() {
        let store = RecordingStore::default();
        let mut config = config_with(Some("my printer cam fingerprint 01"));

        let fp = ensure_fingerprint(&mut config, &store);

        assert_eq!(fp, "my printer cam fingerprint 01");
        assert_eq!(config.fingerprint(), "my printer cam fingerprint 01");
        assert!(store.written.borrow().is_empty());
    }

    #[test]
    fn test_control_character_fingerprint_replaced() {
        let store = RecordingStore::default();
        let mut config = config_with(Some("line\nbreak-in-fingerprint-01"));

        let fp = ensure_fingerprint(&mut config, &store);

        assert_ne!(fp, "line\nbreak-in-fingerprint-01");
        assert!(is_valid_fingerprint(&fp));
        assert_eq!(store.written.borrow().as_slice(), &[fp]);
    }

    #[test]
    fn test_header_safety_matches_http_field_values() {
        for value in ["plain-token", "with space", "with\ttab", "~!@#$%^&*()"] {
            assert!(is_header_safe(value), "{value:?}");
            assert!(reqwest::header::HeaderValue::from_str(value).is_ok());
        }
        for value in ["line\nbreak", "carriage\rreturn", "nul\0byte", "del\x7f", "caf\u{e9}"] {
            assert!(!is_header_safe(value), "{value:?}");
            assert!(reqwest::header::HeaderValue::from_str(value).is_err());
        }
    }

    #[test]
    fn test_persist_failure_still_returns_fingerprint() {
        let mut config = config_with(Some("short"));

        let fp = ensure_fingerprint(&mut config, &FailingStore);

        assert!(is_valid_fingerprint(&fp));
        assert_eq!(config.fingerprint(), fp);
    }

    #[test]
    fn test_generator_deterministic_with_seed() {
        let mut a = FingerprintGenerator::from_seed_for_testing([7u8; 32]);
        let mut b = FingerprintGenerator::from_seed_for_testing([7u8; 32]);
        assert_eq!(a.generate_at(1_700_000_000_000), b.generate_at(1_700_000_000_000));
        assert_ne!(a.generate_at(1), a.generate_at(1));
    }

    #[test]
    fn test_random_fingerprint_shape() {
        let fp = generate_random_fingerprint();
        assert_eq!(fp.len(), 24);
        assert!(is_valid_fingerprint(&fp));
        assert!(!fp.contains('='));
        assert!(!fp.contains('+'));
        assert!(!fp.contains('/'));
        assert_ne!(fp, generate_random_fingerprint());
    }

    proptest! {
        #[test]
        fn prop_short_fingerprints_replaced_with_header_safe(input in "\\PC{0,19}") {
            let store = RecordingStore::default();
            let mut config = config_with(Some(input.as_str()));

            let fp = ensure_fingerprint(&mut config, &store);

            prop_assert!(fp.chars().count() >= MIN_FINGERPRINT_LEN);
            prop_assert!(fp
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }

        #[test]
        fn prop_generated_is_header_safe(seed in any::<[u8; 32]>(), ts in any::<i64>()) {
            let fp = FingerprintGenerator::from_seed_for_testing(seed).generate_at(ts);
            prop_assert_eq!(fp.len(), GENERATED_FINGERPRINT_LEN);
            prop_assert!(fp
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }

        #[test]
        fn prop_long_printable_fingerprints_kept(input in "[ -~]{20,48}") {
            let store = RecordingStore::default();
            let mut config = config_with(Some(input.as_str()));

            let fp = ensure_fingerprint(&mut config, &store);

            prop_assert_eq!(fp, input);
            prop_assert!(store.written.borrow().is_empty());
        }
    }
}
