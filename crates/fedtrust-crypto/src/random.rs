//! Secure random values.
//!
//! Session keys and IVs come from aws-lc-rs; identifiers come from the
//! thread-local generator in `rand`, which is cryptographically secure.

use aws_lc_rs::rand::{SecureRandom, SystemRandom};
use rand::distr::{Alphanumeric, SampleString};

use crate::error::{CryptoError, CryptoResult};

/// Fills a new buffer of `len` bytes from the system generator.
///
/// # Errors
///
/// Returns `Encryption` if the system generator fails.
pub fn secure_bytes(len: usize) -> CryptoResult<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| CryptoError::Encryption("random generator failure".to_string()))?;
    Ok(bytes)
}

/// Generates a random alphanumeric string.
#[must_use]
pub fn random_alphanumeric(len: usize) -> String {
    Alphanumeric.sample_string(&mut rand::rng(), len)
}

/// Generates an XML `ID`-typed identifier.
///
/// XML IDs must not start with a digit, so the value is prefixed with `_`.
#[must_use]
pub fn generate_xml_id() -> String {
    format!("_{}", random_alphanumeric(40))
}
