//! Digest functions.

use aws_lc_rs::digest as lc_digest;

use crate::algorithm::DigestAlgorithm;

/// Computes a digest of the input data.
#[must_use]
pub fn digest(algorithm: DigestAlgorithm, data: &[u8]) -> Vec<u8> {
    let alg = match algorithm {
        DigestAlgorithm::Sha256 => &lc_digest::SHA256,
        DigestAlgorithm::Sha384 => &lc_digest::SHA384,
        DigestAlgorithm::Sha512 => &lc_digest::SHA512,
    };

    lc_digest::digest(alg, data).as_ref().to_vec()
}

/// Computes a SHA-256 digest of the input data.
#[must_use]
pub fn sha256(data: &[u8]) -> Vec<u8> {
    digest(DigestAlgorithm::Sha256, data)
}

/// Computes a SHA-384 digest of the input data.
#[must_use]
pub fn sha384(data: &[u8]) -> Vec<u8> {
    digest(DigestAlgorithm::Sha384, data)
}

/// Computes a SHA-512 digest of the input data.
#[must_use]
pub fn sha512(data: &[u8]) -> Vec<u8> {
    digest(DigestAlgorithm::Sha512, data)
}

/// Compares two digests in constant time.
#[must_use]
pub fn digests_equal(a: &[u8], b: &[u8]) -> bool {
    aws_lc_rs::constant_time::verify_slices_are_equal(a, b).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digests_have_expected_lengths() {
        assert_eq!(sha256(b"test").len(), DigestAlgorithm::Sha256.output_len());
        assert_eq!(sha384(b"test").len(), DigestAlgorithm::Sha384.output_len());
        assert_eq!(sha512(b"test").len(), DigestAlgorithm::Sha512.output_len());
    }

    #[test]
    fn different_inputs_produce_different_digests() {
        assert_ne!(sha256(b"hello"), sha256(b"world"));
        assert_eq!(sha256(b"hello"), sha256(b"hello"));
    }

    #[test]
    fn constant_time_compare() {
        let a = sha256(b"x");
        assert!(digests_equal(&a, &sha256(b"x")));
        assert!(!digests_equal(&a, &sha256(b"y")));
        assert!(!digests_equal(&a, &a[..16]));
    }
}
