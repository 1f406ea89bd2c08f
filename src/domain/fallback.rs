use std::num::NonZeroUsize;

use sha2::{Digest, Sha256};

/// Stable 64-bit hash of a photo reference.
///
/// First eight bytes (big-endian) of the SHA-256 digest of the UTF-8 string.
/// Identical on every platform and across restarts.
pub fn stable_hash(reference: &str) -> u64 {
    let digest = Sha256::digest(reference.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Catalog position suggested for a photo when the backend is unavailable.
///
/// Always within `[0, catalog_len)`.
pub fn fallback_index(reference: &str, catalog_len: NonZeroUsize) -> usize {
    (stable_hash(reference) % catalog_len.get() as u64) as usize
}
