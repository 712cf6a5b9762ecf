//! Fingerprints for effect dependencies.

use std::hash::{Hash, Hasher};

#[cfg(not(feature = "std-hash"))]
type FingerprintHasher = ahash::AHasher;

#[cfg(feature = "std-hash")]
type FingerprintHasher = std::collections::hash_map::DefaultHasher;

/// Fingerprint of one dependency value. Fixed hasher keys keep it stable
/// for the life of the process, so two renders agree on equal values.
#[inline]
pub fn hash_one<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = FingerprintHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::hash_one;

    #[test]
    fn equal_values_share_a_fingerprint() {
        assert_eq!(hash_one("title"), hash_one(&String::from("title")));
        assert_eq!(hash_one(&(1, 2)), hash_one(&(1, 2)));
        assert_ne!(hash_one(&1u32), hash_one(&2u32));
    }
}
