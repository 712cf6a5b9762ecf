//! Map types shared by the reconciler and the runtimes.
//!
//! `hashbrown` keyed by `ahash` by default; the `std-hash` feature swaps in
//! the standard library containers.

#[cfg(feature = "std-hash")]
pub mod map {
    pub type HashMap<K, V> = std::collections::HashMap<K, V>;

    #[inline]
    pub fn new<K, V>() -> HashMap<K, V> {
        HashMap::new()
    }

    #[inline]
    pub fn with_capacity<K, V>(capacity: usize) -> HashMap<K, V> {
        HashMap::with_capacity(capacity)
    }
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub type HashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

    #[inline]
    pub fn new<K, V>() -> HashMap<K, V> {
        HashMap::with_hasher(ahash::RandomState::new())
    }

    #[inline]
    pub fn with_capacity<K, V>(capacity: usize) -> HashMap<K, V> {
        HashMap::with_capacity_and_hasher(capacity, ahash::RandomState::new())
    }
}
