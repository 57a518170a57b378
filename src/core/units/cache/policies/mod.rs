//! Cache Replacement Policies.

/// Least-recently-used replacement.
pub mod lru;

pub use lru::LruPolicy;

/// Trait for set-associative replacement policies.
pub trait ReplacementPolicy {
    /// Records an access to `way` of `set`.
    fn update(&mut self, set: usize, way: usize);

    /// Selects the way of `set` to evict.
    fn get_victim(&mut self, set: usize) -> usize;
}
