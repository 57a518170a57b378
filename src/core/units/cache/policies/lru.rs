//! Least Recently Used (LRU) Replacement Policy.
//!
//! Each set keeps a usage stack of its ways: index 0 is the most recently
//! used way, the last index the least recently used one and therefore the
//! next victim.

use super::ReplacementPolicy;

/// LRU Policy state.
#[derive(Clone, Debug)]
pub struct LruPolicy {
    /// One usage stack per set, MRU first.
    usage: Vec<Vec<usize>>,
}

impl LruPolicy {
    /// Creates a new LRU policy instance.
    ///
    /// # Arguments
    ///
    /// * `sets` - The number of sets in the cache.
    /// * `ways` - The associativity (number of ways) of the cache.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            usage: (0..sets).map(|_| (0..ways).collect()).collect(),
        }
    }
}

impl ReplacementPolicy for LruPolicy {
    /// Moves `way` to the MRU position of its set.
    fn update(&mut self, set: usize, way: usize) {
        let stack = &mut self.usage[set];
        if let Some(pos) = stack.iter().position(|&x| x == way) {
            stack.remove(pos);
        }
        stack.insert(0, way);
    }

    /// Returns the way at the LRU position of the set.
    fn get_victim(&mut self, set: usize) -> usize {
        self.usage[set].last().copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used_way() {
        let mut lru = LruPolicy::new(1, 4);
        for way in [0, 1, 2, 3, 0, 2] {
            lru.update(0, way);
        }
        assert_eq!(lru.get_victim(0), 1);
        lru.update(0, 1);
        assert_eq!(lru.get_victim(0), 3);
    }

    #[test]
    fn sets_are_independent() {
        let mut lru = LruPolicy::new(2, 2);
        lru.update(0, 0);
        lru.update(1, 1);
        assert_eq!(lru.get_victim(0), 1);
        assert_eq!(lru.get_victim(1), 0);
    }
}
