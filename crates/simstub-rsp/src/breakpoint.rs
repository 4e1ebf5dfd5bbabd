//! Breakpoint bookkeeping for an RSP session.

use std::collections::HashMap;

/// Reference-counted set of breakpoint addresses.
///
/// A debugger may insert the same address more than once (for example a
/// software and a hardware breakpoint at one location); each insertion
/// must be matched by a removal before the address stops trapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakpointSet {
    counts: HashMap<u64, u32>,
}

impl BreakpointSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a breakpoint. Returns the new reference count for `address`.
    pub fn insert(&mut self, address: u64) -> u32 {
        let count = self.counts.entry(address).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Remove one reference to `address`.
    ///
    /// Returns `true` if a breakpoint was present.
    pub fn remove(&mut self, address: u64) -> bool {
        match self.counts.get_mut(&address) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.counts.remove(&address);
                true
            }
            None => false,
        }
    }

    /// Whether execution must stop before fetching from `address`.
    pub fn contains(&self, address: u64) -> bool {
        self.counts.contains_key(&address)
    }

    /// Reference count for `address`, zero when absent.
    pub fn count(&self, address: u64) -> u32 {
        self.counts.get(&address).copied().unwrap_or(0)
    }

    /// Number of distinct addresses.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no breakpoint is set.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Remove every breakpoint.
    pub fn clear(&mut self) {
        self.counts.clear();
    }

    /// Iterate over the distinct addresses, in no particular order.
    pub fn addresses(&self) -> impl Iterator<Item = u64> + '_ {
        self.counts.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoint_insert_and_contains() {
        let mut set = BreakpointSet::new();
        assert!(!set.contains(0x1000));
        assert_eq!(set.insert(0x1000), 1);
        assert!(set.contains(0x1000));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn breakpoint_duplicate_insert_is_counted() {
        let mut set = BreakpointSet::new();
        set.insert(0x40);
        assert_eq!(set.insert(0x40), 2);
        assert_eq!(set.len(), 1);

        assert!(set.remove(0x40));
        assert!(set.contains(0x40), "one reference remains");
        assert!(set.remove(0x40));
        assert!(!set.contains(0x40));
        assert!(set.is_empty());
    }

    #[test]
    fn breakpoint_remove_absent() {
        let mut set = BreakpointSet::new();
        assert!(!set.remove(0x999));
        assert_eq!(set.count(0x999), 0);
    }

    #[test]
    fn breakpoint_multiple_addresses() {
        let mut set = BreakpointSet::new();
        set.insert(1);
        set.insert(2);
        set.insert(3);
        let mut all: Vec<u64> = set.addresses().collect();
        all.sort_unstable();
        assert_eq!(all, vec![1, 2, 3]);

        set.clear();
        assert!(set.is_empty());
    }
}
