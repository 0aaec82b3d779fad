//! A monotonic, reusable integer-handle allocator built on top of [`crate::Key`].
//!
//! [`TinyMap`](crate::TinyMap) only ever grows: it has no notion of releasing a slot and handing
//! its index back out again. The object model needs exactly that (every handle scope in the
//! RTI's data model — federations, federates, connects, classes, attributes, instances, regions —
//! is released and reissued over the life of a server), so `HandleAllocator` layers a free-list on
//! top of the same "index is the handle" idea `TinyMap` uses.

use std::collections::BinaryHeap;

use crate::Key;

/// Allocates and releases handles of type `K` within a single scope (e.g. "object instance
/// handles for this federation", "connect handles for this node").
///
/// `allocate()` always returns the smallest currently-free handle, reusing a released one in
/// preference to growing the scope. `allocate_specific(h)` lets a caller claim a particular value
/// (used when the root hands down a handle it already minted), failing if that value is live.
#[derive(Debug, Clone)]
pub struct HandleAllocator<K: Key> {
    /// One past the largest handle index ever issued.
    high_water: usize,
    /// Released handle indices below `high_water`, smallest first.
    free: BinaryHeap<std::cmp::Reverse<usize>>,
    /// Tracks which indices under `high_water` are currently live, to reject double-release and
    /// duplicate `allocate_specific` calls.
    live: Vec<bool>,
    _k: std::marker::PhantomData<K>,
}

impl<K: Key> Default for HandleAllocator<K> {
    fn default() -> Self {
        Self {
            high_water: 0,
            free: BinaryHeap::new(),
            live: Vec::new(),
            _k: std::marker::PhantomData,
        }
    }
}

impl<K: Key> HandleAllocator<K> {
    /// Creates an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of handles currently live.
    pub fn len(&self) -> usize {
        self.live.iter().filter(|live| **live).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `handle` is currently allocated.
    pub fn is_live(&self, handle: K) -> bool {
        self.live.get(handle.index()).copied().unwrap_or(false)
    }

    /// Allocates the smallest free handle, reusing a released one if available.
    pub fn allocate(&mut self) -> K {
        if let Some(std::cmp::Reverse(index)) = self.free.pop() {
            self.live[index] = true;
            K::from(index)
        } else {
            let index = self.high_water;
            self.high_water += 1;
            self.live.push(true);
            K::from(index)
        }
    }

    /// Allocates a caller-chosen handle. Fails if that handle is already live.
    pub fn allocate_specific(&mut self, handle: K) -> Result<(), HandleInUse> {
        let index = handle.index();
        if index < self.high_water {
            if self.live[index] {
                return Err(HandleInUse);
            }
            // The requested index was previously released; remove it from the free-list lazily
            // by marking it live now and letting `allocate()` skip stale entries on pop.
            self.live[index] = true;
            self.free.retain(|std::cmp::Reverse(i)| *i != index);
        } else {
            self.live.resize(index + 1, false);
            for gap in self.high_water..index {
                self.free.push(std::cmp::Reverse(gap));
            }
            self.live[index] = true;
            self.high_water = index + 1;
        }
        Ok(())
    }

    /// Releases `handle`, making its index available for reuse. Releasing a handle that is not
    /// live is a programmer error in the caller (the model is expected to drain every referent of
    /// a handle before releasing it) and is ignored rather than panicking, since the allocator
    /// itself cannot tell whether that invariant was honored.
    pub fn release(&mut self, handle: K) {
        let index = handle.index();
        if self.live.get(index).copied().unwrap_or(false) {
            self.live[index] = false;
            self.free.push(std::cmp::Reverse(index));
        }
    }
}

/// Returned by [`HandleAllocator::allocate_specific`] when the requested handle is already live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("handle is already in use")]
pub struct HandleInUse;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DefaultKey;

    #[test]
    fn reuses_smallest_released_handle() {
        let mut alloc = HandleAllocator::<DefaultKey>::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let c = alloc.allocate();
        assert_eq!([a.index(), b.index(), c.index()], [0, 1, 2]);

        alloc.release(b);
        let d = alloc.allocate();
        assert_eq!(d.index(), 1);
        assert!(alloc.is_live(a));
        assert!(!alloc.is_live(DefaultKey::from(5)));
    }

    #[test]
    fn allocate_specific_rejects_live_handle() {
        let mut alloc = HandleAllocator::<DefaultKey>::new();
        let a = alloc.allocate();
        assert_eq!(alloc.allocate_specific(a), Err(HandleInUse));

        let far = DefaultKey::from(10);
        alloc.allocate_specific(far).unwrap();
        assert!(alloc.is_live(far));
        // Gaps between the previous high-water mark and `far` became free handles.
        let next = alloc.allocate();
        assert_eq!(next.index(), 1);
    }

    #[test]
    fn release_then_reallocate_keeps_scope_bijective() {
        let mut alloc = HandleAllocator::<DefaultKey>::new();
        let handles: Vec<_> = (0..4).map(|_| alloc.allocate()).collect();
        for h in &handles {
            alloc.release(*h);
        }
        assert_eq!(alloc.len(), 0);
        let reused = alloc.allocate();
        assert_eq!(reused.index(), 0);
    }
}
