//! Single-writer, many-reader cells for values the host edits between ticks

use std::sync::Arc;

use arc_swap::ArcSwap;

/// Lock-free cell: readers take a cheap snapshot, writers replace the value whole
pub struct LiveCell<T> {
    inner: ArcSwap<T>,
}

impl<T> LiveCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(value),
        }
    }

    /// Current value; later stores do not affect the returned snapshot
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    pub fn store(&self, value: T) {
        self.inner.store(Arc::new(value));
    }

    /// Replace the value with an edited copy of the current one
    pub fn update(&self, edit: impl Fn(&mut T))
    where
        T: Clone,
    {
        self.inner.rcu(|current| {
            let mut next = T::clone(current);
            edit(&mut next);
            next
        });
    }
}

impl<T: Default> Default for LiveCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for LiveCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LiveCell").field(&*self.inner.load()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_stable() {
        let cell = LiveCell::new(vec![1, 2, 3]);
        let snapshot = cell.load();
        cell.update(|v| v.push(4));
        assert_eq!(*snapshot, vec![1, 2, 3]);
        assert_eq!(*cell.load(), vec![1, 2, 3, 4]);
    }
}
