//! In-memory system-of-record behind the same store traits as Postgres

use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct Rows<T> {
    pub rows: BTreeMap<i64, T>,
    next_id: i64,
}

impl<T> Rows<T> {
    /// Next identity value (1-based, never reused)
    pub fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Table guarded by one lock; each store operation takes it once so checks
/// and writes are atomic
#[derive(Debug)]
pub struct MemoryTable<T> {
    inner: Mutex<Rows<T>>,
}

impl<T> MemoryTable<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Rows {
                rows: BTreeMap::new(),
                next_id: 0,
            }),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Rows<T>> {
        self.inner.lock()
    }
}

impl<T> Default for MemoryTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_not_reused() {
        let table = MemoryTable::<&str>::new();
        let mut rows = table.lock();
        let first = rows.allocate_id();
        rows.rows.insert(first, "a");
        rows.rows.remove(&first);
        assert_eq!(rows.allocate_id(), first + 1);
    }
}
