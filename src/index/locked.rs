use std::collections::BTreeMap;
use std::sync::RwLock;

use super::error::IndexError;
use super::traits::OrderedIndex;

/// A lock-based ordered index.
///
/// This is the trivial baseline the skip list is measured against: a
/// `BTreeMap` behind an `RwLock`, so readers share the lock and the writer
/// excludes everyone. All operations take `&self`, which makes the type easy
/// to share across threads but puts every reader on the lock's contention
/// path.
///
/// # Examples
///
/// ```
/// use memdex::LockedIndex;
///
/// let index: LockedIndex<String, u64> = LockedIndex::new();
/// index.upsert("a".to_string(), 1).unwrap();
/// index.upsert("a".to_string(), 2).unwrap();
/// assert_eq!(index.find(&"a".to_string()).unwrap(), Some(2));
/// assert_eq!(index.len().unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct LockedIndex<K, V> {
    data: RwLock<BTreeMap<K, V>>,
}

impl<K: Ord, V: Clone> LockedIndex<K, V> {
    pub fn new() -> Self {
        LockedIndex {
            data: RwLock::new(BTreeMap::new()),
        }
    }

    /// Inserts `key`, or replaces its value when already present.
    pub fn upsert(&self, key: K, value: V) -> Result<(), IndexError> {
        let mut guard = self.data.write().map_err(|_| IndexError::LockPoisoned)?;
        guard.insert(key, value);
        Ok(())
    }

    /// Retrieves the value currently bound to `key`.
    pub fn find(&self, key: &K) -> Result<Option<V>, IndexError> {
        let guard = self.data.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(guard.get(key).cloned())
    }

    /// Returns the number of distinct keys in the index.
    pub fn len(&self) -> Result<usize, IndexError> {
        let guard = self.data.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(guard.len())
    }

    /// Returns true if the index holds no keys.
    pub fn is_empty(&self) -> Result<bool, IndexError> {
        let guard = self.data.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(guard.is_empty())
    }
}

impl<K: Ord, V: Clone> Default for LockedIndex<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V: Clone> OrderedIndex<K, V> for LockedIndex<K, V> {
    fn upsert(&mut self, key: K, value: V) -> Result<(), IndexError> {
        LockedIndex::upsert(self, key, value)
    }

    fn find(&self, key: &K) -> Result<Option<V>, IndexError> {
        LockedIndex::find(self, key)
    }

    fn len(&self) -> Result<usize, IndexError> {
        LockedIndex::len(self)
    }

    fn is_empty(&self) -> Result<bool, IndexError> {
        LockedIndex::is_empty(self)
    }
}
