use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Errors from inserting into or looking up a [`Table`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    #[error("table has no free keys")]
    Full,
    #[error("key not in table")]
    NotPresent,
    #[error("element is a different type")]
    WrongType,
}

/// The `Table` type maps u32 handles to resources. It is reference counted so
/// that it can be shared beyond a `WasiCtx` with the embedder, which keeps
/// registering resources while the guest runs. Elements in the `Table` are
/// `Any` typed.
pub struct Table(RwLock<Inner>);

struct Inner {
    map: HashMap<u32, Arc<dyn Any + Send + Sync>>,
    next_key: u32,
    max_entries: Option<usize>,
}

impl Default for Table {
    fn default() -> Self {
        Table::new()
    }
}

impl Table {
    /// Create an empty table. New insertions will begin at 3, above stdio.
    pub fn new() -> Self {
        Table(RwLock::new(Inner {
            map: HashMap::new(),
            next_key: 3, // 0, 1 and 2 are reserved for stdio
            max_entries: None,
        }))
    }

    /// Create an empty table that refuses to grow past `max_entries`
    /// resources, stdio included.
    pub fn with_max_entries(max_entries: usize) -> Self {
        let table = Table::new();
        table.write().max_entries = Some(max_entries);
        table
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a resource at a certain index, replacing whatever was there.
    /// This is how stdio is installed and is not subject to the size limit.
    pub fn insert_at<T: Any + Send + Sync>(&self, key: u32, a: Arc<T>) {
        self.write().map.insert(key, a);
    }

    /// Insert a resource at the next available index.
    pub fn push<T: Any + Send + Sync>(&self, a: Arc<T>) -> Result<u32, TableError> {
        let mut inner = self.write();
        let limit = inner.max_entries.unwrap_or(u32::MAX as usize);
        if inner.map.len() >= limit {
            return Err(TableError::Full);
        }
        // NOTE: The performance of this new key calculation could be very bad once keys wrap
        // around.
        loop {
            let key = inner.next_key;
            inner.next_key = inner.next_key.wrapping_add(1).max(3);
            if inner.map.contains_key(&key) {
                continue;
            }
            inner.map.insert(key, a);
            return Ok(key);
        }
    }

    /// Check if the table has a resource at the given index.
    pub fn contains_key(&self, key: u32) -> bool {
        self.read().map.contains_key(&key)
    }

    /// Check if the resource at a given index can be downcast to a given type.
    pub fn is<T: Any + Sized>(&self, key: u32) -> bool {
        self.read().map.get(&key).is_some_and(|r| r.is::<T>())
    }

    /// Get an Arc reference to a resource of a given type at a given index.
    ///
    /// The lock is released before returning, so the resource stays usable
    /// even if it is deleted from the table meanwhile.
    pub fn get<T: Any + Send + Sync + Sized>(&self, key: u32) -> Result<Arc<T>, TableError> {
        let r = self
            .read()
            .map
            .get(&key)
            .cloned()
            .ok_or(TableError::NotPresent)?;
        r.downcast::<T>().map_err(|_| TableError::WrongType)
    }

    /// Remove a resource at a given index from the table. Returns the resource
    /// if it was present and of the given type.
    pub fn delete<T: Any + Send + Sync>(&self, key: u32) -> Option<Arc<T>> {
        let mut inner = self.write();
        if !inner.map.get(&key)?.is::<T>() {
            return None;
        }
        inner.map.remove(&key).and_then(|r| r.downcast::<T>().ok())
    }

    /// Number of resources currently in the table.
    pub fn len(&self) -> usize {
        self.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
