use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Immutable, shared sequence of normalized records. Cloning shares the same
/// allocation, so two publishes can be compared by identity with [`Snapshot::ptr_eq`].
pub struct Snapshot<T>(Arc<[T]>);

impl<T> Snapshot<T> {
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn records(&self) -> &[T] {
        &self.0
    }
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self(Arc::from(Vec::new()))
    }
}

impl<T> From<Vec<T>> for Snapshot<T> {
    fn from(records: Vec<T>) -> Self {
        Self(Arc::from(records))
    }
}

impl<T> Deref for Snapshot<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}
