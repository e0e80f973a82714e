use std::sync::Arc;

/// What a store publishes to its subscribers.
#[derive(Debug, Clone)]
pub struct StoreState<T> {
    pub data: T,

    /// True until the first reconciliation settles, successfully or not.
    pub loading: bool,

    /// Last fetch-level failure; cleared by the next successful reconciliation.
    pub error: Option<Arc<anyhow::Error>>,
}

impl<T: Default> Default for StoreState<T> {
    fn default() -> Self {
        Self {
            data: T::default(),
            loading: true,
            error: None,
        }
    }
}

impl<T> StoreState<T> {
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}
