use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::polling::poll_task::PollTask;
use crate::store::change_detection::has_changed;
use crate::store::polled_store::RecordsFailures;
use crate::store::snapshot::Snapshot;
use crate::store::source::OrdersSource;
use crate::store::store_state::StoreState;
use crate::store::watch_policy::OrderFields;
use crate::types::order::Order;

pub type OrdersState = StoreState<Snapshot<Order>>;

pub struct OrdersStore {
    source: Arc<dyn OrdersSource>,
    baseline: Mutex<Option<Snapshot<Order>>>,
    state: watch::Sender<OrdersState>,
}

impl OrdersStore {
    pub fn new(source: Arc<dyn OrdersSource>) -> Self {
        let (state, _) = watch::channel(OrdersState::default());

        Self {
            source,
            baseline: Mutex::new(None),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<OrdersState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> OrdersState {
        self.state.borrow().clone()
    }

    pub async fn fetch_and_reconcile(&self) {
        let raw_orders = match self.source.fetch_orders().await {
            Ok(raw_orders) => raw_orders,
            Err(error) => {
                warn!("failed to fetch orders: {error:#}");
                self.record_failure(error);
                return;
            }
        };

        let orders: Vec<Order> = raw_orders.into_iter().map(Order::from).collect();
        self.publish(orders);
    }

    /// Swaps the baseline when the fetch differs from it and publishes. The send
    /// happens under the baseline lock so publications follow baseline order.
    fn publish(&self, orders: Vec<Order>) {
        let mut baseline = self.baseline.lock().unwrap_or_else(PoisonError::into_inner);

        let changed = if has_changed(&OrderFields, &orders, baseline.as_deref()) {
            info!(count = orders.len(), "orders changed");

            let snapshot = Snapshot::from(orders);
            *baseline = Some(snapshot.clone());
            Some(snapshot)
        } else {
            debug!(count = orders.len(), "orders unchanged");
            None
        };

        self.state.send_if_modified(|state| {
            let mut modified = state.loading || state.error.is_some();

            if let Some(snapshot) = changed {
                state.data = snapshot;
                modified = true;
            }

            state.loading = false;
            state.error = None;

            modified
        });
    }
}

impl RecordsFailures for OrdersStore {
    /// Surfaces a failure to subscribers; the last good data stays published.
    fn record_failure(&self, error: anyhow::Error) {
        self.state.send_modify(|state| {
            state.loading = false;
            state.error = Some(Arc::new(error));
        });
    }
}

#[async_trait]
impl PollTask for OrdersStore {
    fn name(&self) -> &'static str {
        "orders"
    }

    async fn run(&self) -> Result<()> {
        self.fetch_and_reconcile().await;

        Ok(())
    }
}
