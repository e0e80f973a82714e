use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::polling::poll_task::PollTask;
use crate::store::change_detection::{has_changed, table_orders_changed};
use crate::store::polled_store::RecordsFailures;
use crate::store::snapshot::Snapshot;
use crate::store::source::TablesSource;
use crate::store::store_state::StoreState;
use crate::store::watch_policy::TableFields;
use crate::types::RecordId;
use crate::types::order::Order;
use crate::types::table::Table;

pub type TableOrders = BTreeMap<RecordId, Snapshot<Order>>;

/// Tables plus the orders currently attached to each of them. The two halves
/// are compared and replaced independently.
#[derive(Debug, Clone, Default)]
pub struct FloorView {
    pub tables: Snapshot<Table>,
    pub orders_by_table: Arc<TableOrders>,
}

impl FloorView {
    pub fn orders_for(&self, table_id: RecordId) -> &[Order] {
        self.orders_by_table
            .get(&table_id)
            .map(|orders| orders.records())
            .unwrap_or(&[])
    }
}

pub type TablesState = StoreState<FloorView>;

#[derive(Default)]
struct Baseline {
    tables: Option<Snapshot<Table>>,
    orders: Option<Arc<TableOrders>>,
}

pub struct TablesStore {
    source: Arc<dyn TablesSource>,
    baseline: Mutex<Baseline>,
    state: watch::Sender<TablesState>,
}

impl TablesStore {
    pub fn new(source: Arc<dyn TablesSource>) -> Self {
        let (state, _) = watch::channel(TablesState::default());

        Self {
            source,
            baseline: Mutex::new(Baseline::default()),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TablesState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> TablesState {
        self.state.borrow().clone()
    }

    pub async fn fetch_and_reconcile(&self) {
        let raw_tables = match self.source.fetch_tables().await {
            Ok(raw_tables) => raw_tables,
            Err(error) => {
                warn!("failed to fetch tables: {error:#}");
                self.record_failure(error);
                return;
            }
        };

        let tables: Vec<Table> = raw_tables.into_iter().map(Table::from).collect();
        let orders_by_table = self.fetch_orders_by_table(&tables).await;

        self.publish(tables, orders_by_table);
    }

    /// Refetches one table's orders and splices them into the current map.
    /// Failures are logged only; the published view is left as it was.
    pub async fn refresh_table_orders(&self, table_id: RecordId) {
        let raw_orders = match self.source.fetch_table_orders(table_id).await {
            Ok(raw_orders) => raw_orders,
            Err(error) => {
                warn!(table_id, "failed to refresh table orders: {error:#}");
                return;
            }
        };

        let orders: Vec<Order> = raw_orders.into_iter().map(Order::from).collect();

        let mut baseline = self.baseline.lock().unwrap_or_else(PoisonError::into_inner);

        let mut next = baseline.orders.as_deref().cloned().unwrap_or_default();
        next.insert(table_id, Snapshot::from(orders));

        if !table_orders_changed(&next, baseline.orders.as_deref()) {
            debug!(table_id, "table orders unchanged");
            return;
        }

        info!(table_id, "table orders refreshed");

        let next = Arc::new(next);
        baseline.orders = Some(Arc::clone(&next));
        self.state.send_modify(|state| {
            state.data.orders_by_table = next;
        });
    }

    async fn fetch_orders_by_table(&self, tables: &[Table]) -> TableOrders {
        let fetches = tables.iter().map(|table| async move {
            let orders = match self.source.fetch_table_orders(table.id).await {
                Ok(raw_orders) => raw_orders.into_iter().map(Order::from).collect(),
                Err(error) => {
                    warn!(table_id = table.id, "no orders for table, treating as empty: {error:#}");
                    Vec::new()
                }
            };

            (table.id, Snapshot::from(orders))
        });

        join_all(fetches).await.into_iter().collect()
    }

    /// Compares both halves with the baseline and publishes whichever changed.
    /// The send happens under the baseline lock so publications follow baseline order.
    fn publish(&self, tables: Vec<Table>, orders_by_table: TableOrders) {
        let mut baseline = self.baseline.lock().unwrap_or_else(PoisonError::into_inner);

        let tables = if has_changed(&TableFields, &tables, baseline.tables.as_deref()) {
            info!(count = tables.len(), "tables changed");

            let snapshot = Snapshot::from(tables);
            baseline.tables = Some(snapshot.clone());
            Some(snapshot)
        } else {
            None
        };

        let orders_by_table =
            if table_orders_changed(&orders_by_table, baseline.orders.as_deref()) {
                info!(tables = orders_by_table.len(), "table orders changed");

                let orders_by_table = Arc::new(orders_by_table);
                baseline.orders = Some(Arc::clone(&orders_by_table));
                Some(orders_by_table)
            } else {
                None
            };

        if tables.is_none() && orders_by_table.is_none() {
            debug!("tables and table orders unchanged");
        }

        self.state.send_if_modified(|state| {
            let mut modified = state.loading || state.error.is_some();

            if let Some(tables) = tables {
                state.data.tables = tables;
                modified = true;
            }
            if let Some(orders_by_table) = orders_by_table {
                state.data.orders_by_table = orders_by_table;
                modified = true;
            }

            state.loading = false;
            state.error = None;

            modified
        });
    }
}

impl RecordsFailures for TablesStore {
    /// Surfaces a failure to subscribers; the last good view stays published.
    fn record_failure(&self, error: anyhow::Error) {
        self.state.send_modify(|state| {
            state.loading = false;
            state.error = Some(Arc::new(error));
        });
    }
}

#[async_trait]
impl PollTask for TablesStore {
    fn name(&self) -> &'static str {
        "tables"
    }

    async fn run(&self) -> Result<()> {
        self.fetch_and_reconcile().await;

        Ok(())
    }
}
