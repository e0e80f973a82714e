use anyhow::Result;
use async_trait::async_trait;

use crate::types::RecordId;
use crate::types::order::RawOrder;
use crate::types::table::RawTable;

#[async_trait]
pub trait OrdersSource: Send + Sync {
    async fn fetch_orders(&self) -> Result<Vec<RawOrder>>;
}

#[async_trait]
pub trait TablesSource: Send + Sync {
    async fn fetch_tables(&self) -> Result<Vec<RawTable>>;

    async fn fetch_table_orders(&self, table_id: RecordId) -> Result<Vec<RawOrder>>;
}
