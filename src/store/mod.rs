pub mod change_detection;
pub mod orders_store;
pub mod polled_store;
pub mod snapshot;
pub mod source;
pub mod store_state;
pub mod tables_store;
pub mod watch_policy;
