pub mod amount;
pub mod coerce;
pub mod date_range;
pub mod order;
pub mod table;

pub type RecordId = i64;
