use crate::types::RecordId;
use crate::types::order::Order;
use crate::types::table::Table;

/// Field-level equality used to decide whether a fetch is worth republishing.
/// Fields outside a policy may change freely without producing a new snapshot.
pub trait WatchPolicy<T> {
    fn key(&self, record: &T) -> RecordId;

    /// True when every watched field of `next` matches `previous`.
    fn same(&self, next: &T, previous: &T) -> bool;
}

/// Orders list: customer phone, notes, loyalty points and the rest are not
/// watched, so editing them alone never re-renders the orders board.
pub struct OrderFields;

impl WatchPolicy<Order> for OrderFields {
    fn key(&self, record: &Order) -> RecordId {
        record.id
    }

    fn same(&self, next: &Order, previous: &Order) -> bool {
        next.status == previous.status
            && next.total_amount == previous.total_amount
            && next.item_count() == previous.item_count()
            && next.updated_at == previous.updated_at
            && next.qr_session_id == previous.qr_session_id
            && next.session_status == previous.session_status
    }
}

pub struct TableFields;

impl WatchPolicy<Table> for TableFields {
    fn key(&self, record: &Table) -> RecordId {
        record.id
    }

    fn same(&self, next: &Table, previous: &Table) -> bool {
        next.table_number == previous.table_number
            && next.is_active == previous.is_active
            && next.qr_code_url == previous.qr_code_url
    }
}

/// Orders shown per table on the floor view.
pub struct TableOrderFields;

impl WatchPolicy<Order> for TableOrderFields {
    fn key(&self, record: &Order) -> RecordId {
        record.id
    }

    fn same(&self, next: &Order, previous: &Order) -> bool {
        next.status == previous.status
            && next.total_amount == previous.total_amount
            && next.item_count() == previous.item_count()
    }
}
