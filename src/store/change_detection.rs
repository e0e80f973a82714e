use std::collections::HashMap;

use crate::store::tables_store::TableOrders;
use crate::store::watch_policy::{TableOrderFields, WatchPolicy};

/// Differs when there is no baseline, the record count changed, a record key is
/// new, or a watched field changed on a record present in both.
pub fn has_changed<T, P>(policy: &P, next: &[T], baseline: Option<&[T]>) -> bool
where
    P: WatchPolicy<T>,
{
    let Some(baseline) = baseline else {
        return true;
    };

    if next.len() != baseline.len() {
        return true;
    }

    let mut previous_by_key = HashMap::with_capacity(baseline.len());
    for record in baseline {
        previous_by_key.entry(policy.key(record)).or_insert(record);
    }

    next.iter()
        .any(|record| match previous_by_key.get(&policy.key(record)) {
            None => true,
            Some(previous) => !policy.same(record, previous),
        })
}

pub fn table_orders_changed(next: &TableOrders, baseline: Option<&TableOrders>) -> bool {
    let Some(baseline) = baseline else {
        return true;
    };

    if next.len() != baseline.len() {
        return true;
    }

    next.iter().any(|(table_id, orders)| {
        let previous = baseline
            .get(table_id)
            .map(|snapshot| snapshot.records())
            .unwrap_or(&[]);

        has_changed(&TableOrderFields, orders, Some(previous))
    })
}
