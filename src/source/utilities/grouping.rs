//! Deterministic grouping helpers shared by aggregate views.
//!
//! Groups are emitted in first-seen order so that, for a fixed input order,
//! every derived view is reproducible without an extra sort.

use indexmap::IndexMap;
use std::hash::Hash;

/// Partition `items` by `group_key`, keeping groups and members in first-seen order.
///
/// Items for which `group_key` returns `None` are dropped.
pub fn group_by_first_seen<'a, T, K, F>(items: &'a [T], group_key: F) -> IndexMap<K, Vec<&'a T>>
where
    K: Hash + Eq,
    F: Fn(&T) -> Option<K>,
{
    let mut groups: IndexMap<K, Vec<&'a T>> = IndexMap::new();
    for item in items {
        if let Some(key) = group_key(item) {
            groups.entry(key).or_default().push(item);
        }
    }
    groups
}

/// Select the item with the largest value per group.
///
/// Ties keep the first-seen item: a later item only replaces the leader when
/// its value is strictly greater. Items for which either closure returns
/// `None` are skipped, as are NaN values.
pub fn argmax_per_group<'a, T, K, FKey, FValue>(
    items: impl IntoIterator<Item = &'a T>,
    group_key: FKey,
    value: FValue,
) -> IndexMap<K, (&'a T, f64)>
where
    T: 'a,
    K: Hash + Eq,
    FKey: Fn(&T) -> Option<K>,
    FValue: Fn(&T) -> Option<f64>,
{
    let mut leaders: IndexMap<K, (&'a T, f64)> = IndexMap::new();
    for item in items {
        let (Some(key), Some(candidate)) = (group_key(item), value(item)) else {
            continue;
        };
        if candidate.is_nan() {
            continue;
        }
        match leaders.get_mut(&key) {
            Some(leader) => {
                if candidate > leader.1 {
                    *leader = (item, candidate);
                }
            }
            None => {
                leaders.insert(key, (item, candidate));
            }
        }
    }
    leaders
}
