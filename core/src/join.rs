//! Grouping and left-join accumulation.
//!
//! Each rollup computes its intermediate aggregates independently, one
//! keyed frame per aggregate, then folds them onto a base frame here.
//!
//! RULES:
//!   - The base frame fixes the key set of the result. Joined frames
//!     never add rows, they only fill in columns of existing rows.
//!   - A row starts zeroed. A key absent from a joined frame keeps the
//!     zero values for that frame's columns (fill-zero).
//!   - Rows come out in ascending key order, never input order.

use std::{cmp::Ordering, collections::BTreeMap};

/// Partition `rows` by `key`. Every row lands in exactly one group.
pub fn group_by<'a, K, T, I, F>(rows: I, mut key: F) -> BTreeMap<K, Vec<&'a T>>
where
    K: Ord,
    T: 'a,
    I: IntoIterator<Item = &'a T>,
    F: FnMut(&T) -> K,
{
    let mut groups: BTreeMap<K, Vec<&T>> = BTreeMap::new();
    for row in rows {
        groups.entry(key(row)).or_default().push(row);
    }
    groups
}

/// `group_by`, then sort every group with `order`.
///
/// Float sums depend on summation order, so rollups that add up amounts
/// group this way to stay independent of input row order.
pub fn group_by_sorted<'a, K, T, I, F, C>(rows: I, key: F, mut order: C) -> BTreeMap<K, Vec<&'a T>>
where
    K: Ord,
    T: 'a,
    I: IntoIterator<Item = &'a T>,
    F: FnMut(&T) -> K,
    C: FnMut(&T, &T) -> Ordering,
{
    let mut groups = group_by(rows, key);
    for rows in groups.values_mut() {
        rows.sort_by(|a, b| order(*a, *b));
    }
    groups
}

/// Builder that folds keyed frames onto a base frame by left join.
pub struct LeftJoin<K, R> {
    rows: BTreeMap<K, R>,
}

impl<K: Ord + Clone, R> LeftJoin<K, R> {
    /// Seed one output row per key of the base frame.
    pub fn new<B>(base: &BTreeMap<K, B>, mut seed: impl FnMut(&K, &B) -> R) -> Self {
        let rows = base
            .iter()
            .map(|(key, part)| (key.clone(), seed(key, part)))
            .collect();
        Self { rows }
    }

    /// Left-join `frame` on key. `apply` runs only for matched keys.
    pub fn join<T>(mut self, name: &str, frame: &BTreeMap<K, T>, mut apply: impl FnMut(&mut R, &T)) -> Self {
        let mut matched = 0usize;
        for (key, row) in self.rows.iter_mut() {
            if let Some(part) = frame.get(key) {
                apply(row, part);
                matched += 1;
            }
        }
        log::trace!(
            "join {name}: matched {matched}/{} rows ({} frame keys)",
            self.rows.len(),
            frame.len(),
        );
        self
    }

    /// Finish the fold. Rows are returned in ascending key order.
    pub fn finish(self) -> Vec<R> {
        self.rows.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_by_partitions_every_row() {
        let rows = vec![(3, 'a'), (1, 'b'), (3, 'c'), (2, 'd'), (1, 'e')];
        let groups = group_by(&rows, |r| r.0);
        let total: usize = groups.values().map(Vec::len).sum();
        assert_eq!(total, rows.len());
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(groups[&3].len(), 2);
    }

    #[test]
    fn sorted_groups_ignore_input_order() {
        let rows = vec![(1, 3.5), (2, 1.0), (1, -2.0), (1, 0.25)];
        let mut reversed = rows.clone();
        reversed.reverse();

        let order = |a: &(i32, f64), b: &(i32, f64)| a.1.total_cmp(&b.1);
        let a = group_by_sorted(&rows, |r| r.0, order);
        let b = group_by_sorted(&reversed, |r| r.0, order);
        assert_eq!(a, b);
        assert_eq!(a[&1], vec![&(1, -2.0), &(1, 0.25), &(1, 3.5)]);
    }

    #[test]
    fn unmatched_keys_keep_zero_values() {
        let base: BTreeMap<i64, u64> = [(1, 10), (2, 20), (3, 30)].into();
        let extra: BTreeMap<i64, f64> = [(2, 0.5), (99, 9.0)].into();

        let rows = LeftJoin::new(&base, |k, n| (*k, *n, 0.0))
            .join("extra", &extra, |row, v| row.2 = *v)
            .finish();

        assert_eq!(rows, vec![(1, 10, 0.0), (2, 20, 0.5), (3, 30, 0.0)]);
    }
}
