//! Order-preserving union of partial results across disjuncts.

use std::collections::HashSet;

use crate::storage::{QueryTimes, Record};

/// Returns all of `first` in order, then the elements of `second` not
/// already present, preserving `second`'s relative order. Presence is
/// record-value equality.
pub(crate) fn merge_records(first: Vec<Record>, second: Vec<Record>) -> Vec<Record> {
    let mut seen: HashSet<Record> = first.iter().cloned().collect();
    let mut merged = first;
    merged.reserve(second.len());
    for record in second {
        if seen.insert(record.clone()) {
            merged.push(record);
        }
    }
    merged
}

/// Folds `incoming` into `times`. On key collision the incoming entry
/// wins; engine stage keys are expected to be unique per call, so
/// callers must not rely on collision behavior.
pub(crate) fn merge_times(times: &mut QueryTimes, incoming: QueryTimes) {
    times.extend(incoming);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn rec(fields: &[&str]) -> Record {
        fields.iter().copied().collect()
    }

    #[test]
    fn test_merge_keeps_first_order_then_new() {
        let first = vec![rec(&["1"]), rec(&["2"])];
        let second = vec![rec(&["4"]), rec(&["2"]), rec(&["3"])];
        let merged = merge_records(first, second);
        assert_eq!(merged, vec![rec(&["1"]), rec(&["2"]), rec(&["4"]), rec(&["3"])]);
    }

    #[test]
    fn test_merge_collapses_equal_records() {
        let first = vec![rec(&["5", "a"])];
        let second = vec![rec(&["5", "a"]), rec(&["5", "a"])];
        let merged = merge_records(first, second);
        assert_eq!(merged, vec![rec(&["5", "a"])]);
    }

    #[test]
    fn test_merge_with_empty_sides() {
        assert_eq!(merge_records(Vec::new(), vec![rec(&["1"])]), vec![rec(&["1"])]);
        assert_eq!(merge_records(vec![rec(&["1"])], Vec::new()), vec![rec(&["1"])]);
    }

    #[test]
    fn test_merge_times_incoming_wins() {
        let mut times = QueryTimes::new();
        times.insert("search".to_string(), Duration::from_millis(1));
        let mut incoming = QueryTimes::new();
        incoming.insert("search".to_string(), Duration::from_millis(2));
        incoming.insert("scan".to_string(), Duration::from_millis(3));

        merge_times(&mut times, incoming);
        assert_eq!(times["search"], Duration::from_millis(2));
        assert_eq!(times["scan"], Duration::from_millis(3));
    }
}
