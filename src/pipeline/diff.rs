//! Diff calculation for new-record detection.
//!
//! Computes the difference between the identity keys of the just-fetched
//! dataset and the checkpointed known set, then narrows the full record
//! sequence down to the new subset for notification dispatch. Both
//! functions are pure and total — no I/O, no failure modes.

use std::collections::HashSet;

use crate::models::Violation;

/// Identity keys present in `current` but absent from `known`.
pub fn detect_new(current: &HashSet<String>, known: &HashSet<String>) -> HashSet<String> {
    current.difference(known).cloned().collect()
}

/// Filter the full record sequence down to the new subset, preserving
/// source order.
pub fn filter_new(records: &[Violation], new_ids: &HashSet<String>) -> Vec<Violation> {
    records
        .iter()
        .filter(|v| new_ids.contains(&v.id_poursuite))
        .cloned()
        .collect()
}
