//! Stock-delta inference: approximate units sold from visit snapshots.
//!
//! The ledger records per-visit counters, not sell-through events, so the
//! "units that left a machine" statistic is reconstructed by replaying the
//! visits newest-first and carrying an inferred pre-stock value backwards.
//! The result is a display-only approximation; it never feeds back into
//! ledger or commission state.

use crate::domain::TimeMs;

/// Dispense/restock counters of one visit for a (product, machine) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub collected_at: TimeMs,
    pub dispensed: i64,
    pub restocked: i64,
}

/// Infer the units-sold statistic for one (product, machine) pair.
///
/// Entries are walked in reverse chronological order. The newest entry has
/// no known boundary stock, so its inferred value is seeded as
/// `restocked - dispensed`; each older entry then carries
/// `previous + dispensed - restocked` forward. The reported delta is the
/// absolute difference between the first and last inferred values.
///
/// Fewer than two entries yield `None`: a single visit has nothing to
/// compare against. Gaps in the visit sequence are not detected.
pub fn infer_units_sold(entries: &[LedgerEntry]) -> Option<i64> {
    if entries.len() < 2 {
        return None;
    }

    let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
    ordered.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));

    let newest = ordered[0];
    let first = newest.restocked - newest.dispensed;
    let mut carry = first;
    for entry in &ordered[1..] {
        carry = carry + entry.dispensed - entry.restocked;
    }

    Some((first - carry).abs())
}
