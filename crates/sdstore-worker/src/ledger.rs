//! Budget ledger (C2): atomic reservation and release of filter-kind
//! concurrency slots.

use std::sync::Arc;

use parking_lot::Mutex;

use sdstore_core::{FilterCatalogue, FilterKind, SlotDemand};

/// Per-filter-kind running counts, checked and updated atomically against
/// the catalogue's maxima.
///
/// `try_reserve` commits a job's whole multiset of slots or none of them:
/// a job never holds some of its slots while waiting on the rest, which is
/// what keeps two jobs from deadlocking each other over disjoint kinds.
#[derive(Debug, Clone)]
pub struct BudgetLedger {
    catalogue: Arc<FilterCatalogue>,
    // The whole 7-slot array is behind one lock so a reservation check-and-
    // commit is a single atomic step; striping per kind would let two
    // concurrent reservations interleave into an observable overcommit.
    running: Arc<Mutex<[usize; 7]>>,
}

/// One row of a ledger snapshot, in catalogue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerRow {
    pub kind: FilterKind,
    pub running: usize,
    pub max: usize,
}

impl BudgetLedger {
    #[must_use]
    pub fn new(catalogue: Arc<FilterCatalogue>) -> Self {
        Self {
            catalogue,
            running: Arc::new(Mutex::new([0; 7])),
        }
    }

    /// Atomically reserves `demand`'s slots if every kind has enough
    /// remaining budget, otherwise leaves the ledger untouched.
    #[must_use]
    pub fn try_reserve(&self, demand: &SlotDemand) -> bool {
        let mut running = self.running.lock();
        let fits = FilterKind::ALL.into_iter().all(|k| {
            running[k.index()] + demand.get(k) <= self.catalogue.max_concurrent(k)
        });
        if fits {
            for kind in FilterKind::ALL {
                running[kind.index()] += demand.get(kind);
            }
        }
        fits
    }

    /// Releases `demand`'s slots back to the ledger.
    ///
    /// # Panics
    ///
    /// Panics if releasing would drive a count negative. That can only
    /// happen from a bug in the caller's accounting (releasing demand that
    /// was never reserved, or releasing twice); a ledger invariant
    /// violation is a programming fault, not a recoverable error.
    pub fn release(&self, demand: &SlotDemand) {
        let mut running = self.running.lock();
        for kind in FilterKind::ALL {
            let count = demand.get(kind);
            let current = running[kind.index()];
            assert!(
                current >= count,
                "ledger underflow releasing {kind}: running={current}, releasing={count}"
            );
            running[kind.index()] = current - count;
        }
    }

    /// A consistent snapshot of running/max per kind, in catalogue order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LedgerRow> {
        let running = self.running.lock();
        FilterKind::ALL
            .into_iter()
            .map(|kind| LedgerRow {
                kind,
                running: running[kind.index()],
                max: self.catalogue.max_concurrent(kind),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdstore_core::FilterCatalogueEntry;
    use std::path::PathBuf;

    fn ledger(max: usize) -> BudgetLedger {
        let entries = FilterKind::ALL
            .into_iter()
            .map(|kind| FilterCatalogueEntry {
                kind,
                executable_path: PathBuf::from(format!("/bin/{kind}")),
                max_concurrent: max,
            })
            .collect();
        BudgetLedger::new(Arc::new(FilterCatalogue::new(entries).unwrap()))
    }

    #[test]
    fn reserve_succeeds_within_budget_and_fails_over_budget() {
        let ledger = ledger(2);
        let demand = SlotDemand::from_pipeline(&[FilterKind::Nop, FilterKind::Nop]);
        assert!(ledger.try_reserve(&demand));
        assert!(!ledger.try_reserve(&demand)); // would bring nop to 4 > 2
    }

    #[test]
    fn release_returns_slots_to_the_pool() {
        let ledger = ledger(1);
        let demand = SlotDemand::from_pipeline(&[FilterKind::Nop]);
        assert!(ledger.try_reserve(&demand));
        assert!(!ledger.try_reserve(&demand));
        ledger.release(&demand);
        assert!(ledger.try_reserve(&demand));
    }

    #[test]
    fn reservation_is_all_or_nothing_across_kinds() {
        let ledger = ledger(1);
        // First job takes the only bcompress slot.
        let d1 = SlotDemand::from_pipeline(&[FilterKind::BCompress]);
        assert!(ledger.try_reserve(&d1));

        // Second job wants one gcompress (free) and one bcompress (taken):
        // must reserve neither.
        let d2 = SlotDemand::from_pipeline(&[FilterKind::GCompress, FilterKind::BCompress]);
        assert!(!ledger.try_reserve(&d2));

        let snapshot = ledger.snapshot();
        let gcompress = snapshot
            .iter()
            .find(|row| row.kind == FilterKind::GCompress)
            .unwrap();
        assert_eq!(gcompress.running, 0, "partial admission must not occur");
    }

    #[test]
    #[should_panic(expected = "ledger underflow")]
    fn double_release_is_a_fatal_programming_fault() {
        let ledger = ledger(1);
        let demand = SlotDemand::from_pipeline(&[FilterKind::Nop]);
        ledger.try_reserve(&demand);
        ledger.release(&demand);
        ledger.release(&demand);
    }

    #[test]
    fn snapshot_reflects_current_running_counts() {
        let ledger = ledger(3);
        let demand = SlotDemand::from_pipeline(&[FilterKind::Decrypt, FilterKind::Decrypt]);
        ledger.try_reserve(&demand);

        let row = ledger
            .snapshot()
            .into_iter()
            .find(|r| r.kind == FilterKind::Decrypt)
            .unwrap();
        assert_eq!(row.running, 2);
        assert_eq!(row.max, 3);
    }
}
