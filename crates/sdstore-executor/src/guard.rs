//! RAII release of a job's ledger slots.

use sdstore_core::SlotDemand;
use sdstore_worker::BudgetLedger;

/// Releases `demand`'s slots back to `ledger` when dropped. Constructed
/// immediately after a successful `try_reserve`, so every exit path out of
/// a runner task — normal completion, failure, or cancellation — discharges
/// the release obligation exactly once, even if the task panics.
pub struct ReleaseGuard {
    ledger: BudgetLedger,
    demand: SlotDemand,
}

impl ReleaseGuard {
    #[must_use]
    pub fn new(ledger: BudgetLedger, demand: SlotDemand) -> Self {
        Self { ledger, demand }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.ledger.release(&self.demand);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdstore_core::{FilterCatalogue, FilterCatalogueEntry, FilterKind};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn catalogue(max: usize) -> FilterCatalogue {
        let entries = FilterKind::ALL
            .into_iter()
            .map(|kind| FilterCatalogueEntry {
                kind,
                executable_path: PathBuf::from(format!("/bin/{kind}")),
                max_concurrent: max,
            })
            .collect();
        FilterCatalogue::new(entries).unwrap()
    }

    #[test]
    fn dropping_the_guard_releases_the_slots() {
        let ledger = BudgetLedger::new(Arc::new(catalogue(1)));
        let demand = SlotDemand::from_pipeline(&[FilterKind::Nop]);
        assert!(ledger.try_reserve(&demand));

        {
            let _guard = ReleaseGuard::new(ledger.clone(), demand);
            assert!(!ledger.try_reserve(&demand));
        }

        assert!(ledger.try_reserve(&demand));
    }
}
