//! Slot demand: the concurrency cost of admitting a pipeline.

use crate::filter::{FilterCatalogue, FilterKind};

/// The multiset of filter occurrences in a pipeline — the number of
/// concurrency slots, per kind, that admitting the job would consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotDemand {
    counts: [usize; 7],
}

impl SlotDemand {
    /// Builds demand from an ordered, non-empty pipeline of filter kinds.
    #[must_use]
    pub fn from_pipeline(pipeline: &[FilterKind]) -> Self {
        let mut counts = [0usize; 7];
        for kind in pipeline {
            counts[kind.index()] += 1;
        }
        Self { counts }
    }

    /// Occurrences of `kind` in the pipeline this demand was built from.
    #[must_use]
    pub fn get(&self, kind: FilterKind) -> usize {
        self.counts[kind.index()]
    }

    /// True if this demand could never be satisfied even with the full
    /// catalogue budget free — i.e. some kind is demanded past its max.
    #[must_use]
    pub fn is_feasible(&self, catalogue: &FilterCatalogue) -> bool {
        FilterKind::ALL
            .into_iter()
            .all(|k| self.get(k) <= catalogue.max_concurrent(k))
    }

    /// Iterates `(kind, count)` pairs for kinds with non-zero demand.
    pub fn iter_nonzero(&self) -> impl Iterator<Item = (FilterKind, usize)> + '_ {
        FilterKind::ALL
            .into_iter()
            .filter(move |k| self.counts[k.index()] > 0)
            .map(move |k| (k, self.counts[k.index()]))
    }

    /// True if this demand shares at least one kind with `other`.
    #[must_use]
    pub fn intersects(&self, other: &SlotDemand) -> bool {
        FilterKind::ALL
            .into_iter()
            .any(|k| self.get(k) > 0 && other.get(k) > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterCatalogueEntry;
    use std::path::PathBuf;

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
    fn demand_counts_occurrences_per_kind() {
        let demand = SlotDemand::from_pipeline(&[
            FilterKind::BCompress,
            FilterKind::BDecompress,
            FilterKind::BCompress,
        ]);
        assert_eq!(demand.get(FilterKind::BCompress), 2);
        assert_eq!(demand.get(FilterKind::BDecompress), 1);
        assert_eq!(demand.get(FilterKind::Nop), 0);
    }

    #[test]
    fn demand_within_budget_is_feasible() {
        let demand = SlotDemand::from_pipeline(&[FilterKind::BCompress, FilterKind::BCompress]);
        assert!(demand.is_feasible(&catalogue(2)));
        assert!(!demand.is_feasible(&catalogue(1)));
    }

    #[test]
    fn disjoint_demands_do_not_intersect() {
        let a = SlotDemand::from_pipeline(&[FilterKind::BCompress]);
        let b = SlotDemand::from_pipeline(&[FilterKind::GCompress]);
        assert!(!a.intersects(&b));

        let c = SlotDemand::from_pipeline(&[FilterKind::BCompress, FilterKind::GCompress]);
        assert!(a.intersects(&c));
    }
}
