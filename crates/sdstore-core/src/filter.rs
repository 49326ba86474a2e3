//! Filter kinds and the immutable filter catalogue (C1).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One of the seven external transformation programs a pipeline can chain.
///
/// Exactly these seven kinds exist; there is no way to construct a kind
/// outside this set, and `FromStr` rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FilterKind {
    Nop,
    BCompress,
    BDecompress,
    GCompress,
    GDecompress,
    Encrypt,
    Decrypt,
}

impl FilterKind {
    /// All seven kinds, in catalogue order. Status output iterates this order.
    pub const ALL: [FilterKind; 7] = [
        FilterKind::Nop,
        FilterKind::BCompress,
        FilterKind::BDecompress,
        FilterKind::GCompress,
        FilterKind::GDecompress,
        FilterKind::Encrypt,
        FilterKind::Decrypt,
    ];

    /// Dense index into a 7-slot array, used by `SlotDemand` and the ledger
    /// to avoid hashing on the admission hot path.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            FilterKind::Nop => 0,
            FilterKind::BCompress => 1,
            FilterKind::BDecompress => 2,
            FilterKind::GCompress => 3,
            FilterKind::GDecompress => 4,
            FilterKind::Encrypt => 5,
            FilterKind::Decrypt => 6,
        }
    }

    /// The canonical name used in the budget config file, the filter
    /// directory, and client-facing frames.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            FilterKind::Nop => "nop",
            FilterKind::BCompress => "bcompress",
            FilterKind::BDecompress => "bdecompress",
            FilterKind::GCompress => "gcompress",
            FilterKind::GDecompress => "gdecompress",
            FilterKind::Encrypt => "encrypt",
            FilterKind::Decrypt => "decrypt",
        }
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for FilterKind {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| UnknownFilter(s.to_string()))
    }
}

/// Submitted filter name did not match any of the seven known kinds.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown filter: {0}")]
pub struct UnknownFilter(pub String);

/// Catalogue entry for one filter kind: where its executable lives and how
/// many instances of it may run concurrently across the whole daemon.
#[derive(Debug, Clone)]
pub struct FilterCatalogueEntry {
    pub kind: FilterKind,
    pub executable_path: PathBuf,
    pub max_concurrent: usize,
}

/// Immutable, daemon-lifetime mapping from [`FilterKind`] to its catalogue
/// entry. Once built, freely shareable (wrap in `Arc` at the call site).
#[derive(Debug, Clone)]
pub struct FilterCatalogue {
    entries: [FilterCatalogueEntry; 7],
}

/// Catalogue construction failed: caller did not supply exactly the seven
/// required kinds, or supplied a zero budget for one of them.
#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error("missing filter kind in catalogue: {0}")]
    MissingKind(FilterKind),
    #[error("duplicate entry for filter kind: {0}")]
    DuplicateKind(FilterKind),
    #[error("filter '{0}' must allow at least one concurrent instance")]
    ZeroBudget(FilterKind),
}

impl FilterCatalogue {
    /// Builds the catalogue from a set of entries, one per `FilterKind`.
    ///
    /// Fails if any of the seven kinds is missing, duplicated, or given a
    /// zero budget. Does not touch the filesystem; callers resolve
    /// executable paths and budgets (from the config file and filter
    /// directory) before calling this.
    pub fn new(entries: Vec<FilterCatalogueEntry>) -> Result<Self, CatalogueError> {
        let mut slots: [Option<FilterCatalogueEntry>; 7] = Default::default();
        for entry in entries {
            let idx = entry.kind.index();
            if entry.max_concurrent == 0 {
                return Err(CatalogueError::ZeroBudget(entry.kind));
            }
            if slots[idx].is_some() {
                return Err(CatalogueError::DuplicateKind(entry.kind));
            }
            slots[idx] = Some(entry);
        }

        let mut filled = Vec::with_capacity(7);
        for (idx, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(entry) => filled.push(entry),
                None => return Err(CatalogueError::MissingKind(FilterKind::ALL[idx])),
            }
        }

        Ok(Self {
            entries: filled
                .try_into()
                .unwrap_or_else(|_| unreachable!("exactly 7 slots filled above")),
        })
    }

    /// Pure lookup by kind. Every kind is guaranteed present post-construction.
    #[must_use]
    pub fn entry(&self, kind: FilterKind) -> &FilterCatalogueEntry {
        &self.entries[kind.index()]
    }

    /// Maximum concurrent instances allowed for `kind`.
    #[must_use]
    pub fn max_concurrent(&self, kind: FilterKind) -> usize {
        self.entry(kind).max_concurrent
    }

    /// Iterates all entries in catalogue order (`FilterKind::ALL`).
    pub fn iter(&self) -> impl Iterator<Item = &FilterCatalogueEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: FilterKind, max: usize) -> FilterCatalogueEntry {
        FilterCatalogueEntry {
            kind,
            executable_path: PathBuf::from(format!("/bin/{kind}")),
            max_concurrent: max,
        }
    }

    fn full_entries() -> Vec<FilterCatalogueEntry> {
        FilterKind::ALL.into_iter().map(|k| entry(k, 2)).collect()
    }

    #[test]
    fn filter_kind_round_trips_through_display_and_from_str() {
        for kind in FilterKind::ALL {
            let parsed: FilterKind = kind.name().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn unknown_filter_name_is_rejected() {
        assert!("rot13".parse::<FilterKind>().is_err());
    }

    #[test]
    fn catalogue_requires_all_seven_kinds() {
        let mut entries = full_entries();
        entries.pop();
        assert!(matches!(
            FilterCatalogue::new(entries),
            Err(CatalogueError::MissingKind(_))
        ));
    }

    #[test]
    fn catalogue_rejects_duplicates() {
        let mut entries = full_entries();
        entries.push(entry(FilterKind::Nop, 3));
        assert!(matches!(
            FilterCatalogue::new(entries),
            Err(CatalogueError::DuplicateKind(FilterKind::Nop))
        ));
    }

    #[test]
    fn catalogue_rejects_zero_budget() {
        let mut entries = full_entries();
        entries[0].max_concurrent = 0;
        assert!(matches!(
            FilterCatalogue::new(entries),
            Err(CatalogueError::ZeroBudget(_))
        ));
    }

    #[test]
    fn catalogue_lookup_returns_configured_budget() {
        let catalogue = FilterCatalogue::new(full_entries()).unwrap();
        assert_eq!(catalogue.max_concurrent(FilterKind::Encrypt), 2);
    }
}
