//! Startup configuration: parsing the budget file and discovering filter
//! executables, producing the immutable `FilterCatalogue` the rest of the
//! daemon runs against.

use std::path::{Path, PathBuf};

use sdstore_core::{CatalogueError, FilterCatalogue, FilterCatalogueEntry, FilterKind};

/// Everything that can go wrong while building the catalogue at startup.
/// All of these are fatal: the daemon refuses to start.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read budget file {path}: {source}")]
    BudgetFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed budget line {line_no} in {path}: {line:?}")]
    MalformedLine {
        path: PathBuf,
        line_no: usize,
        line: String,
    },

    #[error("unknown filter name {0:?} in budget file")]
    UnknownFilterName(String),

    #[error("budget value on line {line_no} must be a positive integer: {value:?}")]
    InvalidBudgetValue { line_no: usize, value: String },

    #[error("filter directory {dir} has no executable for {kind} (expected {path})")]
    MissingExecutable {
        dir: PathBuf,
        kind: FilterKind,
        path: PathBuf,
    },

    #[error(transparent)]
    Catalogue(#[from] CatalogueError),
}

/// Parses the budget file at `config_path` and resolves each filter kind's
/// executable under `filter_dir`, producing a ready-to-use catalogue.
///
/// Budget file format: line-oriented UTF-8, one `<filter-name>
/// <positive-integer>` pair per non-empty, non-comment (`#`-prefixed)
/// line, whitespace-separated. All seven kinds are required; duplicates
/// are rejected by `FilterCatalogue::new`.
pub fn load_catalogue(config_path: &Path, filter_dir: &Path) -> Result<FilterCatalogue, ConfigError> {
    let text = std::fs::read_to_string(config_path).map_err(|source| {
        ConfigError::BudgetFileUnreadable {
            path: config_path.to_path_buf(),
            source,
        }
    })?;

    let mut entries = Vec::with_capacity(7);
    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ConfigError::MalformedLine {
                path: config_path.to_path_buf(),
                line_no,
                line: line.to_string(),
            });
        };

        let kind: FilterKind = name
            .parse()
            .map_err(|_| ConfigError::UnknownFilterName(name.to_string()))?;
        let max_concurrent: usize = value
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ConfigError::InvalidBudgetValue {
                line_no,
                value: value.to_string(),
            })?;

        let executable_path = filter_dir.join(kind.name());
        if !executable_path.is_file() {
            return Err(ConfigError::MissingExecutable {
                dir: filter_dir.to_path_buf(),
                kind,
                path: executable_path,
            });
        }

        entries.push(FilterCatalogueEntry {
            kind,
            executable_path,
            max_concurrent,
        });
    }

    Ok(FilterCatalogue::new(entries)?)
}
