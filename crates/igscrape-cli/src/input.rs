//! CSV input loading.
//!
//! Each data row becomes a header-keyed map; classification into requests
//! happens in [`RequestQueue::from_records`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use igscrape_core::RequestQueue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("input file not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Reads every row of `path` as a map from trimmed header to trimmed value.
///
/// Rows shorter than the header simply lack the missing columns; empty cells
/// are kept as empty strings.
///
/// # Errors
///
/// Returns [`InputError::Missing`] if the file does not exist and
/// [`InputError::Csv`] if it cannot be opened or a row is not valid CSV.
pub(crate) fn read_records(path: &Path) -> Result<Vec<BTreeMap<String, String>>, InputError> {
    if !path.is_file() {
        return Err(InputError::Missing {
            path: path.to_path_buf(),
        });
    }
    let csv_err = |source| InputError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_owned())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_owned()))
            .collect();
        rows.push(row);
    }
    tracing::info!(rows = rows.len(), path = %path.display(), "loaded input rows");
    Ok(rows)
}

/// Loads `path` and classifies its rows into a request queue.
///
/// # Errors
///
/// Propagates [`read_records`] failures. Unusable rows are dropped with a
/// warning, not reported as errors.
pub(crate) fn load_queue(path: &Path, post_limit: usize) -> Result<RequestQueue, InputError> {
    let rows = read_records(path)?;
    let queue = RequestQueue::from_records(rows, post_limit);
    if queue.dropped() > 0 {
        tracing::warn!(dropped = queue.dropped(), "input rows without a usable identifier");
    }
    Ok(queue)
}
