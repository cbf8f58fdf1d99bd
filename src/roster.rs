//! Roster loading.
//!
//! The roster is a CSV file with one row per subject. Only the `SID`
//! column is read; any other participant columns are ignored.

use crate::error::ConfigError;
use crate::models::ID_COLUMN;
use csv::ReaderBuilder;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Load subject ids from a roster file, in file order.
pub fn load_roster(path: &Path) -> Result<Vec<String>, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::MissingRoster(path.to_path_buf()));
    }

    let file = std::fs::File::open(path).map_err(|e| ConfigError::MalformedRoster {
        path: path.to_path_buf(),
        source: e.into(),
    })?;

    read_roster(file, path)
}

/// Read subject ids from any CSV reader. `path` is only used in errors.
pub fn read_roster<R: Read>(reader: R, path: &Path) -> Result<Vec<String>, ConfigError> {
    let malformed = |source: csv::Error| ConfigError::MalformedRoster {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let id_index = reader
        .headers()
        .map_err(malformed)?
        .iter()
        .position(|h| h.trim() == ID_COLUMN)
        .ok_or_else(|| ConfigError::MissingIdColumn {
            path: path.to_path_buf(),
            column: ID_COLUMN,
        })?;

    let mut subjects = Vec::new();

    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(malformed)?;
        let sid = record.get(id_index).unwrap_or("").trim();

        if sid.is_empty() {
            warn!("Skipping roster row {} with blank {}", line + 1, ID_COLUMN);
            continue;
        }

        subjects.push(sid.to_string());
    }

    for sid in duplicates(&subjects) {
        warn!("Duplicate subject {} in roster", sid);
    }

    debug!("Loaded {} subjects from {}", subjects.len(), path.display());
    Ok(subjects)
}

/// Ids that occur more than once, each listed once in first-repeat order.
fn duplicates(subjects: &[String]) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    let mut reported = BTreeSet::new();

    subjects
        .iter()
        .map(String::as_str)
        .filter(|sid| !seen.insert(*sid) && reported.insert(*sid))
        .collect()
}
