//! Seed set loading
//!
//! Reads the PaperId column of the input dataset and turns it into an
//! ordered, deduplicated seed list.

use crate::errors::RunError;
use snowball_common::PaperId;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Column holding the service identifiers
pub const PAPER_ID_COLUMN: &str = "PaperId";

/// Placeholder values spreadsheets leave behind for empty cells
const BLANK_MARKERS: &[&str] = &["nan", "none", "null", "n/a"];

/// Load the seed set from a CSV dataset
pub fn load_seed_ids(path: &Path) -> Result<Vec<PaperId>, RunError> {
    if !path.exists() {
        return Err(RunError::input(path, "file not found"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| RunError::input(path, e))?;

    let headers = reader.headers().map_err(|e| RunError::input(path, e))?.clone();
    let column = find_column(&headers, PAPER_ID_COLUMN)
        .ok_or_else(|| RunError::input(path, format!("missing {} column", PAPER_ID_COLUMN)))?;

    let mut raw = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| RunError::input(path, e))?;
        if let Some(value) = record.get(column) {
            raw.push(value.to_string());
        }
    }

    let seeds = normalize_seed_ids(raw);
    info!(path = %path.display(), seeds = seeds.len(), "Loaded seed papers");
    Ok(seeds)
}

/// Trim, drop blanks and placeholder values, and dedupe keeping first occurrence
pub fn normalize_seed_ids<I, S>(ids: I) -> Vec<PaperId>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut seeds = Vec::new();

    for id in ids {
        let id = id.as_ref().trim();
        if id.is_empty() || is_blank_marker(id) {
            continue;
        }
        if seen.insert(id.to_string()) {
            seeds.push(id.to_string());
        } else {
            debug!(paper_id = id, "Dropping duplicate seed");
        }
    }

    seeds
}

fn is_blank_marker(value: &str) -> bool {
    BLANK_MARKERS.iter().any(|m| value.eq_ignore_ascii_case(m))
}

/// Header index by exact name, then case-insensitively
pub(crate) fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .or_else(|| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_normalize_preserves_first_occurrence_order() {
        let seeds = normalize_seed_ids(["  b ", "a", "b", "", "NaN", "c", "a", "null"]);
        assert_eq!(seeds, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_load_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papers_with_ids.csv");
        fs::write(
            &path,
            "Title,Year,DOI,PaperId,LookupStatus\n\
             One,2020,10.1/a,p1,ok\n\
             Two,2021,,,not-found\n\
             Three,2019,,nan,error\n\
             Four,2018,10.1/d, p1 ,ok\n\
             Five,2017,10.1/e,p2,ok\n",
        )
        .unwrap();

        let seeds = load_seed_ids(&path).unwrap();
        assert_eq!(seeds, vec!["p1", "p2"]);
    }

    #[test]
    fn test_case_insensitive_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.csv");
        fs::write(&path, "paperid\nx\ny\n").unwrap();
        assert_eq!(load_seed_ids(&path).unwrap(), vec!["x", "y"]);
    }

    #[test]
    fn test_missing_column_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.csv");
        fs::write(&path, "Title\nsomething\n").unwrap();
        let err = load_seed_ids(&path).unwrap_err();
        assert!(matches!(err, RunError::Input { .. }));
        assert!(err.to_string().contains("PaperId"));
    }

    #[test]
    fn test_missing_file_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_seed_ids(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, RunError::Input { .. }));
    }
}
