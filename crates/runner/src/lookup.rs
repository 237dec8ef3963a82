//! Title to PaperId resolution
//!
//! Builds the seed dataset from a list of titles. Known-bad matches can be
//! pinned with manual overrides keyed by normalized title.

use crate::errors::RunError;
use crate::seeds::find_column;
use serde::{Deserialize, Serialize};
use snowball_common::config::{LookupConfig, ManualOverride};
use snowball_common::MetadataClient;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

const TITLE_COLUMN: &str = "Title";
const YEAR_COLUMN: &str = "Publication Year";

/// How a row's identifiers were obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupStatus {
    Ok,
    ManualFixed,
    NotFound,
    Error(String),
}

impl LookupStatus {
    pub fn as_string(&self) -> String {
        match self {
            LookupStatus::Ok => "ok".to_string(),
            LookupStatus::ManualFixed => "manual-fixed".to_string(),
            LookupStatus::NotFound => "not-found".to_string(),
            LookupStatus::Error(message) => format!("error:{}", message),
        }
    }
}

/// One row of the resolved dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRow {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Year")]
    pub year: Option<i32>,
    #[serde(rename = "DOI")]
    pub doi: String,
    #[serde(rename = "PaperId")]
    pub paper_id: String,
    #[serde(rename = "LookupStatus")]
    pub lookup_status: String,
}

/// Per-status totals for a lookup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupSummary {
    pub total: usize,
    pub resolved: usize,
    pub manual: usize,
    pub not_found: usize,
    pub errors: usize,
}

pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Accepts "2020" as well as spreadsheet floats like "2020.0"
fn parse_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    raw.parse::<i32>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|y| y.is_finite()).map(|y| y as i32))
}

pub struct IdLookup {
    client: Arc<dyn MetadataClient>,
    overrides: HashMap<String, ManualOverride>,
    delay: Duration,
}

impl IdLookup {
    pub fn new(client: Arc<dyn MetadataClient>, config: &LookupConfig) -> Self {
        let overrides = config
            .overrides
            .iter()
            .map(|(title, ids)| (normalize_title(title), ids.clone()))
            .collect();
        Self {
            client,
            overrides,
            delay: Duration::from_millis(config.request_delay_ms),
        }
    }

    /// Resolve one title
    pub async fn lookup(&self, title: &str, year: Option<i32>) -> (LookupRow, LookupStatus) {
        let title = title.trim();
        let row = |doi: String, paper_id: String, status: &LookupStatus| LookupRow {
            title: title.to_string(),
            year,
            doi,
            paper_id,
            lookup_status: status.as_string(),
        };

        if let Some(pinned) = self.overrides.get(&normalize_title(title)) {
            info!(title, doi = %pinned.doi, "Using manual override");
            let status = LookupStatus::ManualFixed;
            return (row(pinned.doi.clone(), pinned.paper_id.clone(), &status), status);
        }

        let status = match self.client.search_paper(title, year).await {
            Ok(Some(hit)) => {
                info!(title, doi = %hit.doi, paper_id = %hit.paper_id, "Resolved title");
                let status = LookupStatus::Ok;
                return (row(hit.doi, hit.paper_id, &status), status);
            }
            Ok(None) => {
                warn!(title, ?year, "No search hit for title");
                LookupStatus::NotFound
            }
            Err(e) => {
                warn!(title, error = %e, "Title search failed");
                LookupStatus::Error(e.to_string())
            }
        };
        (row(String::new(), String::new(), &status), status)
    }

    /// Resolve every title in `input` and write the id dataset to `output`
    #[instrument(skip(self), fields(input = %input.display(), output = %output.display()))]
    pub async fn resolve_file(&self, input: &Path, output: &Path) -> Result<LookupSummary, RunError> {
        let titles = read_titles(input)?;
        let mut summary = LookupSummary::default();

        let mut writer = csv::Writer::from_path(output).map_err(|e| RunError::output(output, e))?;

        for (title, year) in titles {
            let (row, status) = self.lookup(&title, year).await;
            summary.total += 1;
            match &status {
                LookupStatus::Ok => summary.resolved += 1,
                LookupStatus::ManualFixed => summary.manual += 1,
                LookupStatus::NotFound => summary.not_found += 1,
                LookupStatus::Error(_) => summary.errors += 1,
            }

            writer.serialize(&row).map_err(|e| RunError::output(output, e))?;

            if status != LookupStatus::ManualFixed && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        writer.flush().map_err(|e| RunError::output(output, e))?;
        info!(
            total = summary.total,
            resolved = summary.resolved,
            manual = summary.manual,
            not_found = summary.not_found,
            errors = summary.errors,
            "Saved resolved ids"
        );
        Ok(summary)
    }
}

fn read_titles(path: &Path) -> Result<Vec<(String, Option<i32>)>, RunError> {
    if !path.exists() {
        return Err(RunError::input(path, "file not found"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| RunError::input(path, e))?;
    let headers = reader.headers().map_err(|e| RunError::input(path, e))?.clone();
    let title_column = find_column(&headers, TITLE_COLUMN)
        .ok_or_else(|| RunError::input(path, format!("missing {} column", TITLE_COLUMN)))?;
    let year_column = find_column(&headers, YEAR_COLUMN);

    let mut titles = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| RunError::input(path, e))?;
        let title = record.get(title_column).unwrap_or_default().trim().to_string();
        let year = year_column
            .and_then(|column| record.get(column))
            .and_then(parse_year);
        titles.push((title, year));
    }
    Ok(titles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snowball_common::models::PaperMatch;
    use snowball_common::scholar::MockScholarClient;
    use std::fs;

    fn config() -> LookupConfig {
        let mut config = LookupConfig {
            request_delay_ms: 0,
            overrides: HashMap::new(),
            ..LookupConfig::default()
        };
        config.overrides.insert(
            "  Assigning Change Requests to Software Developers ".to_string(),
            ManualOverride {
                doi: "10.1002/smr.530".to_string(),
                paper_id: "7f9082e4".to_string(),
            },
        );
        config
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2020"), Some(2020));
        assert_eq!(parse_year(" 2019.0 "), Some(2019));
        assert_eq!(parse_year(""), None);
        assert_eq!(parse_year("nan"), None);
    }

    #[tokio::test]
    async fn test_override_wins_without_search() {
        let mock = Arc::new(MockScholarClient::new());
        let lookup = IdLookup::new(mock.clone(), &config());

        let (row, status) = lookup
            .lookup("assigning change requests to software developers", Some(2011))
            .await;
        assert_eq!(status, LookupStatus::ManualFixed);
        assert_eq!(row.lookup_status, "manual-fixed");
        assert_eq!(row.paper_id, "7f9082e4");
        assert!(mock.calls().searches.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_file_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ForSnowballing.csv");
        let output = dir.path().join("papers_with_ids.csv");
        fs::write(
            &input,
            "Title,Publication Year\n\
             Known Paper,2020\n\
             Missing Paper,2018\n\
             Broken Paper,\n\
             Assigning change requests to software developers,2011\n",
        )
        .unwrap();

        let mock = Arc::new(
            MockScholarClient::new()
                .with_search_hit(
                    "Known Paper",
                    PaperMatch {
                        paper_id: "kp1".to_string(),
                        title: "Known Paper".to_string(),
                        doi: "10.1/kp".to_string(),
                    },
                )
                .fail_search("Broken Paper"),
        );
        let lookup = IdLookup::new(mock.clone(), &config());

        let summary = lookup.resolve_file(&input, &output).await.unwrap();
        assert_eq!(
            summary,
            LookupSummary {
                total: 4,
                resolved: 1,
                manual: 1,
                not_found: 1,
                errors: 1,
            }
        );
        assert_eq!(mock.calls().searches.len(), 3);

        let rows: Vec<LookupRow> = csv::Reader::from_path(&output)
            .unwrap()
            .deserialize()
            .map(Result::unwrap)
            .collect();
        assert_eq!(rows[0].paper_id, "kp1");
        assert_eq!(rows[0].year, Some(2020));
        assert_eq!(rows[1].lookup_status, "not-found");
        assert!(rows[2].lookup_status.starts_with("error:"));
        assert_eq!(rows[2].year, None);
        assert_eq!(rows[3].lookup_status, "manual-fixed");

        let seeds = crate::seeds::load_seed_ids(&output).unwrap();
        assert_eq!(seeds, vec!["kp1", "7f9082e4"]);
    }

    #[tokio::test]
    async fn test_missing_title_column() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        fs::write(&input, "Name\nx\n").unwrap();
        let lookup = IdLookup::new(Arc::new(MockScholarClient::new()), &config());
        let err = lookup
            .resolve_file(&input, &dir.path().join("out.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Input { .. }));
    }
}
