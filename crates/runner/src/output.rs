//! Discovery dataset persistence
//!
//! Rows are appended to a partial CSV at every flush. Finalization copies
//! them into the output dataset with provenance columns recomputed from the
//! finished round, then drops the partial file.

use crate::checkpoint::temp_sibling;
use crate::errors::RunError;
use serde::{Deserialize, Serialize};
use snowball_common::metrics;
use snowball_common::models::PaperMetadata;
use snowball_common::{Direction, MetadataClient, PaperId, Provenance};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Column order of the partial and final datasets
pub const COLUMNS: [&str; 8] = [
    "PaperId",
    "Title",
    "DOI",
    "Direction",
    "IsBackward",
    "IsForward",
    "SourceCount",
    "SourcePapers",
];

/// Separator between ids in the SourcePapers column
pub const SOURCE_SEPARATOR: &str = "; ";

/// One output row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    #[serde(rename = "PaperId")]
    pub paper_id: PaperId,
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "DOI", default)]
    pub doi: String,
    #[serde(rename = "Direction", default)]
    pub direction: String,
    #[serde(rename = "IsBackward", default)]
    pub is_backward: u8,
    #[serde(rename = "IsForward", default)]
    pub is_forward: u8,
    #[serde(rename = "SourceCount", default)]
    pub source_count: usize,
    #[serde(rename = "SourcePapers", default)]
    pub source_papers: String,
}

impl DiscoveryRecord {
    pub fn new(
        paper_id: &str,
        metadata: Option<&PaperMetadata>,
        provenance: &[Provenance],
        max_sources: usize,
    ) -> Self {
        let mut record = Self {
            paper_id: paper_id.to_string(),
            title: metadata.map(|m| m.title.clone()).unwrap_or_default(),
            doi: metadata.map(|m| m.doi.clone()).unwrap_or_default(),
            direction: String::new(),
            is_backward: 0,
            is_forward: 0,
            source_count: 0,
            source_papers: String::new(),
        };
        record.apply_provenance(provenance, max_sources);
        record
    }

    /// Recompute the provenance-derived columns
    pub fn apply_provenance(&mut self, provenance: &[Provenance], max_sources: usize) {
        let backward = provenance.iter().any(|p| p.direction == Direction::Backward);
        let forward = provenance.iter().any(|p| p.direction == Direction::Forward);

        self.direction = direction_label(backward, forward).to_string();
        self.is_backward = backward as u8;
        self.is_forward = forward as u8;
        self.source_count = provenance.len();

        let mut sources: Vec<&str> = Vec::new();
        for p in provenance {
            if sources.len() == max_sources {
                break;
            }
            if !sources.contains(&p.source.as_str()) {
                sources.push(&p.source);
            }
        }
        self.source_papers = sources.join(SOURCE_SEPARATOR);
    }
}

fn direction_label(backward: bool, forward: bool) -> &'static str {
    match (backward, forward) {
        (true, true) => "Backward + Forward",
        (true, false) => Direction::Backward.label(),
        (false, true) => Direction::Forward.label(),
        (false, false) => "",
    }
}

/// Fetch titles and DOIs in batches
///
/// A failed batch is logged and skipped; its ids are simply absent from the
/// returned map.
pub async fn hydrate_metadata(
    client: &dyn MetadataClient,
    paper_ids: &[PaperId],
    batch_size: usize,
) -> HashMap<PaperId, PaperMetadata> {
    let mut found = HashMap::with_capacity(paper_ids.len());

    for (index, batch) in paper_ids.chunks(batch_size.max(1)).enumerate() {
        match client.get_papers(batch).await {
            Ok(papers) => {
                for paper in papers {
                    found.insert(paper.paper_id.clone(), paper);
                }
            }
            Err(e) => {
                metrics::record_metadata_batch_failure();
                warn!(
                    batch = index,
                    size = batch.len(),
                    error = %e,
                    "Metadata batch failed; rows keep empty Title/DOI"
                );
            }
        }
    }

    debug!(requested = paper_ids.len(), hydrated = found.len(), "Metadata hydration done");
    found
}

/// Incrementally appended dataset
#[derive(Debug, Clone)]
pub struct PartialDataset {
    path: PathBuf,
}

impl PartialDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append rows, writing the header if the file is new or empty
    pub fn append(&self, records: &[DiscoveryRecord]) -> Result<(), RunError> {
        if records.is_empty() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| RunError::output(&self.path, e))?;
        let needs_header = file.metadata().map_err(|e| RunError::output(&self.path, e))?.len() == 0;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer
                .write_record(COLUMNS)
                .map_err(|e| RunError::output(&self.path, e))?;
        }
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| RunError::output(&self.path, e))?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| RunError::output(&self.path, e.error().to_string()))?;
        file.sync_all().map_err(|e| RunError::output(&self.path, e))?;
        Ok(())
    }

    /// All rows currently on disk; a missing file reads as empty
    pub fn read_all(&self) -> Result<Vec<DiscoveryRecord>, RunError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| RunError::output(&self.path, e))?;
        reader
            .deserialize()
            .collect::<Result<Vec<DiscoveryRecord>, _>>()
            .map_err(|e| RunError::output(&self.path, e))
    }

    /// Drop rows beyond the first `rows`, undoing appends after the last checkpoint
    pub fn truncate_to(&self, rows: usize) -> Result<(), RunError> {
        if !self.path.exists() {
            if rows > 0 {
                debug!(path = %self.path.display(), rows, "Partial dataset missing at resume");
            }
            return Ok(());
        }

        let mut records = self.read_all()?;
        if records.len() <= rows {
            return Ok(());
        }

        warn!(
            path = %self.path.display(),
            kept = rows,
            dropped = records.len() - rows,
            "Discarding rows appended after the last checkpoint"
        );
        records.truncate(rows);

        if records.is_empty() {
            return self.remove();
        }
        write_dataset(&self.path, &records)
    }

    pub fn remove(&self) -> Result<(), RunError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RunError::output(&self.path, e)),
        }
    }

    /// Write the final dataset and remove the partial file
    ///
    /// Returns the number of rows written. When the partial file is gone but
    /// the output already exists, the earlier finalization is kept.
    pub fn finalize(
        &self,
        output: &Path,
        provenance: &BTreeMap<PaperId, Vec<Provenance>>,
        max_sources: usize,
    ) -> Result<usize, RunError> {
        if !self.path.exists() && output.exists() {
            info!(output = %output.display(), "Output already finalized; keeping it");
            return Ok(0);
        }

        let mut records = self.read_all()?;
        for record in &mut records {
            if let Some(sources) = provenance.get(&record.paper_id) {
                record.apply_provenance(sources, max_sources);
            }
        }

        write_dataset(output, &records)?;
        self.remove()?;

        info!(output = %output.display(), rows = records.len(), "Saved discovery dataset");
        Ok(records.len())
    }
}

/// Replace `path` with a header plus `records`
fn write_dataset(path: &Path, records: &[DiscoveryRecord]) -> Result<(), RunError> {
    let tmp = temp_sibling(path);
    let file = File::create(&tmp).map_err(|e| RunError::output(&tmp, e))?;

    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    writer
        .write_record(COLUMNS)
        .map_err(|e| RunError::output(&tmp, e))?;
    for record in records {
        writer.serialize(record).map_err(|e| RunError::output(&tmp, e))?;
    }
    let file = writer
        .into_inner()
        .map_err(|e| RunError::output(&tmp, e.error().to_string()))?;
    file.sync_all().map_err(|e| RunError::output(&tmp, e))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| RunError::output(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use snowball_common::scholar::MockScholarClient;

    fn record(id: &str) -> DiscoveryRecord {
        DiscoveryRecord::new(id, None, &[Provenance::new("S", Direction::Backward)], 5)
    }

    #[test]
    fn test_provenance_columns() {
        let provenance = vec![
            Provenance::new("A", Direction::Backward),
            Provenance::new("B", Direction::Forward),
            Provenance::new("A", Direction::Forward),
        ];
        let record = DiscoveryRecord::new("X", None, &provenance, 5);
        assert_eq!(record.direction, "Backward + Forward");
        assert_eq!((record.is_backward, record.is_forward), (1, 1));
        assert_eq!(record.source_count, 3);
        assert_eq!(record.source_papers, "A; B");
        assert!(record.title.is_empty() && record.doi.is_empty());
    }

    #[test]
    fn test_source_papers_capped() {
        let provenance: Vec<_> = (0..8)
            .map(|i| Provenance::new(format!("S{}", i), Direction::Forward))
            .collect();
        let record = DiscoveryRecord::new("X", None, &provenance, 5);
        assert_eq!(record.direction, "Forward");
        assert_eq!(record.source_count, 8);
        assert_eq!(record.source_papers, "S0; S1; S2; S3; S4");
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let partial = PartialDataset::new(dir.path().join("out.partial.csv"));

        partial.append(&[record("P1")]).unwrap();
        partial.append(&[record("P2"), record("P3")]).unwrap();

        let text = fs::read_to_string(partial.path()).unwrap();
        assert_eq!(text.matches("PaperId,Title").count(), 1);
        let ids: Vec<_> = partial.read_all().unwrap().into_iter().map(|r| r.paper_id).collect();
        assert_eq!(ids, vec!["P1", "P2", "P3"]);
    }

    #[test]
    fn test_truncate_to_committed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let partial = PartialDataset::new(dir.path().join("out.partial.csv"));
        partial.append(&[record("P1"), record("P2"), record("P3")]).unwrap();

        partial.truncate_to(5).unwrap();
        assert_eq!(partial.read_all().unwrap().len(), 3);

        partial.truncate_to(1).unwrap();
        let rows = partial.read_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].paper_id, "P1");

        partial.truncate_to(0).unwrap();
        assert!(!partial.path().exists());
    }

    #[test]
    fn test_finalize_refreshes_provenance_and_removes_partial() {
        let dir = tempfile::tempdir().unwrap();
        let partial = PartialDataset::new(dir.path().join("out.partial.csv"));
        let output = dir.path().join("out.csv");
        partial.append(&[record("X")]).unwrap();

        let mut provenance = BTreeMap::new();
        provenance.insert(
            "X".to_string(),
            vec![
                Provenance::new("S", Direction::Backward),
                Provenance::new("T", Direction::Forward),
            ],
        );

        assert_eq!(partial.finalize(&output, &provenance, 5).unwrap(), 1);
        assert!(!partial.path().exists());

        let rows = PartialDataset::new(&output).read_all().unwrap();
        assert_eq!(rows[0].direction, "Backward + Forward");
        assert_eq!(rows[0].source_count, 2);
    }

    #[test]
    fn test_finalize_empty_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let partial = PartialDataset::new(dir.path().join("out.partial.csv"));
        let output = dir.path().join("out.csv");

        assert_eq!(partial.finalize(&output, &BTreeMap::new(), 5).unwrap(), 0);
        let text = fs::read_to_string(&output).unwrap();
        assert_eq!(text.trim_end(), COLUMNS.join(","));
    }

    #[test]
    fn test_finalize_keeps_existing_output_without_partial() {
        let dir = tempfile::tempdir().unwrap();
        let partial = PartialDataset::new(dir.path().join("out.partial.csv"));
        let output = dir.path().join("out.csv");
        fs::write(&output, "kept").unwrap();

        partial.finalize(&output, &BTreeMap::new(), 5).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "kept");
    }

    #[tokio::test]
    async fn test_hydration_skips_failed_batches() {
        let client = MockScholarClient::new()
            .with_metadata("A", "Title A", "10.1/a")
            .with_metadata("C", "Title C", "10.1/c")
            .fail_batches_containing("Y");
        let ids: Vec<PaperId> = ["A", "Y", "C"].iter().map(|s| s.to_string()).collect();

        let found = hydrate_metadata(&client, &ids, 2).await;
        assert!(!found.contains_key("A"));
        assert!(!found.contains_key("Y"));
        assert_eq!(found["C"].title, "Title C");
        assert_eq!(client.calls().batches.len(), 2);
    }
}
