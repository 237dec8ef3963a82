//! Scripted in-memory client for tests and dry runs

use super::MetadataClient;
use crate::errors::{AppError, Result};
use crate::models::{PaperId, PaperMatch, PaperMetadata, PaperRecord};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Calls received by a [`MockScholarClient`], in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallLog {
    pub references: Vec<PaperId>,
    pub citations: Vec<PaperId>,
    pub papers: Vec<PaperId>,
    pub batches: Vec<Vec<PaperId>>,
    pub searches: Vec<String>,
}

/// Mock metadata client
///
/// Neighbor lists are returned as scripted, ignoring the requested limit, so
/// callers' own caps can be exercised. Unknown ids have no neighbors, no
/// metadata and no search hit; `get_paper` on an unscripted id is a 404.
#[derive(Default)]
pub struct MockScholarClient {
    references: HashMap<PaperId, Vec<PaperId>>,
    citations: HashMap<PaperId, Vec<PaperId>>,
    papers: HashMap<PaperId, PaperRecord>,
    metadata: HashMap<PaperId, PaperMetadata>,
    search_hits: HashMap<String, PaperMatch>,
    failing_references: HashSet<PaperId>,
    failing_citations: HashSet<PaperId>,
    failing_papers: HashSet<PaperId>,
    failing_batch_members: HashSet<PaperId>,
    failing_searches: HashSet<String>,
    #[cfg(any(test, feature = "test-util"))]
    crash_after_reference_calls: Option<usize>,
    calls: Mutex<CallLog>,
}

impl MockScholarClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_references<I, S>(mut self, paper_id: &str, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PaperId>,
    {
        self.references
            .insert(paper_id.to_string(), ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_citations<I, S>(mut self, paper_id: &str, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PaperId>,
    {
        self.citations
            .insert(paper_id.to_string(), ids.into_iter().map(Into::into).collect());
        self
    }

    /// Script the generic paper lookup used by the neighbor fallback
    pub fn with_paper(mut self, record: PaperRecord) -> Self {
        self.papers.insert(record.paper_id.clone(), record);
        self
    }

    pub fn with_metadata(mut self, paper_id: &str, title: &str, doi: &str) -> Self {
        self.metadata.insert(
            paper_id.to_string(),
            PaperMetadata {
                paper_id: paper_id.to_string(),
                title: title.to_string(),
                doi: doi.to_string(),
            },
        );
        self
    }

    pub fn with_search_hit(mut self, title: &str, hit: PaperMatch) -> Self {
        self.search_hits.insert(title.to_string(), hit);
        self
    }

    pub fn fail_references(mut self, paper_id: &str) -> Self {
        self.failing_references.insert(paper_id.to_string());
        self
    }

    pub fn fail_citations(mut self, paper_id: &str) -> Self {
        self.failing_citations.insert(paper_id.to_string());
        self
    }

    pub fn fail_paper(mut self, paper_id: &str) -> Self {
        self.failing_papers.insert(paper_id.to_string());
        self
    }

    /// Fail every metadata batch that contains `paper_id`
    pub fn fail_batches_containing(mut self, paper_id: &str) -> Self {
        self.failing_batch_members.insert(paper_id.to_string());
        self
    }

    pub fn fail_search(mut self, title: &str) -> Self {
        self.failing_searches.insert(title.to_string());
        self
    }

    /// Panic on the reference call after `calls` successful ones, simulating
    /// the process dying mid-run. Only built for tests (`test-util` feature).
    #[cfg(any(test, feature = "test-util"))]
    pub fn crash_after_reference_calls(mut self, calls: usize) -> Self {
        self.crash_after_reference_calls = Some(calls);
        self
    }

    /// Snapshot of the calls received so far
    pub fn calls(&self) -> CallLog {
        self.log().clone()
    }

    fn log(&self) -> MutexGuard<'_, CallLog> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unavailable(endpoint: &str) -> AppError {
        AppError::Upstream {
            endpoint: endpoint.to_string(),
            status: 503,
            message: "scripted failure".to_string(),
        }
    }
}

#[async_trait]
impl MetadataClient for MockScholarClient {
    async fn fetch_references(&self, paper_id: &str, _limit: usize) -> Result<Vec<PaperId>> {
        let made = {
            let mut log = self.log();
            log.references.push(paper_id.to_string());
            log.references.len()
        };
        #[cfg(any(test, feature = "test-util"))]
        if let Some(limit) = self.crash_after_reference_calls {
            if made > limit {
                panic!("simulated crash while fetching references for {}", paper_id);
            }
        }
        #[cfg(not(any(test, feature = "test-util")))]
        let _ = made;
        if self.failing_references.contains(paper_id) {
            return Err(Self::unavailable("references"));
        }
        Ok(self.references.get(paper_id).cloned().unwrap_or_default())
    }

    async fn fetch_citations(&self, paper_id: &str, _limit: usize) -> Result<Vec<PaperId>> {
        self.log().citations.push(paper_id.to_string());
        if self.failing_citations.contains(paper_id) {
            return Err(Self::unavailable("citations"));
        }
        Ok(self.citations.get(paper_id).cloned().unwrap_or_default())
    }

    async fn get_paper(&self, paper_id: &str) -> Result<PaperRecord> {
        self.log().papers.push(paper_id.to_string());
        if self.failing_papers.contains(paper_id) {
            return Err(Self::unavailable("paper"));
        }
        self.papers
            .get(paper_id)
            .cloned()
            .ok_or_else(|| AppError::PaperNotFound {
                id: paper_id.to_string(),
            })
    }

    async fn get_papers(&self, paper_ids: &[PaperId]) -> Result<Vec<PaperMetadata>> {
        self.log().batches.push(paper_ids.to_vec());
        if paper_ids.iter().any(|id| self.failing_batch_members.contains(id)) {
            return Err(Self::unavailable("batch"));
        }
        Ok(paper_ids
            .iter()
            .filter_map(|id| self.metadata.get(id).cloned())
            .collect())
    }

    async fn search_paper(&self, title: &str, _year: Option<i32>) -> Result<Option<PaperMatch>> {
        self.log().searches.push(title.to_string());
        if self.failing_searches.contains(title) {
            return Err(Self::unavailable("search"));
        }
        Ok(self.search_hits.get(title).cloned())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_neighbors_and_failures() {
        let client = MockScholarClient::new()
            .with_references("A", ["X", "Y"])
            .fail_citations("A");

        let refs = client.fetch_references("A", 1).await.unwrap();
        assert_eq!(refs, vec!["X", "Y"]);
        assert!(client.fetch_citations("A", 10).await.is_err());
        assert!(client.fetch_references("unknown", 10).await.unwrap().is_empty());

        let calls = client.calls();
        assert_eq!(calls.references, vec!["A", "unknown"]);
        assert_eq!(calls.citations, vec!["A"]);
    }

    #[tokio::test]
    async fn test_unscripted_paper_is_not_found() {
        let client = MockScholarClient::new();
        let err = client.get_paper("nope").await.unwrap_err();
        assert!(matches!(err, AppError::PaperNotFound { .. }));
    }

    #[tokio::test]
    async fn test_batch_failure_and_partial_metadata() {
        let client = MockScholarClient::new()
            .with_metadata("X", "Title X", "10.1/x")
            .fail_batches_containing("Y");

        let ok = client
            .get_papers(&["X".to_string(), "Z".to_string()])
            .await
            .unwrap();
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].title, "Title X");

        let failed = client.get_papers(&["X".to_string(), "Y".to_string()]).await;
        assert!(failed.is_err());
        assert_eq!(client.calls().batches.len(), 2);
    }

    #[tokio::test]
    #[should_panic(expected = "simulated crash")]
    async fn test_crash_after_reference_calls() {
        let client = MockScholarClient::new().crash_after_reference_calls(1);
        client.fetch_references("A", 10).await.unwrap();
        let _ = client.fetch_references("B", 10).await;
    }
}
