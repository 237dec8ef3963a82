//! Neighbor resolution
//!
//! Produces the backward (referenced) and forward (citing) neighbors of one
//! paper. The paginated endpoints are tried first; when one of them fails and
//! a direction is still empty, the generic paper lookup fills the gaps.

use snowball_common::errors::AppError;
use snowball_common::metrics;
use snowball_common::models::PaperRecord;
use snowball_common::{Direction, MetadataClient, PaperId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Neighbors of one paper, each list capped and free of duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Neighbors {
    pub backward: Vec<PaperId>,
    pub forward: Vec<PaperId>,
}

impl Neighbors {
    pub fn get(&self, direction: Direction) -> &[PaperId] {
        match direction {
            Direction::Backward => &self.backward,
            Direction::Forward => &self.forward,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.backward.is_empty() && self.forward.is_empty()
    }
}

/// Resolves neighbors through a [`MetadataClient`]
///
/// Never fails: any direction that cannot be resolved comes back empty.
pub struct NeighborResolver {
    client: Arc<dyn MetadataClient>,
    max_per_direction: usize,
}

impl NeighborResolver {
    pub fn new(client: Arc<dyn MetadataClient>, max_per_direction: usize) -> Self {
        Self {
            client,
            max_per_direction,
        }
    }

    #[instrument(skip(self), fields(client = self.client.name()))]
    pub async fn resolve(&self, paper_id: &str) -> Neighbors {
        let cap = self.max_per_direction;
        let mut errors: Vec<(Direction, AppError)> = Vec::new();

        let backward = match self.client.fetch_references(paper_id, cap).await {
            Ok(ids) => ids,
            Err(e) => {
                debug!(error = %e, "Reference fetch failed");
                errors.push((Direction::Backward, e));
                Vec::new()
            }
        };

        let forward = match self.client.fetch_citations(paper_id, cap).await {
            Ok(ids) => ids,
            Err(e) => {
                debug!(error = %e, "Citation fetch failed");
                errors.push((Direction::Forward, e));
                Vec::new()
            }
        };

        let mut neighbors = Neighbors {
            backward: dedupe_capped(backward, cap),
            forward: dedupe_capped(forward, cap),
        };

        let needs_fallback = neighbors.backward.is_empty() || neighbors.forward.is_empty();
        if !errors.is_empty() && needs_fallback {
            self.fill_from_fallback(paper_id, &mut neighbors).await;
        }

        if neighbors.is_empty() && !errors.is_empty() {
            let summary = errors
                .iter()
                .map(|(direction, e)| format!("{}: {}", direction, e))
                .collect::<Vec<_>>()
                .join("; ");
            warn!(paper_id, errors = %summary, "No neighbors resolved in either direction");
        }

        neighbors
    }

    async fn fill_from_fallback(&self, paper_id: &str, neighbors: &mut Neighbors) {
        metrics::record_fallback();

        let record = match self.client.get_paper(paper_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(paper_id, error = %e, "Fallback paper lookup failed");
                return;
            }
        };

        let PaperRecord {
            references,
            citations,
            reference_count,
            citation_count,
            ..
        } = record;

        if neighbors.backward.is_empty() {
            neighbors.backward = dedupe_capped(references, self.max_per_direction);
            if neighbors.backward.is_empty() && reference_count > 0 {
                warn!(
                    paper_id,
                    declared = reference_count,
                    "Paper declares references but none could be retrieved"
                );
            }
        }

        if neighbors.forward.is_empty() {
            neighbors.forward = dedupe_capped(citations, self.max_per_direction);
            if neighbors.forward.is_empty() && citation_count > 0 {
                warn!(
                    paper_id,
                    declared = citation_count,
                    "Paper declares citations but none could be retrieved"
                );
            }
        }
    }
}

/// Drop empty and repeated ids, keep the first `cap`
fn dedupe_capped(ids: Vec<PaperId>, cap: usize) -> Vec<PaperId> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.clone()))
        .take(cap)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use snowball_common::scholar::MockScholarClient;

    fn record(id: &str, references: &[&str], citations: &[&str]) -> PaperRecord {
        PaperRecord {
            paper_id: id.to_string(),
            references: references.iter().map(|s| s.to_string()).collect(),
            citations: citations.iter().map(|s| s.to_string()).collect(),
            reference_count: references.len() as u64,
            citation_count: citations.len() as u64,
        }
    }

    #[tokio::test]
    async fn test_primary_path_without_fallback() {
        let mock = Arc::new(
            MockScholarClient::new()
                .with_references("A", ["X", "Y"])
                .with_citations("A", ["Z"]),
        );
        let resolver = NeighborResolver::new(mock.clone(), 10);

        let neighbors = resolver.resolve("A").await;
        assert_eq!(neighbors.backward, vec!["X", "Y"]);
        assert_eq!(neighbors.forward, vec!["Z"]);
        assert!(mock.calls().papers.is_empty());
    }

    #[tokio::test]
    async fn test_empty_without_errors_skips_fallback() {
        let mock = Arc::new(MockScholarClient::new().with_paper(record("A", &["R"], &[])));
        let resolver = NeighborResolver::new(mock.clone(), 10);

        assert!(resolver.resolve("A").await.is_empty());
        assert!(mock.calls().papers.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_fills_only_failed_direction() {
        let mock = Arc::new(
            MockScholarClient::new()
                .fail_references("A")
                .with_citations("A", ["F1", "F2"])
                .with_paper(record("A", &["R1", "R2"], &["OTHER"])),
        );
        let resolver = NeighborResolver::new(mock.clone(), 10);

        let neighbors = resolver.resolve("A").await;
        assert_eq!(neighbors.backward, vec!["R1", "R2"]);
        assert_eq!(neighbors.forward, vec!["F1", "F2"]);
        assert_eq!(mock.calls().papers, vec!["A"]);
    }

    #[tokio::test]
    async fn test_fallback_fills_empty_direction_after_other_failed() {
        let mock = Arc::new(
            MockScholarClient::new()
                .fail_citations("A")
                .with_paper(record("A", &["R1"], &["C1"])),
        );
        let resolver = NeighborResolver::new(mock, 10);

        let neighbors = resolver.resolve("A").await;
        assert_eq!(neighbors.backward, vec!["R1"]);
        assert_eq!(neighbors.forward, vec!["C1"]);
    }

    #[tokio::test]
    async fn test_total_failure_degrades_to_empty() {
        let mock = Arc::new(
            MockScholarClient::new()
                .fail_references("A")
                .fail_citations("A")
                .fail_paper("A"),
        );
        let resolver = NeighborResolver::new(mock, 10);
        assert_eq!(resolver.resolve("A").await, Neighbors::default());
    }

    #[tokio::test]
    async fn test_declared_count_without_ids_is_empty() {
        let mut declared = record("A", &[], &[]);
        declared.reference_count = 12;
        let mock = Arc::new(
            MockScholarClient::new()
                .fail_references("A")
                .with_paper(declared),
        );
        let resolver = NeighborResolver::new(mock, 10);
        assert!(resolver.resolve("A").await.backward.is_empty());
    }

    #[tokio::test]
    async fn test_cap_returns_prefix() {
        let many: Vec<String> = (0..25).map(|i| format!("P{}", i)).collect();
        let mock = Arc::new(MockScholarClient::new().with_references("A", many.clone()));
        let resolver = NeighborResolver::new(mock, 7);

        let neighbors = resolver.resolve("A").await;
        assert_eq!(neighbors.backward, many[..7].to_vec());
    }

    #[tokio::test]
    async fn test_fallback_lists_are_capped_and_deduped() {
        let mock = Arc::new(
            MockScholarClient::new()
                .fail_references("A")
                .with_paper(record("A", &["R1", "R1", "", "R2", "R3"], &[])),
        );
        let resolver = NeighborResolver::new(mock, 2);
        assert_eq!(resolver.resolve("A").await.backward, vec!["R1", "R2"]);
    }

    #[test]
    fn test_dedupe_capped() {
        let ids = vec!["a", "b", "a", "c"].into_iter().map(String::from).collect();
        assert_eq!(dedupe_capped(ids, 10), vec!["a", "b", "c"]);
    }
}
