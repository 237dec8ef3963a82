//! Expansion engine
//!
//! Runs one snowballing round: every frontier id is expanded exactly once,
//! new neighbors are recorded with provenance but never re-queued.

use crate::checkpoint::{CheckpointState, CheckpointStore};
use crate::errors::RunError;
use crate::output::{hydrate_metadata, DiscoveryRecord, PartialDataset};
use crate::resolver::NeighborResolver;
use snowball_common::config::SnowballConfig;
use snowball_common::metrics;
use snowball_common::{Direction, MetadataClient, PaperId};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

/// Result of a completed round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Ids discovered this round, sorted
    pub new_ids: Vec<PaperId>,
    pub backward_count: usize,
    pub forward_count: usize,
    /// Ids the round excluded from discovery
    pub excluded: BTreeSet<PaperId>,
    /// Rows in the output dataset
    pub rows_written: usize,
}

/// Where the engine persists its progress
#[derive(Debug, Clone)]
pub struct RoundArtifacts {
    pub checkpoint: CheckpointStore,
    pub partial: PartialDataset,
    pub output: PathBuf,
}

/// Single-round expansion over a seed set
pub struct ExpansionEngine {
    client: Arc<dyn MetadataClient>,
    resolver: NeighborResolver,
    settings: SnowballConfig,
    artifacts: RoundArtifacts,
}

impl ExpansionEngine {
    pub fn new(
        client: Arc<dyn MetadataClient>,
        settings: SnowballConfig,
        artifacts: RoundArtifacts,
    ) -> Self {
        let resolver = NeighborResolver::new(client.clone(), settings.max_results_per_direction);
        Self {
            client,
            resolver,
            settings,
            artifacts,
        }
    }

    /// Expand `seeds` once, or continue the round captured in `resume`
    ///
    /// On success the output dataset is written and the checkpoint removed.
    #[instrument(skip_all, fields(seeds = seeds.len(), resumed = resume.is_some()))]
    pub async fn run_round(
        &self,
        seeds: &[PaperId],
        excluded: BTreeSet<PaperId>,
        resume: Option<CheckpointState>,
    ) -> Result<RoundOutcome, RunError> {
        let mut state = match resume {
            Some(state) => {
                self.artifacts.partial.truncate_to(state.rows_committed)?;
                info!(
                    pending = state.pending.len(),
                    processed = state.processed_in_round,
                    total = state.total,
                    discovered = state.discovered.len(),
                    "Resuming round from checkpoint"
                );
                state
            }
            None => {
                self.artifacts.partial.remove()?;
                let state = CheckpointState::fresh(seeds, excluded);
                info!(
                    total = state.total,
                    excluded = state.excluded.len(),
                    "Starting round"
                );
                state
            }
        };

        let save_every = self.settings.save_every.max(1);
        let delay = self.settings.request_delay();

        while let Some(paper_id) = state.pending.pop() {
            state.processed_in_round += 1;
            let neighbors = self.resolver.resolve(&paper_id).await;

            let mut found = 0;
            for direction in [Direction::Backward, Direction::Forward] {
                for neighbor in neighbors.get(direction) {
                    if state.record_neighbor(&paper_id, direction, neighbor) {
                        metrics::record_discovery(direction.as_str());
                        found += 1;
                    }
                }
            }

            metrics::record_paper_expanded();
            metrics::set_frontier_pending(state.pending.len());
            info!(
                "[{}/{}] {}: {} backward, {} forward, {} new",
                state.processed_in_round,
                state.total,
                paper_id,
                neighbors.backward.len(),
                neighbors.forward.len(),
                found
            );

            if state.processed_in_round % save_every == 0 || state.pending.is_empty() {
                self.flush(&mut state).await?;
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        if !state.buffer.is_empty() {
            self.flush(&mut state).await?;
        }

        let rows_written = self.artifacts.partial.finalize(
            &self.artifacts.output,
            &state.provenance,
            self.settings.max_source_papers,
        )?;
        self.artifacts.checkpoint.clear()?;

        let outcome = RoundOutcome {
            new_ids: state.discovered.iter().cloned().collect(),
            backward_count: state.backward.len(),
            forward_count: state.forward.len(),
            excluded: state.excluded,
            rows_written,
        };
        info!(
            new = outcome.new_ids.len(),
            backward = outcome.backward_count,
            forward = outcome.forward_count,
            "Round complete"
        );
        Ok(outcome)
    }

    /// Hydrate and append buffered discoveries, then snapshot the state
    async fn flush(&self, state: &mut CheckpointState) -> Result<(), RunError> {
        let appended = if state.buffer.is_empty() {
            0
        } else {
            let metadata = hydrate_metadata(
                self.client.as_ref(),
                &state.buffer,
                self.settings.metadata_batch_size,
            )
            .await;

            let records: Vec<DiscoveryRecord> = state
                .buffer
                .iter()
                .map(|id| {
                    DiscoveryRecord::new(
                        id,
                        metadata.get(id),
                        state.provenance_of(id),
                        self.settings.max_source_papers,
                    )
                })
                .collect();

            self.artifacts.partial.append(&records)?;
            state.buffer.clear();
            state.rows_committed += records.len();
            records.len()
        };

        self.artifacts.checkpoint.save(state)?;
        metrics::record_flush(appended);
        info!(
            rows = appended,
            total_rows = state.rows_committed,
            pending = state.pending.len(),
            "Flushed discoveries and saved checkpoint"
        );
        Ok(())
    }
}
