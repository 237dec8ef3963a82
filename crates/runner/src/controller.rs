//! Run controller
//!
//! Entry point for a snowballing run: refuses to clobber a finished output,
//! resumes from a checkpoint when one exists, and writes the stats artifact.

use crate::checkpoint::CheckpointStore;
use crate::engine::{ExpansionEngine, RoundArtifacts};
use crate::errors::RunError;
use crate::output::PartialDataset;
use crate::seeds::load_seed_ids;
use crate::summary::RunSummary;
use snowball_common::config::{PathsConfig, SnowballConfig};
use snowball_common::{AppConfig, MetadataClient, PaperId};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument};

pub struct RunController {
    client: Arc<dyn MetadataClient>,
    settings: SnowballConfig,
    paths: PathsConfig,
}

impl RunController {
    pub fn new(client: Arc<dyn MetadataClient>, config: &AppConfig) -> Self {
        Self {
            client,
            settings: config.snowball.clone(),
            paths: config.paths.clone(),
        }
    }

    #[instrument(skip(self), fields(input = %self.paths.input.display(), output = %self.paths.output.display()))]
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let checkpoint = CheckpointStore::new(&self.paths.checkpoint);

        // An unusable checkpoint counts as no checkpoint
        let resume = checkpoint.load();
        if resume.is_none() && self.paths.output.exists() {
            return Err(RunError::AlreadyComplete {
                output: self.paths.output.clone(),
            });
        }

        let seeds = load_seed_ids(&self.paths.input)?;
        let excluded: BTreeSet<PaperId> = seeds.iter().cloned().collect();

        if let Some(state) = &resume {
            info!(pending = state.pending.len(), "Resuming from checkpoint");
        }

        let engine = ExpansionEngine::new(
            self.client.clone(),
            self.settings.clone(),
            RoundArtifacts {
                checkpoint,
                partial: PartialDataset::new(self.paths.partial_path()),
                output: self.paths.output.clone(),
            },
        );
        let outcome = engine.run_round(&seeds, excluded, resume).await?;

        let mut processed = outcome.excluded;
        processed.extend(outcome.new_ids.iter().cloned());

        let summary = RunSummary {
            seed_papers: seeds.len(),
            backward_found: outcome.backward_count,
            forward_found: outcome.forward_count,
            new_papers: outcome.new_ids.len(),
            unique_papers: processed.len(),
        };

        let stats_path = self.paths.stats_path();
        summary.write_to(&stats_path)?;
        info!(
            seeds = summary.seed_papers,
            backward = summary.backward_found,
            forward = summary.forward_found,
            new = summary.new_papers,
            unique = summary.unique_papers,
            stats = %stats_path.display(),
            "Snowballing complete"
        );

        Ok(summary)
    }
}
