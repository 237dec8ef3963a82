//! Round state and its durable snapshot
//!
//! The snapshot is a versioned JSON envelope written atomically. A missing,
//! unreadable or foreign snapshot loads as `None` and the round starts fresh.

use crate::errors::RunError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snowball_common::{Direction, PaperId, Provenance};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Snapshot schema version
pub const CHECKPOINT_VERSION: u32 = 1;

/// Everything needed to continue a round where it stopped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Frontier stack; the next id to expand is the last element
    pub pending: Vec<PaperId>,
    /// Frontier size at round start
    pub total: usize,
    /// Ids popped so far this round
    pub processed_in_round: usize,
    /// Ids never emitted as discoveries
    pub excluded: BTreeSet<PaperId>,
    /// Ids discovered this round
    pub discovered: BTreeSet<PaperId>,
    pub backward: BTreeSet<PaperId>,
    pub forward: BTreeSet<PaperId>,
    /// (source, direction) pairs per discovered id, in first-seen order
    pub provenance: BTreeMap<PaperId, Vec<Provenance>>,
    /// Discoveries not yet appended to the partial dataset
    pub buffer: Vec<PaperId>,
    /// Data rows in the partial dataset as of this snapshot
    pub rows_committed: usize,
}

impl CheckpointState {
    /// Start a round over `seeds`; seeds are always excluded from discovery
    pub fn fresh(seeds: &[PaperId], mut excluded: BTreeSet<PaperId>) -> Self {
        excluded.extend(seeds.iter().cloned());
        Self {
            pending: seeds.iter().rev().cloned().collect(),
            total: seeds.len(),
            excluded,
            ..Self::default()
        }
    }

    /// Record `paper_id` reached from `source` in `direction`
    ///
    /// Returns true only for the first sighting this round. Later sightings
    /// add their provenance without re-buffering the id.
    pub fn record_neighbor(&mut self, source: &str, direction: Direction, paper_id: &str) -> bool {
        if paper_id.is_empty() || self.excluded.contains(paper_id) {
            return false;
        }

        let is_new = self.discovered.insert(paper_id.to_string());

        let sources = self.provenance.entry(paper_id.to_string()).or_default();
        let link = Provenance::new(source, direction);
        if !sources.contains(&link) {
            sources.push(link);
        }

        match direction {
            Direction::Backward => self.backward.insert(paper_id.to_string()),
            Direction::Forward => self.forward.insert(paper_id.to_string()),
        };

        if is_new {
            self.buffer.push(paper_id.to_string());
        }
        is_new
    }

    pub fn provenance_of(&self, paper_id: &str) -> &[Provenance] {
        self.provenance
            .get(paper_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    state: &'a CheckpointState,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    saved_at: DateTime<Utc>,
    state: CheckpointState,
}

/// File-backed checkpoint store
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot through a temp file, fsync, then rename over the old one
    pub fn save(&self, state: &CheckpointState) -> Result<(), RunError> {
        let envelope = EnvelopeRef {
            version: CHECKPOINT_VERSION,
            saved_at: Utc::now(),
            state,
        };
        let bytes = serde_json::to_vec(&envelope).map_err(|e| RunError::checkpoint(&self.path, e))?;

        let tmp = temp_sibling(&self.path);
        let mut file = File::create(&tmp).map_err(|e| RunError::checkpoint(&tmp, e))?;
        file.write_all(&bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| RunError::checkpoint(&tmp, e))?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|e| RunError::checkpoint(&self.path, e))?;

        debug!(
            path = %self.path.display(),
            pending = state.pending.len(),
            discovered = state.discovered.len(),
            rows = state.rows_committed,
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Last saved state, or `None` when absent or unusable
    pub fn load(&self) -> Option<CheckpointState> {
        if !self.path.exists() {
            return None;
        }

        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read checkpoint; starting fresh");
                return None;
            }
        };

        let envelope: Envelope = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt checkpoint; starting fresh");
                return None;
            }
        };

        if envelope.version != CHECKPOINT_VERSION {
            warn!(
                path = %self.path.display(),
                version = envelope.version,
                expected = CHECKPOINT_VERSION,
                "Unsupported checkpoint version; starting fresh"
            );
            return None;
        }

        info!(
            path = %self.path.display(),
            saved_at = %envelope.saved_at,
            pending = envelope.state.pending.len(),
            "Loaded checkpoint"
        );
        Some(envelope.state)
    }

    pub fn clear(&self) -> Result<(), RunError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RunError::checkpoint(&self.path, e)),
        }
    }
}

pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
