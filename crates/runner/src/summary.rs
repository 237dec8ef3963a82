//! Run statistics artifact

use crate::errors::RunError;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;

/// Counts reported after a round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub seed_papers: usize,
    pub backward_found: usize,
    pub forward_found: usize,
    pub new_papers: usize,
    /// Seeds, prior exclusions and this round's discoveries
    pub unique_papers: usize,
}

impl RunSummary {
    pub fn write_to(&self, path: &Path) -> Result<(), RunError> {
        fs::write(path, self.to_string()).map_err(|e| RunError::output(path, e))
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Initial seed papers: {}", self.seed_papers)?;
        writeln!(f, "Backward papers found: {}", self.backward_found)?;
        writeln!(f, "Forward papers found: {}", self.forward_found)?;
        writeln!(f, "Total new papers: {}", self.new_papers)?;
        writeln!(f, "Total unique papers (including seeds): {}", self.unique_papers)
    }
}
