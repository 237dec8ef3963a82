//! Paper data model shared by the client and the runner

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier assigned by the scholarly metadata service
pub type PaperId = String;

/// Traversal direction relative to the paper being expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// A paper referenced by the expanded paper
    Backward,
    /// A paper citing the expanded paper
    Forward,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Backward => "backward",
            Direction::Forward => "forward",
        }
    }

    /// Label used in the output dataset
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Backward => "Backward",
            Direction::Forward => "Forward",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (source, direction) pair explaining how a paper was reached
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Provenance {
    pub source: PaperId,
    pub direction: Direction,
}

impl Provenance {
    pub fn new(source: impl Into<PaperId>, direction: Direction) -> Self {
        Self {
            source: source.into(),
            direction,
        }
    }
}

/// Full record from the generic paper lookup, used as the neighbor fallback
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub paper_id: PaperId,
    /// Ids this paper references (backward)
    pub references: Vec<PaperId>,
    /// Ids citing this paper (forward)
    pub citations: Vec<PaperId>,
    /// Declared reference count, which may exceed `references.len()`
    pub reference_count: u64,
    /// Declared citation count, which may exceed `citations.len()`
    pub citation_count: u64,
}

/// Title and DOI used to hydrate discovery rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub paper_id: PaperId,
    pub title: String,
    pub doi: String,
}

/// Best search hit for a title lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMatch {
    pub paper_id: PaperId,
    pub title: String,
    pub doi: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_labels() {
        assert_eq!(Direction::Backward.label(), "Backward");
        assert_eq!(Direction::Forward.to_string(), "forward");
        assert!(Direction::Backward < Direction::Forward);
    }

    #[test]
    fn test_provenance_serialization() {
        let p = Provenance::new("A", Direction::Forward);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"source":"A","direction":"forward"}"#);
    }
}
