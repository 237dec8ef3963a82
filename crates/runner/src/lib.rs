//! Snowball Runner
//!
//! One-round citation snowballing over a seed set of papers:
//! 1. Loads seed ids from the input dataset
//! 2. Resolves backward and forward neighbors for each seed
//! 3. Records new discoveries with their provenance
//! 4. Periodically flushes rows and checkpoints the round
//! 5. Writes the final dataset and run statistics

pub mod checkpoint;
pub mod controller;
pub mod engine;
pub mod errors;
pub mod lookup;
pub mod output;
pub mod resolver;
pub mod seeds;
pub mod summary;

pub use checkpoint::{CheckpointState, CheckpointStore};
pub use controller::RunController;
pub use engine::{ExpansionEngine, RoundArtifacts, RoundOutcome};
pub use errors::RunError;
pub use lookup::IdLookup;
pub use output::{DiscoveryRecord, PartialDataset};
pub use resolver::{NeighborResolver, Neighbors};
pub use summary::RunSummary;
