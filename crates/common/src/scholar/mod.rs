//! Scholarly metadata service abstraction
//!
//! Provides a unified interface over the paper-metadata API:
//! - Paginated reference/citation listing
//! - Generic paper lookup (neighbor fallback)
//! - Batch title/DOI hydration
//! - Title search for seed id resolution
//!
//! The service is treated as unreliable; every call returns a `Result`
//! and callers decide how to degrade.

mod client;
mod mock;
mod types;

pub use client::SemanticScholarClient;
pub use mock::{CallLog, MockScholarClient};

use crate::config::ScholarConfig;
use crate::errors::Result;
use crate::models::{PaperId, PaperMatch, PaperMetadata, PaperRecord};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for paper-metadata lookups
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Ids referenced by `paper_id` (backward), at most `limit`
    async fn fetch_references(&self, paper_id: &str, limit: usize) -> Result<Vec<PaperId>>;

    /// Ids citing `paper_id` (forward), at most `limit`
    async fn fetch_citations(&self, paper_id: &str, limit: usize) -> Result<Vec<PaperId>>;

    /// Full record including reference/citation sub-lists and declared counts
    async fn get_paper(&self, paper_id: &str) -> Result<PaperRecord>;

    /// Title/DOI for a batch of ids; ids the service does not know are omitted
    async fn get_papers(&self, paper_ids: &[PaperId]) -> Result<Vec<PaperMetadata>>;

    /// Most relevant hit for a title, optionally restricted to a year
    async fn search_paper(&self, title: &str, year: Option<i32>) -> Result<Option<PaperMatch>>;

    /// Client name for logs
    fn name(&self) -> &str;
}

/// Create a metadata client based on configuration
pub fn create_client(provider: &str, config: &ScholarConfig) -> Result<Arc<dyn MetadataClient>> {
    match provider {
        "semantic-scholar" => Ok(Arc::new(SemanticScholarClient::new(config)?)),
        "mock" => Ok(Arc::new(MockScholarClient::new())),
        _ => {
            tracing::warn!(provider = provider, "Unknown metadata provider, using Semantic Scholar");
            Ok(Arc::new(SemanticScholarClient::new(config)?))
        }
    }
}
