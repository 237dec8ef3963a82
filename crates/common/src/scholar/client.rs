//! Semantic Scholar Graph API client
//!
//! Transient failures (timeouts, connection errors, 429, 5xx) are retried
//! with exponential backoff; anything else is returned to the caller.

use super::types::{BatchRequest, LinkKind, LinkPage, PaperResponse, SearchResponse};
use super::MetadataClient;
use crate::config::ScholarConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{PaperId, PaperMatch, PaperMetadata, PaperRecord};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const USER_AGENT: &str = concat!("snowball/", env!("CARGO_PKG_VERSION"));

/// Fields requested by the neighbor fallback lookup
const FALLBACK_FIELDS: &str = "references.paperId,citations.paperId,referenceCount,citationCount";

/// Fields requested for metadata hydration and search
const METADATA_FIELDS: &str = "paperId,title,externalIds";

/// Semantic Scholar client
pub struct SemanticScholarClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    page_limit: usize,
    max_retry_elapsed: Duration,
}

impl SemanticScholarClient {
    /// Create a new client from configuration
    pub fn new(config: &ScholarConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(USER_AGENT)
            .build()?;

        if config.page_limit == 0 {
            return Err(AppError::Configuration {
                message: "scholar.page_limit must be positive".to_string(),
            });
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            page_limit: config.page_limit,
            max_retry_elapsed: config.max_retry_elapsed(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.api_key {
            Some(ref key) => request.header("x-api-key", key),
            None => request,
        }
    }

    /// Send a request with retry and decode the JSON body
    async fn execute<T, F>(&self, endpoint: &'static str, paper_id: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.max_retry_elapsed),
            ..ExponentialBackoff::default()
        };
        let build = &build;
        let this = self;

        let result = retry(policy, move || async move {
            let response = this
                .authorize(build())
                .send()
                .await
                .map_err(|e| classify(AppError::from(e), endpoint))?;

            let status = response.status();

            if status == StatusCode::NOT_FOUND {
                return Err(backoff::Error::permanent(AppError::PaperNotFound {
                    id: paper_id.to_string(),
                }));
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok());
                debug!(endpoint, ?retry_after_secs, "Rate limited, backing off");
                let err = AppError::RateLimited {
                    service: "semantic-scholar".to_string(),
                    retry_after_secs,
                };
                return Err(match retry_after_secs {
                    Some(secs) => backoff::Error::retry_after(err, Duration::from_secs(secs)),
                    None => backoff::Error::transient(err),
                });
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(classify(
                    AppError::Upstream {
                        endpoint: endpoint.to_string(),
                        status: status.as_u16(),
                        message: body,
                    },
                    endpoint,
                ));
            }

            response.json::<T>().await.map_err(|e| {
                backoff::Error::permanent(AppError::InvalidPayload {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                })
            })
        })
        .await;

        if let Err(ref e) = result {
            metrics::record_api_failure(endpoint);
            debug!(endpoint, paper_id, error = %e, code = ?e.code(), "Scholar request failed");
        }

        result
    }

    /// Page through `/paper/{id}/{references|citations}`
    async fn fetch_links(&self, paper_id: &str, kind: LinkKind, limit: usize) -> Result<Vec<PaperId>> {
        let url = self.url(&format!("paper/{}/{}", paper_id, kind.path()));
        let mut ids = Vec::new();
        let mut offset = 0usize;

        while ids.len() < limit {
            let page_size = self.page_limit.min(limit - ids.len());
            let page: LinkPage = self
                .execute(kind.path(), paper_id, || {
                    self.client.get(&url).query(&[
                        ("fields", "paperId".to_string()),
                        ("offset", offset.to_string()),
                        ("limit", page_size.to_string()),
                    ])
                })
                .await?;

            let page_len = page.len();
            let next = page.next;
            ids.extend(page.neighbor_ids(kind));

            match next {
                Some(next) if page_len > 0 && next > offset => offset = next,
                _ => break,
            }
        }

        ids.truncate(limit);
        debug!(paper_id, endpoint = kind.path(), count = ids.len(), "Fetched neighbor ids");
        Ok(ids)
    }
}

/// Wrap an error for the retry loop according to its transience
fn classify(err: AppError, endpoint: &'static str) -> backoff::Error<AppError> {
    if err.is_transient() {
        warn!(endpoint, error = %err, "Transient scholar failure, retrying");
        backoff::Error::transient(err)
    } else {
        backoff::Error::permanent(err)
    }
}

#[async_trait]
impl MetadataClient for SemanticScholarClient {
    #[instrument(skip(self))]
    async fn fetch_references(&self, paper_id: &str, limit: usize) -> Result<Vec<PaperId>> {
        self.fetch_links(paper_id, LinkKind::References, limit).await
    }

    #[instrument(skip(self))]
    async fn fetch_citations(&self, paper_id: &str, limit: usize) -> Result<Vec<PaperId>> {
        self.fetch_links(paper_id, LinkKind::Citations, limit).await
    }

    #[instrument(skip(self))]
    async fn get_paper(&self, paper_id: &str) -> Result<PaperRecord> {
        let url = self.url(&format!("paper/{}", paper_id));
        let paper: PaperResponse = self
            .execute("paper", paper_id, || {
                self.client.get(&url).query(&[("fields", FALLBACK_FIELDS)])
            })
            .await?;
        Ok(paper.into_record(paper_id))
    }

    #[instrument(skip(self, paper_ids), fields(batch = paper_ids.len()))]
    async fn get_papers(&self, paper_ids: &[PaperId]) -> Result<Vec<PaperMetadata>> {
        if paper_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.url("paper/batch");
        let body = BatchRequest { ids: paper_ids };
        let papers: Vec<Option<PaperResponse>> = self
            .execute("batch", "batch", || {
                self.client
                    .post(&url)
                    .query(&[("fields", METADATA_FIELDS)])
                    .json(&body)
            })
            .await?;

        let requested = papers.len();
        let found: Vec<PaperMetadata> = papers
            .into_iter()
            .flatten()
            .filter_map(PaperResponse::into_metadata)
            .collect();

        if found.len() < requested {
            debug!(requested, found = found.len(), "Some batch ids were not found");
        }

        Ok(found)
    }

    #[instrument(skip(self))]
    async fn search_paper(&self, title: &str, year: Option<i32>) -> Result<Option<PaperMatch>> {
        let url = self.url("paper/search");
        let response: SearchResponse = self
            .execute("search", title, || {
                let mut query = vec![
                    ("query", title.to_string()),
                    ("fields", METADATA_FIELDS.to_string()),
                    ("limit", "1".to_string()),
                ];
                if let Some(year) = year {
                    query.push(("year", year.to_string()));
                }
                self.client.get(&url).query(&query)
            })
            .await?;

        debug!(title, total = ?response.total, "Search completed");

        Ok(response
            .data
            .unwrap_or_default()
            .into_iter()
            .find_map(PaperResponse::into_match))
    }

    fn name(&self) -> &str {
        "semantic-scholar"
    }
}
