//! Wire types for the Semantic Scholar Graph API
//!
//! Every field is optional: the service omits or nulls fields freely, and a
//! missing field must turn into an empty value rather than a parse failure.

use crate::models::{PaperId, PaperMatch, PaperMetadata, PaperRecord};
use serde::Deserialize;
use std::collections::HashMap;

/// `{ "paperId": ... }` stub as embedded in link and list responses
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct PaperStub {
    pub paper_id: Option<String>,
}

/// One entry of a `/references` or `/citations` page
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct LinkItem {
    pub cited_paper: Option<PaperStub>,
    pub citing_paper: Option<PaperStub>,
}

/// A page of `/references` or `/citations`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct LinkPage {
    pub offset: Option<usize>,
    pub next: Option<usize>,
    pub data: Option<Vec<LinkItem>>,
}

/// Paper object from `/paper/{id}`, `/paper/batch` and `/paper/search`
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct PaperResponse {
    pub paper_id: Option<String>,
    pub title: Option<String>,
    pub external_ids: Option<HashMap<String, serde_json::Value>>,
    pub references: Option<Vec<PaperStub>>,
    pub citations: Option<Vec<PaperStub>>,
    pub reference_count: Option<u64>,
    pub citation_count: Option<u64>,
}

/// `/paper/search` envelope
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SearchResponse {
    pub total: Option<u64>,
    pub data: Option<Vec<PaperResponse>>,
}

/// `/paper/batch` request body
#[derive(Debug, serde::Serialize)]
pub(crate) struct BatchRequest<'a> {
    pub ids: &'a [PaperId],
}

/// Which side of a link entry carries the neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkKind {
    References,
    Citations,
}

impl LinkKind {
    pub fn path(&self) -> &'static str {
        match self {
            LinkKind::References => "references",
            LinkKind::Citations => "citations",
        }
    }
}

fn stub_ids(stubs: Option<Vec<PaperStub>>) -> Vec<PaperId> {
    stubs
        .unwrap_or_default()
        .into_iter()
        .filter_map(|s| s.paper_id)
        .filter(|id| !id.is_empty())
        .collect()
}

impl LinkPage {
    /// Neighbor ids on this page, skipping entries without a paperId
    pub fn neighbor_ids(self, kind: LinkKind) -> Vec<PaperId> {
        self.data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| match kind {
                LinkKind::References => item.cited_paper,
                LinkKind::Citations => item.citing_paper,
            })
            .filter_map(|stub| stub.paper_id)
            .filter(|id| !id.is_empty())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.as_ref().map(Vec::len).unwrap_or(0)
    }
}

impl PaperResponse {
    fn doi(&self) -> String {
        self.external_ids
            .as_ref()
            .and_then(|ids| ids.get("DOI"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    pub fn into_record(self, requested_id: &str) -> PaperRecord {
        PaperRecord {
            paper_id: self.paper_id.unwrap_or_else(|| requested_id.to_string()),
            references: stub_ids(self.references),
            citations: stub_ids(self.citations),
            reference_count: self.reference_count.unwrap_or(0),
            citation_count: self.citation_count.unwrap_or(0),
        }
    }

    /// `None` when the response carries no paperId to key the metadata by
    pub fn into_metadata(self) -> Option<PaperMetadata> {
        let doi = self.doi();
        let paper_id = self.paper_id.filter(|id| !id.is_empty())?;
        Some(PaperMetadata {
            paper_id,
            title: self.title.unwrap_or_default(),
            doi,
        })
    }

    pub fn into_match(self) -> Option<PaperMatch> {
        self.into_metadata().map(|m| PaperMatch {
            paper_id: m.paper_id,
            title: m.title,
            doi: m.doi,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_page_skips_null_ids() {
        let body = r#"{
            "offset": 0,
            "next": 2,
            "data": [
                {"citedPaper": {"paperId": "abc"}},
                {"citedPaper": {"paperId": null}},
                {"citedPaper": null},
                {"citedPaper": {"paperId": "def", "title": "ignored"}}
            ]
        }"#;
        let page: LinkPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.next, Some(2));
        assert_eq!(page.len(), 4);
        assert_eq!(page.neighbor_ids(LinkKind::References), vec!["abc", "def"]);
    }

    #[test]
    fn test_citation_page_reads_citing_side() {
        let body = r#"{"data": [{"citingPaper": {"paperId": "x1"}, "citedPaper": {"paperId": "nope"}}]}"#;
        let page: LinkPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.next, None);
        assert_eq!(page.neighbor_ids(LinkKind::Citations), vec!["x1"]);
    }

    #[test]
    fn test_null_data_is_empty() {
        let page: LinkPage = serde_json::from_str(r#"{"offset": 0, "data": null}"#).unwrap();
        assert_eq!(page.len(), 0);
        assert!(page.neighbor_ids(LinkKind::References).is_empty());
    }

    #[test]
    fn test_paper_record_defaults() {
        let body = r#"{"paperId": "p1", "referenceCount": 12}"#;
        let paper: PaperResponse = serde_json::from_str(body).unwrap();
        let record = paper.into_record("p1");
        assert_eq!(record.reference_count, 12);
        assert_eq!(record.citation_count, 0);
        assert!(record.references.is_empty());
        assert!(record.citations.is_empty());
    }

    #[test]
    fn test_metadata_reads_doi_from_external_ids() {
        let body = r#"{
            "paperId": "p1",
            "title": "Assigning change requests",
            "externalIds": {"DOI": "10.1002/smr.530", "CorpusId": 12345}
        }"#;
        let paper: PaperResponse = serde_json::from_str(body).unwrap();
        let meta = paper.into_metadata().unwrap();
        assert_eq!(meta.doi, "10.1002/smr.530");
        assert_eq!(meta.title, "Assigning change requests");
    }

    #[test]
    fn test_metadata_without_id_is_dropped() {
        let paper: PaperResponse = serde_json::from_str(r#"{"title": "orphan"}"#).unwrap();
        assert!(paper.into_metadata().is_none());
    }
}
