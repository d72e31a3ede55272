//! PubMed-backed `LiteratureService`.

use async_trait::async_trait;

use evidyne_common::Result;
use evidyne_pubmed::{ArticleDetails, EntrezClient, SearchHits};

use crate::service::LiteratureService;

/// Thin adapter over the Entrez client. Search maps to `esearch`, detail
/// retrieval to the merged `esummary` + `efetch` path.
pub struct PubMedLiterature {
    client: EntrezClient,
}

impl PubMedLiterature {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: EntrezClient::new(api_key)?,
        })
    }
}

#[async_trait]
impl LiteratureService for PubMedLiterature {
    async fn search(&self, query: &str, max_results: usize) -> Result<SearchHits> {
        self.client.esearch(query, max_results).await
    }

    async fn fetch_details(&self, ids: &[String]) -> Result<Vec<ArticleDetails>> {
        self.client.fetch_details(ids).await
    }
}
