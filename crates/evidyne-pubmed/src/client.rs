//! PubMed E-utilities client.
//!
//! Endpoints used:
//!   esearch:  https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi
//!   esummary: https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esummary.fcgi
//!   efetch:   https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi

use std::collections::HashMap;

use evidyne_common::error::Result;
use evidyne_common::sandbox::SandboxClient as Client;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, instrument, warn};

use crate::models::{ArticleDetails, SearchHits};

const SEARCH_ENDPOINT: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const SUMMARY_ENDPOINT: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esummary.fcgi";
const FETCH_ENDPOINT: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

pub struct EntrezClient {
    client: Client,
    api_key: Option<String>,
}

impl EntrezClient {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: Client::new()?,
            api_key,
        })
    }

    /// Common query parameters for the JSON endpoints (esearch, esummary).
    fn json_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("retmode", "json".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    /// Search PubMed. Returns the total match count and at most `max` PMIDs.
    #[instrument(skip(self))]
    pub async fn esearch(&self, query: &str, max: usize) -> Result<SearchHits> {
        let mut params = self.json_params();
        params.extend([
            ("term", query.to_string()),
            ("retmax", max.to_string()),
            ("usehistory", "n".to_string()),
        ]);

        let resp: serde_json::Value = self
            .client
            .get(SEARCH_ENDPOINT)?
            .query(&params)
            .send()
            .await?
            .json()
            .await?;

        let result = &resp["esearchresult"];
        // esearch reports the count as a JSON string
        let count = result["count"]
            .as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .or_else(|| result["count"].as_u64())
            .unwrap_or(0);
        let ids: Vec<String> = match result["idlist"].as_array() {
            Some(list) => list.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
            None => Vec::new(),
        };

        debug!(count, returned = ids.len(), "PubMed esearch completed");
        Ok(SearchHits { count, ids })
    }

    /// Fetch esummary records for a list of PMIDs: title and publication
    /// date, no abstract. Records come back in the input id order.
    #[instrument(skip(self, pmids), fields(n = pmids.len()))]
    pub async fn esummary(&self, pmids: &[String]) -> Result<Vec<ArticleDetails>> {
        if pmids.is_empty() {
            return Ok(vec![]);
        }

        let mut params = self.json_params();
        params.push(("id", pmids.join(",")));

        let resp: serde_json::Value = self
            .client
            .get(SUMMARY_ENDPOINT)?
            .query(&params)
            .send()
            .await?
            .json()
            .await?;

        let result = &resp["result"];
        let mut records = Vec::with_capacity(pmids.len());
        for id in pmids {
            let entry = &result[id.as_str()];
            if entry.is_null() {
                warn!(pmid = %id, "esummary returned no record");
                continue;
            }
            let mut details = ArticleDetails::new(id.clone());
            details.title = entry["title"].as_str().unwrap_or("").to_string();
            details.publication_date = entry["pubdate"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(String::from);
            records.push(details);
        }

        debug!(returned = records.len(), "PubMed esummary completed");
        Ok(records)
    }

    /// Fetch efetch abstract XML for a list of PMIDs and parse it: title and
    /// abstract, no publication date.
    #[instrument(skip(self, pmids), fields(n = pmids.len()))]
    pub async fn efetch(&self, pmids: &[String]) -> Result<Vec<ArticleDetails>> {
        if pmids.is_empty() {
            return Ok(vec![]);
        }

        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("id", pmids.join(",")),
            ("rettype", "abstract".to_string()),
            ("retmode", "xml".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let xml = self
            .client
            .get(FETCH_ENDPOINT)?
            .query(&params)
            .send()
            .await?
            .text()
            .await?;

        parse_pubmed_xml(&xml)
    }

    /// Resolve esummary and efetch for the same PMIDs and merge them by id.
    /// esummary is mandatory (its failure propagates); an efetch failure is
    /// logged and the summary records are served with no abstract.
    pub async fn fetch_details(&self, pmids: &[String]) -> Result<Vec<ArticleDetails>> {
        if pmids.is_empty() {
            return Ok(vec![]);
        }

        let summaries = self.esummary(pmids).await?;
        let fetched = match self.efetch(pmids).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "efetch failed, falling back to summary records");
                Vec::new()
            }
        };

        Ok(merge_records(pmids, summaries, fetched))
    }
}

/// Merge summary and abstract records by PMID, preserving the input id
/// order. The efetch record wins per field when present; ids missing from
/// efetch keep their summary fields; ids found in neither response are
/// dropped.
fn merge_records(
    pmids: &[String],
    summaries: Vec<ArticleDetails>,
    fetched: Vec<ArticleDetails>,
) -> Vec<ArticleDetails> {
    let mut summaries: HashMap<String, ArticleDetails> =
        summaries.into_iter().map(|r| (r.id.clone(), r)).collect();
    let mut fetched: HashMap<String, ArticleDetails> =
        fetched.into_iter().map(|r| (r.id.clone(), r)).collect();

    let mut merged = Vec::with_capacity(pmids.len());
    for id in pmids {
        match (summaries.remove(id), fetched.remove(id)) {
            (Some(mut summary), Some(full)) => {
                if !full.title.is_empty() {
                    summary.title = full.title;
                }
                summary.abstract_text = full.abstract_text.or(summary.abstract_text);
                merged.push(summary);
            }
            (Some(summary), None) => {
                warn!(pmid = %id, "no efetch record, keeping summary fields");
                merged.push(summary);
            }
            (None, Some(full)) => merged.push(full),
            (None, None) => {
                warn!(pmid = %id, "PMID absent from both esummary and efetch");
            }
        }
    }
    merged
}

/// Parse PubMed XML (efetch abstract mode) into ArticleDetails.
/// Handles the <PubmedArticleSet><PubmedArticle> structure.
fn parse_pubmed_xml(xml: &str) -> Result<Vec<ArticleDetails>> {
    let mut articles = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // Flags track which element encloses the current text node
    let mut current: Option<ArticleDetails> = None;
    let mut in_pmid = false;
    let mut in_title = false;
    let mut in_abstract = false;
    let mut abstract_parts: Vec<String> = Vec::new();
    let mut current_part = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"PubmedArticle" => {
                    current = Some(ArticleDetails::new(""));
                    abstract_parts.clear();
                }
                b"PMID" => in_pmid = true,
                b"ArticleTitle" => in_title = true,
                b"AbstractText" => {
                    in_abstract = true;
                    current_part.clear();
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if let Some(ref mut article) = current {
                    // The article's own PMID comes first; later <PMID>
                    // elements belong to the reference list
                    if in_pmid && article.id.is_empty() {
                        article.id = text.clone();
                    }
                    // Titles and abstracts may be split by inline markup
                    if in_title {
                        push_fragment(&mut article.title, &text);
                    }
                    if in_abstract {
                        push_fragment(&mut current_part, &text);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"PMID" => in_pmid = false,
                b"ArticleTitle" => in_title = false,
                b"AbstractText" => {
                    in_abstract = false;
                    if !current_part.is_empty() {
                        abstract_parts.push(std::mem::take(&mut current_part));
                    }
                }
                b"PubmedArticle" => {
                    if let Some(mut article) = current.take() {
                        if !abstract_parts.is_empty() {
                            article.abstract_text = Some(abstract_parts.join(" "));
                            abstract_parts.clear();
                        }
                        if !article.id.is_empty() && !article.title.is_empty() {
                            articles.push(article);
                        } else {
                            warn!("skipping article with missing PMID or title");
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, "malformed efetch XML, keeping articles parsed so far");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(articles)
}

fn push_fragment(target: &mut String, fragment: &str) {
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(fragment);
}
