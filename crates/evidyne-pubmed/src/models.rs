use serde::{Deserialize, Serialize};

/// Outcome of an esearch call: the total match count reported by PubMed and
/// the capped PMID list actually returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHits {
    pub count: u64,
    pub ids: Vec<String>,
}

/// One article record. `esummary` fills title and publication date,
/// `efetch` fills title and abstract; the merged record carries both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleDetails {
    pub id: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub publication_date: Option<String>,
}

impl ArticleDetails {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            abstract_text: None,
            publication_date: None,
        }
    }
}
