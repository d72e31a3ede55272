//! evidyne-pubmed — NCBI E-utilities client.
//! Covers the literature side of the workflow:
//! - esearch: hit counts and PMID lists for a query
//! - esummary: fast per-PMID summaries (title, publication date)
//! - efetch: abstract XML, parsed with quick-xml
//! - fetch_details: efetch and esummary merged by PMID into one record set

pub mod client;
pub mod models;

pub use client::EntrezClient;
pub use models::{ArticleDetails, SearchHits};
