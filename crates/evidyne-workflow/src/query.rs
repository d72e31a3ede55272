//! PubMed query construction.

use crate::state::KeywordCandidate;

/// Build the MeSH conjunction for the selected keywords, in list order:
/// `"t1"[MeSH Terms] AND "t2"[MeSH Terms] AND …`. Empty selection yields
/// an empty string, which callers treat as "do not search".
pub fn build_search_query(keywords: &[KeywordCandidate]) -> String {
    keywords
        .iter()
        .filter(|k| k.selected)
        .map(|k| format!("\"{}\"[MeSH Terms]", k.term))
        .collect::<Vec<_>>()
        .join(" AND ")
}
