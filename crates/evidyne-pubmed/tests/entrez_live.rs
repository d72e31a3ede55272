//! Live E-utilities tests against the real PubMed API.
//!
//! Run with: cargo test --package evidyne-pubmed --test entrez_live -- --ignored --nocapture

use evidyne_pubmed::EntrezClient;

#[tokio::test]
#[ignore] // Requires network access
async fn test_esearch_mesh_conjunction() {
    let client = EntrezClient::new(None).expect("client");

    let hits = client
        .esearch("\"Diabetes Mellitus, Type 2\"[MeSH Terms]", 5)
        .await
        .expect("esearch failed");

    println!("count={} ids={:?}", hits.count, hits.ids);
    assert!(hits.count > 0, "MeSH search should match something");
    assert!(hits.ids.len() <= 5);
}

#[tokio::test]
#[ignore] // Requires network access
async fn test_fetch_details_merges_both_phases() {
    let client = EntrezClient::new(None).expect("client");

    let hits = client
        .esearch("\"Heart Failure\"[MeSH Terms]", 3)
        .await
        .expect("esearch failed");
    let details = client.fetch_details(&hits.ids).await.expect("fetch failed");

    println!("fetched {} records", details.len());
    for d in &details {
        println!("\n---");
        println!("PMID: {}", d.id);
        println!("Title: {}", d.title);
        println!("Date: {:?}", d.publication_date);
        println!(
            "Abstract: {:?}",
            d.abstract_text.as_ref().map(|s| s.get(..200).unwrap_or(s))
        );
    }

    assert!(!details.is_empty(), "should fetch at least one record");
    assert!(details.iter().any(|d| d.publication_date.is_some()));
}
