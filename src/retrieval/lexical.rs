//! BM25-only retrieval (`search`), spec §4.6.

use crate::error::Result;
use crate::models::SearchResult;
use crate::store::{SearchFilter, Store};

use super::RetrievalInput;

pub async fn search(store: &Store, input: &RetrievalInput) -> Result<Vec<SearchResult>> {
    input.validate()?;

    let filter = SearchFilter {
        collection: input.collection_filter.clone(),
        language_hint: input.language_hint.clone(),
    };

    let hits = store.lexical_search(&input.query_text, &filter, input.limit as i64).await?;

    let max_score = hits.iter().map(|h| h.bm25_score).fold(f64::MIN, f64::max);
    let max_score = if max_score.is_finite() && max_score > 0.0 { max_score } else { 1.0 };

    let mut results: Vec<SearchResult> = hits
        .into_iter()
        .map(|hit| SearchResult {
            docid: hit.docid,
            uri: hit.uri,
            title: hit.title,
            collection: hit.collection,
            // Per-query min-max normalization into [0,1]; documented in SPEC_FULL.md.
            score: (hit.bm25_score / max_score).clamp(0.0, 1.0),
            snippet: hit.snippet,
            snippet_range: hit.snippet_range,
        })
        .collect();

    if let Some(min_score) = input.min_score {
        results.retain(|r| r.score >= min_score);
    }
    results.truncate(input.limit);

    if input.full {
        for result in &mut results {
            super::expand_to_full(store, result).await?;
        }
    }

    Ok(results)
}
