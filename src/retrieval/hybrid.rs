//! Hybrid retrieval (`query`): BM25 + vector fused by Reciprocal Rank
//! Fusion, with optional query expansion and rerank (spec §4.6).

use std::collections::HashMap;

use crate::error::Result;
use crate::llm::embedding::EmbeddingPort;
use crate::llm::rerank::{RerankCandidate, RerankPort};
use crate::llm::generation::GenerationPort;
use crate::models::SearchResult;
use crate::store::Store;

use super::{lexical, vector, RetrievalInput};

const RRF_K: f64 = 60.0;
const MAX_EXPANSIONS: usize = 4;

/// Reciprocal Rank Fusion over the BM25 and vector rankings for one query
/// variant. Returns fused scores keyed by docid.
fn rrf_fuse(rankings: &[Vec<SearchResult>]) -> HashMap<String, (f64, SearchResult)> {
    let mut fused: HashMap<String, (f64, SearchResult)> = HashMap::new();
    for ranking in rankings {
        for (rank, hit) in ranking.iter().enumerate() {
            let contribution = 1.0 / (RRF_K + (rank + 1) as f64);
            fused
                .entry(hit.docid.clone())
                .and_modify(|(score, _)| *score += contribution)
                .or_insert_with(|| (contribution, hit.clone()));
        }
    }
    fused
}

pub async fn query(
    store: &Store,
    embed_port: &dyn EmbeddingPort,
    generation_port: Option<&dyn GenerationPort>,
    rerank_port: Option<&dyn RerankPort>,
    input: &RetrievalInput,
) -> Result<Vec<SearchResult>> {
    input.validate()?;

    // Fetch enough from each path to let fusion and rerank have real
    // candidate depth even when the final limit is small.
    let fetch_limit = (input.limit * 4).max(40);
    let mut widened = input.clone();
    widened.limit = fetch_limit;
    widened.min_score = None;

    let mut query_variants = vec![input.query_text.clone()];
    if let Some(gen_port) = generation_port {
        if let Ok(expansions) = expand_query(gen_port, &input.query_text).await {
            query_variants.extend(expansions.into_iter().take(MAX_EXPANSIONS));
        }
    }

    let mut rankings = Vec::new();
    for variant in &query_variants {
        let mut variant_input = widened.clone();
        variant_input.query_text = variant.clone();

        let bm25 = lexical::search(store, &variant_input).await.unwrap_or_default();
        rankings.push(bm25);

        match vector::vsearch(store, embed_port, &variant_input).await {
            Ok(vec_hits) => rankings.push(vec_hits),
            // A missing vector index degrades gracefully to lexical-only fusion.
            Err(_) => {}
        }
    }

    let fused = rrf_fuse(&rankings);
    let mut results: Vec<(f64, SearchResult)> = fused.into_values().collect();
    results.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let rerank_window = (input.limit * 4).max(40);
    results.truncate(rerank_window);

    if let Some(reranker) = rerank_port {
        if let Ok(reranked) = apply_rerank(reranker, &input.query_text, &results).await {
            results = reranked;
        }
    }

    let max_score = results.iter().map(|(s, _)| *s).fold(f64::MIN, f64::max);
    let max_score = if max_score.is_finite() && max_score > 0.0 { max_score } else { 1.0 };

    let mut final_results: Vec<SearchResult> = results
        .into_iter()
        .map(|(score, mut hit)| {
            hit.score = (score / max_score).clamp(0.0, 1.0);
            hit
        })
        .collect();

    if let Some(min_score) = input.min_score {
        final_results.retain(|r| r.score >= min_score);
    }
    final_results.truncate(input.limit);
    Ok(final_results)
}

/// Up to `MAX_EXPANSIONS` query reformulations via the generation port.
/// Failure here is non-fatal to the caller (spec §4.6: expansion is best-effort).
async fn expand_query(
    gen_port: &dyn GenerationPort,
    query_text: &str,
) -> Result<Vec<String>> {
    let prompt = format!(
        "Suggest up to {MAX_EXPANSIONS} alternative search phrasings for this query, one per line, no numbering:\n{query_text}"
    );
    let raw = gen_port
        .generate(&prompt, 256, None)
        .await
        .map_err(|e| crate::error::GnoError::ModelUnavailable(e.to_string()))?;
    Ok(raw
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .take(MAX_EXPANSIONS)
        .collect())
}

async fn apply_rerank(
    reranker: &dyn RerankPort,
    query_text: &str,
    results: &[(f64, SearchResult)],
) -> Result<Vec<(f64, SearchResult)>> {
    crate::llm::rerank::reject_empty_query(query_text)
        .map_err(|e| crate::error::GnoError::ModelUnavailable(e.to_string()))?;

    let candidates: Vec<RerankCandidate> = results
        .iter()
        .enumerate()
        .map(|(i, (_, hit))| RerankCandidate { original_rank: i, text: hit.snippet.clone() })
        .collect();

    let scored = reranker
        .rerank(query_text, &candidates)
        .await
        .map_err(|e| crate::error::GnoError::ModelUnavailable(e.to_string()))?;

    let mut by_rank: HashMap<usize, f64> = HashMap::new();
    for s in scored {
        by_rank.insert(s.original_rank, s.score);
    }

    let mut replaced: Vec<(f64, SearchResult)> = results
        .iter()
        .enumerate()
        .map(|(i, (fused_score, hit))| {
            let score = by_rank.get(&i).copied().unwrap_or(*fused_score);
            (score, hit.clone())
        })
        .collect();
    replaced.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    Ok(replaced)
}
