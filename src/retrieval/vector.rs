//! Vector-only retrieval (`vsearch`), spec §4.6.

use std::collections::HashMap;

use crate::error::{GnoError, Result};
use crate::llm::embedding::{embed_query, EmbeddingPort};
use crate::models::{LineRange, SearchResult};
use crate::store::{SearchFilter, Store};

use super::RetrievalInput;

pub async fn vsearch(
    store: &Store,
    embed_port: &dyn EmbeddingPort,
    input: &RetrievalInput,
) -> Result<Vec<SearchResult>> {
    input.validate()?;

    let model_id = embed_port.model_id().to_string();
    if store.embedded_count_for_model(&model_id).await? == 0 {
        return Err(GnoError::VectorIndexUnavailable(format!(
            "no vectors indexed for active embedding model '{model_id}'"
        )));
    }

    let query_vector = embed_query(embed_port, &input.query_text)
        .await
        .map_err(|e| GnoError::VectorIndexUnavailable(e.to_string()))?;

    let filter = SearchFilter {
        collection: input.collection_filter.clone(),
        language_hint: input.language_hint.clone(),
    };

    // Over-fetch chunk-level hits since several chunks of the same document
    // can match; collapse to one hit per document keeping the best chunk.
    let chunk_hits = store
        .vector_search(&query_vector, &model_id, &filter, (input.limit as i64) * 8)
        .await?;

    let mut best_per_doc: HashMap<i64, crate::store::VectorHit> = HashMap::new();
    for hit in chunk_hits {
        best_per_doc
            .entry(hit.document_id)
            .and_modify(|existing| {
                if hit.similarity > existing.similarity {
                    *existing = hit.clone();
                }
            })
            .or_insert(hit);
    }

    let mut ranked: Vec<crate::store::VectorHit> = best_per_doc.into_values().collect();
    ranked.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(input.limit);

    let mut results = Vec::with_capacity(ranked.len());
    for hit in ranked {
        let doc = store.get_document_by_id(hit.document_id).await?;
        let chunk = store.get_chunk(hit.chunk_id).await?;
        // Cosine similarity lies in [-1,1]; rescale into the score contract's [0,1].
        let score = ((hit.similarity + 1.0) / 2.0).clamp(0.0, 1.0);

        if let Some(min_score) = input.min_score {
            if score < min_score {
                continue;
            }
        }

        let (snippet, snippet_range) = if input.full {
            let body = store.get_document_body(doc.id).await?;
            let line_count = body.lines().count().max(1) as i64;
            (body, LineRange { start: 1, end: line_count })
        } else {
            let snippet: String = chunk.text.chars().take(240).collect();
            (snippet, LineRange { start: chunk.start_line, end: chunk.end_line })
        };

        results.push(SearchResult {
            docid: doc.docid,
            uri: doc.uri,
            title: doc.title,
            collection: doc.collection,
            score,
            snippet,
            snippet_range,
        });
    }

    Ok(results)
}
