//! Retrieval pipeline: lexical (BM25), vector, hybrid (RRF + optional
//! rerank/expansion), grounded answers, and document retrieval (spec §4.6,
//! §4.7).

pub mod ask;
pub mod get;
pub mod hybrid;
pub mod lexical;
pub mod uri;
pub mod vector;

use serde::Serialize;

use crate::error::{GnoError, Result};
use crate::models::{LineRange, SearchResult};
use crate::store::Store;

/// Shared input across `search`/`vsearch`/`query`/`ask` (spec §4.6).
#[derive(Debug, Clone)]
pub struct RetrievalInput {
    pub query_text: String,
    pub limit: usize,
    pub min_score: Option<f64>,
    pub collection_filter: Option<String>,
    pub language_hint: Option<String>,
    pub full: bool,
    pub line_numbers: bool,
}

impl RetrievalInput {
    pub fn validate(&self) -> Result<()> {
        if self.query_text.trim().is_empty() {
            return Err(GnoError::validation("queryText must not be empty"));
        }
        if let Some(min_score) = self.min_score {
            if !(0.0..=1.0).contains(&min_score) {
                return Err(GnoError::validation("minScore must lie in [0,1]"));
            }
        }
        Ok(())
    }
}

pub const DEFAULT_LIMIT_TERMINAL: usize = 5;
pub const DEFAULT_LIMIT_STRUCTURED: usize = 20;

/// Swap a result's chunk snippet for the document's full canonical markdown
/// (spec §4.6: `--full` returns the canonical markdown instead of the
/// representative chunk's body and `snippetRange`). Shared by `lexical` and
/// `vector`; `hybrid`/`ask` inherit it through their results.
pub(crate) async fn expand_to_full(store: &Store, result: &mut SearchResult) -> Result<()> {
    if let Some(doc) = store.get_document_by_docid(&result.docid).await? {
        let body = store.get_document_body(doc.id).await?;
        let line_count = body.lines().count().max(1) as i64;
        result.snippet = body;
        result.snippet_range = LineRange { start: 1, end: line_count };
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    Bm25,
    Vector,
    Hybrid,
}
