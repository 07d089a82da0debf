//! Grounded answer assembly (`ask`), spec §4.6.

use serde::Serialize;

use crate::error::Result;
use crate::llm::embedding::EmbeddingPort;
use crate::llm::generation::GenerationPort;
use crate::llm::rerank::RerankPort;
use crate::models::SearchResult;
use crate::store::Store;

use super::{hybrid, RetrievalInput};

const CONTEXT_BLOCK_CHARS: usize = 1_500;

#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub docid: String,
    pub uri: String,
    pub start_line: i64,
    pub end_line: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub answer: Option<String>,
    pub citations: Vec<Citation>,
    pub answer_generated: bool,
}

pub async fn ask(
    store: &Store,
    embed_port: &dyn EmbeddingPort,
    generation_port: Option<&dyn GenerationPort>,
    rerank_port: Option<&dyn RerankPort>,
    input: &RetrievalInput,
) -> Result<AskResponse> {
    input.validate()?;

    let results = hybrid::query(store, embed_port, generation_port, rerank_port, input).await?;

    let Some(gen_port) = generation_port else {
        return Ok(AskResponse {
            query: input.query_text.clone(),
            results,
            answer: None,
            citations: Vec::new(),
            answer_generated: false,
        });
    };

    let prompt = build_prompt(&input.query_text, &results);

    match gen_port.generate(&prompt, 1024, None).await {
        Ok(answer) => {
            let citations = parse_citations(&answer, &results);
            Ok(AskResponse {
                query: input.query_text.clone(),
                results,
                answer: Some(answer),
                citations,
                answer_generated: true,
            })
        }
        // Generation failures degrade to retrieval-only; never fatal (spec §4.6).
        Err(_) => Ok(AskResponse {
            query: input.query_text.clone(),
            results,
            answer: None,
            citations: Vec::new(),
            answer_generated: false,
        }),
    }
}

fn build_prompt(query_text: &str, results: &[SearchResult]) -> String {
    let mut blocks = String::new();
    for (i, hit) in results.iter().enumerate() {
        let truncated: String = hit.snippet.chars().take(CONTEXT_BLOCK_CHARS).collect();
        blocks.push_str(&format!("[{}] ({})\n{}\n\n", i + 1, hit.uri, truncated));
    }
    format!(
        "Answer the question using only the numbered context blocks below. \
         Cite the blocks you used with markers like [1] or [2].\n\n\
         Question: {query_text}\n\nContext:\n{blocks}"
    )
}

/// Pull `[n]` citation markers out of generated text and bind each to the
/// nth context block's provenance.
fn parse_citations(answer: &str, results: &[SearchResult]) -> Vec<Citation> {
    let mut seen = std::collections::HashSet::new();
    let mut citations = Vec::new();
    let bytes = answer.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            if let Some(close) = answer[i + 1..].find(']') {
                let digits = &answer[i + 1..i + 1 + close];
                if let Ok(n) = digits.parse::<usize>() {
                    if n >= 1 && n <= results.len() && seen.insert(n) {
                        let hit = &results[n - 1];
                        citations.push(Citation {
                            docid: hit.docid.clone(),
                            uri: hit.uri.clone(),
                            start_line: hit.snippet_range.start,
                            end_line: hit.snippet_range.end,
                        });
                    }
                }
                i += close + 2;
                continue;
            }
        }
        i += 1;
    }
    citations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineRange;

    fn hit(docid: &str, uri: &str) -> SearchResult {
        SearchResult {
            docid: docid.into(),
            uri: uri.into(),
            title: None,
            collection: "docs".into(),
            score: 0.9,
            snippet: "text".into(),
            snippet_range: LineRange { start: 1, end: 2 },
        }
    }

    #[test]
    fn parses_citation_markers() {
        let results = vec![hit("aaa", "gno://docs/a.md"), hit("bbb", "gno://docs/b.md")];
        let citations = parse_citations("per [1] and also [2], [1] again", &results);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].docid, "aaa");
        assert_eq!(citations[1].docid, "bbb");
    }

    #[test]
    fn ignores_out_of_range_markers() {
        let results = vec![hit("aaa", "gno://docs/a.md")];
        let citations = parse_citations("see [5]", &results);
        assert!(citations.is_empty());
    }
}
