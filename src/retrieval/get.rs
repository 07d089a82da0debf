//! Document retrieval: `get`, `multi-get`, `ls` (spec §4.7).

use globset::Glob;
use serde::Serialize;

use crate::error::Result;
use crate::models::Document;
use crate::store::Store;

use super::uri;

#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub docid: String,
    pub uri: String,
    pub body: String,
    pub line_range: Option<(i64, i64)>,
}

pub async fn get(
    store: &Store,
    raw_ref: &str,
    from: Option<i64>,
    limit: Option<i64>,
    line_numbers: bool,
) -> Result<GetResponse> {
    let parsed = uri::parse_ref(raw_ref)?;
    let (doc, ref_line) = uri::resolve_ref(store, &parsed).await?;
    let body = store.get_document_body(doc.id).await?;

    // `:line` sets `from` only if the caller didn't supply one explicitly.
    let effective_from = from.or(ref_line);

    let (windowed, line_range) = match effective_from {
        Some(start) => {
            let lines: Vec<&str> = body.lines().collect();
            let start_idx = (start.max(1) - 1) as usize;
            let end_idx = match limit {
                Some(count) => (start_idx + count.max(0) as usize).min(lines.len()),
                None => lines.len(),
            };
            let slice = if start_idx < lines.len() { &lines[start_idx..end_idx] } else { &[] };
            let end_line = start_idx as i64 + slice.len() as i64;
            let text = if line_numbers {
                number_lines(slice, start.max(1))
            } else {
                slice.join("\n")
            };
            (text, Some((start.max(1), end_line.max(start.max(1)))))
        }
        None => {
            let text = if line_numbers {
                let lines: Vec<&str> = body.lines().collect();
                number_lines(&lines, 1)
            } else {
                body
            };
            (text, None)
        }
    };

    Ok(GetResponse { docid: doc.docid, uri: doc.uri, body: windowed, line_range })
}

/// Prefix each line with its 1-based line number, starting at `first_line`.
fn number_lines(lines: &[&str], first_line: i64) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{}: {}", first_line + i as i64, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiGetEntry {
    pub docid: String,
    pub uri: String,
    pub body: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedRef {
    pub raw_ref: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiGetResponse {
    pub entries: Vec<MultiGetEntry>,
    pub skipped: Vec<SkippedRef>,
}

pub async fn multi_get(store: &Store, refs: &[String], max_bytes: Option<usize>) -> Result<MultiGetResponse> {
    let mut entries = Vec::new();
    let mut skipped = Vec::new();

    for raw in refs {
        if is_glob_pattern(raw) {
            match expand_glob(store, raw).await {
                Ok(docs) if !docs.is_empty() => {
                    for doc in docs {
                        push_entry(store, doc, max_bytes, &mut entries).await?;
                    }
                }
                Ok(_) => skipped.push(SkippedRef { raw_ref: raw.clone(), reason: "no match".into() }),
                Err(e) => skipped.push(SkippedRef { raw_ref: raw.clone(), reason: e.to_string() }),
            }
            continue;
        }

        match uri::parse_ref(raw) {
            Ok(parsed) => match uri::resolve_ref(store, &parsed).await {
                Ok((doc, _)) => push_entry(store, doc, max_bytes, &mut entries).await?,
                Err(e) => skipped.push(SkippedRef { raw_ref: raw.clone(), reason: e.to_string() }),
            },
            Err(e) => skipped.push(SkippedRef { raw_ref: raw.clone(), reason: e.to_string() }),
        }
    }

    Ok(MultiGetResponse { entries, skipped })
}

async fn push_entry(
    store: &Store,
    doc: Document,
    max_bytes: Option<usize>,
    entries: &mut Vec<MultiGetEntry>,
) -> Result<()> {
    let body = store.get_document_body(doc.id).await?;
    let (body, truncated) = match max_bytes {
        Some(max) if body.len() > max => {
            let mut end = max.min(body.len());
            while end > 0 && !body.is_char_boundary(end) {
                end -= 1;
            }
            (body[..end].to_string(), true)
        }
        _ => (body, false),
    };
    entries.push(MultiGetEntry { docid: doc.docid, uri: doc.uri, body, truncated });
    Ok(())
}

fn is_glob_pattern(raw: &str) -> bool {
    raw.contains('*') || raw.contains('?') || raw.contains('[')
}

/// Expand a glob pattern against the document URI space (spec §4.7
/// "glob patterns expand against the doc URI space").
async fn expand_glob(store: &Store, pattern: &str) -> Result<Vec<Document>> {
    let glob = Glob::new(pattern)
        .map_err(|e| crate::error::GnoError::validation(format!("invalid glob '{pattern}': {e}")))?
        .compile_matcher();
    let all = store.list_documents(None, None, i64::MAX, 0).await?;
    Ok(all.into_iter().filter(|d| glob.is_match(&d.uri)).collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct LsEntry {
    pub docid: String,
    pub uri: String,
}

pub async fn ls(store: &Store, scope: Option<&str>, limit: i64, offset: i64) -> Result<Vec<LsEntry>> {
    let (collection, uri_prefix) = match scope {
        Some(raw) => match uri::parse_scope(raw)? {
            uri::Scope::Collection(c) => (Some(c), None),
            uri::Scope::Prefix { collection, prefix } => {
                (Some(collection.clone()), Some(format!("gno://{collection}/{prefix}")))
            }
        },
        None => (None, None),
    };

    let docs = store
        .list_documents(collection.as_deref(), uri_prefix.as_deref(), limit, offset)
        .await?;
    Ok(docs.into_iter().map(|d| LsEntry { docid: d.docid, uri: d.uri }).collect())
}
