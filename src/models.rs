//! Core data models persisted by the store and produced by the pipeline.
//!
//! These mirror the data model in the specification: [`Document`], [`Chunk`],
//! [`Embedding`], [`DocTag`], and [`DocLink`]. Timestamps are stored as Unix
//! seconds and rendered as ISO 8601 at the edges.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One row per ingested file.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: i64,
    pub docid: String,
    pub collection: String,
    pub rel_path: String,
    pub uri: String,
    pub title: Option<String>,
    pub mime: String,
    pub ext: Option<String>,
    pub source_mtime: i64,
    pub source_size: i64,
    pub source_hash: String,
    pub mirror_hash: String,
    pub language_hint: Option<String>,
    pub ingest_version: i64,
}

/// A contiguous piece of a document's canonical markdown.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: i64,
    pub document_id: i64,
    pub seq: i64,
    pub start_line: i64,
    pub end_line: i64,
    pub text: String,
    pub code_lang: Option<String>,
}

/// A dense vector produced for one chunk by one embedding model.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub chunk_id: i64,
    pub model_id: String,
    pub vector: Vec<f32>,
    pub produced_at: DateTime<Utc>,
}

/// Source of a [`DocTag`] or [`DocLink`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    Frontmatter,
    User,
}

impl TagSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TagSource::Frontmatter => "frontmatter",
            TagSource::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "frontmatter" => Some(TagSource::Frontmatter),
            "user" => Some(TagSource::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocTag {
    pub document_id: i64,
    pub tag: String,
    pub source: TagSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Wiki,
    Markdown,
}

impl LinkType {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkType::Wiki => "wiki",
            LinkType::Markdown => "markdown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkSource {
    Parsed,
    User,
    Suggested,
}

impl LinkSource {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkSource::Parsed => "parsed",
            LinkSource::User => "user",
            LinkSource::Suggested => "suggested",
        }
    }
}

/// An extracted outbound link from a document's markdown.
#[derive(Debug, Clone)]
pub struct DocLink {
    pub source_doc_id: i64,
    pub target_ref: String,
    pub target_ref_norm: String,
    pub target_anchor: Option<String>,
    pub target_collection: Option<String>,
    pub link_type: LinkType,
    pub link_text: Option<String>,
    pub start_line: i64,
    pub start_col: i64,
    pub end_line: i64,
    pub end_col: i64,
    pub source: LinkSource,
}

/// A half-open line/column range into a document's canonical markdown,
/// used for snippet extraction in retrieval responses.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LineRange {
    pub start: i64,
    pub end: i64,
}

/// A retrieval hit, shared by `search`, `vsearch`, and `query`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub docid: String,
    pub uri: String,
    pub title: Option<String>,
    pub collection: String,
    pub score: f64,
    pub snippet: String,
    pub snippet_range: LineRange,
}
