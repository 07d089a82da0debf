//! CRUD and search queries against the store.

use sha2::{Digest, Sha256};
use sqlx::Row;

use crate::error::{GnoError, Result};
use crate::models::{Chunk, Document, DocLink, DocTag, LineRange, LinkSource, LinkType, TagSource};

use super::Store;

/// Fields needed to upsert a document row. `body` is the canonical markdown.
pub struct DocumentFields<'a> {
    pub collection: &'a str,
    pub rel_path: &'a str,
    pub uri: &'a str,
    pub title: Option<&'a str>,
    pub mime: &'a str,
    pub ext: Option<&'a str>,
    pub source_mtime: i64,
    pub source_size: i64,
    pub source_hash: &'a str,
    pub mirror_hash: &'a str,
    pub body: &'a str,
    pub language_hint: Option<&'a str>,
    pub ingest_version: i64,
}

/// Derive the short docid: the first 8 hex characters of the mirror hash.
pub fn docid_for(mirror_hash: &str) -> String {
    mirror_hash.chars().take(8).collect()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub collection: Option<String>,
    pub language_hint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub document_id: i64,
    pub docid: String,
    pub uri: String,
    pub title: Option<String>,
    pub collection: String,
    pub bm25_score: f64,
    pub snippet: String,
    pub snippet_range: LineRange,
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk_id: i64,
    pub document_id: i64,
    pub similarity: f64,
}

impl Store {
    /// Insert or replace the document row keyed by `(collection, relPath)`.
    /// Refreshes the FTS row. If the mirror hash changed (content changed),
    /// deletes the document's previous chunks (cascading to embeddings) so
    /// stale chunk rows never linger past a content change.
    pub async fn upsert_document(&self, fields: DocumentFields<'_>) -> Result<String> {
        let docid = docid_for(fields.mirror_hash);
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(
            "SELECT id, mirror_hash FROM documents WHERE collection = ? AND rel_path = ?",
        )
        .bind(fields.collection)
        .bind(fields.rel_path)
        .fetch_optional(&mut *tx)
        .await?;

        let doc_id: i64 = if let Some(row) = existing {
            let id: i64 = row.get("id");
            let old_hash: String = row.get("mirror_hash");

            if old_hash != fields.mirror_hash {
                sqlx::query("DELETE FROM chunks WHERE document_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }

            sqlx::query(
                r#"
                UPDATE documents SET
                    docid = ?, uri = ?, title = ?, mime = ?, ext = ?,
                    source_mtime = ?, source_size = ?, source_hash = ?,
                    mirror_hash = ?, body = ?, language_hint = ?, ingest_version = ?
                WHERE id = ?
                "#,
            )
            .bind(&docid)
            .bind(fields.uri)
            .bind(fields.title)
            .bind(fields.mime)
            .bind(fields.ext)
            .bind(fields.source_mtime)
            .bind(fields.source_size)
            .bind(fields.source_hash)
            .bind(fields.mirror_hash)
            .bind(fields.body)
            .bind(fields.language_hint)
            .bind(fields.ingest_version)
            .bind(id)
            .execute(&mut *tx)
            .await?;

            id
        } else {
            let result = sqlx::query(
                r#"
                INSERT INTO documents
                    (docid, collection, rel_path, uri, title, mime, ext,
                     source_mtime, source_size, source_hash, mirror_hash, body,
                     language_hint, ingest_version)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&docid)
            .bind(fields.collection)
            .bind(fields.rel_path)
            .bind(fields.uri)
            .bind(fields.title)
            .bind(fields.mime)
            .bind(fields.ext)
            .bind(fields.source_mtime)
            .bind(fields.source_size)
            .bind(fields.source_hash)
            .bind(fields.mirror_hash)
            .bind(fields.body)
            .bind(fields.language_hint)
            .bind(fields.ingest_version)
            .execute(&mut *tx)
            .await?;
            result.last_insert_rowid()
        };

        sqlx::query("DELETE FROM documents_fts WHERE rowid = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO documents_fts(rowid, filepath, title, body) VALUES (?, ?, ?, ?)",
        )
        .bind(doc_id)
        .bind(fields.rel_path)
        .bind(fields.title.unwrap_or(""))
        .bind(fields.body)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(docid)
    }

    /// Update only `sourceMtime`/`sourceSize` for the fast "unchanged content,
    /// touched metadata" path (spec ingestion step 4).
    pub async fn touch_document(
        &self,
        collection: &str,
        rel_path: &str,
        source_mtime: i64,
        source_size: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET source_mtime = ?, source_size = ? \
             WHERE collection = ? AND rel_path = ?",
        )
        .bind(source_mtime)
        .bind(source_size)
        .bind(collection)
        .bind(rel_path)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_document_id(&self, collection: &str, rel_path: &str) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT id FROM documents WHERE collection = ? AND rel_path = ?")
            .bind(collection)
            .bind(rel_path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("id")))
    }

    pub async fn document_fingerprint(
        &self,
        collection: &str,
        rel_path: &str,
    ) -> Result<Option<(i64, i64, i64, String)>> {
        let row = sqlx::query(
            "SELECT source_mtime, source_size, ingest_version, source_hash \
             FROM documents WHERE collection = ? AND rel_path = ?",
        )
        .bind(collection)
        .bind(rel_path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| {
            (
                r.get("source_mtime"),
                r.get("source_size"),
                r.get("ingest_version"),
                r.get("source_hash"),
            )
        }))
    }

    /// Delete-then-insert chunks for a document inside one transaction.
    pub async fn replace_chunks(&self, document_id: i64, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (document_id, seq, start_line, end_line, text, code_lang) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(document_id)
            .bind(chunk.seq)
            .bind(chunk.start_line)
            .bind(chunk.end_line)
            .bind(&chunk.text)
            .bind(&chunk.code_lang)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn chunks_for_document(&self, document_id: i64) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, document_id, seq, start_line, end_line, text, code_lang \
             FROM chunks WHERE document_id = ? ORDER BY seq ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_chunk).collect())
    }

    pub async fn get_chunk(&self, chunk_id: i64) -> Result<Chunk> {
        let row = sqlx::query(
            "SELECT id, document_id, seq, start_line, end_line, text, code_lang \
             FROM chunks WHERE id = ?",
        )
        .bind(chunk_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| GnoError::not_found(format!("chunk id {chunk_id} not found")))?;
        Ok(row_to_chunk(row))
    }

    pub async fn set_embedding(&self, chunk_id: i64, model_id: &str, vector: &[f32]) -> Result<()> {
        let blob = vec_to_blob(vector);
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO embeddings (chunk_id, model_id, vector, produced_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(chunk_id, model_id) DO UPDATE SET vector = excluded.vector, produced_at = excluded.produced_at",
        )
        .bind(chunk_id)
        .bind(model_id)
        .bind(blob)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn chunks_missing_embedding(
        &self,
        model_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Chunk>> {
        let limit = limit.unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.document_id, c.seq, c.start_line, c.end_line, c.text, c.code_lang
            FROM chunks c
            LEFT JOIN embeddings e ON e.chunk_id = c.id AND e.model_id = ?
            WHERE e.chunk_id IS NULL
            ORDER BY c.document_id, c.seq
            LIMIT ?
            "#,
        )
        .bind(model_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_chunk).collect())
    }

    pub async fn embedded_count_for_model(&self, model_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings WHERE model_id = ?")
            .bind(model_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Cascades to chunks (and, via chunks, embeddings), tags, and links.
    pub async fn delete_document(&self, document_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM documents_fts WHERE rowid = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Documents present in the store for a collection but absent from
    /// `live_rel_paths` — candidates for orphan cleanup.
    pub async fn orphans_in_collection(
        &self,
        collection: &str,
        live_rel_paths: &std::collections::HashSet<String>,
    ) -> Result<Vec<(i64, String)>> {
        let rows = sqlx::query("SELECT id, rel_path FROM documents WHERE collection = ?")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get::<i64, _>("id"), r.get::<String, _>("rel_path")))
            .filter(|(_, rel_path)| !live_rel_paths.contains(rel_path))
            .collect())
    }

    pub async fn get_document_by_id(&self, document_id: i64) -> Result<Document> {
        let row = sqlx::query(
            "SELECT id, docid, collection, rel_path, uri, title, mime, ext, source_mtime, \
             source_size, source_hash, mirror_hash, language_hint, ingest_version \
             FROM documents WHERE id = ?",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| GnoError::not_found(format!("document id {document_id} not found")))?;
        Ok(row_to_document(row))
    }

    pub async fn get_document_body(&self, document_id: i64) -> Result<String> {
        let row = sqlx::query("SELECT body FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| GnoError::not_found(format!("document id {document_id} not found")))?;
        Ok(row.get("body"))
    }

    pub async fn get_document_by_docid(&self, docid: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, docid, collection, rel_path, uri, title, mime, ext, source_mtime, \
             source_size, source_hash, mirror_hash, language_hint, ingest_version \
             FROM documents WHERE docid = ?",
        )
        .bind(docid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_document))
    }

    pub async fn get_document_by_uri(&self, uri: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, docid, collection, rel_path, uri, title, mime, ext, source_mtime, \
             source_size, source_hash, mirror_hash, language_hint, ingest_version \
             FROM documents WHERE uri = ?",
        )
        .bind(uri)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_document))
    }

    pub async fn get_document_by_coll_path(
        &self,
        collection: &str,
        rel_path: &str,
    ) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, docid, collection, rel_path, uri, title, mime, ext, source_mtime, \
             source_size, source_hash, mirror_hash, language_hint, ingest_version \
             FROM documents WHERE collection = ? AND rel_path = ?",
        )
        .bind(collection)
        .bind(rel_path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_document))
    }

    pub async fn list_documents(
        &self,
        collection: Option<&str>,
        uri_prefix: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Document>> {
        let rows = match (collection, uri_prefix) {
            (Some(c), Some(p)) => {
                sqlx::query(
                    "SELECT id, docid, collection, rel_path, uri, title, mime, ext, source_mtime, \
                     source_size, source_hash, mirror_hash, language_hint, ingest_version \
                     FROM documents WHERE collection = ? AND uri LIKE ? \
                     ORDER BY uri ASC LIMIT ? OFFSET ?",
                )
                .bind(c)
                .bind(format!("{p}%"))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            (Some(c), None) => {
                sqlx::query(
                    "SELECT id, docid, collection, rel_path, uri, title, mime, ext, source_mtime, \
                     source_size, source_hash, mirror_hash, language_hint, ingest_version \
                     FROM documents WHERE collection = ? ORDER BY uri ASC LIMIT ? OFFSET ?",
                )
                .bind(c)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            _ => {
                sqlx::query(
                    "SELECT id, docid, collection, rel_path, uri, title, mime, ext, source_mtime, \
                     source_size, source_hash, mirror_hash, language_hint, ingest_version \
                     FROM documents ORDER BY uri ASC LIMIT ? OFFSET ?",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.into_iter().map(row_to_document).collect())
    }

    // ---- Tags ----

    /// Replace all `source='frontmatter'` tags for a document, preserving
    /// any `source='user'` tags on the same (document, tag) pair.
    pub async fn replace_frontmatter_tags(&self, document_id: i64, tags: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM doc_tags WHERE document_id = ? AND source = 'frontmatter'")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        for tag in tags {
            let normalized = normalize_tag(tag);
            sqlx::query(
                "INSERT INTO doc_tags (document_id, tag, source) VALUES (?, ?, 'frontmatter') \
                 ON CONFLICT(document_id, tag) DO NOTHING",
            )
            .bind(document_id)
            .bind(normalized)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn add_user_tag(&self, document_id: i64, tag: &str) -> Result<()> {
        let normalized = normalize_tag(tag);
        sqlx::query(
            "INSERT INTO doc_tags (document_id, tag, source) VALUES (?, ?, 'user') \
             ON CONFLICT(document_id, tag) DO NOTHING",
        )
        .bind(document_id)
        .bind(normalized)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_tag(&self, document_id: i64, tag: &str) -> Result<bool> {
        let normalized = normalize_tag(tag);
        let result = sqlx::query("DELETE FROM doc_tags WHERE document_id = ? AND tag = ?")
            .bind(document_id)
            .bind(normalized)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn tags_for_document(&self, document_id: i64) -> Result<Vec<DocTag>> {
        let rows = sqlx::query("SELECT document_id, tag, source FROM doc_tags WHERE document_id = ?")
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| DocTag {
                document_id: r.get("document_id"),
                tag: r.get("tag"),
                source: TagSource::parse(&r.get::<String, _>("source")).unwrap_or(TagSource::User),
            })
            .collect())
    }

    /// Aggregate tag counts across the store (optionally scoped to a collection).
    pub async fn list_tag_counts(&self, collection: Option<&str>) -> Result<Vec<(String, i64)>> {
        let rows = match collection {
            Some(c) => {
                sqlx::query(
                    "SELECT t.tag AS tag, COUNT(*) AS n FROM doc_tags t \
                     JOIN documents d ON d.id = t.document_id \
                     WHERE d.collection = ? GROUP BY t.tag ORDER BY t.tag ASC",
                )
                .bind(c)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT tag AS tag, COUNT(*) AS n FROM doc_tags GROUP BY tag ORDER BY tag ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows
            .into_iter()
            .map(|r| (r.get("tag"), r.get("n")))
            .collect())
    }

    // ---- Links ----

    pub async fn replace_parsed_links(&self, source_doc_id: i64, links: &[DocLink]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM doc_links WHERE source_doc_id = ? AND source = 'parsed'")
            .bind(source_doc_id)
            .execute(&mut *tx)
            .await?;
        for link in links {
            sqlx::query(
                r#"
                INSERT INTO doc_links
                    (source_doc_id, target_ref, target_ref_norm, target_anchor,
                     target_collection, link_type, link_text,
                     start_line, start_col, end_line, end_col, source)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(source_doc_id, start_line, start_col, link_type, source) DO NOTHING
                "#,
            )
            .bind(source_doc_id)
            .bind(&link.target_ref)
            .bind(&link.target_ref_norm)
            .bind(&link.target_anchor)
            .bind(&link.target_collection)
            .bind(link.link_type.as_str())
            .bind(&link.link_text)
            .bind(link.start_line)
            .bind(link.start_col)
            .bind(link.end_line)
            .bind(link.end_col)
            .bind(LinkSource::Parsed.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // ---- Search ----

    pub async fn lexical_search(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: i64,
    ) -> Result<Vec<LexicalHit>> {
        // `languageHint` restricts the candidate set to documents that have
        // at least one chunk in that language (spec §4.6); documents_fts is
        // document-level, so the restriction is an EXISTS subquery over chunks.
        let rows = match (&filter.collection, &filter.language_hint) {
            (Some(collection), Some(lang)) => {
                sqlx::query(
                    r#"
                    SELECT d.id AS doc_id, d.docid, d.uri, d.title, d.collection,
                           bm25(documents_fts) AS rank,
                           snippet(documents_fts, 2, '', '', '...', 24) AS snip
                    FROM documents_fts
                    JOIN documents d ON d.id = documents_fts.rowid
                    WHERE documents_fts MATCH ? AND d.collection = ?
                      AND EXISTS (SELECT 1 FROM chunks c WHERE c.document_id = d.id AND c.code_lang = ?)
                    ORDER BY rank
                    LIMIT ?
                    "#,
                )
                .bind(query)
                .bind(collection)
                .bind(lang)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            (Some(collection), None) => {
                sqlx::query(
                    r#"
                    SELECT d.id AS doc_id, d.docid, d.uri, d.title, d.collection,
                           bm25(documents_fts) AS rank,
                           snippet(documents_fts, 2, '', '', '...', 24) AS snip
                    FROM documents_fts
                    JOIN documents d ON d.id = documents_fts.rowid
                    WHERE documents_fts MATCH ? AND d.collection = ?
                    ORDER BY rank
                    LIMIT ?
                    "#,
                )
                .bind(query)
                .bind(collection)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            (None, Some(lang)) => {
                sqlx::query(
                    r#"
                    SELECT d.id AS doc_id, d.docid, d.uri, d.title, d.collection,
                           bm25(documents_fts) AS rank,
                           snippet(documents_fts, 2, '', '', '...', 24) AS snip
                    FROM documents_fts
                    JOIN documents d ON d.id = documents_fts.rowid
                    WHERE documents_fts MATCH ?
                      AND EXISTS (SELECT 1 FROM chunks c WHERE c.document_id = d.id AND c.code_lang = ?)
                    ORDER BY rank
                    LIMIT ?
                    "#,
                )
                .bind(query)
                .bind(lang)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            (None, None) => {
                sqlx::query(
                    r#"
                    SELECT d.id AS doc_id, d.docid, d.uri, d.title, d.collection,
                           bm25(documents_fts) AS rank,
                           snippet(documents_fts, 2, '', '', '...', 24) AS snip
                    FROM documents_fts
                    JOIN documents d ON d.id = documents_fts.rowid
                    WHERE documents_fts MATCH ?
                    ORDER BY rank
                    LIMIT ?
                    "#,
                )
                .bind(query)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let doc_id: i64 = row.get("doc_id");
            let rank: f64 = row.get("rank");
            let snip: String = row.get("snip");
            let snippet_range = self.locate_snippet_range(doc_id, &snip).await?;
            hits.push(LexicalHit {
                document_id: doc_id,
                docid: row.get("docid"),
                uri: row.get("uri"),
                title: row.get("title"),
                collection: row.get("collection"),
                // FTS5 bm25() returns a lower-is-better value; negate so higher is better.
                bm25_score: -rank,
                snippet: snip,
                snippet_range,
            });
        }
        Ok(hits)
    }

    /// Find the chunk whose text contains the FTS snippet excerpt and
    /// return its line range; ties broken by lowest sequence number.
    async fn locate_snippet_range(&self, document_id: i64, snippet: &str) -> Result<LineRange> {
        let needle = snippet.replace("...", "").trim().to_string();
        let chunks = self.chunks_for_document(document_id).await?;
        if chunks.is_empty() {
            return Ok(LineRange { start: 1, end: 1 });
        }
        if !needle.is_empty() {
            for chunk in &chunks {
                if !needle.is_empty() && chunk.text.contains(needle.split_whitespace().next().unwrap_or("")) {
                    return Ok(LineRange {
                        start: chunk.start_line,
                        end: chunk.end_line,
                    });
                }
            }
        }
        Ok(LineRange {
            start: chunks[0].start_line,
            end: chunks[0].end_line,
        })
    }

    pub async fn vector_search(
        &self,
        query_vector: &[f32],
        model_id: &str,
        filter: &SearchFilter,
        limit: i64,
    ) -> Result<Vec<VectorHit>> {
        // `languageHint` restricts ranking to chunks carrying that code_lang
        // (spec §4.6); chunks are the native grain here, so it's a direct predicate.
        let rows = match (&filter.collection, &filter.language_hint) {
            (Some(collection), Some(lang)) => {
                sqlx::query(
                    r#"
                    SELECT e.chunk_id, c.document_id, e.vector
                    FROM embeddings e
                    JOIN chunks c ON c.id = e.chunk_id
                    JOIN documents d ON d.id = c.document_id
                    WHERE e.model_id = ? AND d.collection = ? AND c.code_lang = ?
                    "#,
                )
                .bind(model_id)
                .bind(collection)
                .bind(lang)
                .fetch_all(&self.pool)
                .await?
            }
            (Some(collection), None) => {
                sqlx::query(
                    r#"
                    SELECT e.chunk_id, c.document_id, e.vector
                    FROM embeddings e
                    JOIN chunks c ON c.id = e.chunk_id
                    JOIN documents d ON d.id = c.document_id
                    WHERE e.model_id = ? AND d.collection = ?
                    "#,
                )
                .bind(model_id)
                .bind(collection)
                .fetch_all(&self.pool)
                .await?
            }
            (None, Some(lang)) => {
                sqlx::query(
                    r#"
                    SELECT e.chunk_id, c.document_id, e.vector
                    FROM embeddings e
                    JOIN chunks c ON c.id = e.chunk_id
                    WHERE e.model_id = ? AND c.code_lang = ?
                    "#,
                )
                .bind(model_id)
                .bind(lang)
                .fetch_all(&self.pool)
                .await?
            }
            (None, None) => {
                sqlx::query(
                    r#"
                    SELECT e.chunk_id, c.document_id, e.vector
                    FROM embeddings e
                    JOIN chunks c ON c.id = e.chunk_id
                    WHERE e.model_id = ?
                    "#,
                )
                .bind(model_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut hits: Vec<VectorHit> = rows
            .into_iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("vector");
                let vector = blob_to_vec(&blob);
                let similarity = cosine_similarity(query_vector, &vector) as f64;
                VectorHit {
                    chunk_id: row.get("chunk_id"),
                    document_id: row.get("document_id"),
                    similarity,
                }
            })
            .collect();

        hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit as usize);
        Ok(hits)
    }
}

fn normalize_tag(raw: &str) -> String {
    unicode_nfc_lossy(raw.trim()).to_lowercase()
}

/// `tag == nfc(lowercase(trim(raw)))` per spec §3/§8.
fn unicode_nfc_lossy(s: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    s.nfc().collect()
}

fn row_to_document(row: sqlx::sqlite::SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        docid: row.get("docid"),
        collection: row.get("collection"),
        rel_path: row.get("rel_path"),
        uri: row.get("uri"),
        title: row.get("title"),
        mime: row.get("mime"),
        ext: row.get("ext"),
        source_mtime: row.get("source_mtime"),
        source_size: row.get("source_size"),
        source_hash: row.get("source_hash"),
        mirror_hash: row.get("mirror_hash"),
        language_hint: row.get("language_hint"),
        ingest_version: row.get("ingest_version"),
    }
}

fn row_to_chunk(row: sqlx::sqlite::SqliteRow) -> Chunk {
    Chunk {
        id: row.get("id"),
        document_id: row.get("document_id"),
        seq: row.get("seq"),
        start_line: row.get("start_line"),
        end_line: row.get("end_line"),
        text: row.get("text"),
        code_lang: row.get("code_lang"),
    }
}

pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_blob_roundtrip() {
        let v = vec![1.0f32, -2.5, 3.125];
        let blob = vec_to_blob(&v);
        assert_eq!(blob_to_vec(&blob), v);
    }

    #[test]
    fn docid_is_8_hex_chars() {
        let hash = sha256_hex(b"# Hello");
        let docid = docid_for(&hash);
        assert_eq!(docid.len(), 8);
        assert!(docid.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tag_normalization() {
        assert_eq!(normalize_tag("  Beta  "), "beta");
        assert_eq!(normalize_tag("Alpha"), "alpha");
    }

    #[test]
    fn cosine_identical_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }
}
