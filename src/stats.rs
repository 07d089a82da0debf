//! Store-wide statistics: document/chunk/embedding counts, overall and
//! per-collection. Grounded on the teacher's `stats.rs` query shape,
//! adapted to this schema (`collection` in place of `source`, no
//! checkpoints table — `lastSourceMtime` stands in for "last synced").

use serde::Serialize;
use sqlx::Row;

use crate::error::Result;
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatsRow {
    pub collection: String,
    pub doc_count: i64,
    pub chunk_count: i64,
    pub embedded_count: i64,
    pub last_source_mtime: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub total_documents: i64,
    pub total_chunks: i64,
    pub total_embedded: i64,
    pub db_size_bytes: u64,
    pub by_collection: Vec<CollectionStatsRow>,
}

pub async fn collect(store: &Store, db_path: &std::path::Path) -> Result<StatsReport> {
    let total_documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&store.pool)
        .await?;
    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(&store.pool)
        .await?;
    let total_embedded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings")
        .fetch_one(&store.pool)
        .await?;

    let db_size_bytes = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    let rows = sqlx::query(
        r#"
        SELECT
            d.collection AS collection,
            COUNT(DISTINCT d.id) AS doc_count,
            COUNT(DISTINCT c.id) AS chunk_count,
            COUNT(DISTINCT e.chunk_id) AS embedded_count,
            MAX(d.source_mtime) AS last_source_mtime
        FROM documents d
        LEFT JOIN chunks c ON c.document_id = d.id
        LEFT JOIN embeddings e ON e.chunk_id = c.id
        GROUP BY d.collection
        ORDER BY doc_count DESC
        "#,
    )
    .fetch_all(&store.pool)
    .await?;

    let by_collection = rows
        .into_iter()
        .map(|row| CollectionStatsRow {
            collection: row.get("collection"),
            doc_count: row.get("doc_count"),
            chunk_count: row.get("chunk_count"),
            embedded_count: row.get("embedded_count"),
            last_source_mtime: row.get("last_source_mtime"),
        })
        .collect();

    Ok(StatsReport { total_documents, total_chunks, total_embedded, db_size_bytes, by_collection })
}
