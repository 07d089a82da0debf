//! Schema migrations.
//!
//! Each migration is `up(pool)`, applied in its own transaction. The current
//! schema version is tracked in `schema_meta`. A fresh database is created
//! directly at the migration head; an existing one has pending migrations
//! applied in order.

use sqlx::SqlitePool;

use crate::error::{GnoError, Result};

use super::db::recorded_tokenizer;

const CURRENT_VERSION: i64 = 1;

/// Maps a configured tokenizer name to the FTS5 `tokenize=` clause.
/// SQLite's stock FTS5 module ships unicode61, ascii, porter, and trigram;
/// `snowball <language>` requires a loadable extension that is not bundled
/// here, so it degrades to the porter stemmer (documented in DESIGN.md).
fn fts5_tokenize_clause(tokenizer: &str) -> String {
    match tokenizer {
        "unicode61" => "unicode61".to_string(),
        "porter" => "porter unicode61base".to_string(),
        "trigram" => "trigram".to_string(),
        other if other.starts_with("snowball") => "porter unicode61base".to_string(),
        other => other.to_string(),
    }
}

pub async fn run(pool: &SqlitePool, tokenizer: &str, allow_rebuild: bool) -> Result<()> {
    let version: Option<i64> = sqlx::query_scalar(
        "SELECT value FROM sqlite_master WHERE type='table' AND name='schema_meta'",
    )
    .fetch_optional(pool)
    .await
    .ok()
    .flatten();
    let _ = version;

    let meta_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_meta'",
    )
    .fetch_one(pool)
    .await?;

    if !meta_exists {
        create_schema(pool, tokenizer).await?;
        return Ok(());
    }

    let recorded = recorded_tokenizer(pool).await?;
    if let Some(recorded) = recorded {
        if recorded != tokenizer {
            if !allow_rebuild {
                return Err(GnoError::Conflict(format!(
                    "index was built with ftsTokenizer '{recorded}', requested '{tokenizer}'; \
                     rebuild the FTS index explicitly to change it"
                )));
            }
            rebuild_fts(pool, tokenizer).await?;
        }
    }

    let current: i64 = sqlx::query_scalar("SELECT CAST(value AS INTEGER) FROM schema_meta WHERE key = 'schema_version'")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        // No migrations beyond v1 yet; bump the sentinel for future heads.
        set_meta(pool, "schema_version", &CURRENT_VERSION.to_string()).await?;
    }

    Ok(())
}

async fn create_schema(pool: &SqlitePool, tokenizer: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            docid TEXT NOT NULL UNIQUE,
            collection TEXT NOT NULL,
            rel_path TEXT NOT NULL,
            uri TEXT NOT NULL,
            title TEXT,
            mime TEXT NOT NULL,
            ext TEXT,
            source_mtime INTEGER NOT NULL,
            source_size INTEGER NOT NULL,
            source_hash TEXT NOT NULL,
            mirror_hash TEXT NOT NULL,
            body TEXT NOT NULL DEFAULT '',
            language_hint TEXT,
            ingest_version INTEGER NOT NULL DEFAULT 1,
            UNIQUE(collection, rel_path)
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)")
        .execute(&mut *tx)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_uri ON documents(uri)")
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            seq INTEGER NOT NULL,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            text TEXT NOT NULL,
            code_lang TEXT,
            UNIQUE(document_id, seq)
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id)")
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            chunk_id INTEGER NOT NULL REFERENCES chunks(id) ON DELETE CASCADE,
            model_id TEXT NOT NULL,
            vector BLOB NOT NULL,
            produced_at INTEGER NOT NULL,
            PRIMARY KEY(chunk_id, model_id)
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_embeddings_model ON embeddings(model_id)")
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS doc_tags (
            document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            tag TEXT NOT NULL,
            source TEXT NOT NULL,
            PRIMARY KEY(document_id, tag)
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS doc_links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_doc_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            target_ref TEXT NOT NULL,
            target_ref_norm TEXT NOT NULL,
            target_anchor TEXT,
            target_collection TEXT,
            link_type TEXT NOT NULL,
            link_text TEXT,
            start_line INTEGER NOT NULL,
            start_col INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            end_col INTEGER NOT NULL,
            source TEXT NOT NULL,
            UNIQUE(source_doc_id, start_line, start_col, link_type, source)
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_doc_links_source ON doc_links(source_doc_id)")
        .execute(&mut *tx)
        .await?;

    let tokenize = fts5_tokenize_clause(tokenizer);
    sqlx::query(&format!(
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
            filepath,
            title,
            body,
            content='documents',
            content_rowid='id',
            tokenize='{tokenize}'
        )
        "#
    ))
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('schema_version', ?)",
    )
    .bind(CURRENT_VERSION.to_string())
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('fts_tokenizer', ?)")
        .bind(tokenizer)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Tokenizer change: drop and recreate the FTS table. Irrecoverable — the
/// caller (`sync`) must re-walk every collection to repopulate it.
async fn rebuild_fts(pool: &SqlitePool, tokenizer: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DROP TABLE IF EXISTS documents_fts")
        .execute(&mut *tx)
        .await?;

    let tokenize = fts5_tokenize_clause(tokenizer);
    sqlx::query(&format!(
        r#"
        CREATE VIRTUAL TABLE documents_fts USING fts5(
            filepath,
            title,
            body,
            content='documents',
            content_rowid='id',
            tokenize='{tokenize}'
        )
        "#
    ))
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('fts_tokenizer', ?)")
        .bind(tokenizer)
        .execute(&mut *tx)
        .await?;

    // Repopulate from current document bodies so existing rows aren't orphaned
    // until the next sync; the next sync will still upsert fresh rows.
    sqlx::query(
        "INSERT INTO documents_fts(rowid, filepath, title, body) \
         SELECT id, rel_path, COALESCE(title, ''), body FROM documents",
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

async fn set_meta(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO schema_meta (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    Ok(())
}
