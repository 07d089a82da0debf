//! Connection setup and the open/migrate/tokenizer-guard entry point.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::error::{GnoError, Result};

use super::migrate;
use super::Store;

/// Open (creating if necessary) the database at `path`.
///
/// If the database is empty, the schema is created fresh at the migration
/// head with `tokenizer` recorded in `schema_meta`. Otherwise pending
/// migrations are applied in order, each in its own transaction, and the
/// recorded tokenizer is compared against `tokenizer`: a mismatch is refused
/// unless `allow_tokenizer_rebuild` is set, in which case the FTS table is
/// dropped and rebuilt (irrecoverably — the next sync repopulates it).
pub async fn open(path: &Path, tokenizer: &str, allow_tokenizer_rebuild: bool) -> Result<Store> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .map_err(|e| GnoError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .map_err(|e| GnoError::Corrupt(format!("failed to open store: {e}")))?;

    migrate::run(&pool, tokenizer, allow_tokenizer_rebuild).await?;

    Ok(Store::new(pool))
}

pub(crate) async fn recorded_tokenizer(
    pool: &sqlx::SqlitePool,
) -> Result<Option<String>> {
    let row = sqlx::query("SELECT value FROM schema_meta WHERE key = 'fts_tokenizer'")
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get::<String, _>("value")))
}
