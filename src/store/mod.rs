//! Embedded relational store: SQLite with WAL, an FTS5 virtual table for
//! lexical search, and plain tables for chunks, embeddings, tags, and links.
//!
//! This module is the only place that touches SQL. Everything above it
//! (ingestion, retrieval) goes through [`Store`].

mod db;
mod migrate;
mod queries;

pub use db::open;
pub use queries::*;

use sqlx::SqlitePool;

/// A handle to one GNO index database.
#[derive(Clone)]
pub struct Store {
    pub(crate) pool: SqlitePool,
}

impl Store {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
