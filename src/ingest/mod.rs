//! Ingestion: walking, chunking, frontmatter/link extraction, and the sync
//! pipeline that ties them to the store.

pub mod chunker;
pub mod frontmatter;
pub mod pipeline;
pub mod walker;

pub use pipeline::{sync_all, sync_collection, CollectionStats, SyncResult};
