//! The sync algorithm (spec §4.3): walk, detect change, convert, canonicalize,
//! chunk, upsert, cleanup orphans.

use std::collections::HashSet;
use std::process::Command;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Collection;
use crate::converters::{ConversionArtifact, ConverterRegistry, Limits};
use crate::error::Result;
use crate::ingest::chunker::{chunk_markdown, DEFAULT_MAX_CHARS};
use crate::ingest::frontmatter::{extract_links, parse_frontmatter};
use crate::ingest::walker::walk_collection;
use crate::store::{sha256_hex, DocumentFields, Store};

const MAX_CONVERT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionStats {
    pub collection: String,
    pub files_added: u64,
    pub files_updated: u64,
    pub files_unchanged: u64,
    pub files_skipped: u64,
    pub files_errored: u64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub collections: Vec<CollectionStats>,
}

impl SyncResult {
    pub fn total_errored(&self) -> u64 {
        self.collections.iter().map(|c| c.files_errored).sum()
    }
}

pub async fn sync_collection(
    store: &Store,
    collection: &Collection,
    registry: &ConverterRegistry,
    run_update_cmd: bool,
) -> Result<CollectionStats> {
    let mut stats = CollectionStats {
        collection: collection.name.clone(),
        ..Default::default()
    };

    if run_update_cmd {
        if let Some(cmd) = &collection.update_cmd {
            match Command::new("sh").arg("-c").arg(cmd).current_dir(&collection.root).status() {
                Ok(status) if !status.success() => {
                    stats.warnings.push(format!("updateCmd exited with {status}"));
                }
                Err(e) => {
                    stats.warnings.push(format!("updateCmd failed to start: {e}"));
                }
                _ => {}
            }
        }
    }

    let outcome = walk_collection(collection)?;
    stats.files_skipped = outcome.skipped;
    let entries = outcome.entries;
    let mut live_rel_paths: HashSet<String> = HashSet::new();
    let limits = Limits::default();

    for entry in &entries {
        live_rel_paths.insert(entry.rel_path.clone());

        let fingerprint = store.document_fingerprint(&collection.name, &entry.rel_path).await?;
        if let Some((mtime, size, _ingest_version, _hash)) = fingerprint {
            if mtime == entry.mtime && size == entry.size {
                stats.files_unchanged += 1;
                continue;
            }
        }

        let bytes = match std::fs::read(&entry.abs_path) {
            Ok(b) => b,
            Err(e) => {
                warn!(path = %entry.abs_path.display(), error = %e, "read failed");
                stats.files_errored += 1;
                continue;
            }
        };
        let source_hash = sha256_hex(&bytes);

        if let Some((_, _, ingest_version, stored_hash)) =
            store.document_fingerprint(&collection.name, &entry.rel_path).await?
        {
            if stored_hash == source_hash && ingest_version == CURRENT_INGEST_VERSION {
                store
                    .touch_document(&collection.name, &entry.rel_path, entry.mtime, entry.size)
                    .await?;
                stats.files_unchanged += 1;
                continue;
            }
        }

        let is_new = store.find_document_id(&collection.name, &entry.rel_path).await?.is_none();

        let ext = entry
            .abs_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());
        let mime = mime_for_extension(ext.as_deref());

        let artifact = match convert_with_retry(registry, bytes, &mime, ext.as_deref(), limits).await {
            Ok(a) => a,
            Err(e) => {
                debug!(path = %entry.rel_path, error = %e, "conversion failed");
                stats.files_errored += 1;
                continue;
            }
        };

        let (frontmatter, body_after_frontmatter) = parse_frontmatter(&artifact.markdown);
        let title = frontmatter
            .title
            .clone()
            .or_else(|| artifact.title.clone())
            .or_else(|| filename_stem(&entry.rel_path));
        let language_hint = frontmatter
            .language_hint
            .clone()
            .or_else(|| artifact.language_hint.clone())
            .or_else(|| collection.language_hint.clone());

        let uri = format!("gno://{}/{}", collection.name, entry.rel_path);
        let fields = DocumentFields {
            collection: &collection.name,
            rel_path: &entry.rel_path,
            uri: &uri,
            title: title.as_deref(),
            mime: &mime,
            ext: ext.as_deref(),
            source_mtime: entry.mtime,
            source_size: entry.size,
            source_hash: &source_hash,
            mirror_hash: &artifact.mirror_hash,
            body: &artifact.markdown,
            language_hint: language_hint.as_deref(),
            ingest_version: CURRENT_INGEST_VERSION,
        };
        let _docid = store.upsert_document(fields).await?;

        let document_id = store
            .find_document_id(&collection.name, &entry.rel_path)
            .await?
            .ok_or_else(|| crate::error::GnoError::Internal("document vanished after upsert".into()))?;

        let mut chunks = chunk_markdown(&artifact.markdown, DEFAULT_MAX_CHARS);
        for chunk in &mut chunks {
            chunk.document_id = document_id;
        }
        store.replace_chunks(document_id, &chunks).await?;

        store.replace_frontmatter_tags(document_id, &frontmatter.tags).await?;

        let links = extract_links(document_id, body_after_frontmatter);
        store.replace_parsed_links(document_id, &links).await?;

        if is_new {
            stats.files_added += 1;
        } else {
            stats.files_updated += 1;
        }
    }

    let orphans = store.orphans_in_collection(&collection.name, &live_rel_paths).await?;
    for (document_id, _rel_path) in orphans {
        store.delete_document(document_id).await?;
    }

    info!(
        collection = %collection.name,
        added = stats.files_added,
        updated = stats.files_updated,
        unchanged = stats.files_unchanged,
        errored = stats.files_errored,
        "sync complete"
    );

    Ok(stats)
}

pub async fn sync_all(
    store: &Store,
    collections: &[Collection],
    registry: &ConverterRegistry,
    run_update_cmd: bool,
) -> Result<SyncResult> {
    let mut result = SyncResult::default();
    for collection in collections {
        let stats = sync_collection(store, collection, registry, run_update_cmd).await?;
        result.collections.push(stats);
    }
    Ok(result)
}

/// Bumped when ingestion semantics change, forcing reprocessing of every row.
const CURRENT_INGEST_VERSION: i64 = 1;

async fn convert_with_retry(
    registry: &ConverterRegistry,
    bytes: Vec<u8>,
    mime: &str,
    ext: Option<&str>,
    limits: Limits,
) -> std::result::Result<ConversionArtifact, crate::converters::ConvertError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match registry.convert(bytes.clone(), mime, ext, limits).await {
            Ok(artifact) => return Ok(artifact),
            Err(e) if e.retryable && attempt < MAX_CONVERT_ATTEMPTS => continue,
            Err(e) => return Err(e),
        }
    }
}

fn filename_stem(rel_path: &str) -> Option<String> {
    std::path::Path::new(rel_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
}

fn mime_for_extension(ext: Option<&str>) -> String {
    match ext {
        Some("md") | Some("markdown") | Some("mdx") => "text/markdown".to_string(),
        Some("txt") | Some("text") | Some("log") => "text/plain".to_string(),
        Some("pdf") => "application/pdf".to_string(),
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document".to_string()
        }
        Some("pptx") => {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation".to_string()
        }
        Some("xlsx") => {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string()
        }
        _ => "text/plain".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::open;
    use std::fs;

    fn test_collection(root: std::path::PathBuf) -> Collection {
        Collection {
            name: "docs".into(),
            root,
            pattern: "**/*".into(),
            include_extensions: None,
            exclude_patterns: vec![],
            update_cmd: None,
            language_hint: None,
        }
    }

    #[tokio::test]
    async fn sync_adds_then_detects_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "# Hello\n\nbody\n").unwrap();
        let db_path = dir.path().join("index.sqlite");
        let store = open(&db_path, "unicode61", false).await.unwrap();
        let registry = ConverterRegistry::new();
        let collection = test_collection(dir.path().to_path_buf());

        let stats = sync_collection(&store, &collection, &registry, false).await.unwrap();
        assert_eq!(stats.files_added, 1);

        let stats2 = sync_collection(&store, &collection, &registry, false).await.unwrap();
        assert_eq!(stats2.files_unchanged, 1);
        assert_eq!(stats2.files_added, 0);
    }

    #[tokio::test]
    async fn orphan_cleanup_removes_deleted_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "# A\n").unwrap();
        let db_path = dir.path().join("index.sqlite");
        let store = open(&db_path, "unicode61", false).await.unwrap();
        let registry = ConverterRegistry::new();
        let collection = test_collection(dir.path().to_path_buf());

        sync_collection(&store, &collection, &registry, false).await.unwrap();
        fs::remove_file(dir.path().join("a.md")).unwrap();
        fs::write(dir.path().join("b.md"), "# B\n").unwrap();

        let stats = sync_collection(&store, &collection, &registry, false).await.unwrap();
        assert_eq!(stats.files_added, 1);
        let remaining = store.list_documents(Some("docs"), None, 100, 0).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].rel_path, "b.md");
    }
}
