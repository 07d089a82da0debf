//! Collection walking: glob include/exclude, no symlink following, and
//! rooted-path escape rejection (spec §4.3 step 2).
//!
//! Grounded on the teacher's filesystem connector (`connector_fs.rs`), minus
//! the multi-source abstraction — GNO collections are always local
//! directories.

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::Collection;
use crate::error::{GnoError, Result};

/// A file found during a collection walk, not yet read or converted.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub rel_path: String,
    pub abs_path: std::path::PathBuf,
    pub mtime: i64,
    pub size: i64,
}

/// Result of a collection walk: eligible entries plus a count of files the
/// walk itself ruled ineligible (excluded, outside the extension allowlist,
/// or escaping the collection root) — spec §4.3 `filesSkipped`.
#[derive(Debug, Clone, Default)]
pub struct WalkOutcome {
    pub entries: Vec<WalkEntry>,
    pub skipped: u64,
}

/// Always-excluded directories, regardless of collection config.
const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/.gno/**"];

pub fn walk_collection(collection: &Collection) -> Result<WalkOutcome> {
    if !collection.root.exists() {
        return Err(GnoError::Validation(format!(
            "collection '{}' root does not exist: {}",
            collection.name,
            collection.root.display()
        )));
    }

    let include_set = build_globset(&[collection.pattern.clone()])?;
    let mut exclude_patterns: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    exclude_patterns.extend(collection.exclude_patterns.clone());
    let exclude_set = build_globset(&exclude_patterns)?;

    let mut entries = Vec::new();
    let mut skipped = 0u64;
    let walker = WalkDir::new(&collection.root).follow_links(false);

    for entry in walker {
        let entry = entry.map_err(|e| GnoError::Io(std::io::Error::other(e.to_string())))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(&collection.root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if path_escapes_root(&rel_str) {
            skipped += 1;
            continue;
        }
        if exclude_set.is_match(&rel_str) {
            skipped += 1;
            continue;
        }
        if !include_set.is_match(&rel_str) {
            skipped += 1;
            continue;
        }
        if let Some(allowlist) = &collection.include_extensions {
            let ext = relative
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase());
            match ext {
                Some(e) if allowlist.iter().any(|a| a.trim_start_matches('.') == e) => {}
                _ => {
                    skipped += 1;
                    continue;
                }
            }
        }

        let metadata = entry
            .metadata()
            .map_err(|e| GnoError::Io(std::io::Error::other(e.to_string())))?;
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|m| m.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        entries.push(WalkEntry {
            rel_path: rel_str,
            abs_path: path.to_path_buf(),
            mtime,
            size: metadata.len() as i64,
        });
    }

    entries.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(WalkOutcome { entries, skipped })
}

fn path_escapes_root(rel_str: &str) -> bool {
    std::path::Path::new(rel_str)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir | std::path::Component::RootDir))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| GnoError::Validation(format!("invalid glob '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| GnoError::Validation(format!("failed to build globset: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn collection_for(root: std::path::PathBuf) -> Collection {
        Collection {
            name: "t".into(),
            root,
            pattern: "**/*".into(),
            include_extensions: None,
            exclude_patterns: vec![],
            update_cmd: None,
            language_hint: None,
        }
    }

    #[test]
    fn walks_and_sorts_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/config"), "x").unwrap();

        let outcome = walk_collection(&collection_for(dir.path().to_path_buf())).unwrap();
        let names: Vec<_> = outcome.entries.iter().map(|e| e.rel_path.clone()).collect();
        assert_eq!(names, vec!["a.md".to_string(), "b.md".to_string()]);
        assert_eq!(outcome.skipped, 1); // .git/config excluded
    }

    #[test]
    fn honors_extension_allowlist() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.md"), "x").unwrap();
        fs::write(dir.path().join("skip.bin"), "x").unwrap();

        let mut collection = collection_for(dir.path().to_path_buf());
        collection.include_extensions = Some(vec!["md".to_string()]);
        let outcome = walk_collection(&collection).unwrap();
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].rel_path, "keep.md");
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn missing_root_is_validation_error() {
        let collection = collection_for(std::path::PathBuf::from("/does/not/exist"));
        let err = walk_collection(&collection).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }
}
