//! End-to-end integration tests over the public crate API: sync a real
//! collection into a temp store, then drive retrieval/tags/get against it.

use std::fs;
use std::path::PathBuf;

use gno::config::Collection;
use gno::converters::ConverterRegistry;
use gno::ingest;
use gno::retrieval::{get, lexical, RetrievalInput};
use gno::store::{self, Store};

fn test_collection(name: &str, root: PathBuf) -> Collection {
    Collection {
        name: name.into(),
        root,
        pattern: "**/*".into(),
        include_extensions: None,
        exclude_patterns: vec![],
        update_cmd: None,
        language_hint: None,
    }
}

async fn open_store(dir: &std::path::Path) -> Store {
    store::open(&dir.join("index.sqlite"), "unicode61", false).await.unwrap()
}

fn input(query: &str) -> RetrievalInput {
    RetrievalInput {
        query_text: query.to_string(),
        limit: 20,
        min_score: None,
        collection_filter: None,
        language_hint: None,
        full: false,
        line_numbers: false,
    }
}

#[tokio::test]
async fn sync_then_lexical_search_finds_document() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("onboarding.md"),
        "# Onboarding\n\nNew engineers read the runbook before deploying anything.\n",
    )
    .unwrap();
    let store = open_store(dir.path()).await;
    let registry = ConverterRegistry::new();
    let collection = test_collection("docs", dir.path().to_path_buf());

    let stats = ingest::sync_collection(&store, &collection, &registry, false).await.unwrap();
    assert_eq!(stats.files_added, 1);

    let results = lexical::search(&store, &input("runbook deploying")).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].collection, "docs");
    assert_eq!(results[0].uri, "gno://docs/onboarding.md");
    assert!(results[0].score > 0.0 && results[0].score <= 1.0);
}

#[tokio::test]
async fn docid_is_stable_across_touch_but_changes_with_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.md");
    fs::write(&path, "# A\n\nfirst body\n").unwrap();
    let store = open_store(dir.path()).await;
    let registry = ConverterRegistry::new();
    let collection = test_collection("docs", dir.path().to_path_buf());

    ingest::sync_collection(&store, &collection, &registry, false).await.unwrap();
    let first = store.get_document_by_coll_path("docs", "a.md").await.unwrap().unwrap();

    // Touching mtime without changing content must not mint a new docid.
    let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(2)).unwrap();
    drop(file);
    ingest::sync_collection(&store, &collection, &registry, false).await.unwrap();
    let after_touch = store.get_document_by_coll_path("docs", "a.md").await.unwrap().unwrap();
    assert_eq!(first.docid, after_touch.docid);

    // Changing content must mint a new docid (mirror-hash content address).
    fs::write(&path, "# A\n\nsecond body, totally different\n").unwrap();
    ingest::sync_collection(&store, &collection, &registry, false).await.unwrap();
    let after_edit = store.get_document_by_coll_path("docs", "a.md").await.unwrap().unwrap();
    assert_ne!(first.docid, after_edit.docid);
    assert_eq!(after_edit.docid.len(), 8);
}

#[tokio::test]
async fn user_tag_survives_frontmatter_resync() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.md");
    fs::write(&path, "# A\n\nbody\n").unwrap();
    let store = open_store(dir.path()).await;
    let registry = ConverterRegistry::new();
    let collection = test_collection("docs", dir.path().to_path_buf());

    ingest::sync_collection(&store, &collection, &registry, false).await.unwrap();
    let doc = store.get_document_by_coll_path("docs", "a.md").await.unwrap().unwrap();
    store.add_user_tag(doc.id, "reviewed").await.unwrap();

    // A later sync whose frontmatter declares the same tag must not steal it
    // back to source='frontmatter' (ON CONFLICT(document_id, tag) DO NOTHING).
    fs::write(&path, "---\ntags: [reviewed]\n---\n\n# A\n\nbody, edited\n").unwrap();
    ingest::sync_collection(&store, &collection, &registry, false).await.unwrap();

    let tags = store.tags_for_document(doc.id).await.unwrap();
    let reviewed = tags.iter().find(|t| t.tag == "reviewed").unwrap();
    assert_eq!(reviewed.source.as_str(), "user");
}

#[tokio::test]
async fn orphan_cleanup_then_get_by_ref_not_found() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.md"), "# A\n").unwrap();
    let store = open_store(dir.path()).await;
    let registry = ConverterRegistry::new();
    let collection = test_collection("docs", dir.path().to_path_buf());

    ingest::sync_collection(&store, &collection, &registry, false).await.unwrap();
    fs::remove_file(dir.path().join("a.md")).unwrap();
    ingest::sync_collection(&store, &collection, &registry, false).await.unwrap();

    let err = get::get(&store, "docs/a.md", None, None, false).await.unwrap_err();
    assert_eq!(err.kind().as_str(), "NOT_FOUND");
}

#[tokio::test]
async fn get_with_from_and_limit_windows_lines() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.md"), "one\ntwo\nthree\nfour\nfive\n").unwrap();
    let store = open_store(dir.path()).await;
    let registry = ConverterRegistry::new();
    let collection = test_collection("docs", dir.path().to_path_buf());
    ingest::sync_collection(&store, &collection, &registry, false).await.unwrap();

    let response = get::get(&store, "docs/a.md", Some(2), Some(2), false).await.unwrap();
    assert_eq!(response.body, "two\nthree");
    assert_eq!(response.line_range, Some((2, 3)));

    let full = get::get(&store, "docs/a.md", None, None, false).await.unwrap();
    assert!(full.line_range.is_none());
    assert!(full.body.starts_with("one\n"));
}

#[tokio::test]
async fn multi_get_reports_skipped_and_truncates() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.md"), "# A\n\nshort body\n").unwrap();
    fs::write(dir.path().join("b.md"), "# B\n\nanother body\n").unwrap();
    let store = open_store(dir.path()).await;
    let registry = ConverterRegistry::new();
    let collection = test_collection("docs", dir.path().to_path_buf());
    ingest::sync_collection(&store, &collection, &registry, false).await.unwrap();

    let refs = vec!["docs/a.md".to_string(), "docs/missing.md".to_string()];
    let response = get::multi_get(&store, &refs, Some(5)).await.unwrap();
    assert_eq!(response.entries.len(), 1);
    assert!(response.entries[0].truncated);
    assert!(response.entries[0].body.len() <= 5);
    assert_eq!(response.skipped.len(), 1);
    assert_eq!(response.skipped[0].raw_ref, "docs/missing.md");

    let globbed = get::multi_get(&store, &["gno://docs/*.md".to_string()], None).await.unwrap();
    assert_eq!(globbed.entries.len(), 2);
}

#[tokio::test]
async fn ls_scopes_by_collection_and_prefix() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("guides")).unwrap();
    fs::write(dir.path().join("root.md"), "# Root\n").unwrap();
    fs::write(dir.path().join("guides/intro.md"), "# Intro\n").unwrap();
    let store = open_store(dir.path()).await;
    let registry = ConverterRegistry::new();
    let collection = test_collection("docs", dir.path().to_path_buf());
    ingest::sync_collection(&store, &collection, &registry, false).await.unwrap();

    let all = get::ls(&store, Some("docs"), 100, 0).await.unwrap();
    assert_eq!(all.len(), 2);

    let scoped = get::ls(&store, Some("gno://docs/guides"), 100, 0).await.unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].uri, "gno://docs/guides/intro.md");
}

#[tokio::test]
async fn empty_query_text_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    let err = lexical::search(&store, &input("   ")).await.unwrap_err();
    assert_eq!(err.kind().as_str(), "VALIDATION");
}
