//! Tag CLI-facing operations: add/remove a user tag, list tags for a
//! document, aggregate tag counts (spec §3 `DocTag`).

use crate::error::Result;
use crate::models::DocTag;
use crate::retrieval::uri;
use crate::store::Store;

pub async fn add(store: &Store, raw_ref: &str, tag: &str) -> Result<()> {
    let parsed = uri::parse_ref(raw_ref)?;
    let (doc, _) = uri::resolve_ref(store, &parsed).await?;
    store.add_user_tag(doc.id, tag).await
}

/// Returns `false` if the tag was not present on the document.
pub async fn remove(store: &Store, raw_ref: &str, tag: &str) -> Result<bool> {
    let parsed = uri::parse_ref(raw_ref)?;
    let (doc, _) = uri::resolve_ref(store, &parsed).await?;
    store.remove_tag(doc.id, tag).await
}

pub async fn list_for_document(store: &Store, raw_ref: &str) -> Result<Vec<DocTag>> {
    let parsed = uri::parse_ref(raw_ref)?;
    let (doc, _) = uri::resolve_ref(store, &parsed).await?;
    store.tags_for_document(doc.id).await
}

pub async fn list_counts(store: &Store, collection: Option<&str>) -> Result<Vec<(String, i64)>> {
    store.list_tag_counts(collection).await
}
