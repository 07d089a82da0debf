//! Reference resolution: `docid` | `gno://` URI | `coll/relPath[:line]`
//! (spec §4.7, §6).

use crate::error::{GnoError, Result};
use crate::models::Document;
use crate::store::Store;

#[derive(Debug, Clone)]
pub enum Ref {
    Docid(String),
    Uri(String),
    CollectionPath { collection: String, rel_path: String, line: Option<i64> },
}

/// Parse a `ref` string per spec §4.7. Does not touch the store.
pub fn parse_ref(raw: &str) -> Result<Ref> {
    if let Some(rest) = raw.strip_prefix('#') {
        if is_hex6_8(rest) {
            return Ok(Ref::Docid(rest.to_string()));
        }
        return Err(GnoError::validation(format!("invalid docid: '{raw}'")));
    }

    if let Some(rest) = raw.strip_prefix("gno://") {
        if rest.is_empty() {
            return Err(GnoError::validation("gno:// URI requires a collection and path"));
        }
        return Ok(Ref::Uri(raw.to_string()));
    }

    let (path_part, line) = match raw.rsplit_once(':') {
        Some((p, l)) if l.chars().all(|c| c.is_ascii_digit()) && !l.is_empty() => {
            (p, Some(l.parse::<i64>().unwrap()))
        }
        _ => (raw, None),
    };

    let (collection, rel_path) = path_part
        .split_once('/')
        .ok_or_else(|| GnoError::validation(format!("ref must be 'collection/relPath': '{raw}'")))?;
    if collection.is_empty() || rel_path.is_empty() {
        return Err(GnoError::validation(format!("ref must be 'collection/relPath': '{raw}'")));
    }

    Ok(Ref::CollectionPath {
        collection: collection.to_string(),
        rel_path: rel_path.to_string(),
        line,
    })
}

fn is_hex6_8(s: &str) -> bool {
    (6..=8).contains(&s.len()) && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// Resolve a parsed ref against the store. `NOT_FOUND` when nothing matches.
pub async fn resolve_ref(store: &Store, parsed: &Ref) -> Result<(Document, Option<i64>)> {
    match parsed {
        Ref::Docid(docid) => {
            let doc = store
                .get_document_by_docid(docid)
                .await?
                .ok_or_else(|| GnoError::not_found(format!("no document with docid #{docid}")))?;
            Ok((doc, None))
        }
        Ref::Uri(uri) => {
            let doc = store
                .get_document_by_uri(uri)
                .await?
                .ok_or_else(|| GnoError::not_found(format!("no document at '{uri}'")))?;
            Ok((doc, None))
        }
        Ref::CollectionPath { collection, rel_path, line } => {
            let doc = store
                .get_document_by_coll_path(collection, rel_path)
                .await?
                .ok_or_else(|| GnoError::not_found(format!("no document at '{collection}/{rel_path}'")))?;
            Ok((doc, *line))
        }
    }
}

/// Parsed `ls` scope: either a bare collection name or a `gno://` prefix.
pub enum Scope {
    Collection(String),
    Prefix { collection: String, prefix: String },
}

pub fn parse_scope(raw: &str) -> Result<Scope> {
    if let Some(rest) = raw.strip_prefix("gno://") {
        let mut parts = rest.splitn(2, '/');
        let collection = parts.next().unwrap_or("");
        let prefix = parts.next().unwrap_or("");
        if collection.is_empty() || prefix.is_empty() {
            return Err(GnoError::validation("gno:// scope requires collection and path"));
        }
        return Ok(Scope::Prefix { collection: collection.to_string(), prefix: prefix.to_string() });
    }
    Ok(Scope::Collection(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_docid() {
        match parse_ref("#a1b2c3").unwrap() {
            Ref::Docid(d) => assert_eq!(d, "a1b2c3"),
            _ => panic!("expected docid"),
        }
    }

    #[test]
    fn rejects_bad_docid_length() {
        assert!(parse_ref("#a1").is_err());
        assert!(parse_ref("#a1b2c3d4e5").is_err());
    }

    #[test]
    fn parses_uri() {
        match parse_ref("gno://docs/a.md").unwrap() {
            Ref::Uri(u) => assert_eq!(u, "gno://docs/a.md"),
            _ => panic!("expected uri"),
        }
    }

    #[test]
    fn parses_coll_path_with_line() {
        match parse_ref("docs/a.md:42").unwrap() {
            Ref::CollectionPath { collection, rel_path, line } => {
                assert_eq!(collection, "docs");
                assert_eq!(rel_path, "a.md");
                assert_eq!(line, Some(42));
            }
            _ => panic!("expected coll path"),
        }
    }

    #[test]
    fn bare_gno_scheme_is_rejected() {
        assert!(parse_ref("gno://").is_err());
    }

    #[test]
    fn parses_ls_scope_prefix() {
        match parse_scope("gno://docs/guides").unwrap() {
            Scope::Prefix { collection, prefix } => {
                assert_eq!(collection, "docs");
                assert_eq!(prefix, "guides");
            }
            _ => panic!("expected prefix scope"),
        }
    }
}
