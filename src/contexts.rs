//! Context CRUD and scope resolution (spec §3 Context, §4.7 scope grammar).
//!
//! A context is user-authored text attached to a scope: `global` (`/`),
//! `collection` (`<name>:`), or `prefix` (`gno://<collection>/<path-prefix>`).

use crate::config::{Config, ContextEntry};
use crate::error::{GnoError, Result};

pub const GLOBAL_SCOPE: &str = "/";

pub fn set(config: &mut Config, scope: &str, text: &str) -> Result<()> {
    validate_scope(config, scope)?;
    if let Some(existing) = config.contexts.iter_mut().find(|c| c.scope == scope) {
        existing.text = text.to_string();
    } else {
        config.contexts.push(ContextEntry { scope: scope.to_string(), text: text.to_string() });
    }
    Ok(())
}

pub fn remove(config: &mut Config, scope: &str) -> Result<bool> {
    let before = config.contexts.len();
    config.contexts.retain(|c| c.scope != scope);
    Ok(config.contexts.len() != before)
}

pub fn list(config: &Config) -> &[ContextEntry] {
    &config.contexts
}

fn validate_scope(config: &Config, scope: &str) -> Result<()> {
    if scope == GLOBAL_SCOPE {
        return Ok(());
    }
    if let Some(name) = scope.strip_suffix(':') {
        if config.collections.iter().any(|c| c.name == name) {
            return Ok(());
        }
        return Err(GnoError::validation(format!("scope references unknown collection: '{name}'")));
    }
    if let Some(rest) = scope.strip_prefix("gno://") {
        let collection = rest.split('/').next().unwrap_or("");
        if !collection.is_empty() && rest.len() > collection.len() + 1 {
            if config.collections.iter().any(|c| c.name == collection) {
                return Ok(());
            }
            return Err(GnoError::validation(format!("scope references unknown collection: '{collection}'")));
        }
        return Err(GnoError::validation(format!("malformed context scope: '{scope}'")));
    }
    Err(GnoError::validation(format!("malformed context scope: '{scope}'")))
}

/// Resolve the context text that applies to a document's URI, preferring
/// the most specific match: prefix > collection > global.
pub fn resolve_for_uri<'a>(config: &'a Config, collection: &str, uri: &str) -> Option<&'a str> {
    let mut prefix_match: Option<&str> = None;
    let mut collection_match: Option<&str> = None;
    let mut global_match: Option<&str> = None;

    for ctx in &config.contexts {
        if ctx.scope == GLOBAL_SCOPE {
            global_match = Some(&ctx.text);
        } else if ctx.scope == format!("{collection}:") {
            collection_match = Some(&ctx.text);
        } else if let Some(rest) = ctx.scope.strip_prefix("gno://") {
            if uri.strip_prefix("gno://").map(|u| u.starts_with(rest)).unwrap_or(false) {
                prefix_match = Some(&ctx.text);
            }
        }
    }

    prefix_match.or(collection_match).or(global_match)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Collection;
    use std::path::PathBuf;

    fn config_with_collection(name: &str) -> Config {
        Config {
            version: "1".into(),
            fts_tokenizer: "unicode61".into(),
            collections: vec![Collection {
                name: name.into(),
                root: PathBuf::from("/tmp"),
                pattern: "**/*".into(),
                include_extensions: None,
                exclude_patterns: vec![],
                update_cmd: None,
                language_hint: None,
            }],
            contexts: vec![],
            models: Default::default(),
        }
    }

    #[test]
    fn global_scope_always_valid() {
        let mut config = config_with_collection("docs");
        assert!(set(&mut config, "/", "top level notes").is_ok());
    }

    #[test]
    fn unknown_collection_scope_rejected() {
        let mut config = config_with_collection("docs");
        assert!(set(&mut config, "missing:", "x").is_err());
    }

    #[test]
    fn prefix_beats_collection_beats_global() {
        let mut config = config_with_collection("docs");
        set(&mut config, "/", "global").unwrap();
        set(&mut config, "docs:", "collection").unwrap();
        set(&mut config, "gno://docs/guides", "prefix").unwrap();

        assert_eq!(resolve_for_uri(&config, "docs", "gno://docs/guides/a.md"), Some("prefix"));
        assert_eq!(resolve_for_uri(&config, "docs", "gno://docs/other.md"), Some("collection"));
        assert_eq!(resolve_for_uri(&config, "other", "gno://other/a.md"), Some("global"));
    }
}
