//! Collection CRUD over the config file (spec §3 Collection, §6 config
//! rewrite discipline). Operations mutate a loaded [`Config`] in place;
//! callers persist with [`crate::config::save_config`].

use crate::config::{is_valid_collection_name, Collection, Config};
use crate::error::{GnoError, Result};

pub fn add(config: &mut Config, collection: Collection) -> Result<()> {
    if !is_valid_collection_name(&collection.name) {
        return Err(GnoError::validation(format!("invalid collection name: '{}'", collection.name)));
    }
    if config.collections.iter().any(|c| c.name == collection.name) {
        return Err(GnoError::Duplicate(format!("collection '{}' already exists", collection.name)));
    }
    config.collections.push(collection);
    Ok(())
}

/// Refuses with `CONFLICT` if any context still scopes to this collection
/// (spec §8: "removing a collection referenced by a context").
pub fn remove(config: &mut Config, name: &str) -> Result<()> {
    if !config.collections.iter().any(|c| c.name == name) {
        return Err(GnoError::not_found(format!("no such collection: '{name}'")));
    }
    if references_collection(config, name) {
        return Err(GnoError::Conflict(format!(
            "collection '{name}' is still referenced by a context"
        )));
    }
    config.collections.retain(|c| c.name != name);
    Ok(())
}

pub fn list(config: &Config) -> &[Collection] {
    &config.collections
}

/// Rename `old` to `new`, rewriting every context scope that referenced
/// `old:` or `gno://old/*` in place (spec §8).
pub fn rename(config: &mut Config, old: &str, new: &str) -> Result<()> {
    if !is_valid_collection_name(new) {
        return Err(GnoError::validation(format!("invalid collection name: '{new}'")));
    }
    if config.collections.iter().any(|c| c.name == new) {
        return Err(GnoError::Duplicate(format!("collection '{new}' already exists")));
    }
    let Some(collection) = config.collections.iter_mut().find(|c| c.name == old) else {
        return Err(GnoError::not_found(format!("no such collection: '{old}'")));
    };
    collection.name = new.to_string();

    for context in &mut config.contexts {
        if context.scope == format!("{old}:") {
            context.scope = format!("{new}:");
        } else if let Some(rest) = context.scope.strip_prefix(&format!("gno://{old}/")) {
            context.scope = format!("gno://{new}/{rest}");
        }
    }
    Ok(())
}

fn references_collection(config: &Config, name: &str) -> bool {
    let collection_scope = format!("{name}:");
    let uri_prefix = format!("gno://{name}/");
    config
        .contexts
        .iter()
        .any(|ctx| ctx.scope == collection_scope || ctx.scope.starts_with(&uri_prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextEntry;
    use std::path::PathBuf;

    fn test_collection(name: &str) -> Collection {
        Collection {
            name: name.into(),
            root: PathBuf::from("/tmp"),
            pattern: "**/*".into(),
            include_extensions: None,
            exclude_patterns: vec![],
            update_cmd: None,
            language_hint: None,
        }
    }

    fn empty_config() -> Config {
        Config {
            version: "1".into(),
            fts_tokenizer: "unicode61".into(),
            collections: vec![],
            contexts: vec![],
            models: Default::default(),
        }
    }

    #[test]
    fn remove_blocked_by_referencing_context() {
        let mut config = empty_config();
        add(&mut config, test_collection("docs")).unwrap();
        config.contexts.push(ContextEntry { scope: "docs:".into(), text: "notes".into() });
        assert!(matches!(remove(&mut config, "docs"), Err(GnoError::Conflict(_))));
    }

    #[test]
    fn rename_rewrites_context_scopes() {
        let mut config = empty_config();
        add(&mut config, test_collection("a")).unwrap();
        config.contexts.push(ContextEntry { scope: "a:".into(), text: "x".into() });
        config.contexts.push(ContextEntry { scope: "gno://a/guides".into(), text: "y".into() });
        rename(&mut config, "a", "b").unwrap();
        assert_eq!(config.contexts[0].scope, "b:");
        assert_eq!(config.contexts[1].scope, "gno://b/guides");
        assert!(remove(&mut config, "b").is_err());
    }
}
