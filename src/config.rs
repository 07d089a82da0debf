//! Configuration parsing, validation, and atomic rewrite.
//!
//! GNO is configured via a YAML file (default: `<GNO_CONFIG_DIR>/index.yml`).
//! The config defines the FTS tokenizer, collections, contexts, and the
//! active model preset. Mutating commands (`collection add`, `context set`,
//! `tags add`, …) rewrite this file atomically: write to a temp file in the
//! same directory, then rename over the original, so a crash mid-write never
//! leaves a half-written config (spec §5, §7).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GnoError, Result};

pub const ALLOWED_TOKENIZERS: &[&str] = &["unicode61", "porter", "trigram"];

/// Collection name pattern per spec §6: `[a-z0-9][a-z0-9._-]{0,63}`.
pub fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
        return false;
    }
    if name.len() > 64 {
        return false;
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(rename = "ftsTokenizer", default = "default_tokenizer")]
    pub fts_tokenizer: String,
    #[serde(default)]
    pub collections: Vec<Collection>,
    #[serde(default)]
    pub contexts: Vec<ContextEntry>,
    #[serde(default)]
    pub models: ModelsConfig,
}

fn default_tokenizer() -> String {
    "unicode61".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub root: PathBuf,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default, rename = "includeExtensions")]
    pub include_extensions: Option<Vec<String>>,
    #[serde(default, rename = "excludePatterns")]
    pub exclude_patterns: Vec<String>,
    #[serde(default, rename = "updateCmd")]
    pub update_cmd: Option<String>,
    #[serde(default, rename = "languageHint")]
    pub language_hint: Option<String>,
}

fn default_pattern() -> String {
    "**/*".to_string()
}

/// A scope is one of `global`, `collection:`, or `gno://collection/prefix`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextEntry {
    pub scope: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelsConfig {
    #[serde(default = "default_preset")]
    pub active_preset: String,
    #[serde(default)]
    pub presets: Vec<ModelPreset>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
}

fn default_preset() -> String {
    "default".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_idle_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPreset {
    pub name: String,
    #[serde(default)]
    pub embed: Option<String>,
    #[serde(default)]
    pub rerank: Option<String>,
    #[serde(default)]
    pub generate: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
}

impl ModelsConfig {
    pub fn active(&self) -> Option<&ModelPreset> {
        self.presets.iter().find(|p| p.name == self.active_preset)
    }
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| GnoError::Io(e))?;
    let config: Config = serde_yaml::from_str(&content)
        .map_err(|e| GnoError::Validation(format!("failed to parse config: {e}")))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if !ALLOWED_TOKENIZERS.contains(&config.fts_tokenizer.as_str())
        && !config.fts_tokenizer.starts_with("snowball ")
    {
        return Err(GnoError::Validation(format!(
            "unknown ftsTokenizer: '{}'",
            config.fts_tokenizer
        )));
    }

    for collection in &config.collections {
        if !is_valid_collection_name(&collection.name) {
            return Err(GnoError::Validation(format!(
                "invalid collection name: '{}'",
                collection.name
            )));
        }
    }

    let mut seen = std::collections::HashSet::new();
    for collection in &config.collections {
        if !seen.insert(&collection.name) {
            return Err(GnoError::Validation(format!(
                "duplicate collection name: '{}'",
                collection.name
            )));
        }
    }

    Ok(())
}

/// Atomically rewrite the config file: write to a temp file beside `path`,
/// then rename over it. Never leaves a half-written config on crash.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    validate(config)?;
    let yaml = serde_yaml::to_string(config)
        .map_err(|e| GnoError::Internal(format!("failed to serialize config: {e}")))?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let tmp_path = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("index.yml"),
        std::process::id()
    ));
    std::fs::write(&tmp_path, yaml)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolve the config directory, honoring the `GNO_CONFIG_DIR` override.
/// Overrides must be absolute per spec §6.
pub fn config_dir() -> Result<PathBuf> {
    env_override_dir("GNO_CONFIG_DIR", |base| base.join("gno").join("config"))
}

pub fn data_dir() -> Result<PathBuf> {
    env_override_dir("GNO_DATA_DIR", |base| base.join("gno").join("data"))
}

pub fn cache_dir() -> Result<PathBuf> {
    env_override_dir("GNO_CACHE_DIR", |base| base.join("gno").join("cache"))
}

fn env_override_dir(var: &str, default_under: impl FnOnce(PathBuf) -> PathBuf) -> Result<PathBuf> {
    if let Ok(val) = std::env::var(var) {
        let path = PathBuf::from(&val);
        if !path.is_absolute() {
            return Err(GnoError::Validation(format!(
                "{var} must be an absolute path, got '{val}'"
            )));
        }
        return Ok(path);
    }
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    Ok(default_under(base))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("index.yml"))
}

pub fn default_db_path(index_name: &str) -> Result<PathBuf> {
    Ok(data_dir()?.join(format!("{index_name}.sqlite")))
}

pub fn is_offline() -> bool {
    std::env::var("GNO_OFFLINE").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_collection_names() {
        assert!(is_valid_collection_name("docs"));
        assert!(is_valid_collection_name("my-notes_2024"));
        assert!(!is_valid_collection_name("Docs"));
        assert!(!is_valid_collection_name(""));
        assert!(!is_valid_collection_name("_docs"));
    }

    #[test]
    fn rejects_unknown_tokenizer() {
        let config = Config {
            version: "1".into(),
            fts_tokenizer: "nonsense".into(),
            collections: vec![],
            contexts: vec![],
            models: ModelsConfig::default(),
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn accepts_snowball_tokenizer() {
        let config = Config {
            version: "1".into(),
            fts_tokenizer: "snowball english".into(),
            collections: vec![],
            contexts: vec![],
            models: ModelsConfig::default(),
        };
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.yml");
        let config = Config {
            version: "1".into(),
            fts_tokenizer: "unicode61".into(),
            collections: vec![Collection {
                name: "docs".into(),
                root: PathBuf::from("/tmp/docs"),
                pattern: "**/*".into(),
                include_extensions: None,
                exclude_patterns: vec![],
                update_cmd: None,
                language_hint: None,
            }],
            contexts: vec![],
            models: ModelsConfig::default(),
        };
        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.collections.len(), 1);
        assert_eq!(loaded.collections[0].name, "docs");
    }
}
