//! GNO: a local, single-user knowledge index and retrieval engine.
//!
//! [`Engine`] is the composition root used by both the CLI and the MCP
//! server: one [`store::Store`], one loaded [`config::Config`], one
//! [`llm::ModelRegistry`]. Converters, ingestion, and retrieval are plain
//! functions/modules over those three.

pub mod collections;
pub mod config;
pub mod contexts;
pub mod converters;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod retrieval;
pub mod server;
pub mod stats;
pub mod store;
pub mod tags;

use std::path::PathBuf;

use config::Config;
use error::Result;
use llm::ModelRegistry;
use store::Store;

/// Owns the store, the loaded config, and the model registry for one
/// running instance of the engine (spec §5: "configuration loaded once
/// per engine instance").
pub struct Engine {
    pub store: Store,
    pub config: Config,
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub models: ModelRegistry,
}

impl Engine {
    pub async fn open(config_path: PathBuf) -> Result<Self> {
        let config = config::load_config(&config_path)?;
        let db_path = config::default_db_path("index")?;
        let allow_tokenizer_rebuild = std::env::var("GNO_ALLOW_TOKENIZER_REBUILD")
            .map(|v| v == "1")
            .unwrap_or(false);
        let store = store::open(&db_path, &config.fts_tokenizer, allow_tokenizer_rebuild).await?;
        let models = ModelRegistry::new(config.models.clone());
        Ok(Self { store, config, config_path, db_path, models })
    }

    pub fn save_config(&self) -> Result<()> {
        config::save_config(&self.config_path, &self.config)
    }
}
