//! ModelRegistry: named presets mapping ports to model URIs, with a
//! process-wide TTL-evicting cache per spec §4.5. Changing the active
//! preset invalidates vectors from a different embedding model; the store's
//! `vectorSearch`/`chunks_missing_embedding` already filter by `model_id`,
//! so the registry's only job is to report what is loaded and evict what's
//! gone idle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::ModelsConfig;

use super::embedding::EmbeddingPort;
use super::ModelError;

struct CachedEmbedding {
    port: Arc<dyn EmbeddingPort>,
    last_used: Instant,
}

pub struct ModelRegistry {
    config: ModelsConfig,
    idle_ttl: Duration,
    cached_embedding: Mutex<Option<CachedEmbedding>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PresetAvailability {
    pub preset: String,
    pub embed_model: Option<String>,
    pub embed_available: bool,
    pub rerank_model: Option<String>,
    pub rerank_available: bool,
    pub generate_model: Option<String>,
    pub generate_available: bool,
}

impl ModelRegistry {
    pub fn new(config: ModelsConfig) -> Self {
        let idle_ttl = Duration::from_secs(config.idle_ttl_secs);
        Self { config, idle_ttl, cached_embedding: Mutex::new(None) }
    }

    pub fn active_model_id(&self) -> Option<String> {
        self.config.active().and_then(|p| p.embed.clone())
    }

    /// Lazily load (or reuse) the embedding port for the active preset.
    pub async fn embedding_port(&self) -> Result<Arc<dyn EmbeddingPort>, ModelError> {
        let preset = self
            .config
            .active()
            .ok_or_else(|| ModelError::unavailable("no active model preset configured"))?;
        let model_id = preset
            .embed
            .clone()
            .ok_or_else(|| ModelError::unavailable("active preset has no embed model"))?;
        let dims = preset.dims.unwrap_or(384);

        let mut guard = self.cached_embedding.lock().await;
        if let Some(cached) = guard.as_mut() {
            if cached.port.model_id() == model_id {
                cached.last_used = Instant::now();
                return Ok(cached.port.clone());
            }
        }

        let port = load_embedding_provider(&model_id, dims)?;
        *guard = Some(CachedEmbedding { port: port.clone(), last_used: Instant::now() });
        Ok(port)
    }

    /// Drop the cached embedding model if it has been idle past the
    /// configured TTL. Callers invoke this periodically (e.g. between
    /// ingestion batches); it is not scheduled internally since the engine
    /// has no background timer thread (spec §5: single-process event loop).
    pub async fn evict_idle(&self) {
        let mut guard = self.cached_embedding.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.last_used.elapsed() > self.idle_ttl {
                *guard = None;
            }
        }
    }

    pub fn doctor(&self) -> Vec<PresetAvailability> {
        self.config
            .presets
            .iter()
            .map(|preset| PresetAvailability {
                preset: preset.name.clone(),
                embed_model: preset.embed.clone(),
                embed_available: preset
                    .embed
                    .as_deref()
                    .map(is_known_embed_model)
                    .unwrap_or(false),
                rerank_model: preset.rerank.clone(),
                rerank_available: false,
                generate_model: preset.generate.clone(),
                generate_available: false,
            })
            .collect()
    }
}

fn is_known_embed_model(model_id: &str) -> bool {
    matches!(model_id, "bge-small-en-v1.5" | "bge-base-en-v1.5" | "all-minilm-l6-v2")
}

// Primary platforms (Linux glibc/aarch64, macOS aarch64, Windows): fastembed
// with bundled ORT. Takes priority when both backends are compiled in.
#[cfg(feature = "local-embeddings-fastembed")]
fn load_embedding_provider(model_id: &str, dims: usize) -> Result<Arc<dyn EmbeddingPort>, ModelError> {
    use super::embedding::fastembed_provider::FastEmbedProvider;
    Ok(Arc::new(FastEmbedProvider::new(model_id, dims)?))
}

// Fallback platforms (Linux musl, macOS Intel): pure-Rust tract path, no
// ONNX Runtime binary required.
#[cfg(all(feature = "local-embeddings-tract", not(feature = "local-embeddings-fastembed")))]
fn load_embedding_provider(model_id: &str, dims: usize) -> Result<Arc<dyn EmbeddingPort>, ModelError> {
    use super::embedding::tract_provider::TractEmbedProvider;
    Ok(Arc::new(TractEmbedProvider::new(model_id, dims)?))
}

#[cfg(not(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract")))]
fn load_embedding_provider(model_id: &str, _dims: usize) -> Result<Arc<dyn EmbeddingPort>, ModelError> {
    Err(ModelError::unavailable(format!(
        "no local embedding backend compiled in (model '{model_id}')"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelPreset;

    #[test]
    fn doctor_reports_unknown_models_as_unavailable() {
        let config = ModelsConfig {
            active_preset: "default".into(),
            presets: vec![ModelPreset {
                name: "default".into(),
                embed: Some("nonexistent-model".into()),
                rerank: None,
                generate: None,
                dims: Some(384),
            }],
            timeout_ms: 30_000,
            idle_ttl_secs: 300,
        };
        let registry = ModelRegistry::new(config);
        let report = registry.doctor();
        assert_eq!(report.len(), 1);
        assert!(!report[0].embed_available);
    }

    #[test]
    fn doctor_reports_known_model_as_available() {
        let config = ModelsConfig {
            active_preset: "default".into(),
            presets: vec![ModelPreset {
                name: "default".into(),
                embed: Some("bge-small-en-v1.5".into()),
                rerank: None,
                generate: None,
                dims: Some(384),
            }],
            timeout_ms: 30_000,
            idle_ttl_secs: 300,
        };
        let registry = ModelRegistry::new(config);
        assert!(registry.doctor()[0].embed_available);
    }
}
