//! EmbeddingPort: in-process local embedding, never a hosted API call
//! (spec Non-goal: no hosting of external embedding services).
//!
//! Grounded on the teacher's `EmbeddingProvider` trait (`embedding.rs`), with
//! the OpenAI HTTP backend replaced by an in-process `fastembed` model —
//! the registry loads the model once and keeps it warm, matching the
//! `ModelRegistry`/preset contract in spec §4.5.

use async_trait::async_trait;

use super::ModelError;

#[async_trait]
pub trait EmbeddingPort: Send + Sync {
    fn model_id(&self) -> &str;
    fn dims(&self) -> usize;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError>;
}

/// Embeds a single query text; a thin wrapper used by the vector retrieval
/// path (spec §4.6 "embed the query once").
pub async fn embed_query(port: &dyn EmbeddingPort, text: &str) -> Result<Vec<f32>, ModelError> {
    let mut vectors = port.embed(std::slice::from_ref(&text.to_string())).await?;
    vectors
        .pop()
        .ok_or_else(|| ModelError::unavailable("embedding provider returned no vectors"))
}

#[cfg(feature = "local-embeddings-fastembed")]
pub mod fastembed_provider {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

    use super::{EmbeddingPort, ModelError};

    /// Wraps `fastembed::TextEmbedding`, which is `!Sync` internally; access
    /// is serialized through a mutex since embedding calls are already
    /// batched one-at-a-time per model (spec §5 "at most one batch in
    /// flight per model"). The mutex is `Arc`-shared so `embed` can move it
    /// into `spawn_blocking` without cloning the model itself.
    pub struct FastEmbedProvider {
        model_id: String,
        dims: usize,
        inner: Arc<Mutex<TextEmbedding>>,
    }

    impl FastEmbedProvider {
        pub fn new(model_id: &str, dims: usize) -> Result<Self, ModelError> {
            let model = resolve_model(model_id)?;
            let inner = TextEmbedding::try_new(InitOptions::new(model))
                .map_err(|e| ModelError::load_failed(format!("failed to load {model_id}: {e}")))?;
            Ok(Self {
                model_id: model_id.to_string(),
                dims,
                inner: Arc::new(Mutex::new(inner)),
            })
        }
    }

    fn resolve_model(model_id: &str) -> Result<EmbeddingModel, ModelError> {
        match model_id {
            "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
            "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            other => Err(ModelError::unavailable(format!("unknown embed model preset '{other}'"))),
        }
    }

    #[async_trait]
    impl EmbeddingPort for FastEmbedProvider {
        fn model_id(&self) -> &str {
            &self.model_id
        }

        fn dims(&self) -> usize {
            self.dims
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
            let texts = texts.to_vec();
            let model_id = self.model_id.clone();
            let inner = self.inner.clone();
            // TextEmbedding::embed is CPU-bound; run it off the async executor.
            let inner_result = tokio::task::spawn_blocking(move || {
                let guard = inner.lock().expect("fastembed mutex poisoned");
                guard.embed(texts, None)
            })
            .await
            .map_err(|e| ModelError::unavailable(format!("{model_id} embed task panicked: {e}")))?;
            inner_result.map_err(|e| ModelError::unavailable(format!("{model_id} embed failed: {e}")))
        }
    }
}

/// Pure-Rust fallback path for platforms without ORT binaries (musl, Intel
/// Mac): loads an ONNX model with `tract-onnx`, tokenizes with `tokenizers`,
/// runs inference in `spawn_blocking`. Grounded on the teacher's
/// `embedding/local_tract.rs`.
#[cfg(feature = "local-embeddings-tract")]
pub mod tract_provider {
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;
    use tract_onnx::prelude::*;

    use super::{EmbeddingPort, ModelError};

    const ALL_MINILM_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";
    const DEFAULT_MAX_LEN: usize = 256;
    const DEFAULT_BATCH_SIZE: usize = 32;

    /// Model manifest: model id -> (onnx path in repo, tokenizer path in repo).
    fn model_manifest(model_id: &str) -> Result<(&'static str, &'static str), ModelError> {
        match model_id {
            "all-minilm-l6-v2" => Ok(("onnx/model.onnx", "tokenizer.json")),
            other => Err(ModelError::unavailable(format!(
                "tract backend supports only all-minilm-l6-v2, requested '{other}'"
            ))),
        }
    }

    fn cache_dir() -> Result<PathBuf, ModelError> {
        let base = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let dir = PathBuf::from(base).join(".cache").join("gno").join("models");
        std::fs::create_dir_all(&dir)
            .map_err(|e| ModelError::load_failed(format!("create model cache dir: {e}")))?;
        Ok(dir)
    }

    fn download_to_cache(repo: &str, path: &str, cache_path: &Path) -> Result<(), ModelError> {
        if cache_path.exists() {
            return Ok(());
        }
        let url = format!("https://huggingface.co/{repo}/resolve/main/{}", path.replace(' ', "%20"));
        let resp = reqwest::blocking::get(&url)
            .and_then(|r| r.error_for_status())
            .map_err(|e| ModelError::load_failed(format!("download {url}: {e}")))?;
        let bytes = resp.bytes().map_err(|e| ModelError::load_failed(format!("read body: {e}")))?;
        if let Some(parent) = cache_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ModelError::load_failed(format!("create cache parent: {e}")))?;
        }
        std::fs::write(cache_path, &bytes).map_err(|e| ModelError::load_failed(format!("write cache: {e}")))?;
        Ok(())
    }

    fn ensure_cached(model_id: &str) -> Result<(PathBuf, PathBuf), ModelError> {
        let (onnx_rel, tokenizer_rel) = model_manifest(model_id)?;
        let dir = cache_dir()?.join(model_id);
        let onnx_path = dir.join(onnx_rel);
        let tokenizer_path = dir.join(tokenizer_rel);
        download_to_cache(ALL_MINILM_REPO, onnx_rel, &onnx_path)?;
        download_to_cache(ALL_MINILM_REPO, tokenizer_rel, &tokenizer_path)?;
        Ok((onnx_path, tokenizer_path))
    }

    pub struct TractEmbedProvider {
        model_id: String,
        dims: usize,
    }

    impl TractEmbedProvider {
        /// Eagerly validates the model is known and primes the cache; the
        /// ONNX model itself loads lazily inside `spawn_blocking` on first
        /// `embed` call, matching the teacher's load-on-use behavior.
        pub fn new(model_id: &str, dims: usize) -> Result<Self, ModelError> {
            model_manifest(model_id)?;
            Ok(Self { model_id: model_id.to_string(), dims })
        }
    }

    #[async_trait]
    impl EmbeddingPort for TractEmbedProvider {
        fn model_id(&self) -> &str {
            &self.model_id
        }

        fn dims(&self) -> usize {
            self.dims
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
            let texts = texts.to_vec();
            let model_id = self.model_id.clone();
            let dims = self.dims;
            tokio::task::spawn_blocking(move || run_tract_embed(&model_id, dims, &texts))
                .await
                .map_err(|e| ModelError::unavailable(format!("{model_id} embed task panicked: {e}")))?
        }
    }

    fn run_tract_embed(model_id: &str, dims: usize, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let (onnx_path, tokenizer_path) = ensure_cached(model_id)?;

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ModelError::load_failed(format!("load tokenizer: {e}")))?;

        let model = tract_onnx::onnx()
            .model_for_path(&onnx_path)
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| ModelError::load_failed(format!("load onnx model: {e}")))?;

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(DEFAULT_BATCH_SIZE) {
            let encodings: Vec<_> = chunk
                .iter()
                .map(|s| {
                    tokenizer
                        .encode(s.as_str(), true)
                        .map_err(|e| ModelError::unavailable(format!("tokenize: {e}")))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(1).min(DEFAULT_MAX_LEN);
            let batch_size = encodings.len();
            let mut input_ids = vec![0i64; batch_size * max_len];
            let mut attention_mask = vec![0i64; batch_size * max_len];

            for (i, enc) in encodings.iter().enumerate() {
                let ids = enc.get_ids();
                let len = ids.len().min(max_len);
                for (j, &id) in ids.iter().take(len).enumerate() {
                    input_ids[i * max_len + j] = id as i64;
                    attention_mask[i * max_len + j] = 1;
                }
            }

            let input_ids_t: Tensor = ndarray::Array2::from_shape_vec((batch_size, max_len), input_ids)
                .map_err(|e| ModelError::unavailable(format!("input ids shape: {e}")))?
                .into();
            let attention_mask_t: Tensor = ndarray::Array2::from_shape_vec((batch_size, max_len), attention_mask)
                .map_err(|e| ModelError::unavailable(format!("attention mask shape: {e}")))?
                .into();

            let result = model
                .run(tvec!(input_ids_t.into(), attention_mask_t.into()))
                .map_err(|e| ModelError::unavailable(format!("tract inference: {e}")))?;
            let output = result
                .into_iter()
                .next()
                .ok_or_else(|| ModelError::unavailable("tract model produced no output tensor"))?;
            let view = output
                .to_array_view::<f32>()
                .map_err(|e| ModelError::unavailable(format!("output to array: {e}")))?;

            // Shape is [batch, dims] for a pooled sentence embedding, or
            // [batch, seq_len, dims] for a last_hidden_state needing mean pooling.
            let shape = view.shape();
            if shape.len() == 2 {
                for i in 0..shape[0] {
                    let row: Vec<f32> = view.slice(ndarray::s![i, ..]).iter().copied().collect();
                    all_embeddings.push(normalize_l2(row));
                }
            } else if shape.len() == 3 {
                let seq_len = shape[1];
                for (i, enc) in encodings.iter().enumerate() {
                    let valid_len = enc.get_ids().len().min(seq_len).min(max_len);
                    let mut sum = vec![0f32; dims];
                    let mut count = 0f32;
                    for j in 0..valid_len {
                        for (k, &v) in view.slice(ndarray::s![i, j, ..]).iter().enumerate() {
                            if k < dims {
                                sum[k] += v;
                            }
                        }
                        count += 1.0;
                    }
                    if count > 0.0 {
                        for x in &mut sum {
                            *x /= count;
                        }
                    }
                    all_embeddings.push(normalize_l2(sum));
                }
            } else {
                return Err(ModelError::unavailable(format!("unexpected tract output shape: {shape:?}")));
            }
        }

        Ok(all_embeddings)
    }

    fn normalize_l2(mut v: Vec<f32>) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 1e-9 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubPort;

    #[async_trait]
    impl EmbeddingPort for StubPort {
        fn model_id(&self) -> &str {
            "stub"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn embed_query_returns_single_vector() {
        let port = StubPort;
        let v = embed_query(&port, "hello").await.unwrap();
        assert_eq!(v, vec![1.0, 0.0, 0.0]);
    }
}
