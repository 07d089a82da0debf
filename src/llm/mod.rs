//! Model ports: abstractions over embedding, rerank, and generation
//! (spec §4.5). Implementations load weights once and stay warm for a
//! configurable TTL, managed by [`registry::ModelRegistry`].
//!
//! Grounded on the teacher's `embedding.rs` trait/free-function split, but
//! the vector math (cosine/blob codec) now lives in `store::queries` since
//! the store is the only thing that touches raw vector bytes; this module
//! only produces `Vec<f32>`.

pub mod embedding;
pub mod generation;
pub mod registry;
pub mod rerank;

pub use embedding::EmbeddingPort;
pub use generation::GenerationPort;
pub use registry::ModelRegistry;
pub use rerank::RerankPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    ModelUnavailable,
    ModelLoadFailed,
    Timeout,
}

#[derive(Debug, Clone)]
pub struct ModelError {
    pub kind: ModelErrorKind,
    pub message: String,
}

impl ModelError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self { kind: ModelErrorKind::ModelUnavailable, message: message.into() }
    }

    pub fn load_failed(message: impl Into<String>) -> Self {
        Self { kind: ModelErrorKind::ModelLoadFailed, message: message.into() }
    }
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ModelError {}

impl From<ModelError> for crate::error::GnoError {
    fn from(e: ModelError) -> Self {
        crate::error::GnoError::ModelUnavailable(e.to_string())
    }
}
