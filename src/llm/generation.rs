//! GenerationPort (spec §4.5): used only by the grounded-answer stage
//! (`ask`); the core retrieval pipeline never calls it for ranking.

use async_trait::async_trait;

use super::ModelError;

#[async_trait]
pub trait GenerationPort: Send + Sync {
    fn model_id(&self) -> &str;
    async fn generate(
        &self,
        prompt: &str,
        max_tokens: usize,
        stop: Option<&[String]>,
    ) -> Result<String, ModelError>;
}
