//! RerankPort (spec §4.5): scores query/candidate pairs, normalized to
//! `[0,1]`. An empty query is rejected up front.

use async_trait::async_trait;

use super::ModelError;

#[derive(Debug, Clone)]
pub struct RerankCandidate {
    pub original_rank: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub original_rank: usize,
    pub score: f64,
}

#[async_trait]
pub trait RerankPort: Send + Sync {
    fn model_id(&self) -> &str;
    async fn rerank(
        &self,
        query: &str,
        candidates: &[RerankCandidate],
    ) -> Result<Vec<ScoredCandidate>, ModelError>;
}

pub fn reject_empty_query(query: &str) -> Result<(), ModelError> {
    if query.trim().is_empty() {
        return Err(ModelError::unavailable("rerank query must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_query() {
        assert!(reject_empty_query("").is_err());
        assert!(reject_empty_query("   ").is_err());
        assert!(reject_empty_query("hello").is_ok());
    }
}
