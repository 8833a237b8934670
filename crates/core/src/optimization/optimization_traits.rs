use crate::errors::Result;
use crate::optimization::optimization_model::{OptimizationRequest, OptimizationResult};
use async_trait::async_trait;

/// Trait for portfolio optimization service operations
#[async_trait]
pub trait OptimizationServiceTrait: Send + Sync {
    async fn optimize(&self, request: OptimizationRequest) -> Result<OptimizationResult>;
}
