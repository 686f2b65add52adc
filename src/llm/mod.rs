pub mod client;
pub mod prompts;

use crate::domain::{PriceCategory, RestaurantSummary};
use crate::error::Result;
use async_trait::async_trait;

pub use client::{extract_json, LlmClient};

/// Ranks pre-filtered candidates. Returns the raw `recommendations` array as
/// produced by the model; validation happens in the caller.
#[async_trait]
pub trait Ranker: Send + Sync {
    async fn rank(
        &self,
        candidates: &[RestaurantSummary],
        city: &str,
        price_category: PriceCategory,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>>;
}
