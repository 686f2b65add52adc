use crate::domain::{PriceCategory, RestaurantSummary};
use crate::error::RecommenderError;
use crate::llm::Ranker;
use crate::metrics as m;
use crate::storage::RestaurantStore;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

pub const LIMIT_MIN: usize = 3;
pub const LIMIT_MAX: usize = 10;
/// Candidates handed to the ranker, best rated first.
pub const CANDIDATE_POOL: usize = 20;

fn default_limit() -> i64 {
    LIMIT_MIN as i64
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecommendationRequest {
    pub city: String,
    pub price_category: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub rank: i64,
    pub name: String,
    pub location: String,
    pub rating: f64,
    pub cost_for_two: i64,
    pub online_order: bool,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<RecommendationItem>,
}

#[derive(Error, Debug)]
pub enum RecommendError {
    #[error("{0}")]
    Invalid(String),

    #[error("No restaurants found for the given city and price category")]
    NotFound,

    #[error("{0}")]
    Upstream(String),

    #[error(transparent)]
    Storage(#[from] RecommenderError),
}

/// Candidate lookup plus LLM ranking, with the model's answer checked
/// against the candidate list.
pub struct Recommender {
    store: Arc<dyn RestaurantStore>,
    ranker: Arc<dyn Ranker>,
}

impl Recommender {
    pub fn new(store: Arc<dyn RestaurantStore>, ranker: Arc<dyn Ranker>) -> Self {
        Self { store, ranker }
    }

    #[instrument(skip(self), fields(city = %request.city, price_category = %request.price_category))]
    pub async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> Result<RecommendationResponse, RecommendError> {
        let result = self.recommend_inner(request).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(RecommendError::Invalid(_)) => "invalid",
            Err(RecommendError::NotFound) => "not_found",
            Err(RecommendError::Upstream(_)) => "upstream_error",
            Err(RecommendError::Storage(_)) => "storage_error",
        };
        counter!(m::RECOMMENDATION_REQUESTS, "outcome" => outcome).increment(1);
        result
    }

    async fn recommend_inner(
        &self,
        request: &RecommendationRequest,
    ) -> Result<RecommendationResponse, RecommendError> {
        let (price_category, limit) = validate_request(request)?;

        let candidates = self
            .store
            .find_restaurants(&request.city, price_category, CANDIDATE_POOL)
            .await?;
        if candidates.is_empty() {
            return Err(RecommendError::NotFound);
        }

        let raw = self
            .ranker
            .rank(&candidates, &request.city, price_category, limit)
            .await
            .map_err(|e| match e {
                RecommenderError::Llm(msg) => RecommendError::Upstream(msg),
                other => RecommendError::Upstream(other.to_string()),
            })?;

        let recommendations = sanitize_recommendations(&raw, &candidates, limit);
        if recommendations.is_empty() {
            warn!("Model returned {} items, none usable", raw.len());
            return Err(RecommendError::Upstream(
                "Could not parse valid recommendations from LLM response".to_string(),
            ));
        }
        info!("Returning {} recommendations", recommendations.len());
        Ok(RecommendationResponse { recommendations })
    }
}

pub fn validate_request(
    request: &RecommendationRequest,
) -> Result<(PriceCategory, usize), RecommendError> {
    let price_category: PriceCategory = request
        .price_category
        .parse()
        .map_err(|_| RecommendError::Invalid("price_category must be $, $$, or $$$".to_string()))?;
    let limit = usize::try_from(request.limit)
        .ok()
        .filter(|l| (LIMIT_MIN..=LIMIT_MAX).contains(l))
        .ok_or_else(|| {
            RecommendError::Invalid(format!(
                "limit must be between {LIMIT_MIN} and {LIMIT_MAX}"
            ))
        })?;
    Ok((price_category, limit))
}

/// Keep at most `limit` model items, dropping names that are not candidates
/// and items whose fields cannot be coerced.
pub fn sanitize_recommendations(
    raw: &[Value],
    candidates: &[RestaurantSummary],
    limit: usize,
) -> Vec<RecommendationItem> {
    let valid_names: HashSet<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
    raw.iter()
        .take(limit)
        .filter_map(|item| {
            let obj = item.as_object()?;
            let name = obj.get("name");
            if let Some(Value::String(n)) = name {
                if !n.is_empty() && !valid_names.contains(n.as_str()) {
                    // invented by the model
                    return None;
                }
            }
            Some(RecommendationItem {
                rank: coerce_int(obj.get("rank"))?,
                name: coerce_string(name)?,
                location: coerce_string(obj.get("location"))?,
                rating: coerce_float(obj.get("rating"))?,
                cost_for_two: coerce_truncated_int(obj.get("cost_for_two"))?,
                online_order: truthy(obj.get("online_order")),
                reason: coerce_string(obj.get("reason"))?,
            })
        })
        .collect()
}

// Missing keys take their defaults; present-but-wrong values reject the item.

fn coerce_string(value: Option<&Value>) -> Option<String> {
    match value {
        None => Some(String::new()),
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => None,
    }
}

fn coerce_int(value: Option<&Value>) -> Option<i64> {
    match value {
        None => Some(0),
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(Value::Bool(b)) => Some(i64::from(*b)),
        Some(_) => None,
    }
}

/// Like `coerce_int`, but fractional numbers are truncated toward zero.
fn coerce_truncated_int(value: Option<&Value>) -> Option<i64> {
    match value {
        Some(Value::Number(n)) if n.as_i64().is_none() => n
            .as_f64()
            .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
            .map(|f| f.trunc() as i64),
        other => coerce_int(other),
    }
}

fn coerce_float(value: Option<&Value>) -> Option<f64> {
    match value {
        None => Some(0.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        Some(_) => None,
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(name: &str) -> RestaurantSummary {
        RestaurantSummary {
            name: name.to_string(),
            city: "Bangalore".to_string(),
            location: Some("Banashankari".to_string()),
            rating: Some(4.1),
            cost_for_two: Some(800),
            price_category: Some(PriceCategory::Moderate),
            has_online_delivery: Some(true),
            cuisines: None,
        }
    }

    fn request(price: &str, limit: i64) -> RecommendationRequest {
        RecommendationRequest {
            city: "Bangalore".to_string(),
            price_category: price.to_string(),
            limit,
        }
    }

    #[test]
    fn test_validate_request() {
        assert_eq!(
            validate_request(&request("$$", 3)).unwrap(),
            (PriceCategory::Moderate, 3)
        );
        assert_eq!(validate_request(&request("$$$", 10)).unwrap().1, 10);
        assert!(matches!(validate_request(&request("cheap", 3)), Err(RecommendError::Invalid(_))));
        assert!(matches!(validate_request(&request("$", 2)), Err(RecommendError::Invalid(_))));
        assert!(matches!(validate_request(&request("$", 11)), Err(RecommendError::Invalid(_))));
        assert!(matches!(validate_request(&request("$", -1)), Err(RecommendError::Invalid(_))));
    }

    #[test]
    fn test_default_limit() {
        let parsed: RecommendationRequest =
            serde_json::from_value(json!({"city": "Bangalore", "price_category": "$$"})).unwrap();
        assert_eq!(parsed.limit, 3);
    }

    #[test]
    fn test_sanitize_drops_invented_and_malformed_items() {
        let raw = vec![
            json!({"rank": 1, "name": "Onesta", "location": "Banashankari", "rating": 4.6,
                   "cost_for_two": 600, "online_order": true, "reason": "Best pizza."}),
            json!({"rank": 2, "name": "Made Up Diner", "reason": "Does not exist."}),
            json!("not an object"),
            json!({"rank": "3", "name": "Jalsa", "rating": "4.1", "cost_for_two": 800.0}),
            json!({"rank": 4, "name": "Jalsa", "location": null}),
        ];
        let items = sanitize_recommendations(&raw, &[candidate("Onesta"), candidate("Jalsa")], 10);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Onesta");
        assert!(items[0].online_order);
        assert_eq!(items[1].rank, 3);
        assert_eq!(items[1].rating, 4.1);
        assert_eq!(items[1].cost_for_two, 800);
        assert_eq!(items[1].location, "");
        assert!(!items[1].online_order);
    }

    #[test]
    fn test_sanitize_truncates_before_filtering() {
        let raw = vec![
            json!({"name": "Invented"}),
            json!({"name": "Jalsa"}),
        ];
        assert!(sanitize_recommendations(&raw, &[candidate("Jalsa")], 1).is_empty());
    }

    #[test]
    fn test_fractional_cost_is_truncated() {
        let raw = vec![
            json!({"rank": 1, "name": "Jalsa", "cost_for_two": 600.5}),
            json!({"rank": 2.5, "name": "Jalsa", "cost_for_two": 600}),
        ];
        let items = sanitize_recommendations(&raw, &[candidate("Jalsa")], 10);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].cost_for_two, 600);
        assert_eq!(items[0].rank, 1);
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(Some(&json!("false"))));
        assert!(!truthy(Some(&json!(0))));
        assert!(!truthy(None));
    }
}
