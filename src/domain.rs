use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Upper bound (exclusive) of the `$` band.
pub const BUDGET_CEILING: u64 = 500;
/// Upper bound (inclusive) of the `$$` band.
pub const MODERATE_CEILING: u64 = 1500;

/// Price tier derived from cost-for-two. Query filters and recommendation
/// requests partition on these three values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceCategory {
    #[serde(rename = "$")]
    Budget,
    #[serde(rename = "$$")]
    Moderate,
    #[serde(rename = "$$$")]
    Premium,
}

impl PriceCategory {
    pub const ALL: [PriceCategory; 3] = [Self::Budget, Self::Moderate, Self::Premium];

    /// `cost < 500` is `$`, `500..=1500` is `$$`, anything above is `$$$`.
    pub fn from_cost(cost: u64) -> Self {
        if cost < BUDGET_CEILING {
            Self::Budget
        } else if cost <= MODERATE_CEILING {
            Self::Moderate
        } else {
            Self::Premium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Budget => "$",
            Self::Moderate => "$$",
            Self::Premium => "$$$",
        }
    }
}

impl fmt::Display for PriceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPriceCategory(pub String);

impl fmt::Display for InvalidPriceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "price_category must be $, $$, or $$$ (got '{}')", self.0)
    }
}

impl std::error::Error for InvalidPriceCategory {}

impl FromStr for PriceCategory {
    type Err = InvalidPriceCategory;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "$" => Ok(Self::Budget),
            "$$" => Ok(Self::Moderate),
            "$$$" => Ok(Self::Premium),
            other => Err(InvalidPriceCategory(other.to_string())),
        }
    }
}

/// Canonical restaurant record produced by the row transformer.
///
/// Only the ingest workflow constructs these, and always in full: `name` and
/// `city` are non-empty, `cost_for_two` is positive and `price_category`
/// agrees with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantRecord {
    pub name: String,
    pub city: String,
    pub location: Option<String>,
    pub rating: Option<f64>,
    pub cost_for_two: u64,
    pub price_category: PriceCategory,
    pub has_online_delivery: bool,
    pub cuisines: Option<String>,
    /// Verbatim source row, kept for audit. Never re-parsed.
    pub raw_data: serde_json::Value,
}

/// A stored restaurant as served by the query layer (no raw payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantSummary {
    pub name: String,
    pub city: String,
    pub location: Option<String>,
    pub rating: Option<f64>,
    pub cost_for_two: Option<u64>,
    pub price_category: Option<PriceCategory>,
    pub has_online_delivery: Option<bool>,
    pub cuisines: Option<String>,
}

impl From<&RestaurantRecord> for RestaurantSummary {
    fn from(record: &RestaurantRecord) -> Self {
        Self {
            name: record.name.clone(),
            city: record.city.clone(),
            location: record.location.clone(),
            rating: record.rating,
            cost_for_two: Some(record.cost_for_two),
            price_category: Some(record.price_category),
            has_online_delivery: Some(record.has_online_delivery),
            cuisines: record.cuisines.clone(),
        }
    }
}

/// Outcome of one ingest run. `processed == skipped + inserted` always holds.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub source_id: String,
    pub processed: usize,
    pub skipped: usize,
    pub inserted: usize,
    /// SHA-256 over the accepted records, identity values excluded.
    pub content_digest: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IngestReport {
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.processed, self.skipped, self.inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_category_bands() {
        assert_eq!(PriceCategory::from_cost(1), PriceCategory::Budget);
        assert_eq!(PriceCategory::from_cost(499), PriceCategory::Budget);
        assert_eq!(PriceCategory::from_cost(500), PriceCategory::Moderate);
        assert_eq!(PriceCategory::from_cost(1500), PriceCategory::Moderate);
        assert_eq!(PriceCategory::from_cost(1501), PriceCategory::Premium);
        assert_eq!(PriceCategory::from_cost(u64::MAX), PriceCategory::Premium);
    }

    #[test]
    fn test_price_category_parse_and_serde() {
        for category in PriceCategory::ALL {
            assert_eq!(category.as_str().parse::<PriceCategory>(), Ok(category));
        }
        assert!("$$$$".parse::<PriceCategory>().is_err());
        assert!("".parse::<PriceCategory>().is_err());
        assert_eq!(
            serde_json::to_string(&PriceCategory::Moderate).unwrap(),
            "\"$$\""
        );
        let parsed: PriceCategory = serde_json::from_str("\"$$$\"").unwrap();
        assert_eq!(parsed, PriceCategory::Premium);
    }
}
