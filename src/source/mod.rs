pub mod file;
pub mod huggingface;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use file::FileSource;
pub use huggingface::HuggingFaceSource;

/// One untransformed dataset row: column name to scalar (string, number or null).
pub type RawSourceRecord = serde_json::Map<String, Value>;

// Column roles, bound to the Zomato dataset schema. Case-sensitive.
pub const COL_NAME: &str = "name";
pub const COL_CITY: &str = "listed_in(city)";
pub const COL_LOCATION: &str = "location";
pub const COL_RATE: &str = "rate";
pub const COL_COST: &str = "approx_cost(for two people)";
pub const COL_ONLINE_ORDER: &str = "online_order";
pub const COL_CUISINES: &str = "cuisines";

/// A finite provider of raw dataset rows.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Identifier used in logs and reports
    fn source_id(&self) -> &str;

    /// Fetch the whole dataset. Any failure is fatal to the ingest run.
    async fn fetch_records(&self) -> Result<Vec<RawSourceRecord>>;
}

/// Typed view of the column roles the transformer reads, built once per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRestaurantRow {
    pub name: Option<String>,
    pub city: Option<String>,
    pub location: Option<String>,
    pub rate: Option<String>,
    pub approx_cost: Option<String>,
    pub online_order: Option<String>,
    pub cuisines: Option<String>,
}

impl RawRestaurantRow {
    pub fn from_record(record: &RawSourceRecord) -> Self {
        let text = |column: &str| record.get(column).and_then(value_to_text);
        Self {
            name: text(COL_NAME),
            city: text(COL_CITY),
            location: text(COL_LOCATION),
            rate: text(COL_RATE),
            approx_cost: text(COL_COST),
            online_order: text(COL_ONLINE_ORDER),
            cuisines: text(COL_CUISINES),
        }
    }
}

/// Render a scalar cell as text. Null is absence; blank strings are kept so
/// the normalizers decide what empty means.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Fixed set of rows, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    id: String,
    records: Vec<RawSourceRecord>,
}

impl InMemorySource {
    pub fn new(id: impl Into<String>, records: Vec<RawSourceRecord>) -> Self {
        Self {
            id: id.into(),
            records,
        }
    }

    /// Build from JSON values; anything that is not an object is dropped.
    pub fn from_values(id: impl Into<String>, values: Vec<Value>) -> Self {
        let records = values
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        Self::new(id, records)
    }
}

#[async_trait]
impl SourceProvider for InMemorySource {
    fn source_id(&self) -> &str {
        &self.id
    }

    async fn fetch_records(&self) -> Result<Vec<RawSourceRecord>> {
        Ok(self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_from_record_binds_column_roles() {
        let record = json!({
            "name": "Jalsa",
            "listed_in(city)": "Banashankari",
            "location": "Banashankari",
            "rate": "4.1/5",
            "approx_cost(for two people)": 800,
            "online_order": "Yes",
            "cuisines": null,
            "City": "ignored"
        });
        let row = RawRestaurantRow::from_record(record.as_object().unwrap());
        assert_eq!(row.name.as_deref(), Some("Jalsa"));
        assert_eq!(row.city.as_deref(), Some("Banashankari"));
        assert_eq!(row.rate.as_deref(), Some("4.1/5"));
        assert_eq!(row.approx_cost.as_deref(), Some("800"));
        assert_eq!(row.online_order.as_deref(), Some("Yes"));
        assert_eq!(row.cuisines, None);
    }

    #[test]
    fn test_missing_columns_are_absent() {
        let row = RawRestaurantRow::from_record(&RawSourceRecord::new());
        assert_eq!(row, RawRestaurantRow::default());
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&json!(null)), None);
        assert_eq!(value_to_text(&json!("  ")).as_deref(), Some("  "));
        assert_eq!(value_to_text(&json!(4.1)).as_deref(), Some("4.1"));
        assert_eq!(value_to_text(&json!(true)).as_deref(), Some("true"));
        assert_eq!(value_to_text(&json!(["a"])).as_deref(), Some("[\"a\"]"));
    }

    #[tokio::test]
    async fn test_in_memory_source_drops_non_objects() {
        let source = InMemorySource::from_values("mem", vec![json!({"name": "A"}), json!(3)]);
        assert_eq!(source.source_id(), "mem");
        assert_eq!(source.fetch_records().await.unwrap().len(), 1);
    }
}
