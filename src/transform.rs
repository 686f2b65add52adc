use crate::domain::RestaurantRecord;
use crate::normalize::{
    derive_price_category, normalize_city, normalize_cost, normalize_cuisines, normalize_location,
    normalize_name, normalize_online_order, normalize_rating,
};
use crate::source::{RawRestaurantRow, RawSourceRecord};
use serde_json::Value;

/// Turn one raw dataset row into a canonical record, or `None` when a
/// required field (city, name, derivable price category) is missing.
///
/// Checks run in that order and stop at the first failure.
pub fn transform_row(record: &RawSourceRecord) -> Option<RestaurantRecord> {
    let row = RawRestaurantRow::from_record(record);

    let city = normalize_city(row.city.as_deref())?;
    let name = normalize_name(row.name.as_deref())?;

    let cost = normalize_cost(row.approx_cost.as_deref());
    let price_category = derive_price_category(cost)?;
    let cost_for_two = cost?;

    Some(RestaurantRecord {
        name,
        city,
        location: normalize_location(row.location.as_deref()),
        rating: normalize_rating(row.rate.as_deref()),
        cost_for_two,
        price_category,
        has_online_delivery: normalize_online_order(row.online_order.as_deref()),
        cuisines: normalize_cuisines(row.cuisines.as_deref()),
        raw_data: Value::Object(record.clone()),
    })
}

/// Accepted records plus rejection count for a batch of rows.
#[derive(Debug, Default)]
pub struct TransformOutcome {
    pub records: Vec<RestaurantRecord>,
    pub processed: usize,
    pub skipped: usize,
}

pub fn transform_all(rows: &[RawSourceRecord]) -> TransformOutcome {
    let mut outcome = TransformOutcome::default();
    for row in rows {
        outcome.processed += 1;
        match transform_row(row) {
            Some(record) => outcome.records.push(record),
            None => outcome.skipped += 1,
        }
    }
    outcome
}
