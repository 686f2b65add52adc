//! Field normalizers.
//!
//! Every function here is total: malformed input yields `None` (or `false` for
//! the delivery flag), never an error.

use crate::domain::PriceCategory;

/// Alternate spellings folded onto one city partition key.
const CITY_ALIASES: &[(&str, &str)] = &[("Bengaluru", "Bangalore")];

fn non_empty_trimmed(raw: Option<&str>) -> Option<&str> {
    let s = raw?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Capitalize the first cased character of every word and lowercase the rest.
/// A word starts after any non-alphabetic character, so `"new-delhi"` becomes
/// `"New-Delhi"`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                // Multi-char expansions ('ß' -> "SS") keep only their first
                // char upper so a second pass is a no-op.
                let mut upper = c.to_uppercase();
                out.extend(upper.next());
                out.extend(upper.flat_map(char::to_lowercase));
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

pub fn normalize_city(raw: Option<&str>) -> Option<String> {
    let city = title_case(non_empty_trimmed(raw)?);
    let canonical = CITY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == city)
        .map(|(_, canonical)| canonical.to_string());
    Some(canonical.unwrap_or(city))
}

/// Parses `"4.1/5"` or `"4.1"`. Non-finite values count as unparseable.
pub fn normalize_rating(raw: Option<&str>) -> Option<f64> {
    let s = non_empty_trimmed(raw)?;
    let s = match s.split_once('/') {
        Some((before, _)) => before.trim(),
        None => s,
    };
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses `"800"`, `"800, 900"` (first value wins) or `"₹800 Rs"`. Zero and
/// values beyond SQLite's signed 64-bit INTEGER range are treated as absent.
pub fn normalize_cost(raw: Option<&str>) -> Option<u64> {
    let s = non_empty_trimmed(raw)?;
    let first = match s.split_once(',') {
        Some((before, _)) => before,
        None => s,
    };
    let digits: String = first.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits
        .parse::<u64>()
        .ok()
        .filter(|cost| *cost > 0 && *cost <= i64::MAX as u64)
}

pub fn derive_price_category(cost: Option<u64>) -> Option<PriceCategory> {
    cost.map(PriceCategory::from_cost)
}

/// Only a trimmed, case-insensitive `"yes"` counts; absence is a negative signal.
pub fn normalize_online_order(raw: Option<&str>) -> bool {
    raw.map(|s| s.trim().eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

pub fn normalize_cuisines(raw: Option<&str>) -> Option<String> {
    non_empty_trimmed(raw).map(str::to_string)
}

pub fn normalize_location(raw: Option<&str>) -> Option<String> {
    non_empty_trimmed(raw).map(str::to_string)
}

pub fn normalize_name(raw: Option<&str>) -> Option<String> {
    non_empty_trimmed(raw).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_city_trim_and_title_case() {
        assert_eq!(normalize_city(Some("  Bangalore  ")).as_deref(), Some("Bangalore"));
        assert_eq!(normalize_city(Some("bangalore")).as_deref(), Some("Bangalore"));
        assert_eq!(normalize_city(Some("BANGALORE")).as_deref(), Some("Bangalore"));
        assert_eq!(normalize_city(Some("new delhi")).as_deref(), Some("New Delhi"));
        assert_eq!(normalize_city(Some("Mumbai")).as_deref(), Some("Mumbai"));
    }

    #[test]
    fn test_city_alias() {
        assert_eq!(normalize_city(Some("Bengaluru")).as_deref(), Some("Bangalore"));
        assert_eq!(normalize_city(Some("bengaluru")).as_deref(), Some("Bangalore"));
        assert_eq!(normalize_city(Some("  BENGALURU  ")).as_deref(), Some("Bangalore"));
    }

    #[test]
    fn test_city_absent() {
        assert_eq!(normalize_city(None), None);
        assert_eq!(normalize_city(Some("")), None);
        assert_eq!(normalize_city(Some("   ")), None);
    }

    #[test]
    fn test_city_idempotent() {
        for input in [
            "bengaluru",
            " koramangala 5th block ",
            "BTM",
            "new-delhi",
            "o'brien town",
            "ßad vilbel",
            "ŉorth end",
        ] {
            let once = normalize_city(Some(input));
            let twice = normalize_city(once.as_deref());
            assert_eq!(once, twice, "input {input:?}");
        }
    }

    #[test]
    fn test_title_case_word_boundaries() {
        assert_eq!(title_case("koramangala 5th block"), "Koramangala 5Th Block");
        assert_eq!(title_case("o'brien"), "O'Brien");
        assert_eq!(title_case(""), "");
        assert_eq!(title_case("ßad vilbel"), "Ssad Vilbel");
    }

    #[test]
    fn test_rating() {
        assert_eq!(normalize_rating(Some("4.1/5")), Some(4.1));
        assert_eq!(normalize_rating(Some("3.8 /5")), Some(3.8));
        assert_eq!(normalize_rating(Some("4.5")), Some(4.5));
        assert_eq!(normalize_rating(Some("5.0")), Some(5.0));
        assert_eq!(normalize_rating(Some(" 7 ")), Some(7.0));
    }

    #[test]
    fn test_rating_absent_or_invalid() {
        assert_eq!(normalize_rating(None), None);
        assert_eq!(normalize_rating(Some("")), None);
        assert_eq!(normalize_rating(Some("   ")), None);
        assert_eq!(normalize_rating(Some("N/A")), None);
        assert_eq!(normalize_rating(Some("NEW")), None);
        assert_eq!(normalize_rating(Some("-")), None);
        assert_eq!(normalize_rating(Some("invalid")), None);
        assert_eq!(normalize_rating(Some("inf")), None);
    }

    #[test]
    fn test_cost() {
        assert_eq!(normalize_cost(Some("800")), Some(800));
        assert_eq!(normalize_cost(Some("300")), Some(300));
        assert_eq!(normalize_cost(Some("800, 900")), Some(800));
        assert_eq!(normalize_cost(Some("500,1000")), Some(500));
        assert_eq!(normalize_cost(Some("₹800")), Some(800));
        assert_eq!(normalize_cost(Some("800 Rs")), Some(800));
        assert_eq!(normalize_cost(Some("₹800 Rs")), Some(800));
    }

    #[test]
    fn test_cost_absent() {
        assert_eq!(normalize_cost(None), None);
        assert_eq!(normalize_cost(Some("")), None);
        assert_eq!(normalize_cost(Some("   ")), None);
        assert_eq!(normalize_cost(Some("0")), None);
        assert_eq!(normalize_cost(Some("000")), None);
        assert_eq!(normalize_cost(Some("Rs")), None);
        assert_eq!(normalize_cost(Some(",900")), None);
        assert_eq!(normalize_cost(Some("99999999999")), Some(99_999_999_999));
        assert_eq!(normalize_cost(Some("9223372036854775808")), None);
    }

    #[test]
    fn test_price_category_derivation() {
        assert_eq!(derive_price_category(None), None);
        for cost in [1, 100, 499] {
            assert_eq!(derive_price_category(Some(cost)), Some(PriceCategory::Budget));
        }
        for cost in [500, 1000, 1500] {
            assert_eq!(derive_price_category(Some(cost)), Some(PriceCategory::Moderate));
        }
        for cost in [1501, 3000] {
            assert_eq!(derive_price_category(Some(cost)), Some(PriceCategory::Premium));
        }
    }

    #[test]
    fn test_online_order() {
        assert!(normalize_online_order(Some("Yes")));
        assert!(normalize_online_order(Some("yes")));
        assert!(normalize_online_order(Some(" YES ")));
        assert!(!normalize_online_order(Some("No")));
        assert!(!normalize_online_order(Some("no")));
        assert!(!normalize_online_order(Some("")));
        assert!(!normalize_online_order(Some("maybe")));
        assert!(!normalize_online_order(None));
    }

    #[test]
    fn test_free_text_fields() {
        assert_eq!(
            normalize_cuisines(Some("  North Indian, Chinese  ")).as_deref(),
            Some("North Indian, Chinese")
        );
        assert_eq!(
            normalize_cuisines(Some("North Indian, Mughlai, Chinese")).as_deref(),
            Some("North Indian, Mughlai, Chinese")
        );
        assert_eq!(normalize_cuisines(Some("   ")), None);
        assert_eq!(normalize_location(Some("  Banashankari  ")).as_deref(), Some("Banashankari"));
        assert_eq!(normalize_location(None), None);
        assert_eq!(normalize_name(Some("  Jalsa  ")).as_deref(), Some("Jalsa"));
        assert_eq!(normalize_name(Some("")), None);
        assert_eq!(normalize_name(None), None);
    }
}
