use crate::domain::{PriceCategory, RestaurantSummary};

pub fn build_system_prompt() -> &'static str {
    "You are a restaurant recommendation assistant. Your task is to rank restaurants from a provided list and explain why each is a good choice.

RULES (strict):
1. You MUST rank ONLY from the restaurants in the list provided. Do NOT invent or add any restaurant not in the list.
2. Return your response as valid JSON only. No markdown, no explanation outside the JSON.
3. Use the exact restaurant names from the list.
4. Provide a brief, helpful reason for each recommendation."
}

pub fn build_user_prompt(
    restaurants: &[RestaurantSummary],
    city: &str,
    price_category: PriceCategory,
    limit: usize,
) -> String {
    let mut lines = vec![
        format!("City: {city}"),
        format!("Price category: {price_category}"),
        format!("Rank exactly the top {limit} restaurants from the list below."),
        String::new(),
        "Restaurant list (name, location, rating, cost_for_two, online_order, cuisines):".to_string(),
    ];

    for (i, r) in restaurants.iter().enumerate() {
        let location = r.location.as_deref().filter(|s| !s.is_empty()).unwrap_or("N/A");
        let rating = r
            .rating
            .filter(|v| *v != 0.0)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let cost = r
            .cost_for_two
            .filter(|c| *c != 0)
            .map(|c| c.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let online = if r.has_online_delivery.unwrap_or(false) {
            "Yes"
        } else {
            "No"
        };
        let cuisines = r.cuisines.as_deref().filter(|s| !s.is_empty()).unwrap_or("N/A");
        lines.push(format!(
            "{}. {} | {} | {} | {} | Online: {} | {}",
            i + 1,
            r.name,
            location,
            rating,
            cost,
            online,
            cuisines
        ));
    }

    lines.push(String::new());
    lines.push(
        "Respond with JSON in this exact format (no other text): \
         {\"recommendations\": [{\"rank\": 1, \"name\": \"...\", \"location\": \"...\", \"rating\": 4.1, \
         \"cost_for_two\": 800, \"online_order\": true, \"reason\": \"...\"}]}"
            .to_string(),
    );
    lines.join("\n")
}
