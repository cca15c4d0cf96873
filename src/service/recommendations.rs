use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::claude::{ClaudeClient, extract_json_array};
use crate::db::models::Recipient;
use crate::error::StashError;

const MAX_TOKENS: u32 = 3000;

static FIRST_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$?(\d+(?:\.\d{2})?)").expect("valid price regex"));

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub estimated_price: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub where_to_buy: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationsResponse {
    pub success: bool,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

fn list_or(values: Option<&Vec<String>>, fallback: &str) -> String {
    match values {
        Some(v) if !v.is_empty() => v.join(", "),
        _ => fallback.to_string(),
    }
}

pub fn build_prompt(r: &Recipient) -> String {
    let age = r.age_range.as_deref().unwrap_or("Not specified");
    let interests = list_or(r.interests.as_ref().map(|j| &j.0), "Not specified");
    let budget = r
        .max_budget
        .map(|b| format!("${b}"))
        .unwrap_or_else(|| "No limit".to_string());
    let preferences = r.gift_preferences.as_deref().unwrap_or("None specified");
    let restrictions = list_or(r.restrictions.as_ref().map(|j| &j.0), "None");

    format!(
        r#"You are a gift recommendation expert. Generate 8-10 personalized gift ideas for this person:

RECIPIENT PROFILE:
- Name: {name}
- Relationship: {relationship}
- Age: {age}
- Interests: {interests}
- Budget: Up to {budget}
- Gift Preferences: {preferences}
- Restrictions: {restrictions}

REQUIREMENTS:
1. Each gift should match their interests and age
2. Stay within the budget (or close to it)
3. Mix price points
4. Be specific in descriptions

Return ONLY a JSON array, no markdown or prose:

[
  {{
    "title": "Gift name",
    "description": "2-3 sentence description",
    "price_range": "$XX-$YY or $XX",
    "reasoning": "Why this gift fits",
    "where_to_buy": "Store names",
    "category": "Category name"
  }}
]"#,
        name = r.name,
        relationship = r.relationship,
    )
}

/// First dollar amount in a range like `$50-$100`.
pub fn price_from_range(range: &str) -> Option<f64> {
    FIRST_AMOUNT
        .captures(range)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parse a completion; `None` when it holds no usable array.
pub fn parse_recommendations(text: &str) -> Option<Vec<Recommendation>> {
    let json = extract_json_array(text)?;
    let mut recs: Vec<Recommendation> = match serde_json::from_str(json) {
        Ok(recs) => recs,
        Err(e) => {
            warn!(error = %e, "unparseable recommendations array");
            return None;
        }
    };
    for rec in &mut recs {
        if rec.estimated_price.is_none() {
            rec.estimated_price = rec.price_range.as_deref().and_then(price_from_range);
        }
    }
    Some(recs)
}

pub async fn recommend(claude: &ClaudeClient, recipient: &Recipient) -> Result<RecommendationsResponse, StashError> {
    if !claude.is_configured() {
        return Err(StashError::NotConfigured("Claude"));
    }
    let text = claude.complete(&build_prompt(recipient), None, MAX_TOKENS).await?;
    Ok(match parse_recommendations(&text) {
        Some(recommendations) => {
            info!(recipient = %recipient.id, count = recommendations.len(), "recommendations generated");
            RecommendationsResponse {
                success: true,
                recommendations,
                raw: None,
            }
        }
        None => RecommendationsResponse {
            success: true,
            recommendations: Vec::new(),
            raw: Some(text),
        },
    })
}
