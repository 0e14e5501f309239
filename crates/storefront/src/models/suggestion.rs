//! Suggestion domain types.
//!
//! A [`SuggestionDraft`] is what the recommendation service hands back; a
//! [`Suggestion`] is the persisted record owned by a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use cartwise_core::{SuggestionId, UserId};

/// Delimiter used by the `items` column.
const ITEMS_DELIMITER: char = ',';

/// A stored recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: SuggestionId,
    pub user_id: UserId,
    pub title: String,
    pub items: Vec<String>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// A recommendation as decoded from the upstream reply.
///
/// Accepts both the flat record shape (`title`/`items`/`reason`) and the
/// recipe agent's shape (`dish_name`/`extra_items_required`). `items` may be
/// a JSON array or a comma-delimited string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SuggestionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(alias = "dish_name")]
    pub title: String,
    #[serde(
        default,
        alias = "extra_items_required",
        alias = "extra_items",
        deserialize_with = "deserialize_items"
    )]
    pub items: Vec<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl SuggestionDraft {
    /// Convenience constructor for a draft without upstream metadata.
    #[must_use]
    pub fn new(title: impl Into<String>, items: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            id: None,
            user_id: None,
            title: title.into(),
            items,
            reason: reason.into(),
            timestamp: None,
        }
    }
}

/// Serialize an item list into the delimited `items` column.
#[must_use]
pub fn encode_items(items: &[String]) -> String {
    items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse the delimited `items` column back into a list.
#[must_use]
pub fn decode_items(raw: &str) -> Vec<String> {
    raw.split(ITEMS_DELIMITER)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn deserialize_items<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Items {
        List(Vec<String>),
        Delimited(String),
    }

    Ok(match Items::deserialize(deserializer)? {
        Items::List(items) => items,
        Items::Delimited(raw) => decode_items(&raw),
    })
}
