//! Wire types for the agent-run protocol.

use serde::{Deserialize, Serialize};

use cartwise_core::UserId;

/// Body of `POST /run`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub new_message: Content,
    /// Flat identifier read by older agent revisions.
    #[serde(rename = "user_id")]
    pub legacy_user_id: UserId,
}

impl RunRequest {
    /// Build a run request for one user's cart against the current catalog.
    #[must_use]
    pub fn new(
        app_name: &str,
        user_id: UserId,
        cart_items: &[String],
        stock_items: &[String],
    ) -> Self {
        Self {
            app_name: app_name.to_owned(),
            user_id: format!("user_{user_id}"),
            session_id: format!("session_{user_id}"),
            new_message: Content {
                role: "user".to_owned(),
                parts: vec![Part {
                    text: Some(build_prompt(user_id, cart_items, stock_items)),
                }],
            },
            legacy_user_id: user_id,
        }
    }
}

/// A role-tagged message made of parts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One part of a message. Non-text parts (function calls etc.) carry no `text`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One event in the agent's reply array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub author: Option<String>,
}

impl Envelope {
    /// The first text part of this envelope, if any.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .as_ref()?
            .parts
            .iter()
            .find_map(|part| part.text.as_deref())
    }
}

/// Render the prompt text the agent expects.
#[must_use]
pub fn build_prompt(user_id: UserId, cart_items: &[String], stock_items: &[String]) -> String {
    let cart = serde_json::Value::from(cart_items.to_vec());
    let stock = serde_json::Value::from(stock_items.to_vec());
    format!("user_id: {user_id}\npresent_cart_json: {cart}\nitems_in_stock_json: {stock}")
}
