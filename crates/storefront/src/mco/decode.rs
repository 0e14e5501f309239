//! Ordered decoding of recommendation replies.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use super::error::McoError;
use super::types::Envelope;
use crate::models::SuggestionDraft;

/// One way of turning a parsed reply into suggestions.
///
/// A strategy returns `McoError::Parse` when the reply is not in its shape;
/// the decoder then moves on to the next one.
pub trait DecodeStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Attempt to decode `reply`, which is known to be a non-empty JSON array.
    ///
    /// # Errors
    ///
    /// Returns `McoError::Parse` if the reply does not match this shape.
    fn decode(&self, reply: &Value) -> Result<Vec<SuggestionDraft>, McoError>;
}

/// The reply is itself the suggestion array.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectArray;

impl DecodeStrategy for DirectArray {
    fn name(&self) -> &'static str {
        "direct_array"
    }

    fn decode(&self, reply: &Value) -> Result<Vec<SuggestionDraft>, McoError> {
        Vec::<SuggestionDraft>::deserialize(reply)
            .map_err(|e| McoError::Parse(format!("not a suggestion array: {e}")))
    }
}

/// The first envelope's text part is the suggestion array as plain JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeText;

impl DecodeStrategy for EnvelopeText {
    fn name(&self) -> &'static str {
        "envelope_text"
    }

    fn decode(&self, reply: &Value) -> Result<Vec<SuggestionDraft>, McoError> {
        with_first_text(reply, |text| parse_drafts(text.trim()))
    }
}

/// The first envelope's text part is a markdown-fenced suggestion array.
#[derive(Debug, Clone, Copy, Default)]
pub struct FencedText;

impl DecodeStrategy for FencedText {
    fn name(&self) -> &'static str {
        "fenced_text"
    }

    fn decode(&self, reply: &Value) -> Result<Vec<SuggestionDraft>, McoError> {
        with_first_text(reply, |text| parse_drafts(strip_fence(text)))
    }
}

/// Tries each [`DecodeStrategy`] in order and returns the first success.
pub struct SuggestionDecoder {
    strategies: Vec<Box<dyn DecodeStrategy>>,
}

impl Default for SuggestionDecoder {
    fn default() -> Self {
        Self::new(vec![
            Box::new(DirectArray),
            Box::new(EnvelopeText),
            Box::new(FencedText),
        ])
    }
}

impl std::fmt::Debug for SuggestionDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}

impl SuggestionDecoder {
    /// A decoder with a custom strategy order.
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn DecodeStrategy>>) -> Self {
        Self { strategies }
    }

    /// Decode a raw reply body.
    ///
    /// # Errors
    ///
    /// Returns `McoError::Parse` if the body is not a JSON array, is an empty
    /// array, or matches none of the strategies. The error from the last
    /// strategy tried is returned.
    pub fn decode(&self, body: &str) -> Result<Vec<SuggestionDraft>, McoError> {
        let reply: Value = serde_json::from_str(body)
            .map_err(|e| McoError::Parse(format!("reply is not JSON: {e}")))?;

        match &reply {
            Value::Array(entries) if entries.is_empty() => {
                return Err(McoError::Parse("reply contained no envelopes".to_owned()));
            }
            Value::Array(_) => {}
            _ => return Err(McoError::Parse("reply is not a JSON array".to_owned())),
        }

        let mut last_error = McoError::Parse("no decode strategies configured".to_owned());
        for strategy in &self.strategies {
            match strategy.decode(&reply) {
                Ok(drafts) => {
                    debug!(strategy = strategy.name(), count = drafts.len(), "Decoded suggestions");
                    return Ok(drafts);
                }
                Err(e) => {
                    trace!(strategy = strategy.name(), error = %e, "Decode strategy did not match");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

/// Remove a surrounding markdown code fence (```` ```json ```` or ```` ``` ````).
///
/// Any language tag after the opening fence is dropped regardless of case.
/// Text without a fence is returned trimmed.
#[must_use]
pub fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+')
    });
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// =============================================================================
// Helper Functions
// =============================================================================

fn with_first_text<F>(reply: &Value, parse: F) -> Result<Vec<SuggestionDraft>, McoError>
where
    F: FnOnce(&str) -> Result<Vec<SuggestionDraft>, McoError>,
{
    let envelopes = Vec::<Envelope>::deserialize(reply)
        .map_err(|e| McoError::Parse(format!("not an envelope array: {e}")))?;
    let text = envelopes
        .first()
        .and_then(Envelope::first_text)
        .ok_or_else(|| McoError::Parse("first envelope has no text part".to_owned()))?;
    parse(text)
}

fn parse_drafts(text: &str) -> Result<Vec<SuggestionDraft>, McoError> {
    serde_json::from_str(text)
        .map_err(|e| McoError::Parse(format!("embedded text is not a suggestion array: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const FLAT: &str = r#"[
        {"id": 1, "user_id": 7, "title": "Pasta night", "items": "garlic,basil",
         "reason": "You have pasta", "timestamp": "2025-06-01T12:00:00Z"},
        {"id": 2, "user_id": 7, "title": "Omelette", "items": "chives",
         "reason": "You have eggs", "timestamp": "2025-06-01T12:00:00Z"}
    ]"#;

    fn envelope(text: &str) -> String {
        serde_json::json!([
            {"author": "agent", "content": {"role": "model", "parts": [{"text": text}]}},
            {"author": "agent", "content": {"role": "model", "parts": [{"text": "ignored"}]}}
        ])
        .to_string()
    }

    fn inner() -> String {
        serde_json::json!([
            {"title": "Pasta night", "items": ["garlic", "basil"], "reason": "You have pasta"},
            {"title": "Omelette", "items": ["chives"], "reason": "You have eggs"}
        ])
        .to_string()
    }

    #[test]
    fn test_flat_array_is_returned_unchanged() {
        let drafts = SuggestionDecoder::default().decode(FLAT).unwrap();
        let expected: Vec<SuggestionDraft> = serde_json::from_str(FLAT).unwrap();
        assert_eq!(drafts, expected);
        assert_eq!(drafts[0].items, ["garlic", "basil"]);
        assert!(drafts[0].timestamp.is_some());
    }

    #[test]
    fn test_envelope_and_fenced_envelope_decode_the_same() {
        let decoder = SuggestionDecoder::default();
        let plain = decoder.decode(&envelope(&inner())).unwrap();
        let fenced = decoder
            .decode(&envelope(&format!("```json\n{}\n```", inner())))
            .unwrap();

        let shouted = decoder
            .decode(&envelope(&format!("```JSON\n{}\n```", inner())))
            .unwrap();

        assert_eq!(plain.len(), 2);
        assert_eq!(plain, fenced);
        assert_eq!(plain, shouted);
        assert_eq!(plain[1].title, "Omelette");
    }

    #[test]
    fn test_agent_field_names_inside_envelope() {
        let text = r#"```json
[{"dish_name": "Shakshuka", "extra_items_required": ["cumin"]}]
```"#;
        let drafts = SuggestionDecoder::default().decode(&envelope(text)).unwrap();
        assert_eq!(drafts[0].title, "Shakshuka");
        assert_eq!(drafts[0].items, ["cumin"]);
    }

    #[test]
    fn test_empty_reply_is_parse_error() {
        let err = SuggestionDecoder::default().decode("[]").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let decoder = SuggestionDecoder::default();
        assert!(decoder.decode("not json").unwrap_err().is_parse());
        assert!(decoder.decode(r#"{"title": "x"}"#).unwrap_err().is_parse());
        assert!(decoder.decode(&envelope("no list here")).unwrap_err().is_parse());
        assert!(
            decoder
                .decode(r#"[{"content": {"parts": []}}]"#)
                .unwrap_err()
                .is_parse()
        );
    }

    #[test]
    fn test_each_strategy_in_isolation() {
        let flat: Value = serde_json::from_str(FLAT).unwrap();
        assert!(DirectArray.decode(&flat).is_ok());
        assert!(EnvelopeText.decode(&flat).is_err());

        let fenced: Value =
            serde_json::from_str(&envelope(&format!("```\n{}\n```", inner()))).unwrap();
        assert!(DirectArray.decode(&fenced).is_err());
        assert!(EnvelopeText.decode(&fenced).is_err());
        assert_eq!(FencedText.decode(&fenced).unwrap().len(), 2);
    }

    #[test]
    fn test_strip_fence() {
        assert_eq!(strip_fence("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_fence("```\n[1]\n```"), "[1]");
        assert_eq!(strip_fence("  [1] "), "[1]");
        assert_eq!(strip_fence("```json [1]"), "[1]");
        assert_eq!(strip_fence("```JSON\n[1]\n```"), "[1]");
        assert_eq!(strip_fence("```Json\r\n[1]\r\n```"), "[1]");
        assert_eq!(strip_fence("```[1]```"), "[1]");
    }

    #[test]
    fn test_custom_order() {
        let decoder = SuggestionDecoder::new(vec![Box::new(FencedText)]);
        assert!(decoder.decode(FLAT).unwrap_err().is_parse());
    }
}
