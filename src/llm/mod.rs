//! Scoring/generation collaborator — an OpenAI-compatible chat API.
//!
//! Three request shapes: batch scoring, single-post generation, and
//! thread-matching. All three tolerate wrapped or malformed response shapes
//! and degrade to "no result" instead of panicking.

mod openai;

pub use openai::OpenAiAnalyst;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::feed::NewsItem;

/// Index-aligned scoring result for one item of a batch.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BatchScore {
    pub index: usize,
    pub hype_score: u8,
    #[serde(default)]
    pub summary: String,
}

/// Language-model collaborator behind the lifecycle controller.
#[async_trait]
pub trait NewsAnalyst: Send + Sync {
    /// Score a batch of items (1–10) and produce replacement summaries.
    /// The whole batch succeeds or fails atomically.
    async fn score_batch(&self, items: &[NewsItem]) -> Result<Vec<BatchScore>, LlmError>;

    /// Generate channel-ready post text for one item, seeded with recent
    /// published posts for tone consistency.
    async fn generate_post(
        &self,
        title: &str,
        article: &str,
        style_context: &[String],
    ) -> Result<String, LlmError>;

    /// Pick the single best same-topic match among candidate titles, or
    /// `None` when no candidate continues the new post's topic.
    async fn find_related(
        &self,
        title: &str,
        draft_text: &str,
        candidate_titles: &[String],
    ) -> Result<Option<usize>, LlmError>;
}

/// Unwrap a scoring response that may arrive as a bare array or wrapped in
/// an object (`{"results": [...]}`, `{"news": [...]}`, …), then bounds-check
/// indices and clamp scores to 1..=10.
pub(crate) fn parse_batch_scores(raw: &str, batch_len: usize) -> Result<Vec<BatchScore>, LlmError> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
        LlmError::InvalidResponse {
            reason: format!("scoring response is not JSON: {e}"),
        }
    })?;

    let array = unwrap_array(&value).ok_or_else(|| LlmError::InvalidResponse {
        reason: "scoring response holds no array".to_string(),
    })?;

    let mut scores = Vec::new();
    for entry in array {
        let Ok(mut score) = serde_json::from_value::<BatchScore>(entry.clone()) else {
            continue;
        };
        if score.index >= batch_len {
            continue;
        }
        score.hype_score = score.hype_score.clamp(1, 10);
        scores.push(score);
    }

    if scores.is_empty() {
        return Err(LlmError::InvalidResponse {
            reason: "no usable entries in scoring response".to_string(),
        });
    }
    Ok(scores)
}

fn unwrap_array(value: &serde_json::Value) -> Option<&Vec<serde_json::Value>> {
    if let Some(array) = value.as_array() {
        return Some(array);
    }
    let object = value.as_object()?;
    for key in ["results", "news", "items"] {
        if let Some(array) = object.get(key).and_then(|v| v.as_array()) {
            return Some(array);
        }
    }
    // Last resort: first array-valued field.
    object.values().find_map(|v| v.as_array())
}

/// Parse a `{"related_index": n|null, "reason": "..."}` response; anything
/// malformed or out of range is treated as "no match".
pub(crate) fn parse_related(raw: &str, candidate_count: usize) -> Option<usize> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let index = value.get("related_index")?.as_u64()? as usize;
    (index < candidate_count).then_some(index)
}

/// Convert stray Markdown emphasis in generated text into the HTML tags the
/// channel expects. Bold first, so the italic pass never sees `**`.
pub(crate) fn markdown_to_html(text: &str) -> String {
    let bold = regex::Regex::new(r"\*\*([^*]+)\*\*").expect("invalid bold regex");
    let out = bold.replace_all(text, "<b>$1</b>");
    let italic = regex::Regex::new(r"\*([^*]+)\*").expect("invalid italic regex");
    let out = italic.replace_all(&out, "<i>$1</i>");
    let code = regex::Regex::new(r"`([^`]+)`").expect("invalid code regex");
    code.replace_all(&out, "<code>$1</code>").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_batch_scores_bare_array() {
        let raw = r#"[{"index": 0, "hype_score": 8, "summary": "big crash"},
                      {"index": 1, "hype_score": 3, "summary": "sponsor news"}]"#;
        let scores = parse_batch_scores(raw, 2).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].hype_score, 8);
        assert_eq!(scores[1].summary, "sponsor news");
    }

    #[test]
    fn parse_batch_scores_wrapped_object() {
        let raw = r#"{"results": [{"index": 0, "hype_score": 12, "summary": "s"}]}"#;
        let scores = parse_batch_scores(raw, 1).unwrap();
        // Out-of-scale score is clamped, not rejected.
        assert_eq!(scores[0].hype_score, 10);
    }

    #[test]
    fn parse_batch_scores_unknown_wrapper_key() {
        let raw = r#"{"scored_news": [{"index": 0, "hype_score": 5}]}"#;
        let scores = parse_batch_scores(raw, 1).unwrap();
        assert_eq!(scores[0].hype_score, 5);
    }

    #[test]
    fn parse_batch_scores_drops_out_of_range_index() {
        let raw = r#"[{"index": 7, "hype_score": 5, "summary": "s"}]"#;
        assert!(parse_batch_scores(raw, 2).is_err());
    }

    #[test]
    fn parse_batch_scores_rejects_garbage() {
        assert!(parse_batch_scores("not json", 2).is_err());
        assert!(parse_batch_scores(r#"{"results": "yes"}"#, 2).is_err());
    }

    #[test]
    fn parse_related_happy_path_and_null() {
        assert_eq!(
            parse_related(r#"{"related_index": 2, "reason": "same event"}"#, 5),
            Some(2)
        );
        assert_eq!(
            parse_related(r#"{"related_index": null, "reason": "nothing"}"#, 5),
            None
        );
    }

    #[test]
    fn parse_related_out_of_range_is_none() {
        assert_eq!(parse_related(r#"{"related_index": 9}"#, 5), None);
        assert_eq!(parse_related("garbage", 5), None);
    }

    #[test]
    fn markdown_to_html_converts_emphasis() {
        assert_eq!(
            markdown_to_html("**Big** news about *tyres* and `DRS`"),
            "<b>Big</b> news about <i>tyres</i> and <code>DRS</code>"
        );
    }

    #[test]
    fn markdown_to_html_leaves_plain_text_alone() {
        assert_eq!(markdown_to_html("no markup here"), "no markup here");
    }
}
