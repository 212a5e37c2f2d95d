//! OpenAI-compatible chat client over reqwest.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::feed::NewsItem;
use crate::llm::{BatchScore, NewsAnalyst, markdown_to_html, parse_batch_scores, parse_related};

/// Item summaries are trimmed before scoring to bound prompt size.
const SCORING_SUMMARY_CHARS: usize = 300;

/// Article text fed to generation is capped.
const GENERATION_ARTICLE_CHARS: usize = 3000;

/// Draft text shown to the thread matcher is capped.
const MATCHING_DRAFT_CHARS: usize = 300;

const SCORING_SYSTEM: &str =
    "You are a Formula 1 news analyst. Respond strictly in JSON format.";

const GENERATION_SYSTEM: &str =
    "You write for a popular Formula 1 news channel. Be vivid and to the point.";

const MATCHING_SYSTEM: &str = "Respond strictly in JSON format.";

/// Analyst implementation against an OpenAI-compatible `chat/completions`
/// endpoint.
pub struct OpenAiAnalyst {
    http: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenAiAnalyst {
    pub fn new(api_key: SecretString, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    fn headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|e| LlmError::RequestFailed {
                reason: format!("invalid API key header: {e}"),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// One chat completion round trip, returning the first choice's content.
    async fn chat(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %request.model, "chat completion request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                reason: format!("API error ({status}): {body}"),
            });
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse {
                reason: "no choices in completion".to_string(),
            })
    }

    fn request(&self, system: &str, user: String, temperature: f32, json: bool) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            temperature,
            response_format: json.then(|| serde_json::json!({"type": "json_object"})),
        }
    }
}

#[async_trait::async_trait]
impl NewsAnalyst for OpenAiAnalyst {
    async fn score_batch(&self, items: &[NewsItem]) -> Result<Vec<BatchScore>, LlmError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let listing: Vec<serde_json::Value> = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::json!({
                    "index": index,
                    "title": item.title,
                    "source": item.source,
                    "summary": truncate_chars(&item.summary, SCORING_SUMMARY_CHARS),
                })
            })
            .collect();

        let prompt = build_scoring_prompt(&listing);
        let raw = self.chat(&self.request(SCORING_SYSTEM, prompt, 0.3, true)).await?;
        let scores = parse_batch_scores(&raw, items.len())?;
        tracing::info!(scored = scores.len(), batch = items.len(), "batch scored");
        Ok(scores)
    }

    async fn generate_post(
        &self,
        title: &str,
        article: &str,
        style_context: &[String],
    ) -> Result<String, LlmError> {
        let prompt = build_generation_prompt(
            title,
            &truncate_chars(article, GENERATION_ARTICLE_CHARS),
            style_context,
        );
        let raw = self.chat(&self.request(GENERATION_SYSTEM, prompt, 0.7, false)).await?;
        Ok(markdown_to_html(raw.trim()))
    }

    async fn find_related(
        &self,
        title: &str,
        draft_text: &str,
        candidate_titles: &[String],
    ) -> Result<Option<usize>, LlmError> {
        if candidate_titles.is_empty() {
            return Ok(None);
        }

        let prompt = build_matching_prompt(
            title,
            &truncate_chars(draft_text, MATCHING_DRAFT_CHARS),
            candidate_titles,
        );
        let raw = self.chat(&self.request(MATCHING_SYSTEM, prompt, 0.1, true)).await?;
        Ok(parse_related(&raw, candidate_titles.len()))
    }
}

fn build_scoring_prompt(listing: &[serde_json::Value]) -> String {
    format!(
        "You are a Formula 1 news analyst. For each of the following news items:\n\n\
         1. Assign a hype score from 1 to 10:\n\
            - 10: sensation (top-team driver swap, major crash, disqualification, scandal)\n\
            - 8-9: very important (race win, pole, significant contract news, technical innovation)\n\
            - 6-7: interesting (qualifying form, strategy calls, car upgrades)\n\
            - 4-5: routine news (press conferences, minor updates)\n\
            - 1-3: minor (promo, sponsorship, generic statements)\n\
         2. Write a short one-to-two sentence summary of what the item is about.\n\n\
         Return strictly a JSON array of objects:\n\
         [{{\"index\": 0, \"hype_score\": 8, \"summary\": \"short description\"}}, ...]\n\n\
         News items to analyze:\n{}",
        serde_json::to_string_pretty(listing).unwrap_or_default()
    )
}

fn build_generation_prompt(title: &str, article: &str, style_context: &[String]) -> String {
    let context_block = if style_context.is_empty() {
        String::new()
    } else {
        format!(
            "\nHere are the channel's most recent posts — match their style and tone, \
             and do not repeat already-published information:\n---\n{}\n---\n",
            style_context.join("\n---\n")
        )
    };

    format!(
        "You write posts for a Formula 1 news channel. Write a short, vivid, informative \
         post based on this news item.\n\n\
         Requirements:\n\
         - 3 to 6 sentences\n\
         - Use a few emoji for emphasis, without overdoing it\n\
         - Open with a punchy headline wrapped in <b>bold tags</b>\n\
         - Include the key facts\n\
         - Lively, expert, engaging tone\n\
         - Use HTML tags for formatting: <b>bold</b>, <i>italic</i>\n\
         - Do NOT add hashtags\n\
         - Do NOT add links\n\
         - Do NOT use Markdown asterisks, HTML tags only\n\
         {context_block}\n\
         Original headline: {title}\n\n\
         Article text:\n{article}"
    )
}

fn build_matching_prompt(title: &str, draft_text: &str, candidate_titles: &[String]) -> String {
    let listing: Vec<String> = candidate_titles
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{i}. {t}"))
        .collect();

    format!(
        "You help run a Formula 1 news channel.\n\n\
         A new post is about to be published:\n\
         Headline: {title}\n\
         Text: {draft_text}\n\n\
         Here are the channel's already-published posts:\n{}\n\n\
         Is any published post topically linked to the new one? Linked means the SAME \
         topic, event, person, or team (a continuation, update, or development of the \
         story). Do NOT count posts that are merely about Formula 1 in general.\n\n\
         Answer strictly in JSON:\n\
         {{\"related_index\": <post number or null if none>, \"reason\": \"<short explanation>\"}}",
        listing.join("\n")
    )
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        text.chars().take(limit).collect()
    } else {
        text.to_string()
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
