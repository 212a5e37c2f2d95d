//! Best-effort article text extraction.
//!
//! Regex-level HTML handling only — good enough to seed generation, and an
//! empty result is always a valid outcome.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::feed::ArticleExtractor;

/// Extracted article text is capped before it reaches the analyst.
const MAX_ARTICLE_CHARS: usize = 4000;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Tags whose whole subtree is noise for article text.
const NOISE_TAGS: &[&str] = &["script", "style", "nav", "footer", "header", "aside", "iframe"];

/// Fetches article pages and extracts their main text.
pub struct HttpExtractor {
    http: reqwest::Client,
}

impl HttpExtractor {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .build()
            .expect("failed to build extractor HTTP client");
        Self { http }
    }
}

impl Default for HttpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleExtractor for HttpExtractor {
    async fn extract(&self, url: &str) -> String {
        let html = match self.http.get(url).send().await {
            Ok(resp) => match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(url, error = %e, "article body read failed");
                    return String::new();
                }
            },
            Err(e) => {
                tracing::warn!(url, error = %e, "article fetch failed");
                return String::new();
            }
        };

        extract_main_text(&html)
    }
}

/// Pull readable text out of an HTML page: drop noise subtrees, prefer
/// `<article>`, fall back to paragraph runs, then to the whole document.
pub fn extract_main_text(html: &str) -> String {
    let mut cleaned = html.to_string();
    for tag in NOISE_TAGS {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>");
        let re = Regex::new(&pattern).expect("invalid noise-tag regex");
        cleaned = re.replace_all(&cleaned, " ").into_owned();
    }

    let article_re = Regex::new(r"(?is)<article[^>]*>(.*?)</article>").expect("invalid article regex");
    let text = if let Some(cap) = article_re.captures(&cleaned) {
        strip_tags(&cap[1])
    } else {
        let p_re = Regex::new(r"(?is)<p[^>]*>(.*?)</p>").expect("invalid paragraph regex");
        let paragraphs: Vec<String> = p_re
            .captures_iter(&cleaned)
            .map(|cap| strip_tags(&cap[1]))
            .filter(|p| !p.is_empty())
            .collect();
        if paragraphs.is_empty() {
            strip_tags(&cleaned)
        } else {
            paragraphs.join("\n")
        }
    };

    if text.chars().count() > MAX_ARTICLE_CHARS {
        text.chars().take(MAX_ARTICLE_CHARS).collect()
    } else {
        text
    }
}

/// Remove all markup and decode common entities, collapsing whitespace runs.
pub fn strip_tags(html: &str) -> String {
    let tag_re = Regex::new(r"(?s)<[^>]*>").expect("invalid tag regex");
    let stripped = tag_re.replace_all(html, " ");

    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");

    // Collapse whitespace but keep paragraph line breaks.
    decoded
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
