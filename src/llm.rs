//! LLM summarization of collected tweets.
//!
//! This module turns a batch of normalized tweets into a short bulleted
//! summary using the DeepSeek chat-completions API. Summarization never fails
//! from the caller's point of view: problems are reported inside the returned
//! text so the monitoring cycle can still store a result.

use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::LlmConfig;
use crate::twitter::{sanitize_for_logging, NormalizedTweet};

/// Returned instead of calling the LLM when there is nothing to summarize.
pub const NO_TWEETS_SUMMARY: &str = "No tweets found for analysis.";

/// Maximum number of tweets included in one prompt.
pub const MAX_PROMPT_TWEETS: usize = 20;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that analyzes social media content and provides structured summaries using bullet points. Always format your responses with clear section headers and bullet points (•) for easy reading.";

const MAX_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.7;

/// Produces a human-readable summary for a keyword's tweets.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarizes `tweets` found for `keyword`.
    async fn summarize(&self, tweets: &[NormalizedTweet], keyword: &str) -> String;
}

/// Formats one tweet as `@username ✓: text` for the prompt.
///
/// The check mark only appears for verified authors, and the whole prefix is
/// left out when the author is unknown.
fn prompt_line(tweet: &NormalizedTweet) -> String {
    match &tweet.author {
        Some(author) => {
            let username = author.username.as_deref().unwrap_or("Unknown");
            let verified = if author.verified.unwrap_or(false) {
                " ✓"
            } else {
                ""
            };
            format!("@{}{}: {}", username, verified, tweet.text)
        }
        None => tweet.text.clone(),
    }
}

/// Builds the user prompt for a keyword from at most [`MAX_PROMPT_TWEETS`] tweets.
pub fn build_summary_prompt(tweets: &[NormalizedTweet], keyword: &str) -> String {
    let tweets_text = tweets
        .iter()
        .take(MAX_PROMPT_TWEETS)
        .map(prompt_line)
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Summarize the following tweets about \"{keyword}\" into:
1. Main themes / repeated ideas
2. Positive sentiment (if any)
3. Negative sentiment (if any)
4. Notable quotes or insights

Return a concise summary (5–10 bullet points).

Use bullet points (•) for each item within sections.

Tweets:
{tweets_text}

Format your response with clear section headers and bullet points."
    )
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// [`Summarizer`] backed by the DeepSeek chat-completions endpoint.
pub struct DeepSeekSummarizer {
    client: Client,
    config: LlmConfig,
}

impl DeepSeekSummarizer {
    /// Creates a summarizer with its own HTTP client.
    ///
    /// # Returns
    ///
    /// - `Ok(DeepSeekSummarizer)`: Ready to use
    /// - `Err(reqwest::Error)`: If the HTTP client cannot be built
    pub fn new(config: &LlmConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(DeepSeekSummarizer {
            client,
            config: config.clone(),
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let payload = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
            "stream": false
        });

        debug!("Sending summarization request to {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            debug!(
                "Summarization error response: {}",
                sanitize_for_logging(&body, 200)
            );
            return Err(format!("LLM API returned status {}", status).into());
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or("LLM response contained no choices")?;
        Ok(content)
    }
}

#[async_trait]
impl Summarizer for DeepSeekSummarizer {
    async fn summarize(&self, tweets: &[NormalizedTweet], keyword: &str) -> String {
        if tweets.is_empty() {
            return NO_TWEETS_SUMMARY.to_string();
        }

        info!(
            "Summarizing {} tweets for '{}' with model {}",
            tweets.len().min(MAX_PROMPT_TWEETS),
            keyword,
            self.config.model
        );
        let prompt = build_summary_prompt(tweets, keyword);

        match self.complete(&prompt).await {
            Ok(summary) => {
                info!("Generated summary for '{}' ({} characters)", keyword, summary.len());
                summary
            }
            Err(e) => {
                error!("Error generating summary for '{}': {}", keyword, e);
                format!("Error generating summary: {}", e)
            }
        }
    }
}
