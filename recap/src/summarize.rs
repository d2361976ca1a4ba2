//! Transcript summarization.
//!
//! A chat-completion API is used when the caller asks for it and a credential
//! is configured. Any failure there is logged and the local sentence-based
//! summary is returned instead, so summarizing never fails a request.

use std::future::Future;

use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Error, Result};

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that summarizes video transcripts concisely.";
const MAX_TOKENS: u32 = 500;

const SENTENCE_DELIMITER: &str = ". ";
const SHORT_TEXT_SENTENCES: usize = 5;
const LEAD_SENTENCES: usize = 3;
const KEY_POINTS: usize = 5;

/// A remote chat-completion endpoint.
pub trait CompletionClient {
    fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub const DEFAULT_MODEL: &'static str = "gpt-3.5-turbo";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".into(),
            model: Self::DEFAULT_MODEL.into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl CompletionClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "max_tokens": max_tokens,
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::Completion { status, message });
        }

        resp.json::<CompletionResponse>()
            .await?
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::Completion {
                status: 200,
                message: "no content in response".into(),
            })
    }
}

/// Produces the summary half of a [`Digest`](crate::Digest).
#[derive(Debug, Clone)]
pub struct Summarizer<C> {
    external: Option<C>,
}

impl<C: CompletionClient + Sync> Summarizer<C> {
    /// `external` is `None` when no API credential is configured.
    pub fn new(external: Option<C>) -> Self {
        Self { external }
    }

    pub fn has_external(&self) -> bool {
        self.external.is_some()
    }

    /// Summarize `text`, trying the external API first when `prefer_external`
    /// is set and a client is configured.
    #[tracing::instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn summarize(&self, text: &str, prefer_external: bool) -> String {
        if let (true, Some(client)) = (prefer_external, &self.external) {
            let prompt = format!(
                "Please provide a concise summary of the following video transcript:\n\n{text}"
            );
            match client.complete(SYSTEM_PROMPT, &prompt, MAX_TOKENS).await {
                Ok(summary) => {
                    info!("summarized with completion API");
                    return summary;
                }
                Err(e) => {
                    warn!(error = %e, "completion API failed, falling back to local summary");
                }
            }
        }

        summarize_locally(text)
    }
}

/// Lead sentences plus a short list of key points.
///
/// Splits on `". "`; text with at most five pieces comes back unchanged.
pub fn summarize_locally(text: &str) -> String {
    let sentences: Vec<&str> = text.split(SENTENCE_DELIMITER).collect();
    if sentences.len() <= SHORT_TEXT_SENTENCES {
        return text.to_string();
    }

    let lead = sentences[..LEAD_SENTENCES].join(SENTENCE_DELIMITER);
    let key_points = sentences
        .iter()
        .skip(LEAD_SENTENCES)
        .take(KEY_POINTS)
        .copied()
        .collect::<Vec<_>>()
        .join("\n- ");

    format!("{lead}.\n\nKey points:\n- {key_points}")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FailingClient {
        calls: AtomicUsize,
    }

    impl CompletionClient for FailingClient {
        async fn complete(&self, _system: &str, _user: &str, _max_tokens: u32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Completion {
                status: 401,
                message: "invalid api key".into(),
            })
        }
    }

    struct CannedClient(&'static str);

    impl CompletionClient for CannedClient {
        async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
            assert_eq!(system, SYSTEM_PROMPT);
            assert!(user.ends_with("One. Two."));
            assert_eq!(max_tokens, 500);
            Ok(self.0.to_string())
        }
    }

    fn numbered(n: usize) -> String {
        (1..=n)
            .map(|i| format!("Sentence {i}"))
            .collect::<Vec<_>>()
            .join(". ")
    }

    #[test]
    fn test_short_text_unchanged() {
        for n in 0..=5 {
            let text = numbered(n);
            assert_eq!(summarize_locally(&text), text);
        }
        assert_eq!(summarize_locally("No delimiter at all"), "No delimiter at all");
    }

    #[test]
    fn test_six_sentences() {
        let summary = summarize_locally(&numbered(6));
        assert_eq!(
            summary,
            "Sentence 1. Sentence 2. Sentence 3.\n\nKey points:\n- Sentence 4\n- Sentence 5\n- Sentence 6"
        );
    }

    #[test]
    fn test_key_points_capped_at_five() {
        let summary = summarize_locally(&numbered(12));
        let (lead, points) = summary.split_once("\n\nKey points:\n").unwrap();
        assert_eq!(lead, "Sentence 1. Sentence 2. Sentence 3.");

        let points: Vec<&str> = points.lines().collect();
        assert_eq!(
            points,
            vec!["- Sentence 4", "- Sentence 5", "- Sentence 6", "- Sentence 7", "- Sentence 8"]
        );
    }

    #[test]
    fn test_split_is_on_literal_delimiter() {
        let text = "A eg b. C 3.5 kg. D. E. F. G";
        assert_eq!(
            summarize_locally(text),
            "A eg b. C 3.5 kg. D.\n\nKey points:\n- E\n- F\n- G"
        );
    }

    #[tokio::test]
    async fn test_external_failure_matches_local() {
        let text = numbered(9);
        let failing = Summarizer::new(Some(FailingClient {
            calls: AtomicUsize::new(0),
        }));

        let with_external = failing.summarize(&text, true).await;
        let without = failing.summarize(&text, false).await;
        assert_eq!(with_external, without);
        assert_eq!(with_external, summarize_locally(&text));

        let client = failing.external.as_ref().unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_external_used_when_preferred() {
        let summarizer = Summarizer::new(Some(CannedClient("A short recap.")));
        assert_eq!(summarizer.summarize("One. Two.", true).await, "A short recap.");
        assert_eq!(summarizer.summarize("One. Two.", false).await, "One. Two.");
    }

    #[tokio::test]
    async fn test_no_credential_means_local() {
        let summarizer: Summarizer<OpenAiClient> = Summarizer::new(None);
        assert!(!summarizer.has_external());
        assert_eq!(summarizer.summarize("One. Two.", true).await, "One. Two.");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = OpenAiClient::new("sk-test").with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
        assert_eq!(client.model, OpenAiClient::DEFAULT_MODEL);
    }
}
