//! Ollama-backed capabilities.
//!
//! One `OllamaClient` serves the router and the three graders over
//! `/api/chat` with `format: "json"`. `OllamaGenerator` wraps the same client
//! for plain-text generation with its own model and temperature.
//!
//! Classifier output is parsed leniently:
//! - JSON embedded in prose or markdown fences is extracted first
//! - `binary_score` may be a string ("yes"/"no") or a boolean
//! - anything else becomes `Unparsed`, which the core reads as negative

use crate::capabilities::{
    GroundingGrader, RelevanceGrader, RouteClassifier, TextGenerator, UsefulnessGrader,
};
use crate::prompts;
use anyhow::{Context, Result};
use async_trait::async_trait;
use clinic_shared::{Document, Grade, RouteLabel};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_MODEL: &str = "qwen3:4b";

/// Default keep_alive duration - model stays loaded for 5 minutes after last request
pub const DEFAULT_KEEP_ALIVE: &str = "5m";

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    keep_alive: String,
    options: ChatOptions,
}

#[derive(Debug, Clone, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Ollama client for the route classifier and the graders
pub struct OllamaClient {
    http_client: reqwest::Client,
    base_url: String,
    router_model: String,
    grader_model: String,
    keep_alive: String,
}

impl OllamaClient {
    /// `http_timeout` is a transport backstop; turn deadlines are enforced
    /// by the orchestrator.
    pub fn new(base_url: &str, http_timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(http_timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            router_model: DEFAULT_MODEL.to_string(),
            grader_model: DEFAULT_MODEL.to_string(),
            keep_alive: DEFAULT_KEEP_ALIVE.to_string(),
        }
    }

    pub fn with_models(mut self, router_model: &str, grader_model: &str) -> Self {
        self.router_model = router_model.to_string();
        self.grader_model = grader_model.to_string();
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: &str) -> Self {
        self.keep_alive = keep_alive.to_string();
        self
    }

    pub fn router_model(&self) -> &str {
        &self.router_model
    }

    pub fn grader_model(&self) -> &str {
        &self.grader_model
    }

    /// Text generator sharing this client's connection pool
    pub fn generator(self: &Arc<Self>, model: &str, temperature: f32) -> OllamaGenerator {
        OllamaGenerator {
            client: self.clone(),
            model: model.to_string(),
            temperature,
        }
    }

    async fn chat(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        user_prompt: &str,
        json: bool,
        temperature: f32,
    ) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user_prompt.to_string(),
        });

        let request = ChatRequest {
            model: model.to_string(),
            messages,
            stream: false,
            format: json.then(|| "json".to_string()),
            keep_alive: self.keep_alive.clone(),
            options: ChatOptions { temperature },
        };

        info!("[>]  LLM CALL [{}] (keep_alive: {})", model, self.keep_alive);
        debug!(
            "[U]  USER PROMPT ({} chars): {}",
            user_prompt.len(),
            preview(user_prompt, 500)
        );

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("[-]  Ollama error {}: {}", status, error_text);
            anyhow::bail!("Ollama returned error {}: {}", status, error_text);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        let content = chat_response.message.content;
        info!(
            "[<]  LLM RESPONSE ({} chars): {}",
            content.len(),
            preview(&content, 200)
        );
        Ok(content)
    }

    async fn classify(&self, model: &str, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.chat(model, Some(system_prompt), user_prompt, true, 0.0)
            .await
    }
}

#[async_trait]
impl RouteClassifier for OllamaClient {
    async fn classify_route(&self, question: &str, history: &str) -> Result<RouteLabel> {
        let raw = self
            .classify(
                &self.router_model,
                prompts::ROUTER_SYSTEM_PROMPT,
                &prompts::router_user_prompt(question, history),
            )
            .await
            .context("Route classification failed")?;
        Ok(parse_route_label(&raw))
    }
}

#[async_trait]
impl RelevanceGrader for OllamaClient {
    async fn grade_relevance(&self, question: &str, document: &str) -> Result<Grade> {
        let raw = self
            .classify(
                &self.grader_model,
                prompts::RELEVANCE_SYSTEM_PROMPT,
                &prompts::relevance_user_prompt(question, document),
            )
            .await
            .context("Relevance grading failed")?;
        Ok(parse_grade(&raw))
    }
}

#[async_trait]
impl GroundingGrader for OllamaClient {
    async fn grade_grounding(&self, documents: &[Document], answer: &str) -> Result<Grade> {
        let raw = self
            .classify(
                &self.grader_model,
                prompts::GROUNDING_SYSTEM_PROMPT,
                &prompts::grounding_user_prompt(documents, answer),
            )
            .await
            .context("Grounding check failed")?;
        Ok(parse_grade(&raw))
    }
}

#[async_trait]
impl UsefulnessGrader for OllamaClient {
    async fn grade_usefulness(&self, question: &str, answer: &str) -> Result<Grade> {
        let raw = self
            .classify(
                &self.grader_model,
                prompts::USEFULNESS_SYSTEM_PROMPT,
                &prompts::usefulness_user_prompt(question, answer),
            )
            .await
            .context("Usefulness check failed")?;
        Ok(parse_grade(&raw))
    }
}

/// Plain-text generator on one model
pub struct OllamaGenerator {
    client: Arc<OllamaClient>,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.client
            .chat(&self.model, None, prompt, false, self.temperature)
            .await
            .with_context(|| format!("Generation on {} failed", self.model))
    }
}

/// Slice from the first `{` to the last `}`, if both exist
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn parse_object(raw: &str) -> Option<Value> {
    let json = extract_json(raw)?;
    serde_json::from_str::<Value>(json).ok()
}

/// Read `{"datasource": ..}`; a bare label is accepted too
pub fn parse_route_label(raw: &str) -> RouteLabel {
    match parse_object(raw) {
        Some(v) => match v.get("datasource").and_then(Value::as_str) {
            Some(label) => RouteLabel::from_label(label),
            None => RouteLabel::Unparsed(raw.trim().to_string()),
        },
        None => RouteLabel::from_label(raw.trim()),
    }
}

/// Read `{"binary_score": ..}` as a string or boolean; a bare label is
/// accepted too
pub fn parse_grade(raw: &str) -> Grade {
    match parse_object(raw) {
        Some(v) => match v.get("binary_score") {
            Some(Value::String(label)) => Grade::from_label(label),
            Some(Value::Bool(b)) => Grade::from_bool(*b),
            _ => Grade::Unparsed(raw.trim().to_string()),
        },
        None => Grade::from_label(raw.trim()),
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_fenced_output() {
        let raw = "Sure!\n```json\n{\"binary_score\": \"yes\"}\n```";
        assert_eq!(extract_json(raw), Some("{\"binary_score\": \"yes\"}"));
        assert_eq!(extract_json("no braces here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_parse_route_label() {
        assert_eq!(
            parse_route_label(r#"{"datasource":"vectorstore"}"#),
            RouteLabel::Vectorstore
        );
        assert_eq!(
            parse_route_label("The answer is {\"datasource\": \"simulated_generation\"}"),
            RouteLabel::SimulatedGeneration
        );
        assert_eq!(parse_route_label("vectorstore"), RouteLabel::Vectorstore);
        assert!(parse_route_label(r#"{"datasource":"web_search"}"#).is_unparsed());
        assert!(parse_route_label(r#"{"route":"vectorstore"}"#).is_unparsed());
    }

    #[test]
    fn test_parse_grade_variants() {
        assert_eq!(parse_grade(r#"{"binary_score":"yes"}"#), Grade::Yes);
        assert_eq!(parse_grade(r#"{"binary_score":"No"}"#), Grade::No);
        assert_eq!(parse_grade(r#"{"binary_score":true}"#), Grade::Yes);
        assert_eq!(parse_grade(r#"{"binary_score":false}"#), Grade::No);
        assert_eq!(parse_grade("yes"), Grade::Yes);
        assert!(matches!(
            parse_grade(r#"{"binary_score":"maybe"}"#),
            Grade::Unparsed(_)
        ));
        assert!(matches!(parse_grade(r#"{"score":1}"#), Grade::Unparsed(_)));
        assert!(matches!(parse_grade(""), Grade::Unparsed(_)));
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("مرحبا بكم", 5), "مرحبا...");
        assert_eq!(preview("short", 10), "short");
    }

    #[test]
    fn test_generator_shares_client() {
        let client = Arc::new(
            OllamaClient::new(DEFAULT_OLLAMA_URL, Duration::from_secs(5))
                .with_models("router:1b", "grader:1b"),
        );
        let generator = client.generator("writer:8b", 0.3);
        assert_eq!(generator.model(), "writer:8b");
        assert_eq!(generator.temperature(), 0.3);
        assert_eq!(client.grader_model(), "grader:1b");
        assert_eq!(Arc::strong_count(&client), 2);
    }
}
