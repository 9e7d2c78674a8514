//! OpenAI-compatible chat-completions judge backend.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::domain::error::JudgeError;
use crate::plugins::llm_judge::{JudgeBackend, JudgeRequest, JudgeVerdict};

const SYSTEM_PROMPT: &str = "You are an impartial reviewer scoring the output of a multi-agent \
research system. Score each dimension from 0.0 to 1.0: technical_accuracy, constructiveness, \
clarity, planning_rationality. Reply with a single JSON object containing those four numeric \
fields and a short `rationale` string. Do not include any other text.";

/// Judge backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpJudgeConfig {
    /// Base URL of an OpenAI-compatible API, without the trailing path.
    pub base_url: String,
    pub model: String,
    /// Sent as a bearer token when set.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Reference texts are truncated to this many characters each.
    pub max_reference_chars: usize,
}

impl Default for HttpJudgeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.0,
            max_tokens: 512,
            max_reference_chars: 4_000,
        }
    }
}

/// HTTP judge client.
pub struct HttpJudgeBackend {
    config: HttpJudgeConfig,
    http_client: reqwest::Client,
    fenced_block: Regex,
}

impl HttpJudgeBackend {
    pub fn new(config: HttpJudgeConfig) -> Result<Self, JudgeError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("compsweep/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| JudgeError::Network(e.to_string()))?;
        let fenced_block = Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```")
            .map_err(|e| JudgeError::Parse(e.to_string()))?;
        Ok(Self {
            config,
            http_client,
            fenced_block,
        })
    }

    fn user_prompt(&self, request: &JudgeRequest) -> String {
        let roles = request
            .roles
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut prompt = format!(
            "Task: {}\nEnabled agent roles: {}\n\n",
            request.task_id, roles
        );
        if request.references.is_empty() {
            prompt.push_str("No reference is available; judge on intrinsic quality.\n\n");
        } else {
            for (i, r) in request.references.iter().enumerate() {
                let clipped: String = r.chars().take(self.config.max_reference_chars).collect();
                prompt.push_str(&format!("Reference {}:\n{}\n\n", i + 1, clipped));
            }
        }
        prompt.push_str(&format!("Output to score:\n{}\n", request.output));
        prompt
    }

    /// Extract and decode the verdict from a model reply.
    ///
    /// Tries the whole reply, then a fenced code block, then the first
    /// JSON value starting at each `{`; text after the object is ignored.
    pub fn parse_verdict(&self, content: &str) -> Result<JudgeVerdict, JudgeError> {
        if let Ok(verdict) = serde_json::from_str(content.trim()) {
            return Ok(verdict);
        }
        if let Some(block) = self.fenced_block.captures(content).and_then(|c| c.get(1)) {
            if let Ok(verdict) = serde_json::from_str(block.as_str()) {
                return Ok(verdict);
            }
        }

        let mut first_error = None;
        for (start, _) in content.match_indices('{') {
            let mut values =
                serde_json::Deserializer::from_str(&content[start..]).into_iter::<JudgeVerdict>();
            match values.next() {
                Some(Ok(verdict)) => return Ok(verdict),
                Some(Err(e)) => {
                    first_error.get_or_insert_with(|| e.to_string());
                }
                None => {}
            }
        }
        Err(JudgeError::Parse(first_error.unwrap_or_else(|| {
            "no JSON object in judge reply".to_string()
        })))
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl JudgeBackend for HttpJudgeBackend {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn score(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": self.user_prompt(request)},
            ],
        });

        let mut builder = self.http_client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(model = %self.config.model, task_id = %request.task_id, "sending judge request");
        let response = builder
            .send()
            .await
            .map_err(|e| JudgeError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let text = response.text().await.unwrap_or_default();
            return Err(JudgeError::RateLimited(text));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(JudgeError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| JudgeError::Parse(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| JudgeError::Parse("judge reply had no content".to_string()))?;

        self.parse_verdict(&content)
    }
}
