//! LLM API client for chapter translation and glossary extraction

pub mod retry;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// Network trouble, rate limiting, or a 5xx from the provider.
    #[error("transient API failure: {0}")]
    Transient(String),

    /// Bad key, malformed request, or an unusable response.
    #[error("API request rejected: {0}")]
    Fatal(String),
}

/// A text-completion capability: fixed instructions plus user text in,
/// model output out. The pipeline only depends on this trait so tests
/// can substitute a scripted client.
pub trait Completion {
    fn complete(&self, instructions: &str, text: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LlmProvider {
    Gemini,
    OpenAI,
    Claude,
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Self::Gemini,
            "openai" => Self::OpenAI,
            "claude" | "anthropic" => Self::Claude,
            "ollama" => Self::Ollama,
            _ => Self::Gemini,
        }
    }

    pub fn default_base_url(&self) -> &str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::OpenAI => "https://api.openai.com/v1",
            Self::Claude => "https://api.anthropic.com/v1",
            Self::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(&self) -> &str {
        match self {
            Self::Gemini => "gemini-2.5-flash-preview-05-20",
            Self::OpenAI => "gpt-4o-mini",
            Self::Claude => "claude-sonnet-4-20250514",
            Self::Ollama => "llama3",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl LlmConfig {
    pub fn new(provider: LlmProvider) -> Self {
        Self {
            base_url: provider.default_base_url().to_string(),
            model: provider.default_model().to_string(),
            provider,
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    pub fn with_base_url(mut self, url: Option<String>) -> Self {
        if let Some(u) = url {
            self.base_url = u;
        }
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(m) = model {
            self.model = m;
        }
        self
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

pub struct LlmClient {
    config: LlmConfig,
    client: reqwest::blocking::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn model_name(&self) -> &str {
        &self.config.model
    }

    fn complete_gemini(&self, instructions: &str, text: &str) -> Result<String, LlmError> {
        let request = GeminiRequest {
            system_instruction: GeminiContent {
                parts: vec![GeminiPart {
                    text: instructions.to_string(),
                }],
            },
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: text.to_string(),
                }],
            }],
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        let mut req = self.client.post(&url).json(&request);
        if let Some(ref key) = self.config.api_key {
            req = req.header("x-goog-api-key", key);
        }

        let response = send_checked(req)?;

        let result: GeminiResponse = response
            .json()
            .map_err(|e| LlmError::Fatal(format!("unparseable Gemini response: {e}")))?;

        result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .ok_or_else(|| LlmError::Fatal("empty Gemini response".to_string()))
    }

    fn complete_openai_compatible(&self, instructions: &str, text: &str) -> Result<String, LlmError> {
        let request = OpenAIRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: instructions.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            temperature: 0.3,
        };

        let url = format!("{}/chat/completions", self.config.base_url);

        let mut req = self.client.post(&url).json(&request);
        if let Some(ref key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = send_checked(req)?;

        let result: OpenAIResponse = response
            .json()
            .map_err(|e| LlmError::Fatal(format!("unparseable API response: {e}")))?;

        result
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| LlmError::Fatal("empty API response".to_string()))
    }

    fn complete_ollama(&self, instructions: &str, text: &str) -> Result<String, LlmError> {
        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt: format!("{}\n\n{}", instructions, text),
            stream: false,
        };

        let url = format!("{}/api/generate", self.config.base_url);

        let response = send_checked(self.client.post(&url).json(&request))?;

        let result: OllamaResponse = response
            .json()
            .map_err(|e| LlmError::Fatal(format!("unparseable Ollama response: {e}")))?;

        Ok(result.response.trim().to_string())
    }
}

impl Completion for LlmClient {
    fn complete(&self, instructions: &str, text: &str) -> Result<String, LlmError> {
        match self.config.provider {
            LlmProvider::Gemini => self.complete_gemini(instructions, text),
            LlmProvider::OpenAI | LlmProvider::Claude => {
                self.complete_openai_compatible(instructions, text)
            }
            LlmProvider::Ollama => self.complete_ollama(instructions, text),
        }
    }
}

/// Sends the request and maps failures onto the retry taxonomy:
/// connection problems, rate limits, and 5xx are transient; any other
/// non-success status is fatal.
fn send_checked(req: reqwest::blocking::RequestBuilder) -> Result<reqwest::blocking::Response, LlmError> {
    let response = req
        .send()
        .map_err(|e| LlmError::Transient(format!("request failed: {e}")))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    if status.as_u16() == 429 || status.is_server_error() {
        Err(LlmError::Transient(format!("{}: {}", status, body)))
    } else {
        Err(LlmError::Fatal(format!("{}: {}", status, body)))
    }
}
