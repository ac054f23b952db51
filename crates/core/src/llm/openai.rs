use crate::config::{env_or, Settings};
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json;
use crate::llm::{Completion, CompletionRequest, LlmClient, Provider};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Chat Completions client. Also works against OpenAI-compatible servers via
/// `OPENAI_BASE_URL`.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_openai_api_key()?.to_string();
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = env_or("OPENAI_MAX_TOKENS", DEFAULT_MAX_TOKENS);
        let timeout_secs = env_or("OPENAI_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    fn url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    fn build_request(&self, req: CompletionRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = req.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: req.prompt,
        });

        let response_format = req.structured.map(|s| ResponseFormat::JsonSchema {
            json_schema: JsonSchemaFormat {
                name: s.name,
                description: s.description,
                schema: s.schema,
                strict: false,
            },
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: req.temperature,
            max_tokens: self.max_tokens,
            response_format,
        }
    }

    async fn chat(&self, body: &ChatRequest) -> anyhow::Result<(serde_json::Value, ChatResponse)> {
        let res = self
            .http
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .context("OpenAI request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read OpenAI response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<serde_json::Value>(&text).ok();
            return Err(LlmDiagnosticsError {
                provider: Provider::OpenAI,
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text)
            .with_context(|| format!("failed to parse OpenAI response JSON: {text}"))?;
        let parsed = serde_json::from_value::<ChatResponse>(raw_json.clone())
            .context("failed to decode OpenAI response into ChatResponse")?;
        Ok((raw_json, parsed))
    }

    fn first_choice_text(res: &ChatResponse) -> Option<String> {
        res.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|s| !s.trim().is_empty())
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Completion> {
        let wants_structured = req.structured.is_some();
        let body = self.build_request(req);
        let (raw_json, res) = self.chat(&body).await?;

        if let Some(reason) = res.choices.first().and_then(|c| c.finish_reason.as_deref()) {
            if reason == "length" {
                tracing::warn!(model = %self.model, "OpenAI finish_reason=length; response may be truncated");
            }
        }

        let Some(text) = Self::first_choice_text(&res) else {
            let refusal = res
                .choices
                .first()
                .and_then(|c| c.message.refusal.clone());
            return Err(LlmDiagnosticsError {
                provider: Provider::OpenAI,
                stage: "empty_response",
                detail: refusal.unwrap_or_else(|| "no message content".to_string()),
                raw_output: None,
                raw_response_json: Some(raw_json),
            }
            .into());
        };

        let structured = if wants_structured {
            json::parse_object(&text)
        } else {
            None
        };

        Ok(Completion { text, structured })
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseFormat {
    JsonSchema { json_schema: JsonSchemaFormat },
}

#[derive(Debug, Clone, Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    description: &'static str,
    schema: serde_json::Value,
    strict: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}
