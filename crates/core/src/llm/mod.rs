pub mod anthropic;
pub mod error;
pub mod json;
pub mod openai;

use crate::config::Settings;
use std::fmt;
use std::str::FromStr;

/// Schema the model is asked to fill instead of (or alongside) prose.
#[derive(Debug, Clone)]
pub struct StructuredOutput {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub structured: Option<StructuredOutput>,
}

impl CompletionRequest {
    pub fn new(prompt: String, temperature: f32) -> Self {
        Self {
            system: None,
            prompt,
            temperature,
            structured: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_structured(mut self, structured: StructuredOutput) -> Self {
        self.structured = Some(structured);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// Prose returned by the model (may be empty when only a tool call came back).
    pub text: String,
    /// Parsed payload when structured output was requested and returned.
    pub structured: Option<serde_json::Value>,
}

impl Completion {
    /// Text to show a human: the prose, or the structured payload when there
    /// was no prose.
    pub fn display_text(&self) -> String {
        match (&self.structured, self.text.trim().is_empty()) {
            (Some(v), true) => serde_json::to_string_pretty(v).unwrap_or_default(),
            _ => self.text.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Anthropic => f.write_str("anthropic"),
            Provider::OpenAI => f.write_str("openai"),
        }
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "openai" | "gpt" => Ok(Provider::OpenAI),
            other => anyhow::bail!("unknown LLM_PROVIDER {other:?} (expected openai or anthropic)"),
        }
    }
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    fn model(&self) -> &str;

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Completion>;
}

/// Builds the configured client. Fails when the provider's API key is absent.
pub fn client_from_settings(settings: &Settings) -> anyhow::Result<Box<dyn LlmClient>> {
    let provider = match settings.llm_provider.as_deref() {
        Some(s) => s.parse::<Provider>()?,
        None => Provider::OpenAI,
    };

    Ok(match provider {
        Provider::OpenAI => Box::new(openai::OpenAiClient::from_settings(settings)?),
        Provider::Anthropic => Box::new(anthropic::AnthropicClient::from_settings(settings)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_parses_aliases() {
        assert_eq!("Claude".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAI);
        assert!("gemini".parse::<Provider>().is_err());
    }

    #[test]
    fn display_text_prefers_prose() {
        let c = Completion {
            text: " Final Verdict: BUY ".into(),
            structured: Some(json!({"verdict": "BUY"})),
        };
        assert_eq!(c.display_text(), "Final Verdict: BUY");

        let c = Completion {
            text: String::new(),
            structured: Some(json!({"verdict": "BUY"})),
        };
        assert!(c.display_text().contains("\"verdict\": \"BUY\""));
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let settings = Settings {
            llm_provider: Some("anthropic".into()),
            openai_api_key: Some("sk-test".into()),
            anthropic_api_key: None,
            sentry_dsn: None,
            data_provider_base_url: None,
            data_provider_api_key: None,
        };
        let err = client_from_settings(&settings).err().unwrap();
        assert!(format!("{err:#}").contains("ANTHROPIC_API_KEY"));
    }
}
