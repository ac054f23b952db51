use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

/// LLM failure with enough context to debug a bad response.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}

impl LlmDiagnosticsError {
    /// Provider output attached to `err`, when it is (or wraps) a diagnostics error.
    pub fn raw_from(err: &anyhow::Error) -> Option<Value> {
        let diag = err.downcast_ref::<LlmDiagnosticsError>()?;
        diag.raw_response_json.clone().or_else(|| {
            diag.raw_output
                .as_deref()
                .map(|raw| serde_json::json!({ "raw_text": raw }))
        })
    }
}
