use crate::domain::ticker::Ticker;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Formal,
    Direct,
    Conversational,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Formal => "formal",
            Tone::Direct => "direct",
            Tone::Conversational => "conversational",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "formal" => Ok(Tone::Formal),
            "direct" => Ok(Tone::Direct),
            "conversational" => Ok(Tone::Conversational),
            other => anyhow::bail!(
                "unknown tone {other:?} (expected formal, direct or conversational)"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecommendationLabel {
    Buy,
    Sell,
    Hold,
}

impl RecommendationLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationLabel::Buy => "BUY",
            RecommendationLabel::Sell => "SELL",
            RecommendationLabel::Hold => "HOLD",
        }
    }

    /// Case-insensitive match on the bare word.
    pub fn from_word(word: &str) -> Option<Self> {
        match word.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(RecommendationLabel::Buy),
            "SELL" => Some(RecommendationLabel::Sell),
            "HOLD" => Some(RecommendationLabel::Hold),
            _ => None,
        }
    }
}

impl fmt::Display for RecommendationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub ticker: Ticker,
    pub tone: Tone,
    pub label: Option<RecommendationLabel>,
    pub analysis: String,
    /// 0..=100 when the model stated one.
    pub confidence: Option<u8>,
    pub status: RunStatus,
    pub error: Option<String>,
    /// Provider response body behind `error`, when the client captured one.
    #[serde(skip)]
    pub llm_raw_error: Option<serde_json::Value>,
}

impl RecommendationResult {
    pub fn success(
        ticker: Ticker,
        tone: Tone,
        analysis: String,
        label: Option<RecommendationLabel>,
        confidence: Option<u8>,
    ) -> Self {
        Self {
            ticker,
            tone,
            label,
            analysis,
            confidence,
            status: RunStatus::Success,
            error: None,
            llm_raw_error: None,
        }
    }

    pub fn failed(ticker: Ticker, tone: Tone, error: String) -> Self {
        Self {
            ticker,
            tone,
            label: None,
            analysis: String::new(),
            confidence: None,
            status: RunStatus::Error,
            error: Some(error),
            llm_raw_error: None,
        }
    }

    pub fn with_llm_raw_error(mut self, raw: Option<serde_json::Value>) -> Self {
        self.llm_raw_error = raw;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
