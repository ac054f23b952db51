use crate::domain::ticker::Ticker;
use crate::heuristics::HeuristicFlag;
use serde::{Deserialize, Serialize};

pub const UNCERTAIN_VERDICT: &str = "UNCERTAIN";
pub const UNKNOWN_CONFIDENCE: &str = "N/A";
pub const MAX_SUPPORTING_HEADLINES: usize = 3;

/// How the verifier's fields were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Machine-readable payload returned by the model.
    Structured,
    /// Line patterns over the prose response.
    Text,
}

/// Verifier fields before they are attached to a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedVerdict {
    pub verdict: String,
    pub confidence: String,
    pub justification: String,
    pub supporting_headlines: Vec<String>,
    pub mode: ExtractionMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub ticker: Ticker,
    pub original_recommendation: String,
    pub verdict: String,
    pub confidence: String,
    pub justification: String,
    /// Headlines the model cited, at most three.
    pub supporting_headlines: Vec<String>,
    /// Headlines as scraped, at most three.
    pub news_headlines: Vec<String>,
    pub flags: Vec<HeuristicFlag>,
    pub extraction: ExtractionMode,
    pub raw_output: String,
}

impl VerificationResult {
    pub fn assemble(
        ticker: Ticker,
        original_recommendation: String,
        extracted: ExtractedVerdict,
        news_headlines: Vec<String>,
        flags: Vec<HeuristicFlag>,
        raw_output: String,
    ) -> Self {
        let mut supporting_headlines = extracted.supporting_headlines;
        supporting_headlines.truncate(MAX_SUPPORTING_HEADLINES);
        let mut news_headlines = news_headlines;
        news_headlines.truncate(MAX_SUPPORTING_HEADLINES);

        Self {
            ticker,
            original_recommendation,
            verdict: extracted.verdict,
            confidence: extracted.confidence,
            justification: extracted.justification,
            supporting_headlines,
            news_headlines,
            flags,
            extraction: extracted.mode,
            raw_output,
        }
    }

    pub fn is_uncertain(&self) -> bool {
        self.verdict == UNCERTAIN_VERDICT
    }
}
