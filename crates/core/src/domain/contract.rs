use crate::domain::recommendation::RecommendationLabel;
use crate::domain::verification::{ExtractedVerdict, ExtractionMode, MAX_SUPPORTING_HEADLINES};
use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};

/// Name used for the structured-output schema (OpenAI `json_schema.name`,
/// Anthropic tool name).
pub const VERIFICATION_SCHEMA_NAME: &str = "emit_verification";

/// What the verifier is asked to emit when structured output is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmVerificationPayload {
    pub verdict: String,
    pub confidence: serde_json::Value,
    pub justification: String,
    #[serde(default)]
    pub supporting_headlines: Vec<String>,
}

impl LlmVerificationPayload {
    pub fn validate_and_into_verdict(self) -> anyhow::Result<ExtractedVerdict> {
        let Some(label) = RecommendationLabel::from_word(&self.verdict) else {
            bail!("verdict must be BUY, SELL or HOLD (got {:?})", self.verdict);
        };

        let confidence = match &self.confidence {
            serde_json::Value::Number(n) => {
                let Some(v) = n.as_f64() else {
                    bail!("confidence is not a finite number: {n}");
                };
                ensure!(
                    (0.0..=100.0).contains(&v),
                    "confidence must be between 0 and 100 (got {v})"
                );
                format!("{}%", v.round() as u8)
            }
            serde_json::Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            other => bail!("confidence must be a number or non-empty string (got {other})"),
        };

        let justification = self.justification.trim().to_string();
        ensure!(!justification.is_empty(), "justification must be non-empty");

        let supporting_headlines = self
            .supporting_headlines
            .into_iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .take(MAX_SUPPORTING_HEADLINES)
            .collect();

        Ok(ExtractedVerdict {
            verdict: label.as_str().to_string(),
            confidence,
            justification,
            supporting_headlines,
            mode: ExtractionMode::Structured,
        })
    }
}

/// JSON schema for [`LlmVerificationPayload`].
pub fn verification_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["verdict", "confidence", "justification", "supporting_headlines"],
        "properties": {
            "verdict": {"type": "string", "enum": ["BUY", "SELL", "HOLD"]},
            "confidence": {"type": "number", "minimum": 0, "maximum": 100},
            "justification": {"type": "string"},
            "supporting_headlines": {
                "type": "array",
                "maxItems": MAX_SUPPORTING_HEADLINES,
                "items": {"type": "string"}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: serde_json::Value) -> anyhow::Result<ExtractedVerdict> {
        serde_json::from_value::<LlmVerificationPayload>(v)?.validate_and_into_verdict()
    }

    #[test]
    fn accepts_numeric_confidence() {
        let out = payload(json!({
            "verdict": "buy",
            "confidence": 82,
            "justification": "Earnings momentum.",
            "supporting_headlines": ["A", " ", "B", "C", "D"],
        }))
        .unwrap();
        assert_eq!(out.verdict, "BUY");
        assert_eq!(out.confidence, "82%");
        assert_eq!(out.supporting_headlines, vec!["A", "B", "C"]);
        assert_eq!(out.mode, ExtractionMode::Structured);
    }

    #[test]
    fn accepts_string_confidence_and_missing_headlines() {
        let out = payload(json!({
            "verdict": "HOLD",
            "confidence": "70%",
            "justification": "Mixed signals.",
        }))
        .unwrap();
        assert_eq!(out.confidence, "70%");
        assert!(out.supporting_headlines.is_empty());
    }

    #[test]
    fn rejects_unknown_verdict_and_out_of_range_confidence() {
        assert!(payload(json!({
            "verdict": "STRONG BUY",
            "confidence": 50,
            "justification": "x",
        }))
        .is_err());
        assert!(payload(json!({
            "verdict": "SELL",
            "confidence": 140,
            "justification": "x",
        }))
        .is_err());
        assert!(payload(json!({
            "verdict": "SELL",
            "confidence": 40,
            "justification": "   ",
        }))
        .is_err());
    }
}
