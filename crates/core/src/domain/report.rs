use crate::domain::financials::FinancialSnapshot;
use crate::domain::recommendation::{RecommendationResult, RunStatus, Tone};
use crate::domain::ticker::Ticker;
use crate::domain::verification::{
    ExtractionMode, VerificationResult, UNCERTAIN_VERDICT, UNKNOWN_CONFIDENCE,
};
use crate::heuristics::HeuristicFlag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Live,
    Mock,
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub ticker: Ticker,
    pub tone: Tone,
    pub mode: RunMode,
    pub financials: Option<FinancialSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financials_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub news_error: Option<String>,
    pub flags: Vec<HeuristicFlag>,
    pub recommendation: RecommendationResult,
    pub verification: Option<VerificationResult>,
    pub verdict: String,
    pub confidence: String,
    pub justification: String,
    pub status: RunStatus,
    pub error: Option<String>,
    /// Provider response body for a failed model call, when one was captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_raw_error: Option<serde_json::Value>,
}

impl AnalysisReport {
    /// Report skeleton for a run; verdict fields start at their sentinels.
    pub fn begin(
        run_id: Uuid,
        ticker: Ticker,
        tone: Tone,
        mode: RunMode,
        recommendation: RecommendationResult,
    ) -> Self {
        Self {
            run_id,
            generated_at: Utc::now(),
            ticker,
            tone,
            mode,
            financials: None,
            financials_error: None,
            news_error: None,
            flags: Vec::new(),
            recommendation,
            verification: None,
            verdict: UNCERTAIN_VERDICT.to_string(),
            confidence: UNKNOWN_CONFIDENCE.to_string(),
            justification: String::new(),
            status: RunStatus::Success,
            error: None,
            llm_raw_error: None,
        }
    }

    pub fn attach_verification(&mut self, verification: VerificationResult) {
        self.verdict = verification.verdict.clone();
        self.confidence = verification.confidence.clone();
        self.justification = verification.justification.clone();
        self.verification = Some(verification);
    }

    pub fn fail(&mut self, error: String) {
        self.status = RunStatus::Error;
        self.error = Some(error);
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// One `key: value` per line. Nested fields use dotted keys, list entries
    /// use their index, and embedded newlines are written as `\n`.
    pub fn to_key_value(&self) -> String {
        let mut out = KeyValueWriter::default();

        out.field("run_id", &self.run_id.to_string());
        out.field("generated_at", &self.generated_at.to_rfc3339());
        out.field("ticker", self.ticker.as_str());
        out.field("tone", self.tone.as_str());
        out.field(
            "mode",
            match self.mode {
                RunMode::Live => "live",
                RunMode::Mock => "mock",
            },
        );
        out.field("status", self.status.as_str());
        if let Some(err) = &self.error {
            out.field("error", err);
        }
        if let Some(raw) = &self.llm_raw_error {
            out.field("llm_raw_error", &raw.to_string());
        }
        out.field("verdict", &self.verdict);
        out.field("confidence", &self.confidence);
        out.field("justification", &self.justification);

        match &self.financials {
            Some(snapshot) => {
                for (k, v) in snapshot.iter() {
                    out.field(&format!("financials.{k}"), &v.to_string());
                }
            }
            None => {
                if let Some(err) = &self.financials_error {
                    out.field("financials.error", err);
                }
            }
        }
        if let Some(err) = &self.news_error {
            out.field("news.error", err);
        }
        out.list("flags", self.flags.iter().map(|f| f.as_str()));

        let rec = &self.recommendation;
        out.field("recommendation.status", rec.status.as_str());
        if let Some(label) = rec.label {
            out.field("recommendation.label", label.as_str());
        }
        if let Some(c) = rec.confidence {
            out.field("recommendation.confidence", &c.to_string());
        }
        if let Some(err) = &rec.error {
            out.field("recommendation.error", err);
        }
        out.field("recommendation.analysis", &rec.analysis);

        if let Some(v) = &self.verification {
            out.field(
                "verification.extraction",
                match v.extraction {
                    ExtractionMode::Structured => "structured",
                    ExtractionMode::Text => "text",
                },
            );
            out.list(
                "verification.supporting_headlines",
                v.supporting_headlines.iter().map(String::as_str),
            );
            out.list(
                "verification.news_headlines",
                v.news_headlines.iter().map(String::as_str),
            );
        }

        out.finish()
    }
}

#[derive(Default)]
struct KeyValueWriter {
    buf: String,
}

impl KeyValueWriter {
    fn field(&mut self, key: &str, value: &str) {
        let value = value.trim().replace('\r', "").replace('\n', "\\n");
        let _ = writeln!(self.buf, "{key}: {value}");
    }

    fn list<'a>(&mut self, key: &str, values: impl Iterator<Item = &'a str>) {
        for (i, v) in values.enumerate() {
            self.field(&format!("{key}.{i}"), v);
        }
    }

    fn finish(self) -> String {
        self.buf
    }
}
