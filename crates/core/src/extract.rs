//! Pulls structured fields out of model responses.
//!
//! The verifier may return a JSON payload (when structured output was
//! requested and honoured); otherwise the prose is scanned line by line for
//! fixed labels. Nothing here fails: absent fields become sentinels.

use crate::domain::contract::LlmVerificationPayload;
use crate::domain::recommendation::RecommendationLabel;
use crate::domain::verification::{
    ExtractedVerdict, ExtractionMode, MAX_SUPPORTING_HEADLINES, UNCERTAIN_VERDICT,
    UNKNOWN_CONFIDENCE,
};
use regex::Regex;
use std::sync::OnceLock;

struct Patterns {
    verdict: Regex,
    confidence_score: Regex,
    justification: Regex,
    headlines_header: Regex,
    numbered: Regex,
    recommendation_line: Regex,
    label_word: Regex,
    confidence_pct: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        verdict: Regex::new(r"(?i)final verdict\s*:\s*(.*)").unwrap(),
        confidence_score: Regex::new(r"(?i)confidence score\s*:\s*(.*)").unwrap(),
        justification: Regex::new(r"(?i)^\W*justification\W*:\s*(.*)").unwrap(),
        headlines_header: Regex::new(r"(?i)^\W*supporting headlines\W*:?").unwrap(),
        numbered: Regex::new(r"^\s*\d+\.\s+(.*)").unwrap(),
        recommendation_line: Regex::new(r"(?i)^\W*recommendation\W*:\W*(buy|sell|hold)\b").unwrap(),
        label_word: Regex::new(r"(?i)\b(buy|sell|hold)\b").unwrap(),
        confidence_pct: Regex::new(r"(?i)confidence(?:\s+score)?\W*:\W*(\d+(?:\.\d+)?)(\s*%)?").unwrap(),
    })
}

/// Verifier fields from a response. A valid structured payload wins; an
/// invalid one is logged and the prose is scanned instead.
pub fn extract_verification(
    text: &str,
    structured: Option<&serde_json::Value>,
) -> ExtractedVerdict {
    if let Some(value) = structured {
        match serde_json::from_value::<LlmVerificationPayload>(value.clone())
            .map_err(anyhow::Error::from)
            .and_then(LlmVerificationPayload::validate_and_into_verdict)
        {
            Ok(extracted) => return extracted,
            Err(err) => {
                tracing::warn!(error = %err, "structured verifier payload rejected; falling back to text patterns");
            }
        }
    }
    extract_from_text(text)
}

/// Line-pattern extraction over free text.
pub fn extract_from_text(text: &str) -> ExtractedVerdict {
    let p = patterns();

    let mut verdict: Option<String> = None;
    let mut confidence: Option<String> = None;
    let mut justification: Option<Vec<String>> = None;
    let mut in_justification = false;
    let mut in_headlines = false;
    let mut section_headlines = Vec::new();
    let mut any_numbered = Vec::new();

    for line in text.lines() {
        if verdict.is_none() {
            if let Some(c) = p.verdict.captures(line) {
                verdict = clean_value(&c[1]);
                in_justification = false;
                continue;
            }
        }
        if confidence.is_none() {
            if let Some(c) = p.confidence_score.captures(line) {
                confidence = clean_value(&c[1]);
                in_justification = false;
                continue;
            }
        }
        if p.headlines_header.is_match(line) {
            in_headlines = true;
            in_justification = false;
            continue;
        }
        if let Some(c) = p.numbered.captures(line) {
            if in_justification && !in_headlines {
                if let Some(parts) = justification.as_mut() {
                    parts.push(line.trim().to_string());
                }
                continue;
            }
            if let Some(h) = clean_headline(&c[1]) {
                if in_headlines {
                    section_headlines.push(h.clone());
                }
                any_numbered.push(h);
            }
            continue;
        }
        if justification.is_none() {
            if let Some(c) = p.justification.captures(line) {
                let first = c[1].trim();
                justification = Some(if first.is_empty() {
                    Vec::new()
                } else {
                    vec![first.to_string()]
                });
                in_justification = true;
                continue;
            }
        }
        if in_justification {
            if line.trim().is_empty() {
                in_justification = false;
            } else if let Some(parts) = justification.as_mut() {
                parts.push(line.trim().to_string());
            }
        }
    }

    let supporting_headlines = if section_headlines.is_empty() {
        any_numbered
    } else {
        section_headlines
    }
    .into_iter()
    .take(MAX_SUPPORTING_HEADLINES)
    .collect();

    let justification = justification
        .map(|parts| parts.join(" "))
        .filter(|j| !j.trim().is_empty())
        .unwrap_or_else(|| text.trim().to_string());

    ExtractedVerdict {
        verdict: verdict.unwrap_or_else(|| UNCERTAIN_VERDICT.to_string()),
        confidence: confidence.unwrap_or_else(|| UNKNOWN_CONFIDENCE.to_string()),
        justification,
        supporting_headlines,
        mode: ExtractionMode::Text,
    }
}

/// Buy/Sell/Hold stated by a recommendation. Prefers an explicit
/// `Recommendation:` line, then the first such word anywhere.
pub fn recommendation_label(text: &str) -> Option<RecommendationLabel> {
    let p = patterns();
    text.lines()
        .find_map(|line| p.recommendation_line.captures(line))
        .or_else(|| p.label_word.captures(text))
        .and_then(|c| RecommendationLabel::from_word(&c[1]))
}

/// Confidence percentage stated by a recommendation, when in 0..=100.
///
/// A bare fraction such as `0.85` (no `%`) is read as 85. Anything above
/// 100 is rejected rather than clamped.
pub fn recommendation_confidence(text: &str) -> Option<u8> {
    let c = patterns().confidence_pct.captures(text)?;
    let mut value: f64 = c[1].parse().ok()?;
    let has_percent = c.get(2).is_some();
    if !has_percent && c[1].contains('.') && value <= 1.0 {
        value *= 100.0;
    }
    (0.0..=100.0)
        .contains(&value)
        .then(|| value.round() as u8)
}

fn clean_value(raw: &str) -> Option<String> {
    let v = strip_emphasis(raw);
    let v = v.trim();
    (!v.is_empty()).then(|| v.to_string())
}

/// Drops markdown emphasis markers anywhere in `raw`. Underscores inside a
/// word (`pe_ratio`) are kept.
fn strip_emphasis(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| match c {
            '*' | '`' => false,
            '_' => {
                let before = i.checked_sub(1).map(|j| chars[j]);
                let after = chars.get(i + 1).copied();
                matches!((before, after), (Some(b), Some(a)) if b.is_alphanumeric() && a.is_alphanumeric())
            }
            _ => true,
        })
        .map(|(_, &c)| c)
        .collect()
}

fn clean_headline(raw: &str) -> Option<String> {
    let v = raw
        .trim()
        .trim_matches(|c: char| c == '*' || c == '"' || c == '\u{201c}' || c == '\u{201d}')
        .trim();
    (!v.is_empty()).then(|| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = "\
Final Verdict: BUY
Confidence Score: 82%
Justification: Revenue growth and a reasonable P/E support the original call.
Margins remain healthy.

Supporting Headlines:
1. Tesla deliveries beat expectations
2. \"Analysts raise price targets\"
3. New factory opens in Berlin
4. Extra line beyond the cap";

    #[test]
    fn extracts_well_formed_response() {
        let out = extract_from_text(SAMPLE);
        assert_eq!(out.verdict, "BUY");
        assert_eq!(out.confidence, "82%");
        assert_eq!(
            out.justification,
            "Revenue growth and a reasonable P/E support the original call. Margins remain healthy."
        );
        assert_eq!(
            out.supporting_headlines,
            vec![
                "Tesla deliveries beat expectations",
                "Analysts raise price targets",
                "New factory opens in Berlin",
            ]
        );
        assert_eq!(out.mode, ExtractionMode::Text);
    }

    #[test]
    fn missing_verdict_degrades_to_sentinels() {
        let text = "I think the stock looks fine overall.";
        let out = extract_from_text(text);
        assert_eq!(out.verdict, UNCERTAIN_VERDICT);
        assert_eq!(out.confidence, UNKNOWN_CONFIDENCE);
        assert_eq!(out.justification, text);
        assert!(out.supporting_headlines.is_empty());
    }

    #[test]
    fn strips_markdown_emphasis() {
        let text = "**Final Verdict:** SELL\n**Confidence Score:** 64%";
        let out = extract_from_text(text);
        assert_eq!(out.verdict, "SELL");
        assert_eq!(out.confidence, "64%");
    }

    #[test]
    fn empty_response_does_not_panic() {
        let out = extract_from_text("");
        assert_eq!(out.verdict, UNCERTAIN_VERDICT);
        assert_eq!(out.justification, "");
    }

    #[test]
    fn numbered_lines_used_when_no_headline_section() {
        let text = "Final Verdict: HOLD\n1. First point\n2. Second point";
        let out = extract_from_text(text);
        assert_eq!(out.supporting_headlines, vec!["First point", "Second point"]);
    }

    #[test]
    fn structured_payload_wins_over_text() {
        let payload = json!({
            "verdict": "SELL",
            "confidence": 71,
            "justification": "Guidance cut.",
            "supporting_headlines": ["Guidance lowered"],
        });
        let out = extract_verification("Final Verdict: BUY", Some(&payload));
        assert_eq!(out.verdict, "SELL");
        assert_eq!(out.confidence, "71%");
        assert_eq!(out.mode, ExtractionMode::Structured);
    }

    #[test]
    fn invalid_structured_payload_falls_back_to_text() {
        let payload = json!({"verdict": "MAYBE", "confidence": 10, "justification": "x"});
        let out = extract_verification("Final Verdict: BUY\nConfidence Score: 55%", Some(&payload));
        assert_eq!(out.verdict, "BUY");
        assert_eq!(out.confidence, "55%");
        assert_eq!(out.mode, ExtractionMode::Text);
    }

    #[test]
    fn emphasis_inside_value_is_stripped() {
        let out = extract_from_text("Final Verdict: **BUY** (accept)\nConfidence Score: `70`%");
        assert_eq!(out.verdict, "BUY (accept)");
        assert_eq!(out.confidence, "70%");
        assert_eq!(clean_value("__HOLD__ on pe_ratio").as_deref(), Some("HOLD on pe_ratio"));
    }

    #[test]
    fn numbered_justification_is_kept_until_headlines() {
        let text = "\
Final Verdict: HOLD
Confidence Score: 60%
Justification:
1. Valuation is stretched at 150x earnings.
2. Layoff news adds execution risk.
Supporting Headlines:
1. Company announces layoffs
2. Shares slide after guidance";
        let out = extract_from_text(text);
        assert_eq!(
            out.justification,
            "1. Valuation is stretched at 150x earnings. 2. Layoff news adds execution risk."
        );
        assert!(!out.justification.contains("Final Verdict"));
        assert_eq!(
            out.supporting_headlines,
            vec!["Company announces layoffs", "Shares slide after guidance"]
        );
    }

    #[test]
    fn confidence_out_of_range_or_fractional() {
        assert_eq!(recommendation_confidence("Confidence: 1000%"), None);
        assert_eq!(recommendation_confidence("Confidence: 101"), None);
        assert_eq!(recommendation_confidence("Confidence: 0.85"), Some(85));
        assert_eq!(recommendation_confidence("Confidence: 72.6%"), Some(73));
        assert_eq!(recommendation_confidence("Confidence: 0.5%"), Some(1));
        assert_eq!(recommendation_confidence("**Confidence:** 100%"), Some(100));
    }

    #[test]
    fn recommendation_label_prefers_explicit_line() {
        let text = "Some would sell here.\nRecommendation: **BUY**\nConfidence: 75%";
        assert_eq!(recommendation_label(text), Some(RecommendationLabel::Buy));
        assert_eq!(recommendation_confidence(text), Some(75));
    }

    #[test]
    fn recommendation_label_falls_back_to_first_word() {
        let text = "HOLD for now; wait for earnings.";
        assert_eq!(recommendation_label(text), Some(RecommendationLabel::Hold));
        assert_eq!(recommendation_label("No opinion."), None);
        assert_eq!(recommendation_confidence("Confidence: 250%"), None);
        assert_eq!(recommendation_confidence("no number"), None);
    }
}
