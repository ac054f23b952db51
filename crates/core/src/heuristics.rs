//! Static rule checks over fetched data, independent of the model.

use crate::config::{env_flag, env_or};
use crate::domain::financials::{FinancialSnapshot, MetricLookup};
use serde::{Deserialize, Serialize};
use std::fmt;

const DEFAULT_PE_THRESHOLD: f64 = 100.0;
const DEFAULT_RISK_TERMS: [&str; 3] = ["SEC investigation", "fraud", "layoffs"];

const PE_ALIASES: [&str; 5] = ["pe_ratio", "p_e_ratio", "pe", "trailing_pe", "pe_ratio_ttm"];

/// Human-readable warning. No severity or id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeuristicFlag(String);

impl HeuristicFlag {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HeuristicFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What to do when a metric a rule needs is absent or not a number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnavailableMetricPolicy {
    #[default]
    Skip,
    Flag,
}

#[derive(Debug, Clone)]
pub struct HeuristicRules {
    pub pe_threshold: f64,
    pub risk_terms: Vec<String>,
    pub unavailable: UnavailableMetricPolicy,
}

impl Default for HeuristicRules {
    fn default() -> Self {
        Self {
            pe_threshold: DEFAULT_PE_THRESHOLD,
            risk_terms: DEFAULT_RISK_TERMS.iter().map(|s| s.to_string()).collect(),
            unavailable: UnavailableMetricPolicy::Skip,
        }
    }
}

impl HeuristicRules {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        out.pe_threshold = env_or("HEURISTIC_PE_THRESHOLD", out.pe_threshold);

        if let Ok(s) = std::env::var("HEURISTIC_RISK_TERMS") {
            let terms: Vec<String> = s
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if !terms.is_empty() {
                out.risk_terms = terms;
            }
        }

        if env_flag("HEURISTIC_FLAG_UNAVAILABLE", false) {
            out.unavailable = UnavailableMetricPolicy::Flag;
        }

        out
    }

    /// Runs every rule. `financials` is `None` when the fetch failed.
    pub fn evaluate(
        &self,
        financials: Option<&FinancialSnapshot>,
        news_text: &str,
    ) -> Vec<HeuristicFlag> {
        let mut flags = Vec::new();

        let pe = financials
            .map(|f| f.lookup_numeric(&PE_ALIASES))
            .unwrap_or(MetricLookup::Missing);
        if let Some(flag) = self.check_pe(&pe) {
            flags.push(flag);
        }

        flags.extend(self.check_risk_terms(news_text));

        tracing::debug!(flags = flags.len(), "heuristic evaluation finished");
        flags
    }

    fn check_pe(&self, pe: &MetricLookup) -> Option<HeuristicFlag> {
        match pe {
            MetricLookup::Value(v) if *v > self.pe_threshold => Some(HeuristicFlag::new(format!(
                "High P/E ratio ({v}) exceeds {}; valuation may be stretched",
                self.pe_threshold
            ))),
            MetricLookup::Value(_) => None,
            MetricLookup::Missing => match self.unavailable {
                UnavailableMetricPolicy::Skip => None,
                UnavailableMetricPolicy::Flag => {
                    Some(HeuristicFlag::new("P/E ratio unavailable; valuation check skipped"))
                }
            },
            MetricLookup::Unparseable(raw) => {
                tracing::debug!(raw = %raw, "P/E ratio is not numeric");
                match self.unavailable {
                    UnavailableMetricPolicy::Skip => None,
                    UnavailableMetricPolicy::Flag => Some(HeuristicFlag::new(format!(
                        "P/E ratio unavailable ({raw:?} is not numeric); valuation check skipped"
                    ))),
                }
            }
        }
    }

    fn check_risk_terms(&self, news_text: &str) -> Vec<HeuristicFlag> {
        let haystack = news_text.to_lowercase();
        self.risk_terms
            .iter()
            .filter(|term| haystack.contains(&term.to_lowercase()))
            .map(|term| HeuristicFlag::new(format!("Risk term in recent news: \"{term}\"")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::financials::MetricValue;

    fn with_pe(v: MetricValue) -> FinancialSnapshot {
        FinancialSnapshot::new().with("pe_ratio", v)
    }

    #[test]
    fn flags_pe_above_threshold() {
        let rules = HeuristicRules::default();
        let flags = rules.evaluate(Some(&with_pe(MetricValue::Number(150.0))), "");
        assert_eq!(flags.len(), 1);
        assert!(flags[0].as_str().contains("P/E"));
    }

    #[test]
    fn no_flag_for_moderate_pe() {
        let rules = HeuristicRules::default();
        assert!(rules
            .evaluate(Some(&with_pe(MetricValue::Number(50.0))), "")
            .is_empty());
        // Exactly at the threshold is not "exceeds".
        assert!(rules
            .evaluate(Some(&with_pe(MetricValue::Number(100.0))), "")
            .is_empty());
    }

    #[test]
    fn reads_pe_from_text_and_aliases() {
        let rules = HeuristicRules::default();
        let snap = FinancialSnapshot::new().with("P/E Ratio", MetricValue::Text("212.4".into()));
        assert_eq!(rules.evaluate(Some(&snap), "").len(), 1);
    }

    #[test]
    fn flags_risk_terms_case_insensitively() {
        let rules = HeuristicRules::default();
        let flags = rules.evaluate(None, "Company announces LAYOFFS across divisions");
        assert_eq!(flags.len(), 1);
        assert!(flags[0].as_str().contains("layoffs"));

        let flags = rules.evaluate(None, "Regulators open an sec Investigation into fraud claims");
        assert_eq!(flags.len(), 2);

        assert!(rules.evaluate(None, "Record quarterly deliveries").is_empty());
    }

    #[test]
    fn unparseable_pe_is_skipped_by_default() {
        let rules = HeuristicRules::default();
        let snap = with_pe(MetricValue::Text("N/A".into()));
        assert!(rules.evaluate(Some(&snap), "").is_empty());
        assert!(rules.evaluate(None, "").is_empty());
    }

    #[test]
    fn unavailable_policy_surfaces_missing_pe() {
        let rules = HeuristicRules {
            unavailable: UnavailableMetricPolicy::Flag,
            ..HeuristicRules::default()
        };
        let flags = rules.evaluate(Some(&with_pe(MetricValue::Text("N/A".into()))), "");
        assert_eq!(flags.len(), 1);
        assert!(flags[0].as_str().contains("unavailable"));

        let flags = rules.evaluate(None, "");
        assert_eq!(flags.len(), 1);
    }

    #[test]
    fn custom_threshold_and_terms() {
        let rules = HeuristicRules {
            pe_threshold: 40.0,
            risk_terms: vec!["recall".to_string()],
            ..HeuristicRules::default()
        };
        let flags = rules.evaluate(
            Some(&with_pe(MetricValue::Number(50.0))),
            "Automaker issues recall; layoffs rumored",
        );
        assert_eq!(flags.len(), 2);
    }
}
