use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    /// Numeric reading of the value. Text is parsed leniently: currency signs,
    /// thousands separators, trailing `%`/`x` and T/B/M/K magnitude suffixes
    /// are understood.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) if n.is_finite() => Some(*n),
            MetricValue::Number(_) => None,
            MetricValue::Text(s) => parse_number(s),
        }
    }

    fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map(MetricValue::Number),
            serde_json::Value::String(s) => Some(MetricValue::Text(s.trim().to_string())),
            serde_json::Value::Bool(b) => Some(MetricValue::Text(b.to_string())),
            serde_json::Value::Null => None,
            other => Some(MetricValue::Text(other.to_string())),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(n) => write!(f, "{n}"),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

/// Outcome of looking a metric up for rule evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricLookup {
    Value(f64),
    Missing,
    Unparseable(String),
}

/// Metric name to value. Keys are whatever the source produced, normalised
/// with [`normalize_key`]; nothing is guaranteed to be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinancialSnapshot {
    metrics: BTreeMap<String, MetricValue>,
}

impl FinancialSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: MetricValue) {
        self.metrics.insert(normalize_key(key), value);
    }

    pub fn with(mut self, key: &str, value: MetricValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.metrics.get(&normalize_key(key))
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// First of `aliases` present in the snapshot, read as a number.
    pub fn lookup_numeric(&self, aliases: &[&str]) -> MetricLookup {
        let Some(value) = aliases.iter().find_map(|k| self.get(k)) else {
            return MetricLookup::Missing;
        };
        match value.as_f64() {
            Some(n) => MetricLookup::Value(n),
            None => MetricLookup::Unparseable(value.to_string()),
        }
    }

    /// Builds a snapshot from a JSON object, either bare or wrapped as
    /// `{"metrics": {...}}`. Nulls are dropped.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let obj = match obj.get("metrics").and_then(|m| m.as_object()) {
            Some(inner) => inner,
            None => obj,
        };

        let mut out = Self::new();
        for (k, v) in obj {
            if let Some(mv) = MetricValue::from_json(v) {
                out.insert(k, mv);
            }
        }
        Some(out)
    }

    /// Parses the scraper's `Key: value` text format, one metric per line.
    /// Lines without a colon are ignored.
    pub fn parse_key_value_text(text: &str) -> Self {
        let mut out = Self::new();
        for line in text.trim().lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            let value = value.trim();
            let mv = match value.parse::<f64>() {
                Ok(n) if n.is_finite() => MetricValue::Number(n),
                _ => MetricValue::Text(value.to_string()),
            };
            out.insert(key, mv);
        }
        out
    }

    /// `key: value` lines, in key order.
    pub fn to_prompt_text(&self) -> String {
        self.metrics
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '/' { '_' } else { c })
        .collect()
}

fn parse_number(raw: &str) -> Option<f64> {
    let mut s: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | ' '))
        .collect();
    if s.is_empty() {
        return None;
    }

    if s.ends_with('%') || s.ends_with('x') || s.ends_with('X') {
        s.pop();
    }

    let multiplier = match s.chars().last()? {
        'T' | 't' => 1e12,
        'B' | 'b' => 1e9,
        'M' | 'm' => 1e6,
        'K' | 'k' => 1e3,
        _ => 1.0,
    };
    if multiplier != 1.0 {
        s.pop();
    }

    s.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(|n| n * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_scraper_text_block() {
        let text = "Stock Price: 341.17\nP/E Ratio: 52.3\nMarket Cap: 1.2T\nnot a metric line\n";
        let snap = FinancialSnapshot::parse_key_value_text(text);
        assert_eq!(snap.len(), 3);
        assert_eq!(snap.get("stock_price"), Some(&MetricValue::Number(341.17)));
        assert_eq!(snap.get("p_e_ratio"), Some(&MetricValue::Number(52.3)));
        assert_eq!(
            snap.get("market_cap"),
            Some(&MetricValue::Text("1.2T".to_string()))
        );
    }

    #[test]
    fn text_values_parse_with_suffixes() {
        let close = |raw: &str, expected: f64| {
            let got = MetricValue::Text(raw.into()).as_f64().unwrap();
            assert!((got - expected).abs() / expected < 1e-9, "{raw} -> {got}");
        };
        close("1.2T", 1.2e12);
        close("$24.7B", 24.7e9);
        close("850K", 850_000.0);
        assert_eq!(MetricValue::Text("1,234.5".into()).as_f64(), Some(1234.5));
        assert_eq!(MetricValue::Text("12%".into()).as_f64(), Some(12.0));
        assert_eq!(MetricValue::Text("N/A".into()).as_f64(), None);
        assert_eq!(MetricValue::Text("".into()).as_f64(), None);
    }

    #[test]
    fn lookup_reports_missing_and_unparseable_separately() {
        let snap = FinancialSnapshot::new()
            .with("pe_ratio", MetricValue::Text("N/A".into()))
            .with("eps_ttm", MetricValue::Number(6.52));

        assert_eq!(
            snap.lookup_numeric(&["pe_ratio"]),
            MetricLookup::Unparseable("N/A".to_string())
        );
        assert_eq!(snap.lookup_numeric(&["revenue"]), MetricLookup::Missing);
        assert_eq!(
            snap.lookup_numeric(&["eps", "eps_ttm"]),
            MetricLookup::Value(6.52)
        );
    }

    #[test]
    fn from_json_accepts_wrapped_and_bare_objects() {
        let bare = json!({"P/E Ratio": 150.0, "market_cap": "2T", "dividend": null});
        let snap = FinancialSnapshot::from_json(&bare).unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.lookup_numeric(&["p_e_ratio"]), MetricLookup::Value(150.0));

        let wrapped = json!({"ticker": "TSLA", "metrics": {"pe_ratio": 50}});
        let snap = FinancialSnapshot::from_json(&wrapped).unwrap();
        assert_eq!(snap.len(), 1);

        assert!(FinancialSnapshot::from_json(&json!([1, 2])).is_none());
    }

    #[test]
    fn prompt_text_is_key_value_lines() {
        let snap = FinancialSnapshot::new()
            .with("revenue", MetricValue::Text("24.7B".into()))
            .with("eps_ttm", MetricValue::Number(6.52));
        assert_eq!(snap.to_prompt_text(), "eps_ttm: 6.52\nrevenue: 24.7B");
    }
}
