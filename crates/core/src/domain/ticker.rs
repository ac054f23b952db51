use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_TICKER_LEN: usize = 12;

/// Exchange symbol as supplied by the caller, trimmed and upper-cased.
///
/// Construction never fails; whether the symbol is usable is decided by the
/// fetcher (see [`Ticker::validate`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticker(String);

impl Ticker {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.0.is_empty() {
            return Err("ticker must be non-empty".to_string());
        }
        if self.0.len() > MAX_TICKER_LEN {
            return Err(format!(
                "ticker longer than {MAX_TICKER_LEN} characters: {}",
                self.0
            ));
        }
        if let Some(bad) = self
            .0
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=')))
        {
            return Err(format!("ticker contains invalid character {bad:?}: {}", self.0));
        }
        Ok(())
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
