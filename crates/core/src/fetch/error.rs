use std::fmt;

/// Why financials or news could not be obtained. The pipeline renders any of
/// these inline and carries on; the variants exist for logs and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    InvalidTicker(String),
    Unreachable { source: &'static str, detail: String },
    Upstream { source: &'static str, status: u16, body: String },
    Decode { source: &'static str, detail: String },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::InvalidTicker(detail) => write!(f, "invalid ticker: {detail}"),
            FetchError::Unreachable { source, detail } => {
                write!(f, "{source} unreachable: {detail}")
            }
            FetchError::Upstream {
                source,
                status,
                body,
            } => write!(f, "{source} returned HTTP {status}: {body}"),
            FetchError::Decode { source, detail } => {
                write!(f, "{source} response could not be decoded: {detail}")
            }
        }
    }
}

impl std::error::Error for FetchError {}
