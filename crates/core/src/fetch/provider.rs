use crate::config::{env_or, Settings};
use crate::domain::financials::FinancialSnapshot;
use crate::domain::news::NewsItem;
use crate::domain::ticker::Ticker;
use crate::fetch::FetchError;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FINANCIALS_PATH: &str = "/v1/financials";
const DEFAULT_NEWS_PATH: &str = "/v1/news";
const SOURCE_NAME: &str = "data provider";
const MAX_ERROR_BODY_CHARS: usize = 300;

#[async_trait::async_trait]
pub trait MarketDataFetcher: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_financials(&self, ticker: &Ticker) -> Result<FinancialSnapshot, FetchError>;

    /// Most recent first, as the source orders them.
    async fn fetch_news(&self, ticker: &Ticker) -> Result<Vec<NewsItem>, FetchError>;
}

/// Financials and news from an HTTP service keyed by `?ticker=`.
#[derive(Debug, Clone)]
pub struct HttpJsonFetcher {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    financials_path: String,
    news_path: String,
}

impl HttpJsonFetcher {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = settings.require_data_provider_base_url()?.to_string();
        let api_key = settings.data_provider_api_key.clone();

        let timeout_secs = env_or("DATA_PROVIDER_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);

        let financials_path = std::env::var("DATA_PROVIDER_FINANCIALS_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FINANCIALS_PATH.to_string());
        let news_path = std::env::var("DATA_PROVIDER_NEWS_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NEWS_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build data provider http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            financials_path,
            news_path,
        })
    }

    fn url(&self, path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            let value = HeaderValue::from_str(api_key).map_err(|e| FetchError::Unreachable {
                source: SOURCE_NAME,
                detail: format!("invalid DATA_PROVIDER_API_KEY header value: {e}"),
            })?;
            headers.insert("x-api-key", value);
        }
        Ok(headers)
    }

    /// One GET; returns the body and whether it was declared as JSON.
    async fn get(&self, path: &str, ticker: &Ticker) -> Result<(String, bool), FetchError> {
        ticker.validate().map_err(FetchError::InvalidTicker)?;

        let res = self
            .http
            .get(self.url(path))
            .headers(self.headers()?)
            .query(&[("ticker", ticker.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::Unreachable {
                source: SOURCE_NAME,
                detail: e.to_string(),
            })?;

        let status = res.status();
        let is_json = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);
        let text = res.text().await.map_err(|e| FetchError::Unreachable {
            source: SOURCE_NAME,
            detail: format!("failed to read response: {e}"),
        })?;

        if !status.is_success() {
            return Err(FetchError::Upstream {
                source: SOURCE_NAME,
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        Ok((text, is_json))
    }
}

#[async_trait::async_trait]
impl MarketDataFetcher for HttpJsonFetcher {
    fn source_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_financials(&self, ticker: &Ticker) -> Result<FinancialSnapshot, FetchError> {
        let (body, is_json) = self.get(&self.financials_path, ticker).await?;
        let snapshot = parse_financials_body(&body, is_json)?;
        tracing::debug!(%ticker, metrics = snapshot.len(), "fetched financials");
        Ok(snapshot)
    }

    async fn fetch_news(&self, ticker: &Ticker) -> Result<Vec<NewsItem>, FetchError> {
        let (body, _) = self.get(&self.news_path, ticker).await?;
        let items = parse_news_body(&body)?;
        tracing::debug!(%ticker, items = items.len(), "fetched news");
        Ok(items)
    }
}

/// JSON object of metrics, or the scraper's `Key: value` text.
fn parse_financials_body(body: &str, declared_json: bool) -> Result<FinancialSnapshot, FetchError> {
    let trimmed = body.trim();
    if declared_json || trimmed.starts_with('{') {
        let value = serde_json::from_str::<serde_json::Value>(trimmed).map_err(|e| {
            FetchError::Decode {
                source: SOURCE_NAME,
                detail: format!("financials are not valid JSON: {e}"),
            }
        })?;
        return FinancialSnapshot::from_json(&value).ok_or_else(|| FetchError::Decode {
            source: SOURCE_NAME,
            detail: "financials JSON is not an object".to_string(),
        });
    }

    let snapshot = FinancialSnapshot::parse_key_value_text(trimmed);
    if snapshot.is_empty() {
        return Err(FetchError::Decode {
            source: SOURCE_NAME,
            detail: "financials body contained no `key: value` lines".to_string(),
        });
    }
    Ok(snapshot)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NewsBody {
    List(Vec<NewsItem>),
    Wrapped { items: Vec<NewsItem> },
}

fn parse_news_body(body: &str) -> Result<Vec<NewsItem>, FetchError> {
    let parsed = serde_json::from_str::<NewsBody>(body.trim()).map_err(|e| FetchError::Decode {
        source: SOURCE_NAME,
        detail: format!("news is not a list of items: {e}"),
    })?;
    let items = match parsed {
        NewsBody::List(items) | NewsBody::Wrapped { items } => items,
    };
    Ok(items
        .into_iter()
        .filter(|n| !n.title.trim().is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::financials::{MetricLookup, MetricValue};
    use serde_json::json;

    #[test]
    fn parses_json_financials() {
        let body = json!({"pe_ratio": 52.3, "market_cap": "1.2T"}).to_string();
        let snap = parse_financials_body(&body, true).unwrap();
        assert_eq!(snap.lookup_numeric(&["pe_ratio"]), MetricLookup::Value(52.3));
        assert_eq!(snap.get("market_cap"), Some(&MetricValue::Text("1.2T".into())));
    }

    #[test]
    fn parses_text_financials() {
        let body = "Stock Price: 341.17\nP/E Ratio: 52.3\n";
        let snap = parse_financials_body(body, false).unwrap();
        assert_eq!(snap.len(), 2);
    }

    #[test]
    fn rejects_unusable_financials() {
        assert!(matches!(
            parse_financials_body("<html>oops</html>", false),
            Err(FetchError::Decode { .. })
        ));
        assert!(matches!(
            parse_financials_body("[1,2,3]", true),
            Err(FetchError::Decode { .. })
        ));
    }

    #[test]
    fn parses_news_list_and_wrapped_forms() {
        let list = json!([
            {"title": "Deliveries beat", "summary": "Q4 strong"},
            {"title": "  "},
        ])
        .to_string();
        let items = parse_news_body(&list).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].summary.as_deref(), Some("Q4 strong"));

        let wrapped = json!({"items": [{"title": "Layoffs announced", "body": "details"}]}).to_string();
        let items = parse_news_body(&wrapped).unwrap();
        assert_eq!(items[0].content.as_deref(), Some("details"));
    }

    #[test]
    fn rejects_non_news_json() {
        assert!(parse_news_body("{\"error\": \"rate limited\"}").is_err());
    }

    #[tokio::test]
    async fn invalid_ticker_fails_before_any_request() {
        let fetcher = HttpJsonFetcher {
            http: reqwest::Client::new(),
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
            financials_path: DEFAULT_FINANCIALS_PATH.to_string(),
            news_path: DEFAULT_NEWS_PATH.to_string(),
        };
        let err = fetcher
            .fetch_financials(&Ticker::new("NOT A TICKER"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidTicker(_)));
    }
}
