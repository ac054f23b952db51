use crate::domain::financials::{FinancialSnapshot, MetricValue};
use crate::domain::news::NewsItem;
use crate::domain::ticker::Ticker;
use crate::fetch::{FetchError, MarketDataFetcher};

/// Recommendation used by mock runs in place of a model call.
pub const MOCK_RECOMMENDATION: &str = "BUY – Strong EPS, reasonable P/E, and high market cap \
make this a solid investment for long-term growth.";

/// Fixed data for offline runs. Never touches the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockFetcher;

impl MockFetcher {
    pub fn snapshot() -> FinancialSnapshot {
        FinancialSnapshot::new()
            .with("stock_price", MetricValue::Number(341.17))
            .with("pe_ratio", MetricValue::Number(52.3))
            .with("eps_ttm", MetricValue::Number(6.52))
            .with("market_cap", MetricValue::Text("1.2T".to_string()))
            .with("revenue", MetricValue::Text("24.7B".to_string()))
    }

    pub fn news(ticker: &Ticker) -> Vec<NewsItem> {
        vec![
            NewsItem {
                summary: Some("Quarterly deliveries came in ahead of consensus.".to_string()),
                content: Some(
                    "Deliveries rose on strong demand in North America and Europe.".to_string(),
                ),
                ..NewsItem::titled(format!("{ticker} deliveries beat analyst expectations"))
            },
            NewsItem {
                summary: Some("Several brokers lifted their targets after the report.".to_string()),
                ..NewsItem::titled(format!("Analysts raise price targets on {ticker}"))
            },
            NewsItem {
                summary: Some("Management reiterated full-year guidance.".to_string()),
                ..NewsItem::titled(format!("{ticker} reaffirms annual outlook"))
            },
        ]
    }
}

#[async_trait::async_trait]
impl MarketDataFetcher for MockFetcher {
    fn source_name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_financials(&self, ticker: &Ticker) -> Result<FinancialSnapshot, FetchError> {
        ticker.validate().map_err(FetchError::InvalidTicker)?;
        Ok(Self::snapshot())
    }

    async fn fetch_news(&self, ticker: &Ticker) -> Result<Vec<NewsItem>, FetchError> {
        ticker.validate().map_err(FetchError::InvalidTicker)?;
        Ok(Self::news(ticker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::financials::MetricLookup;

    #[tokio::test]
    async fn mock_data_is_deterministic() {
        let t = Ticker::new("tsla");
        let a = MockFetcher.fetch_financials(&t).await.unwrap();
        let b = MockFetcher.fetch_financials(&t).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.lookup_numeric(&["pe_ratio"]), MetricLookup::Value(52.3));

        let news = MockFetcher.fetch_news(&t).await.unwrap();
        assert_eq!(news.len(), 3);
        assert!(news[0].title.starts_with("TSLA"));
    }
}
