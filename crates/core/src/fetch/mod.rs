pub mod error;
pub mod mock;
pub mod provider;

pub use error::FetchError;
pub use provider::{HttpJsonFetcher, MarketDataFetcher};
