pub mod contract;
pub mod financials;
pub mod news;
pub mod recommendation;
pub mod report;
pub mod ticker;
pub mod verification;
