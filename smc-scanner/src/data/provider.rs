//! Market data provider abstraction.
//!
//! Defines the `MarketDataProvider` trait the screeners and the pattern
//! analyzer are fed through. Implementations own their transport and any
//! caching; the core only sees this contract.

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use tracing::{debug, warn};

use super::{CandleSeries, Market, MarketSnapshot, Quote, RisingStock};

/// Extra calendar days fetched beyond the lookback to cover non-trading days.
const HISTORY_PADDING_DAYS: i64 = 30;

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Data not available for the requested ticker/date
    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    /// Provider is temporarily unavailable
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Provider returned rows that violate the data model
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Backing store failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying on a later run)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Unavailable(_))
    }
}

impl From<super::SeriesError> for ProviderError {
    fn from(err: super::SeriesError) -> Self {
        Self::InvalidData(err.to_string())
    }
}

// ============================================================================
// Data Provider Trait
// ============================================================================

/// Trait for market data providers.
///
/// Every method is a pull; failures for one ticker are reported as
/// `ProviderError` and never poison later calls.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Get the provider name (e.g., "sqlite")
    fn name(&self) -> &'static str;

    /// Fetch daily candles for a ticker in `[start, end]`, oldest first.
    async fn get_daily_candles(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CandleSeries, ProviderError>;

    /// Fetch the latest realtime quote for a ticker.
    async fn get_latest_quote(&self, ticker: &str) -> Result<Quote, ProviderError>;

    /// Fetch every ticker's OHLCV for one trading date.
    ///
    /// Returns an empty snapshot on non-trading days.
    async fn get_market_snapshot(
        &self,
        date: NaiveDate,
        market: Market,
    ) -> Result<MarketSnapshot, ProviderError>;

    /// Look up a ticker's display name. `None` for unknown tickers.
    async fn get_ticker_name(&self, ticker: &str) -> Result<Option<String>, ProviderError>;

    /// Fetch today's top risers for a market segment, highest change first.
    async fn get_rising_stocks(
        &self,
        market: Market,
        limit: usize,
    ) -> Result<Vec<RisingStock>, ProviderError>;

    /// History ending at `as_of`, with that day's realtime quote merged in.
    ///
    /// Fetches `lookback + 30` calendar days, folds the latest quote into
    /// the series when the quote belongs to `as_of`, and keeps the last
    /// `lookback` candles. A failing quote leaves the history unmerged.
    async fn get_history_as_of(
        &self,
        ticker: &str,
        lookback: usize,
        as_of: NaiveDate,
    ) -> Result<CandleSeries, ProviderError> {
        let start = as_of - Duration::days(lookback as i64 + HISTORY_PADDING_DAYS);
        let mut series = self.get_daily_candles(ticker, start, as_of).await?;

        match self.get_latest_quote(ticker).await {
            Ok(quote) => {
                let quote_date = quote.as_of.unwrap_or_else(|| Local::now().date_naive());
                if quote_date == as_of && !series.merge_quote(&quote, as_of) {
                    debug!(ticker, %as_of, "Quote older than stored history, not merged");
                }
            }
            Err(e) => {
                warn!(ticker, error = %e, "Realtime quote unavailable, using stored history");
            }
        }

        Ok(series.tail(lookback))
    }

    /// History ending today (local date).
    async fn get_history(
        &self,
        ticker: &str,
        lookback: usize,
    ) -> Result<CandleSeries, ProviderError> {
        self.get_history_as_of(ticker, lookback, Local::now().date_naive())
            .await
    }
}
