//! Market data module.
//!
//! Daily OHLCV candles, realtime quotes and full-market snapshots, plus the
//! provider contract the screeners depend on.
//!
//! # Components
//! - **provider**: the `MarketDataProvider` contract and its error type
//! - **cache**: explicit TTL cache and a memoizing provider wrapper
//! - **theme**: static ticker → theme tag catalog
//! - **calendar**: trading-date resolution from snapshot availability
//! - **local_storage**: SQLite-backed provider implementation

mod cache;
mod calendar;
pub mod local_storage;
mod provider;
mod theme;

pub use cache::{CacheStats, CachedProvider, DataCache};
pub use calendar::{latest_trading_date, previous_trading_date, previous_trading_snapshot};
pub use local_storage::{LocalStorage, LocalStorageConfig};
pub use provider::{MarketDataProvider, ProviderError};
pub use theme::ThemeCatalog;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;

// ============================================================================
// Market
// ============================================================================

/// Exchange segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Kospi,
    Kosdaq,
    /// Every listed ticker regardless of segment
    All,
}

impl Market {
    /// Storage / wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kospi => "kospi",
            Self::Kosdaq => "kosdaq",
            Self::All => "all",
        }
    }

    /// Parse from a case-insensitive identifier.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "kospi" => Some(Self::Kospi),
            "kosdaq" => Some(Self::Kosdaq),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kospi => write!(f, "KOSPI"),
            Self::Kosdaq => write!(f, "KOSDAQ"),
            Self::All => write!(f, "ALL"),
        }
    }
}

// ============================================================================
// Candle
// ============================================================================

/// A single daily candlestick (OHLCV).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Trading day
    pub date: NaiveDate,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume (shares)
    pub volume: f64,
}

impl Candle {
    /// Check if this is a bullish (up) candle
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Check if this is a bearish (down) candle
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Get the candle body size
    pub fn body_size(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Get the full range (high - low)
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

// ============================================================================
// Candle Series
// ============================================================================

/// Invariant violations when building a [`CandleSeries`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("{ticker}: duplicate candle for {date}")]
    DuplicateDate { ticker: String, date: NaiveDate },

    #[error("{ticker}: candle {date} is older than its predecessor {previous}")]
    OutOfOrder {
        ticker: String,
        date: NaiveDate,
        previous: NaiveDate,
    },
}

/// Ordered daily candles for one ticker. Dates are strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandleSeries {
    ticker: String,
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series, rejecting duplicate or out-of-order dates.
    pub fn new(ticker: impl Into<String>, candles: Vec<Candle>) -> Result<Self, SeriesError> {
        let ticker = ticker.into();
        for pair in candles.windows(2) {
            let (previous, current) = (pair[0].date, pair[1].date);
            if current == previous {
                return Err(SeriesError::DuplicateDate {
                    ticker,
                    date: current,
                });
            }
            if current < previous {
                return Err(SeriesError::OutOfOrder {
                    ticker,
                    date: current,
                    previous,
                });
            }
        }
        Ok(Self { ticker, candles })
    }

    /// Build a series from rows in any order; later duplicates win.
    pub fn from_unsorted(ticker: impl Into<String>, mut candles: Vec<Candle>) -> Self {
        // Stable sort keeps arrival order among equal dates.
        candles.sort_by_key(|c| c.date);
        let mut deduped: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            match deduped.last_mut() {
                Some(last) if last.date == candle.date => *last = candle,
                _ => deduped.push(candle),
            }
        }
        Self {
            ticker: ticker.into(),
            candles: deduped,
        }
    }

    /// An empty series.
    pub fn empty(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            candles: Vec::new(),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// Fold a realtime quote into the series as the candle for `date`.
    ///
    /// Overwrites the last candle when it is already dated `date`, appends
    /// otherwise. A quote older than the last candle is rejected and the
    /// series is left untouched. Zero open/high/low fall back to the price.
    pub fn merge_quote(&mut self, quote: &Quote, date: NaiveDate) -> bool {
        let or_price = |v: f64| if v > 0.0 { v } else { quote.price };
        let candle = Candle {
            date,
            open: or_price(quote.open),
            high: or_price(quote.high),
            low: or_price(quote.low),
            close: quote.price,
            volume: quote.volume,
        };

        match self.candles.last_mut() {
            Some(last) if last.date == date => {
                *last = candle;
                true
            }
            Some(last) if last.date > date => false,
            _ => {
                self.candles.push(candle);
                true
            }
        }
    }

    /// Keep only the last `n` candles.
    pub fn tail(mut self, n: usize) -> Self {
        if self.candles.len() > n {
            self.candles.drain(..self.candles.len() - n);
        }
        self
    }

    /// Keep candles dated on or before `date`.
    pub fn truncate_after(mut self, date: NaiveDate) -> Self {
        self.candles.retain(|c| c.date <= date);
        self
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

impl Deref for CandleSeries {
    type Target = [Candle];

    fn deref(&self) -> &Self::Target {
        &self.candles
    }
}

// ============================================================================
// Quotes and Snapshots
// ============================================================================

/// Realtime quote snapshot for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Ticker code
    pub ticker: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Last price
    pub price: f64,
    /// Previous close
    #[serde(default)]
    pub prev_close: Option<f64>,
    /// Change from previous close (%)
    pub change_pct: f64,
    /// Day's volume (shares)
    pub volume: f64,
    /// Day's traded value (currency units)
    #[serde(default)]
    pub traded_value: f64,
    /// Day's open
    #[serde(default)]
    pub open: f64,
    /// Day's high
    #[serde(default)]
    pub high: f64,
    /// Day's low
    #[serde(default)]
    pub low: f64,
    /// Trading day the quote belongs to; `None` means the local current date
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

/// Entry of a market-wide "top risers" list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RisingStock {
    pub ticker: String,
    pub name: String,
    pub price: f64,
    pub change_pct: f64,
    pub market: Market,
}

/// One ticker's row in a full-market snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Traded value (currency units)
    pub traded_value: f64,
}

/// All tickers' OHLCV for one trading date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub date: NaiveDate,
    pub market: Market,
    pub rows: BTreeMap<String, SnapshotRow>,
}

impl MarketSnapshot {
    pub fn new(date: NaiveDate, market: Market) -> Self {
        Self {
            date,
            market,
            rows: BTreeMap::new(),
        }
    }

    pub fn get(&self, ticker: &str) -> Option<&SnapshotRow> {
        self.rows.get(ticker)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of volume across all rows. Zero on holidays.
    pub fn total_volume(&self) -> f64 {
        self.rows.values().map(|r| r.volume).sum()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn candle(d: u32, close: f64) -> Candle {
        Candle {
            date: day(d),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        }
    }

    fn quote(price: f64) -> Quote {
        Quote {
            ticker: "005930".into(),
            name: "Samsung".into(),
            price,
            prev_close: Some(100.0),
            change_pct: 1.0,
            volume: 5000.0,
            traded_value: price * 5000.0,
            open: 0.0,
            high: price + 2.0,
            low: 0.0,
            as_of: None,
        }
    }

    #[test]
    fn test_candle_direction() {
        let mut c = candle(1, 100.0);
        assert!(!c.is_bullish() && !c.is_bearish());
        c.close = 101.0;
        assert!(c.is_bullish());
        assert_eq!(c.body_size(), 1.0);
        assert_eq!(c.range(), 2.0);
    }

    #[test]
    fn test_series_rejects_duplicates_and_disorder() {
        let dup = CandleSeries::new("A", vec![candle(1, 1.0), candle(1, 2.0)]);
        assert!(matches!(dup, Err(SeriesError::DuplicateDate { .. })));

        let disorder = CandleSeries::new("A", vec![candle(2, 1.0), candle(1, 2.0)]);
        assert!(matches!(disorder, Err(SeriesError::OutOfOrder { .. })));
    }

    #[test]
    fn test_from_unsorted_last_duplicate_wins() {
        let series =
            CandleSeries::from_unsorted("A", vec![candle(3, 3.0), candle(1, 1.0), candle(3, 9.0)]);
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].close, 9.0);
    }

    #[test]
    fn test_merge_quote_overwrites_same_day() {
        let mut series = CandleSeries::new("A", vec![candle(1, 100.0), candle(2, 101.0)]).unwrap();
        assert!(series.merge_quote(&quote(105.0), day(2)));
        assert_eq!(series.len(), 2);

        let last = series.last().unwrap();
        assert_eq!(last.close, 105.0);
        assert_eq!(last.open, 105.0);
        assert_eq!(last.low, 105.0);
        assert_eq!(last.high, 107.0);
        assert_eq!(last.volume, 5000.0);
    }

    #[test]
    fn test_merge_quote_appends_new_day() {
        let mut series = CandleSeries::new("A", vec![candle(1, 100.0)]).unwrap();
        assert!(series.merge_quote(&quote(105.0), day(2)));
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().date, day(2));
    }

    #[test]
    fn test_merge_quote_ignores_stale_date() {
        let mut series = CandleSeries::new("A", vec![candle(5, 100.0)]).unwrap();
        assert!(!series.merge_quote(&quote(105.0), day(4)));
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].close, 100.0);
    }

    #[test]
    fn test_tail_and_truncate() {
        let series =
            CandleSeries::new("A", (1..=10).map(|d| candle(d, d as f64)).collect()).unwrap();
        let tail = series.clone().tail(3);
        assert_eq!(tail.closes(), vec![8.0, 9.0, 10.0]);

        let cut = series.truncate_after(day(4));
        assert_eq!(cut.len(), 4);
    }

    #[test]
    fn test_snapshot_total_volume() {
        let mut snapshot = MarketSnapshot::new(day(1), Market::Kospi);
        assert_eq!(snapshot.total_volume(), 0.0);
        snapshot.rows.insert(
            "A".into(),
            SnapshotRow {
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 10.0,
                traded_value: 10.0,
            },
        );
        assert_eq!(snapshot.total_volume(), 10.0);
        assert_eq!(Market::parse("KOSDAQ"), Some(Market::Kosdaq));
    }
}
