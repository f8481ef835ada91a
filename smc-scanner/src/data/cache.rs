//! Data cache for market data.
//!
//! Provides in-memory caching with TTL so repeated requests for the same
//! ticker within one scan hit the provider once. The cache is an explicit
//! object owned by [`CachedProvider`]; nothing here is process-global.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use super::{CandleSeries, Market, MarketDataProvider, MarketSnapshot, ProviderError, Quote, RisingStock};

/// Cache entry with TTL
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn new(data: T, ttl_secs: i64) -> Self {
        Self {
            data,
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

type Slot<T> = RwLock<HashMap<String, CacheEntry<T>>>;

fn read_slot<T: Clone>(slot: &Slot<T>, key: &str) -> Option<T> {
    let map = slot.read().ok()?;
    map.get(key)
        .filter(|entry| !entry.is_expired())
        .map(|entry| entry.data.clone())
}

fn write_slot<T>(slot: &Slot<T>, key: String, data: T, ttl_secs: i64) {
    if let Ok(mut map) = slot.write() {
        map.insert(key, CacheEntry::new(data, ttl_secs));
    }
}

/// Market data cache
pub struct DataCache {
    /// History cache: key = "ticker:lookback:as_of"
    histories: Slot<CandleSeries>,
    /// Candle range cache: key = "ticker:start:end"
    ranges: Slot<CandleSeries>,
    /// Quote cache: key = ticker
    quotes: Slot<Quote>,
    /// Name cache: key = ticker
    names: Slot<Option<String>>,
    /// Snapshot cache: key = "date:market"
    snapshots: Slot<MarketSnapshot>,
    /// TTL in seconds
    ttl: i64,
}

impl DataCache {
    /// Create a new data cache (15 minute TTL)
    pub fn new() -> Self {
        Self::with_ttl(15 * 60)
    }

    /// Create with custom TTL
    pub fn with_ttl(ttl_secs: i64) -> Self {
        Self {
            histories: RwLock::new(HashMap::new()),
            ranges: RwLock::new(HashMap::new()),
            quotes: RwLock::new(HashMap::new()),
            names: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(HashMap::new()),
            ttl: ttl_secs,
        }
    }

    fn history_key(ticker: &str, lookback: usize, as_of: NaiveDate) -> String {
        format!("{}:{}:{}", ticker, lookback, as_of)
    }

    fn range_key(ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!("{}:{}:{}", ticker, start, end)
    }

    fn snapshot_key(date: NaiveDate, market: Market) -> String {
        format!("{}:{}", date, market.as_str())
    }

    pub fn get_history(&self, ticker: &str, lookback: usize, as_of: NaiveDate) -> Option<CandleSeries> {
        read_slot(&self.histories, &Self::history_key(ticker, lookback, as_of))
    }

    pub fn set_history(&self, lookback: usize, as_of: NaiveDate, series: CandleSeries) {
        let key = Self::history_key(series.ticker(), lookback, as_of);
        write_slot(&self.histories, key, series, self.ttl);
    }

    pub fn get_range(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Option<CandleSeries> {
        read_slot(&self.ranges, &Self::range_key(ticker, start, end))
    }

    pub fn set_range(&self, start: NaiveDate, end: NaiveDate, series: CandleSeries) {
        let key = Self::range_key(series.ticker(), start, end);
        write_slot(&self.ranges, key, series, self.ttl);
    }

    pub fn get_quote(&self, ticker: &str) -> Option<Quote> {
        read_slot(&self.quotes, ticker)
    }

    pub fn set_quote(&self, quote: Quote) {
        write_slot(&self.quotes, quote.ticker.clone(), quote, self.ttl);
    }

    pub fn get_name(&self, ticker: &str) -> Option<Option<String>> {
        read_slot(&self.names, ticker)
    }

    pub fn set_name(&self, ticker: &str, name: Option<String>) {
        write_slot(&self.names, ticker.to_string(), name, self.ttl);
    }

    pub fn get_snapshot(&self, date: NaiveDate, market: Market) -> Option<MarketSnapshot> {
        read_slot(&self.snapshots, &Self::snapshot_key(date, market))
    }

    pub fn set_snapshot(&self, snapshot: MarketSnapshot) {
        let key = Self::snapshot_key(snapshot.date, snapshot.market);
        write_slot(&self.snapshots, key, snapshot, self.ttl);
    }

    /// Clear all expired entries
    pub fn clear_expired(&self) {
        fn prune<T>(slot: &Slot<T>) {
            if let Ok(mut map) = slot.write() {
                map.retain(|_, entry| !entry.is_expired());
            }
        }
        prune(&self.histories);
        prune(&self.ranges);
        prune(&self.quotes);
        prune(&self.names);
        prune(&self.snapshots);
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        fn count<T>(slot: &Slot<T>) -> (usize, usize) {
            slot.read()
                .map(|map| (map.len(), map.values().filter(|e| e.is_expired()).count()))
                .unwrap_or((0, 0))
        }
        let (total, expired) = [
            count(&self.histories),
            count(&self.ranges),
            count(&self.quotes),
            count(&self.names),
            count(&self.snapshots),
        ]
        .iter()
        .fold((0, 0), |acc, (t, e)| (acc.0 + t, acc.1 + e));

        CacheStats {
            total_entries: total,
            expired_entries: expired,
            active_entries: total - expired,
        }
    }
}

impl Default for DataCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
}

// ============================================================================
// Cached Provider
// ============================================================================

/// Provider wrapper that memoizes responses in a [`DataCache`].
///
/// Rising-stock lists are always fetched fresh. Errors are never cached.
pub struct CachedProvider<P: MarketDataProvider> {
    inner: P,
    cache: Arc<DataCache>,
}

impl<P: MarketDataProvider> CachedProvider<P> {
    pub fn new(inner: P, cache: Arc<DataCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &DataCache {
        &self.cache
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: MarketDataProvider> MarketDataProvider for CachedProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn get_daily_candles(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CandleSeries, ProviderError> {
        if let Some(series) = self.cache.get_range(ticker, start, end) {
            return Ok(series);
        }
        let series = self.inner.get_daily_candles(ticker, start, end).await?;
        self.cache.set_range(start, end, series.clone());
        Ok(series)
    }

    async fn get_latest_quote(&self, ticker: &str) -> Result<Quote, ProviderError> {
        if let Some(quote) = self.cache.get_quote(ticker) {
            return Ok(quote);
        }
        let quote = self.inner.get_latest_quote(ticker).await?;
        self.cache.set_quote(quote.clone());
        Ok(quote)
    }

    async fn get_market_snapshot(
        &self,
        date: NaiveDate,
        market: Market,
    ) -> Result<MarketSnapshot, ProviderError> {
        if let Some(snapshot) = self.cache.get_snapshot(date, market) {
            debug!(%date, %market, "Snapshot cache hit");
            return Ok(snapshot);
        }
        let snapshot = self.inner.get_market_snapshot(date, market).await?;
        self.cache.set_snapshot(snapshot.clone());
        Ok(snapshot)
    }

    async fn get_ticker_name(&self, ticker: &str) -> Result<Option<String>, ProviderError> {
        if let Some(name) = self.cache.get_name(ticker) {
            return Ok(name);
        }
        let name = self.inner.get_ticker_name(ticker).await?;
        self.cache.set_name(ticker, name.clone());
        Ok(name)
    }

    async fn get_rising_stocks(
        &self,
        market: Market,
        limit: usize,
    ) -> Result<Vec<RisingStock>, ProviderError> {
        self.inner.get_rising_stocks(market, limit).await
    }

    async fn get_history_as_of(
        &self,
        ticker: &str,
        lookback: usize,
        as_of: NaiveDate,
    ) -> Result<CandleSeries, ProviderError> {
        if let Some(series) = self.cache.get_history(ticker, lookback, as_of) {
            return Ok(series);
        }
        let series = self.inner.get_history_as_of(ticker, lookback, as_of).await?;
        self.cache.set_history(lookback, as_of, series.clone());
        Ok(series)
    }
}

// ============================================================================
// Tests
// ============================================================================
