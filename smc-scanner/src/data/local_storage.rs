//! Local market data storage using SQLite.
//!
//! Provides persistent storage for:
//! - Daily candles (with traded value, for full-market snapshots)
//! - The latest realtime quote per ticker
//! - The ticker list with names and market segment
//!
//! `LocalStorage` implements [`MarketDataProvider`], so scans can run fully
//! offline against a database filled by an external collector.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{
    Candle, CandleSeries, Market, MarketDataProvider, MarketSnapshot, ProviderError, Quote,
    RisingStock, SnapshotRow,
};

// ============================================================================
// Database Schema
// ============================================================================

const CREATE_TABLES_SQL: &str = r#"
-- Ticker list
CREATE TABLE IF NOT EXISTS stocks (
    ticker TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    market TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_stocks_market
    ON stocks(market);

-- Daily candles
CREATE TABLE IF NOT EXISTS candles (
    ticker TEXT NOT NULL,
    date TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume REAL NOT NULL,
    traded_value REAL NOT NULL DEFAULT 0,
    PRIMARY KEY (ticker, date)
);

CREATE INDEX IF NOT EXISTS idx_candles_date
    ON candles(date);

-- Latest realtime quote per ticker
CREATE TABLE IF NOT EXISTS quotes (
    ticker TEXT PRIMARY KEY,
    price REAL NOT NULL,
    prev_close REAL,
    change_pct REAL NOT NULL,
    volume REAL NOT NULL,
    traded_value REAL NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    as_of TEXT,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_quotes_change
    ON quotes(change_pct);
"#;

const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for local storage
#[derive(Debug, Clone)]
pub struct LocalStorageConfig {
    /// Path to SQLite database
    pub db_path: PathBuf,
}

// ============================================================================
// Local Storage
// ============================================================================

/// Local SQLite storage for market data
pub struct LocalStorage {
    /// rusqlite::Connection is Send but not Sync, so it sits behind a Mutex.
    db: Arc<Mutex<Connection>>,
    config: LocalStorageConfig,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    pub fn new(config: LocalStorageConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&config.db_path)
            .context("Failed to open local storage database")?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .context("Failed to set database pragmas")?;

        conn.execute_batch(CREATE_TABLES_SQL)
            .context("Failed to create database tables")?;

        info!(db_path = %config.db_path.display(), "Initialized local storage");

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// Get the database path
    pub fn db_path(&self) -> &PathBuf {
        &self.config.db_path
    }

    // ========================================================================
    // Write Operations
    // ========================================================================

    /// Insert or update a ticker in the stock list
    pub async fn save_stock(&self, ticker: &str, name: &str, market: Market) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            r#"
            INSERT OR REPLACE INTO stocks (ticker, name, market, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![ticker, name, market.as_str(), Utc::now().to_rfc3339()],
        )
        .context("Failed to save stock")?;
        Ok(())
    }

    /// Save candles, estimating traded value as close × volume
    pub async fn save_candles(&self, series: &CandleSeries) -> Result<usize> {
        let rows: Vec<(Candle, f64)> = series
            .iter()
            .map(|c| (*c, c.close * c.volume))
            .collect();
        self.save_daily_bars(series.ticker(), &rows).await
    }

    /// Save candles with explicit traded values
    pub async fn save_daily_bars(&self, ticker: &str, bars: &[(Candle, f64)]) -> Result<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO candles
                (ticker, date, open, high, low, close, volume, traded_value)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for (candle, traded_value) in bars {
                stmt.execute(params![
                    ticker,
                    candle.date.format(DATE_FORMAT).to_string(),
                    candle.open,
                    candle.high,
                    candle.low,
                    candle.close,
                    candle.volume,
                    traded_value,
                ])?;
            }
        }
        tx.commit().context("Failed to commit candles")?;

        debug!(ticker, count = bars.len(), "Saved candles to local storage");
        Ok(bars.len())
    }

    /// Replace the stored quote for a ticker
    pub async fn save_quote(&self, quote: &Quote) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            r#"
            INSERT OR REPLACE INTO quotes
            (ticker, price, prev_close, change_pct, volume, traded_value, open, high, low, as_of, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                quote.ticker,
                quote.price,
                quote.prev_close,
                quote.change_pct,
                quote.volume,
                quote.traded_value,
                quote.open,
                quote.high,
                quote.low,
                quote.as_of.map(|d| d.format(DATE_FORMAT).to_string()),
                Utc::now().to_rfc3339(),
            ],
        )
        .context("Failed to save quote")?;
        Ok(())
    }

    /// Count stored tickers, optionally for one market
    pub async fn count_stocks(&self, market: Market) -> Result<usize> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM stocks WHERE ?1 = 'all' OR market = ?1",
            params![market.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

// ============================================================================
// Query Helpers
// ============================================================================

fn storage_err(err: rusqlite::Error) -> ProviderError {
    ProviderError::Storage(err.to_string())
}

fn parse_date(raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_candle(row: &rusqlite::Row) -> rusqlite::Result<Candle> {
    let date: String = row.get(0)?;
    Ok(Candle {
        date: parse_date(&date)?,
        open: row.get(1)?,
        high: row.get(2)?,
        low: row.get(3)?,
        close: row.get(4)?,
        volume: row.get(5)?,
    })
}

fn query_candles(
    conn: &Connection,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> rusqlite::Result<Vec<Candle>> {
    let mut stmt = conn.prepare(
        "SELECT date, open, high, low, close, volume FROM candles
         WHERE ticker = ?1 AND date >= ?2 AND date <= ?3
         ORDER BY date ASC",
    )?;
    let rows = stmt.query_map(
        params![
            ticker,
            start.format(DATE_FORMAT).to_string(),
            end.format(DATE_FORMAT).to_string()
        ],
        row_to_candle,
    )?;
    rows.collect()
}

fn query_quote(conn: &Connection, ticker: &str) -> rusqlite::Result<Option<Quote>> {
    conn.query_row(
        "SELECT q.ticker, COALESCE(s.name, ''), q.price, q.prev_close, q.change_pct, q.volume,
                q.traded_value, q.open, q.high, q.low, q.as_of
         FROM quotes q LEFT JOIN stocks s ON s.ticker = q.ticker
         WHERE q.ticker = ?1",
        params![ticker],
        |row| {
            let as_of: Option<String> = row.get(10)?;
            Ok(Quote {
                ticker: row.get(0)?,
                name: row.get(1)?,
                price: row.get(2)?,
                prev_close: row.get(3)?,
                change_pct: row.get(4)?,
                volume: row.get(5)?,
                traded_value: row.get(6)?,
                open: row.get(7)?,
                high: row.get(8)?,
                low: row.get(9)?,
                as_of: as_of.as_deref().map(parse_date).transpose()?,
            })
        },
    )
    .optional()
}

fn query_snapshot(
    conn: &Connection,
    date: NaiveDate,
    market: Market,
) -> rusqlite::Result<MarketSnapshot> {
    let mut stmt = conn.prepare(
        "SELECT c.ticker, c.open, c.high, c.low, c.close, c.volume, c.traded_value
         FROM candles c LEFT JOIN stocks s ON s.ticker = c.ticker
         WHERE c.date = ?1 AND (?2 = 'all' OR s.market = ?2)",
    )?;
    let rows = stmt.query_map(
        params![date.format(DATE_FORMAT).to_string(), market.as_str()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                SnapshotRow {
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                    traded_value: row.get(6)?,
                },
            ))
        },
    )?;

    let mut snapshot = MarketSnapshot::new(date, market);
    for row in rows {
        let (ticker, data) = row?;
        snapshot.rows.insert(ticker, data);
    }
    Ok(snapshot)
}

fn query_rising(conn: &Connection, market: Market, limit: usize) -> rusqlite::Result<Vec<RisingStock>> {
    let mut stmt = conn.prepare(
        "SELECT q.ticker, s.name, q.price, q.change_pct, s.market
         FROM quotes q JOIN stocks s ON s.ticker = q.ticker
         WHERE q.change_pct > 0 AND (?1 = 'all' OR s.market = ?1)
         ORDER BY q.change_pct DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![market.as_str(), limit as i64], |row| {
        let market: String = row.get(4)?;
        Ok(RisingStock {
            ticker: row.get(0)?,
            name: row.get(1)?,
            price: row.get(2)?,
            change_pct: row.get(3)?,
            market: Market::parse(&market).unwrap_or(Market::All),
        })
    })?;
    rows.collect()
}

// ============================================================================
// Provider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for LocalStorage {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get_daily_candles(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CandleSeries, ProviderError> {
        let db = self.db.lock().await;
        let candles = query_candles(&db, ticker, start, end).map_err(storage_err)?;
        Ok(CandleSeries::new(ticker, candles)?)
    }

    async fn get_latest_quote(&self, ticker: &str) -> Result<Quote, ProviderError> {
        let db = self.db.lock().await;
        query_quote(&db, ticker)
            .map_err(storage_err)?
            .ok_or_else(|| ProviderError::DataNotAvailable(format!("no quote for {}", ticker)))
    }

    async fn get_market_snapshot(
        &self,
        date: NaiveDate,
        market: Market,
    ) -> Result<MarketSnapshot, ProviderError> {
        let db = self.db.lock().await;
        query_snapshot(&db, date, market).map_err(storage_err)
    }

    async fn get_ticker_name(&self, ticker: &str) -> Result<Option<String>, ProviderError> {
        let db = self.db.lock().await;
        db.query_row(
            "SELECT name FROM stocks WHERE ticker = ?1",
            params![ticker],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage_err)
    }

    async fn get_rising_stocks(
        &self,
        market: Market,
        limit: usize,
    ) -> Result<Vec<RisingStock>, ProviderError> {
        let db = self.db.lock().await;
        query_rising(&db, market, limit).map_err(storage_err)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn create_test_storage() -> (LocalStorage, TempDir) {
        let dir = tempdir().unwrap();
        let config = LocalStorageConfig {
            db_path: dir.path().join("test_market.db"),
        };
        (LocalStorage::new(config).unwrap(), dir)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn create_test_candle(date: NaiveDate, close: f64) -> Candle {
        Candle {
            date,
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000_000.0,
        }
    }

    fn create_test_quote(ticker: &str, change_pct: f64) -> Quote {
        Quote {
            ticker: ticker.to_string(),
            name: String::new(),
            price: 10_000.0,
            prev_close: Some(9_500.0),
            change_pct,
            volume: 50_000.0,
            traded_value: 500_000_000.0,
            open: 9_600.0,
            high: 10_100.0,
            low: 9_550.0,
            as_of: Some(day(10)),
        }
    }

    #[tokio::test]
    async fn test_candle_save_and_retrieve() {
        let (storage, _dir) = create_test_storage();
        let series = CandleSeries::new(
            "005930",
            (1..=5).map(|d| create_test_candle(day(d), 100.0 + d as f64)).collect(),
        )
        .unwrap();

        let count = storage.save_candles(&series).await.unwrap();
        assert_eq!(count, 5);

        let retrieved = storage.get_daily_candles("005930", day(2), day(4)).await.unwrap();
        assert_eq!(retrieved.len(), 3);
        assert_eq!(retrieved[0].date, day(2));
        assert_eq!(retrieved[2].close, 104.0);
    }

    #[tokio::test]
    async fn test_snapshot_filters_by_market() {
        let (storage, _dir) = create_test_storage();
        storage.save_stock("005930", "Samsung", Market::Kospi).await.unwrap();
        storage.save_stock("035720", "Kakao", Market::Kosdaq).await.unwrap();

        for ticker in ["005930", "035720"] {
            storage
                .save_daily_bars(ticker, &[(create_test_candle(day(3), 100.0), 5e9)])
                .await
                .unwrap();
        }

        let all = storage.get_market_snapshot(day(3), Market::All).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("005930").unwrap().traded_value, 5e9);

        let kospi = storage.get_market_snapshot(day(3), Market::Kospi).await.unwrap();
        assert_eq!(kospi.len(), 1);
        assert!(kospi.get("035720").is_none());

        let holiday = storage.get_market_snapshot(day(4), Market::All).await.unwrap();
        assert!(holiday.is_empty());
    }

    #[tokio::test]
    async fn test_quote_and_rising_list() {
        let (storage, _dir) = create_test_storage();
        storage.save_stock("A", "Alpha", Market::Kospi).await.unwrap();
        storage.save_stock("B", "Beta", Market::Kospi).await.unwrap();
        storage.save_stock("C", "Gamma", Market::Kosdaq).await.unwrap();
        storage.save_quote(&create_test_quote("A", 3.0)).await.unwrap();
        storage.save_quote(&create_test_quote("B", 12.0)).await.unwrap();
        storage.save_quote(&create_test_quote("C", -1.0)).await.unwrap();

        let quote = storage.get_latest_quote("A").await.unwrap();
        assert_eq!(quote.name, "Alpha");
        assert_eq!(quote.as_of, Some(day(10)));

        let rising = storage.get_rising_stocks(Market::Kospi, 10).await.unwrap();
        let tickers: Vec<_> = rising.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["B", "A"]);

        assert!(storage.get_rising_stocks(Market::Kosdaq, 10).await.unwrap().is_empty());
        assert!(matches!(
            storage.get_latest_quote("Z").await,
            Err(ProviderError::DataNotAvailable(_))
        ));
    }

    #[tokio::test]
    async fn test_ticker_name_lookup() {
        let (storage, _dir) = create_test_storage();
        storage.save_stock("005930", "Samsung", Market::Kospi).await.unwrap();

        assert_eq!(
            storage.get_ticker_name("005930").await.unwrap().as_deref(),
            Some("Samsung")
        );
        assert_eq!(storage.get_ticker_name("999999").await.unwrap(), None);
        assert_eq!(storage.count_stocks(Market::All).await.unwrap(), 1);
        assert_eq!(storage.count_stocks(Market::Kosdaq).await.unwrap(), 0);
    }
}
