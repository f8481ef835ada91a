//! End-to-end scans against an in-memory market.

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;

use smc_scanner::data::{
    Candle, CandleSeries, Market, MarketDataProvider, MarketSnapshot, ProviderError, Quote,
    RisingStock, SnapshotRow, ThemeCatalog,
};
use smc_scanner::screener::{FilterStage, ScanKind, ScanStatus, ScreenerConfig, ScreenerEngine};

// ============================================================================
// In-memory market
// ============================================================================

#[derive(Default)]
struct MockMarket {
    names: HashMap<String, String>,
    histories: HashMap<String, Vec<Candle>>,
    quotes: HashMap<String, Quote>,
    /// Rows per trading date, served for every market segment
    snapshots: HashMap<NaiveDate, Vec<(String, SnapshotRow)>>,
    /// Markets without an entry fail their rising list
    rising: HashMap<Market, Vec<RisingStock>>,
    /// Tickers whose name lookup errors out
    name_errors: Vec<String>,
}

impl MockMarket {
    fn listed(mut self, ticker: &str, name: &str) -> Self {
        self.names.insert(ticker.to_string(), name.to_string());
        self
    }

    fn history(mut self, ticker: &str, candles: Vec<Candle>) -> Self {
        self.histories.insert(ticker.to_string(), candles);
        self
    }

    fn row(mut self, date: NaiveDate, ticker: &str, row: SnapshotRow) -> Self {
        self.snapshots
            .entry(date)
            .or_default()
            .push((ticker.to_string(), row));
        self
    }
}

#[async_trait]
impl MarketDataProvider for MockMarket {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_daily_candles(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CandleSeries, ProviderError> {
        let candles = self
            .histories
            .get(ticker)
            .ok_or_else(|| ProviderError::DataNotAvailable(ticker.to_string()))?
            .iter()
            .filter(|c| c.date >= start && c.date <= end)
            .copied()
            .collect();
        Ok(CandleSeries::new(ticker, candles)?)
    }

    async fn get_latest_quote(&self, ticker: &str) -> Result<Quote, ProviderError> {
        self.quotes
            .get(ticker)
            .cloned()
            .ok_or_else(|| ProviderError::DataNotAvailable(ticker.to_string()))
    }

    async fn get_market_snapshot(
        &self,
        date: NaiveDate,
        market: Market,
    ) -> Result<MarketSnapshot, ProviderError> {
        let mut snapshot = MarketSnapshot::new(date, market);
        if let Some(rows) = self.snapshots.get(&date) {
            snapshot.rows = rows.iter().cloned().collect();
        }
        Ok(snapshot)
    }

    async fn get_ticker_name(&self, ticker: &str) -> Result<Option<String>, ProviderError> {
        if self.name_errors.iter().any(|t| t == ticker) {
            return Err(ProviderError::Network(format!("name lookup for {}", ticker)));
        }
        Ok(self.names.get(ticker).cloned())
    }

    async fn get_rising_stocks(
        &self,
        market: Market,
        limit: usize,
    ) -> Result<Vec<RisingStock>, ProviderError> {
        self.rising
            .get(&market)
            .map(|list| list.iter().take(limit).cloned().collect())
            .ok_or_else(|| ProviderError::Unavailable(format!("{} rising list", market)))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn target() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

fn candle(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
    Candle {
        date,
        open,
        high,
        low,
        close,
        volume,
    }
}

/// Daily candles ending on `end`, one per calendar day.
fn series_ending(end: NaiveDate, bars: &[(f64, f64, f64, f64, f64)]) -> Vec<Candle> {
    let first = end - Duration::days(bars.len() as i64 - 1);
    bars.iter()
        .enumerate()
        .map(|(i, &(o, h, l, c, v))| candle(first + Duration::days(i as i64), o, h, l, c, v))
        .collect()
}

/// `flat` quiet candles at `base`, then a breakout candle closing at `close`.
fn flat_then(flat: usize, base: f64, close: f64, volume: f64) -> Vec<(f64, f64, f64, f64, f64)> {
    let mut bars = vec![(base, base, base, base, 1000.0); flat];
    bars.push((base, close, base, close, volume));
    bars
}

fn snapshot_row(close: f64, volume: f64, traded_value: f64) -> SnapshotRow {
    SnapshotRow {
        open: close,
        high: close,
        low: close,
        close,
        volume,
        traded_value,
    }
}

fn themes(entries: &[(&str, &str)]) -> ThemeCatalog {
    ThemeCatalog::from_map(
        entries
            .iter()
            .map(|(ticker, theme)| (ticker.to_string(), vec![theme.to_string()]))
            .collect(),
    )
}

fn engine(market: MockMarket, catalog: ThemeCatalog) -> ScreenerEngine<MockMarket> {
    engine_with(market, catalog, ScreenerConfig::default())
}

fn engine_with(
    market: MockMarket,
    catalog: ThemeCatalog,
    config: ScreenerConfig,
) -> ScreenerEngine<MockMarket> {
    ScreenerEngine::new(config, Arc::new(market), Arc::new(catalog)).with_concurrency(4)
}

// ============================================================================
// Accumulation
// ============================================================================

#[tokio::test]
async fn test_accumulation_flat_range_breakout() {
    let day = target();
    let market = MockMarket::default()
        .listed("000020", "동화약품")
        .listed("069500", "KODEX 200 ETF")
        .listed("000030", "우리은행")
        .history("000020", series_ending(day, &flat_then(64, 100.0, 140.0, 2000.0)))
        .history("069500", series_ending(day, &flat_then(64, 100.0, 140.0, 2000.0)))
        .history("000030", series_ending(day, &flat_then(64, 100.0, 140.0, 2000.0)))
        .row(day, "000020", snapshot_row(140.0, 2000.0, 1e9))
        .row(day, "069500", snapshot_row(140.0, 2000.0, 1e9))
        // Under the traded value floor
        .row(day, "000030", snapshot_row(140.0, 2000.0, 1e8));

    let outcome = engine(market, themes(&[("000020", "제약")]))
        .run_accumulation(Some(day))
        .await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(outcome.kind, ScanKind::Accumulation);
    assert_eq!(outcome.as_of, Some(day));
    assert_eq!(outcome.candidates.len(), 1);

    let hit = &outcome.candidates[0];
    assert_eq!(hit.ticker, "000020");
    assert_eq!(hit.name, "동화약품");
    assert!(hit.conditions.iter().any(|c| c == "Breakout"));
    assert_eq!(hit.metrics.range_pct, Some(0.0));
    assert!((hit.change_pct - 40.0).abs() < 1e-9);
    assert_eq!(hit.themes, vec!["제약".to_string()]);
}

#[tokio::test]
async fn test_accumulation_without_snapshot_is_unavailable() {
    let outcome = engine(MockMarket::default(), ThemeCatalog::default())
        .run_accumulation(Some(target()))
        .await;

    assert!(outcome.is_data_unavailable());
    assert!(outcome.candidates.is_empty());
}

// ============================================================================
// Squeeze
// ============================================================================

#[tokio::test]
async fn test_squeeze_flat_history_has_zero_cv() {
    let day = target();
    let previous = day - Duration::days(1);

    let mut choppy = Vec::new();
    for i in 0..61 {
        let close = if i % 2 == 0 { 90.0 } else { 110.0 };
        choppy.push((close, close, close, close, 1000.0));
    }
    choppy.push((100.0, 103.0, 100.0, 103.0, 6000.0));

    let market = MockMarket::default()
        .listed("000040", "대한전선")
        .listed("000050", "경방")
        .listed("000060", "메리츠")
        .history("000040", series_ending(day, &flat_then(61, 100.0, 103.0, 6000.0)))
        .history("000050", series_ending(day, &choppy))
        .history("000060", series_ending(day, &flat_then(61, 100.0, 103.0, 2000.0)))
        .row(previous, "000040", snapshot_row(100.0, 1000.0, 1e8))
        .row(previous, "000050", snapshot_row(100.0, 1000.0, 1e8))
        .row(previous, "000060", snapshot_row(100.0, 1000.0, 1e8))
        .row(day, "000040", snapshot_row(103.0, 6000.0, 6e8))
        .row(day, "000050", snapshot_row(103.0, 6000.0, 6e8))
        // Only a 2x volume jump
        .row(day, "000060", snapshot_row(103.0, 2000.0, 2e8));

    let outcome = engine(market, ThemeCatalog::default())
        .run_squeeze(Some(day))
        .await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(outcome.candidates.len(), 1);

    let hit = &outcome.candidates[0];
    assert_eq!(hit.ticker, "000040");
    assert_eq!(hit.metrics.volume_ratio, Some(6.0));
    assert!(hit.metrics.cv_pct.unwrap().abs() < 1e-9);
    assert_eq!(hit.conditions[0], "Vol 5.0x");
    assert_eq!(hit.prev_close, Some(100.0));
}

#[tokio::test]
async fn test_squeeze_without_previous_session_is_unavailable() {
    let day = target();
    let market = MockMarket::default()
        .listed("000040", "대한전선")
        .row(day, "000040", snapshot_row(103.0, 6000.0, 6e8));

    let outcome = engine(market, ThemeCatalog::default())
        .run_squeeze(Some(day))
        .await;

    assert!(outcome.is_data_unavailable());
    assert!(matches!(
        outcome.status,
        ScanStatus::MarketDataUnavailable { ref reason } if reason.contains("before")
    ));
}

// ============================================================================
// Daily Momentum
// ============================================================================

fn daily_market() -> MockMarket {
    let day = target();
    let previous = day - Duration::days(1);
    let breakout = flat_then(59, 10_000.0, 12_000.0, 5000.0);

    MockMarket::default()
        .listed("000040", "대한전선")
        .listed("000045", "우선주")
        .listed("000050", "경방")
        .listed("000060", "메리츠")
        .history("000040", series_ending(day, &breakout))
        .history("000045", series_ending(day, &breakout))
        .history("000050", series_ending(day, &breakout))
        .history("000060", series_ending(day, &breakout))
        .row(previous, "000040", snapshot_row(10_000.0, 1000.0, 1e10))
        .row(previous, "000045", snapshot_row(10_000.0, 1000.0, 1e10))
        .row(previous, "000050", snapshot_row(10_000.0, 1000.0, 1e10))
        .row(previous, "000060", snapshot_row(10_000.0, 1000.0, 1e10))
        .row(day, "000040", snapshot_row(12_000.0, 5000.0, 3e10))
        // Excluded code suffix
        .row(day, "000045", snapshot_row(12_000.0, 5000.0, 3e10))
        // No theme tag
        .row(day, "000050", snapshot_row(12_000.0, 5000.0, 3e10))
        // Barely moved
        .row(day, "000060", snapshot_row(10_100.0, 5000.0, 3e10))
}

#[tokio::test]
async fn test_daily_momentum_funnel() {
    let catalog = themes(&[("000040", "전선"), ("000045", "전선"), ("000060", "금융")]);
    let outcome = engine(daily_market(), catalog)
        .run_daily_momentum(Some(target()))
        .await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(outcome.candidates.len(), 1);

    let hit = &outcome.candidates[0];
    assert_eq!(hit.ticker, "000040");
    assert!((hit.change_pct - 20.0).abs() < 1e-9);
    assert_eq!(hit.condition_count(), 6);
    assert!(hit.conditions.contains(&"GoldenX".to_string()));
    assert!(hit.conditions.contains(&"Vol3x".to_string()));
}

#[tokio::test]
async fn test_daily_momentum_unnamed_ticker_keeps_its_code() {
    let day = target();
    let previous = day - Duration::days(1);
    let breakout = flat_then(59, 10_000.0, 12_000.0, 5000.0);

    let mut market = MockMarket::default()
        .history("000070", series_ending(day, &breakout))
        .history("000080", series_ending(day, &breakout))
        .row(previous, "000070", snapshot_row(10_000.0, 1000.0, 1e10))
        .row(previous, "000080", snapshot_row(10_000.0, 1000.0, 1e10))
        .row(day, "000070", snapshot_row(12_000.0, 5000.0, 3e10))
        .row(day, "000080", snapshot_row(12_000.0, 5000.0, 3e10));
    market.name_errors.push("000080".to_string());

    let catalog = themes(&[("000070", "전선"), ("000080", "전선")]);
    let outcome = engine(market, catalog)
        .run_daily_momentum(Some(day))
        .await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(outcome.candidates[0].ticker, "000070");
    assert_eq!(outcome.candidates[0].name, "000070");
}

#[tokio::test]
async fn test_daily_momentum_empty_result_is_completed() {
    let day = target();
    let previous = day - Duration::days(1);
    let market = MockMarket::default()
        .listed("000040", "대한전선")
        .row(previous, "000040", snapshot_row(10_000.0, 1000.0, 1e10))
        .row(day, "000040", snapshot_row(10_010.0, 1000.0, 3e10));

    let outcome = engine(market, ThemeCatalog::default())
        .run_daily_momentum(Some(day))
        .await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert!(!outcome.is_data_unavailable());
    assert!(outcome.candidates.is_empty());
}

#[tokio::test]
async fn test_daily_momentum_holiday_is_unavailable() {
    let outcome = engine(daily_market(), ThemeCatalog::default())
        .run_daily_momentum(Some(target() + Duration::days(1)))
        .await;

    assert!(outcome.is_data_unavailable());
    assert!(outcome.funnel.is_empty());
}

// ============================================================================
// Realtime Momentum
// ============================================================================

fn rising(ticker: &str, name: &str, change_pct: f64, market: Market) -> RisingStock {
    RisingStock {
        ticker: ticker.to_string(),
        name: name.to_string(),
        price: 12_000.0,
        change_pct,
        market,
    }
}

#[tokio::test]
async fn test_realtime_momentum_merges_live_quote() {
    let today = Local::now().date_naive();
    let yesterday = today - Duration::days(1);

    let mut market = MockMarket::default()
        .listed("000040", "대한전선")
        .history(
            "000040",
            series_ending(yesterday, &vec![(10_000.0, 10_000.0, 10_000.0, 10_000.0, 1000.0); 59]),
        )
        .history(
            "000050",
            series_ending(yesterday, &vec![(10_000.0, 10_000.0, 10_000.0, 10_000.0, 1000.0); 59]),
        );
    market.quotes.insert(
        "000040".to_string(),
        Quote {
            ticker: "000040".to_string(),
            name: "대한전선".to_string(),
            price: 12_000.0,
            prev_close: Some(10_000.0),
            change_pct: 20.0,
            volume: 5000.0,
            traded_value: 2e10,
            open: 10_000.0,
            high: 12_000.0,
            low: 10_000.0,
            as_of: None,
        },
    );
    market.rising.insert(
        Market::Kospi,
        vec![
            rising("000040", "대한전선", 20.0, Market::Kospi),
            // Below the change floor
            rising("000050", "경방", 2.0, Market::Kospi),
        ],
    );
    // Kosdaq list fails; Kospi alone keeps the scan alive

    let outcome = engine(market, themes(&[("000040", "전선"), ("000050", "섬유")]))
        .run_realtime_momentum()
        .await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(outcome.candidates.len(), 1);

    let hit = &outcome.candidates[0];
    assert_eq!(hit.ticker, "000040");
    assert_eq!(hit.price, 12_000.0);
    assert!(hit.conditions.contains(&"High60".to_string()));
    assert!(hit.conditions.contains(&"Surge7d".to_string()));
}

fn live_quote(ticker: &str, price: f64, volume: f64) -> Quote {
    Quote {
        ticker: ticker.to_string(),
        name: String::new(),
        price,
        prev_close: Some(10_000.0),
        change_pct: (price - 10_000.0) / 100.0,
        volume,
        traded_value: 2e10,
        open: 10_000.0,
        high: price,
        low: 10_000.0,
        as_of: None,
    }
}

#[tokio::test]
async fn test_realtime_momentum_ranks_before_capping() {
    let yesterday = Local::now().date_naive() - Duration::days(1);
    let quiet = vec![(10_000.0, 10_000.0, 10_000.0, 10_000.0, 1000.0); 59];

    let mut market = MockMarket::default();
    for ticker in ["00000A", "00000B", "00000C"] {
        market
            .histories
            .insert(ticker.to_string(), series_ending(yesterday, &quiet));
    }
    // A and B edge up on flat volume; C breaks out on heavy volume.
    market.quotes.insert("00000A".into(), live_quote("00000A", 10_100.0, 1000.0));
    market.quotes.insert("00000B".into(), live_quote("00000B", 10_100.0, 1000.0));
    market.quotes.insert("00000C".into(), live_quote("00000C", 12_000.0, 5000.0));
    market.rising.insert(
        Market::Kospi,
        vec![
            rising("00000A", "Alpha", 30.0, Market::Kospi),
            rising("00000B", "Beta", 25.0, Market::Kospi),
            rising("00000C", "Gamma", 10.0, Market::Kospi),
        ],
    );
    market.rising.insert(Market::Kosdaq, Vec::new());

    let mut config = ScreenerConfig::default();
    config.realtime.top_n = 2;
    let catalog = themes(&[("00000A", "x"), ("00000B", "x"), ("00000C", "x")]);
    let outcome = engine_with(market, catalog, config)
        .run_realtime_momentum()
        .await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    let order: Vec<_> = outcome.candidates.iter().map(|c| c.ticker.as_str()).collect();
    assert_eq!(order, vec!["00000C", "00000A"]);
    assert_eq!(outcome.candidates[0].condition_count(), 6);
    assert_eq!(outcome.candidates[1].condition_count(), 4);

    let last = outcome.funnel.last().unwrap();
    assert_eq!(last.stage, FilterStage::Final);
    assert_eq!((last.passed, last.eliminated), (2, 1));
}

#[tokio::test]
async fn test_realtime_momentum_without_rising_lists() {
    let outcome = engine(MockMarket::default(), ThemeCatalog::default())
        .run_realtime_momentum()
        .await;

    assert!(outcome.is_data_unavailable());
    assert_eq!(outcome.kind, ScanKind::RealtimeMomentum);
}

// ============================================================================
// Pattern Scan
// ============================================================================

#[tokio::test]
async fn test_smc_scan_reports_open_gap() {
    let today = Local::now().date_naive();
    let mut bars = vec![(100.0, 100.0, 100.0, 100.0, 1000.0); 30];
    bars.push((100.0, 110.0, 100.0, 110.0, 3000.0));
    for i in 0..29 {
        let price = 121.0 + i as f64;
        bars.push((price, price, price, price, 1000.0));
    }

    let market = MockMarket::default()
        .listed("000040", "대한전선")
        .history("000040", series_ending(today, &bars));

    let outcome = engine(market, ThemeCatalog::default())
        .run_smc_scan(Some("000040"))
        .await;

    assert_eq!(outcome.status, ScanStatus::Completed);
    assert_eq!(outcome.candidates.len(), 1);

    let report = &outcome.candidates[0];
    assert_eq!(report.price, 149.0);
    assert!(report.open_fair_value_gaps >= 1);
    assert!(report
        .analysis
        .fair_value_gaps
        .iter()
        .any(|g| g.bottom == 100.0 && g.top == 121.0 && !g.mitigated));
}

#[tokio::test]
async fn test_smc_scan_unknown_ticker() {
    let outcome = engine(MockMarket::default(), ThemeCatalog::default())
        .run_smc_scan(Some("999999"))
        .await;

    assert!(outcome.is_data_unavailable());
    assert!(outcome.candidates.is_empty());
}
