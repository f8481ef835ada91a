//! Screener engine module.
//!
//! The central orchestrator for universe scans. Each scan strategy lives in
//! its own module as an `impl ScreenerEngine` block; this module holds the
//! shared state and helpers.

use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::debug;

use crate::analysis::SmcAnalyzer;
use crate::data::{latest_trading_date, MarketDataProvider, ThemeCatalog};

use super::candidate::MAX_THEMES;
use super::config::ScreenerConfig;

/// Default number of tickers fetched concurrently.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// The main screener engine.
///
/// Orchestrates the scan pipelines:
/// 1. Pull the universe (rising lists or a full-market snapshot)
/// 2. Apply cheap row filters (change, liquidity, hygiene, theme)
/// 3. Fetch history for survivors and run the expensive checks
/// 4. Rank and return a [`ScanOutcome`](super::ScanOutcome)
pub struct ScreenerEngine<P: MarketDataProvider> {
    pub(super) config: ScreenerConfig,
    pub(super) provider: Arc<P>,
    pub(super) themes: Arc<ThemeCatalog>,
    pub(super) analyzer: SmcAnalyzer,
    pub(super) concurrency: usize,
}

impl<P: MarketDataProvider> ScreenerEngine<P> {
    /// Create a new screener engine.
    pub fn new(config: ScreenerConfig, provider: Arc<P>, themes: Arc<ThemeCatalog>) -> Self {
        let analyzer = SmcAnalyzer::new(config.analyzer.clone());
        Self {
            config,
            provider,
            themes,
            analyzer,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set how many per-ticker fetches run at once (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// First theme tags for a ticker.
    pub(super) fn theme_tags(&self, ticker: &str) -> Vec<String> {
        self.themes
            .themes(ticker)
            .iter()
            .take(MAX_THEMES)
            .cloned()
            .collect()
    }

    /// The requested date, or the latest trading date on or before today.
    pub(super) async fn resolve_date(&self, date: Option<NaiveDate>) -> Option<NaiveDate> {
        match date {
            Some(date) => Some(date),
            None => latest_trading_date(self.provider.as_ref(), Local::now().date_naive()).await,
        }
    }

    /// Display name, or the ticker code when the provider knows no name.
    ///
    /// `None` only when the lookup itself failed.
    pub(super) async fn name_or_code(&self, ticker: &str) -> Option<String> {
        match self.provider.get_ticker_name(ticker).await {
            Ok(Some(name)) if !name.trim().is_empty() => Some(name),
            Ok(_) => Some(ticker.to_string()),
            Err(e) => {
                debug!(ticker, error = %e, "Name lookup failed, skipping");
                None
            }
        }
    }

    /// Display name when known and non-empty.
    pub(super) async fn lookup_name(&self, ticker: &str) -> Option<String> {
        match self.provider.get_ticker_name(ticker).await {
            Ok(Some(name)) if !name.trim().is_empty() => Some(name),
            Ok(_) => {
                debug!(ticker, "Unknown ticker name, skipping");
                None
            }
            Err(e) => {
                debug!(ticker, error = %e, "Name lookup failed, skipping");
                None
            }
        }
    }
}
