//! SMC Scanner Library
//!
//! Smart Money Concepts pattern analysis and universe screening over daily
//! equity candles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         smc-scanner                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌───────────────┐   ┌───────────────┐   ┌───────────────────┐  │
//! │  │  Market Data  │──▶│   Screener    │──▶│   ScanOutcome     │  │
//! │  │  Provider     │   │   Engine      │   │   (JSON)          │  │
//! │  └───────────────┘   └───────┬───────┘   └───────────────────┘  │
//! │                              │                                  │
//! │                      ┌───────▼───────┐                          │
//! │                      │ SMC Analyzer  │                          │
//! │                      └───────────────┘                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Patterns
//! - **Support/Resistance**: clustered swing highs and lows
//! - **Order Block**: the opposing candle before an impulsive move
//! - **Fair Value Gap**: a three-candle gap left by a strong move
//!
//! ## Scans
//! - **Momentum**: risers confirmed by moving-average, volume and RSI conditions
//! - **Squeeze**: volume spike out of a tight range (low coefficient of variation)
//! - **Accumulation**: price and volume breaking a narrow 60-day range

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod analysis;
pub mod data;
pub mod screener;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use smc_common::config::Config;

use crate::data::{CachedProvider, DataCache, LocalStorage, LocalStorageConfig, ThemeCatalog};
use crate::screener::{ScreenerConfig, ScreenerEngine};

/// Provider stack used by the binary: SQLite behind a TTL cache.
pub type DefaultProvider = CachedProvider<LocalStorage>;

/// Wire storage, cache and theme catalog into a screener engine.
pub fn build_engine(
    config: &Config,
    screener_config: ScreenerConfig,
) -> Result<ScreenerEngine<DefaultProvider>> {
    let storage = LocalStorage::new(LocalStorageConfig {
        db_path: config.data.db_path.clone(),
    })
    .context("Failed to open market data store")?;

    let cache = Arc::new(DataCache::with_ttl(config.data.cache_ttl_secs));
    let provider = Arc::new(CachedProvider::new(storage, cache));
    let themes = Arc::new(ThemeCatalog::load(&config.data.theme_file)?);

    info!(
        provider = "sqlite",
        themes = themes.len(),
        concurrency = config.data.concurrency,
        "Screener engine ready"
    );

    Ok(ScreenerEngine::new(screener_config, provider, themes)
        .with_concurrency(config.data.concurrency))
}
