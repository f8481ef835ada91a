//! Screener configuration module.
//!
//! One sub-configuration per scan pipeline. Loaded from the optional
//! `screener.json` section file; every field has a default.

use serde::{Deserialize, Serialize};

use crate::analysis::AnalyzerConfig;

/// Currency units per "억" (10^8), the unit traded-value thresholds use.
pub const TRADED_VALUE_UNIT: f64 = 1e8;

// ============================================================================
// Main Screener Configuration
// ============================================================================

/// Configuration for all screening pipelines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Realtime momentum scan
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Close-of-day momentum scan
    #[serde(default)]
    pub daily: DailyConfig,

    /// Volume squeeze breakout scan
    #[serde(default)]
    pub squeeze: SqueezeConfig,

    /// Accumulation breakout scan
    #[serde(default)]
    pub accumulation: AccumulationConfig,

    /// Pattern (order block / FVG) scan
    #[serde(default)]
    pub smc: SmcScanConfig,

    /// Pattern analyzer tunables
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

// ============================================================================
// Hygiene
// ============================================================================

/// Universe exclusions shared by the snapshot-based scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HygieneConfig {
    /// Minimum close price (penny stock floor)
    #[serde(default)]
    pub min_price: Option<f64>,

    /// Ticker codes ending in one of these digits are excluded
    /// (preferred shares and similar listings)
    #[serde(default)]
    pub excluded_suffix_digits: Vec<char>,

    /// Names containing any of these fragments are excluded
    #[serde(default = "default_excluded_name_patterns")]
    pub excluded_name_patterns: Vec<String>,
}

impl HygieneConfig {
    /// Name-pattern exclusions only.
    pub fn name_patterns_only() -> Self {
        Self {
            min_price: None,
            excluded_suffix_digits: Vec::new(),
            excluded_name_patterns: default_excluded_name_patterns(),
        }
    }

    /// Price floor, code suffix and name exclusions.
    pub fn strict() -> Self {
        Self {
            min_price: Some(1000.0),
            excluded_suffix_digits: vec!['5', '6', '7', '8', '9'],
            excluded_name_patterns: default_excluded_name_patterns(),
        }
    }
}

impl Default for HygieneConfig {
    fn default() -> Self {
        Self::name_patterns_only()
    }
}

fn default_excluded_name_patterns() -> Vec<String> {
    ["스팩", "SPAC", "ETF", "ETN", "리츠"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_strict_hygiene() -> HygieneConfig {
    HygieneConfig::strict()
}

// ============================================================================
// Realtime Momentum
// ============================================================================

/// Realtime momentum scan over today's top risers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Minimum change from previous close (%)
    #[serde(default = "default_realtime_min_change")]
    pub min_change_pct: f64,

    /// Minimum traded value (×10^8)
    #[serde(default = "default_realtime_min_traded_value")]
    pub min_traded_value: f64,

    /// Only keep tickers with at least one theme tag
    #[serde(default = "default_true")]
    pub require_theme: bool,

    /// Minimum number of fired technical conditions
    #[serde(default = "default_realtime_min_conditions")]
    pub min_conditions: usize,

    /// Stop after this many candidates pass
    #[serde(default = "default_realtime_top_n")]
    pub top_n: usize,

    /// Rising list size requested per market
    #[serde(default = "default_rising_limit")]
    pub rising_limit: usize,

    /// Candles fetched for condition checks
    #[serde(default = "default_momentum_lookback")]
    pub history_lookback: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            min_change_pct: default_realtime_min_change(),
            min_traded_value: default_realtime_min_traded_value(),
            require_theme: true,
            min_conditions: default_realtime_min_conditions(),
            top_n: default_realtime_top_n(),
            rising_limit: default_rising_limit(),
            history_lookback: default_momentum_lookback(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_realtime_min_change() -> f64 {
    5.0
}

fn default_realtime_min_traded_value() -> f64 {
    100.0
}

fn default_realtime_min_conditions() -> usize {
    2
}

fn default_realtime_top_n() -> usize {
    50
}

fn default_rising_limit() -> usize {
    200
}

fn default_momentum_lookback() -> usize {
    60
}

// ============================================================================
// Daily Momentum
// ============================================================================

/// Close-of-day momentum scan over a full-market snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyConfig {
    /// Minimum change from previous trading day's close (%)
    #[serde(default = "default_daily_min_change")]
    pub min_change_pct: f64,

    /// Minimum traded value (×10^8)
    #[serde(default = "default_daily_min_traded_value")]
    pub min_traded_value: f64,

    #[serde(default = "default_true")]
    pub require_theme: bool,

    #[serde(default = "default_daily_min_conditions")]
    pub min_conditions: usize,

    /// Optional cap on the result count
    #[serde(default)]
    pub top_n: Option<usize>,

    #[serde(default = "default_momentum_lookback")]
    pub history_lookback: usize,

    #[serde(default = "default_strict_hygiene")]
    pub hygiene: HygieneConfig,
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            min_change_pct: default_daily_min_change(),
            min_traded_value: default_daily_min_traded_value(),
            require_theme: true,
            min_conditions: default_daily_min_conditions(),
            top_n: None,
            history_lookback: default_momentum_lookback(),
            hygiene: HygieneConfig::strict(),
        }
    }
}

fn default_daily_min_change() -> f64 {
    3.0
}

fn default_daily_min_traded_value() -> f64 {
    200.0
}

fn default_daily_min_conditions() -> usize {
    3
}

// ============================================================================
// Squeeze Breakout
// ============================================================================

/// Volume spike out of a tight price range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqueezeConfig {
    /// Today's volume must be at least this multiple of yesterday's
    #[serde(default = "default_volume_multiple")]
    pub volume_multiple: f64,

    /// Maximum coefficient of variation of prior closes (%)
    #[serde(default = "default_max_cv")]
    pub max_cv_pct: f64,

    #[serde(default = "default_lookback_90")]
    pub history_lookback: usize,

    /// Fewest candles (today included) needed to evaluate
    #[serde(default = "default_squeeze_min_candles")]
    pub min_candles: usize,

    /// Prior candles the CV is measured over
    #[serde(default = "default_cv_window")]
    pub cv_window: usize,

    /// Fewest prior candles the CV may be measured over
    #[serde(default = "default_min_cv_window")]
    pub min_cv_window: usize,

    #[serde(default)]
    pub hygiene: HygieneConfig,
}

impl Default for SqueezeConfig {
    fn default() -> Self {
        Self {
            volume_multiple: default_volume_multiple(),
            max_cv_pct: default_max_cv(),
            history_lookback: default_lookback_90(),
            min_candles: default_squeeze_min_candles(),
            cv_window: default_cv_window(),
            min_cv_window: default_min_cv_window(),
            hygiene: HygieneConfig::default(),
        }
    }
}

fn default_volume_multiple() -> f64 {
    5.0
}

fn default_max_cv() -> f64 {
    2.5
}

fn default_lookback_90() -> usize {
    90
}

fn default_squeeze_min_candles() -> usize {
    60
}

fn default_cv_window() -> usize {
    60
}

fn default_min_cv_window() -> usize {
    30
}

// ============================================================================
// Accumulation Breakout
// ============================================================================

/// Breakout from a 60-day accumulation range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccumulationConfig {
    /// Minimum traded value (×10^8)
    #[serde(default = "default_accumulation_min_traded_value")]
    pub min_traded_value: f64,

    /// Maximum (max close − min close) / min close over the range (%)
    #[serde(default = "default_max_range")]
    pub max_range_pct: f64,

    #[serde(default = "default_lookback_90")]
    pub history_lookback: usize,

    /// Fewest candles (today included) needed to evaluate
    #[serde(default = "default_accumulation_min_candles")]
    pub min_candles: usize,

    /// Candles preceding today that form the range
    #[serde(default = "default_range_window")]
    pub range_window: usize,

    #[serde(default)]
    pub hygiene: HygieneConfig,
}

impl Default for AccumulationConfig {
    fn default() -> Self {
        Self {
            min_traded_value: default_accumulation_min_traded_value(),
            max_range_pct: default_max_range(),
            history_lookback: default_lookback_90(),
            min_candles: default_accumulation_min_candles(),
            range_window: default_range_window(),
            hygiene: HygieneConfig::default(),
        }
    }
}

fn default_accumulation_min_traded_value() -> f64 {
    5.0
}

fn default_max_range() -> f64 {
    30.0
}

fn default_accumulation_min_candles() -> usize {
    62
}

fn default_range_window() -> usize {
    60
}

// ============================================================================
// Pattern Scan
// ============================================================================

/// Order block / FVG scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmcScanConfig {
    /// Rising list size requested per market when no ticker is given
    #[serde(default = "default_smc_rising_limit")]
    pub rising_limit: usize,

    #[serde(default = "default_smc_lookback")]
    pub history_lookback: usize,

    #[serde(default = "default_smc_min_candles")]
    pub min_candles: usize,
}

impl Default for SmcScanConfig {
    fn default() -> Self {
        Self {
            rising_limit: default_smc_rising_limit(),
            history_lookback: default_smc_lookback(),
            min_candles: default_smc_min_candles(),
        }
    }
}

fn default_smc_rising_limit() -> usize {
    50
}

fn default_smc_lookback() -> usize {
    120
}

fn default_smc_min_candles() -> usize {
    60
}
