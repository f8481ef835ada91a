//! Universe screener module.
//!
//! Multi-stage funnels over many tickers, cheapest filters first:
//! - **Realtime momentum**: today's risers → traded value → conditions
//! - **Daily momentum**: full snapshot → liquidity/hygiene/change → conditions
//! - **Squeeze**: volume spike → hygiene → CV of prior closes
//! - **Accumulation**: liquidity/hygiene → 60-day range breakout
//! - **Patterns**: order blocks and fair-value gaps per ticker

mod accumulation;
mod candidate;
pub mod conditions;
mod config;
mod engine;
mod momentum;
mod quantitative;
mod smc;
mod squeeze;

pub use accumulation::{detect_range_breakout, RangeBreakout};
pub use candidate::{CandidateMetrics, ScanKind, ScanOutcome, ScanStatus, ScreenerCandidate, MAX_THEMES};
pub use conditions::{evaluate_conditions, ConditionReport, Indicator, IndicatorOutcome};
pub use config::{
    AccumulationConfig, DailyConfig, HygieneConfig, RealtimeConfig, ScreenerConfig, SmcScanConfig,
    SqueezeConfig, TRADED_VALUE_UNIT,
};
pub use engine::{ScreenerEngine, DEFAULT_CONCURRENCY};
pub use quantitative::{change_pct, passes_liquidity, FilterResult, FilterStage, HygieneFilter};
pub use smc::SmcReport;
pub use squeeze::{coefficient_of_variation, prior_close_cv};
