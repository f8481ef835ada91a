//! Smart Money Concepts pattern analysis.
//!
//! Pure functions over one ticker's daily candles. No I/O and no shared
//! state, so analyses of different series may run concurrently.
//!
//! # Patterns
//! - **levels**: swing highs/lows clustered into support/resistance prices
//! - **order_block**: the opposing candle right before an impulsive move
//! - **fvg**: three-candle gaps left by a strong move

mod fvg;
mod levels;
mod order_block;

pub use fvg::{detect_fair_value_gaps, FairValueGap};
pub use levels::{cluster_levels, support_resistance_levels, swing_points, SwingPoints};
pub use order_block::{detect_order_blocks, rolling_body_mean, OrderBlock};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::Candle;

// ============================================================================
// Shared Types
// ============================================================================

/// Direction of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
        }
    }
}

/// First candle at or after `from` matching `touches`, as its date.
///
/// Linear forward scan; daily series are short enough that the quadratic
/// total over all zones stays small.
pub(crate) fn find_mitigation<F>(candles: &[Candle], from: usize, touches: F) -> Option<NaiveDate>
where
    F: Fn(&Candle) -> bool,
{
    candles.get(from..)?.iter().find(|c| touches(c)).map(|c| c.date)
}

// ============================================================================
// Analyzer Configuration
// ============================================================================

/// Tunables for [`SmcAnalyzer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Candles on each side a swing point must strictly exceed
    #[serde(default = "default_swing_window")]
    pub swing_window: usize,

    /// Relative distance (0.015 = 1.5%) within which swing prices merge
    #[serde(default = "default_merge_tolerance")]
    pub merge_tolerance: f64,

    /// Impulse body must exceed this multiple of the rolling mean body
    #[serde(default = "default_impulse_body_multiplier")]
    pub impulse_body_multiplier: f64,

    /// Rolling window for the mean body size
    #[serde(default = "default_body_mean_period")]
    pub body_mean_period: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            swing_window: default_swing_window(),
            merge_tolerance: default_merge_tolerance(),
            impulse_body_multiplier: default_impulse_body_multiplier(),
            body_mean_period: default_body_mean_period(),
        }
    }
}

fn default_swing_window() -> usize {
    10
}

fn default_merge_tolerance() -> f64 {
    0.015
}

fn default_impulse_body_multiplier() -> f64 {
    1.5
}

fn default_body_mean_period() -> usize {
    20
}

// ============================================================================
// Analyzer
// ============================================================================

/// All patterns found in one series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmcAnalysis {
    /// Support/resistance prices, ascending
    pub levels: Vec<i64>,
    /// Order blocks in detection order
    pub order_blocks: Vec<OrderBlock>,
    /// Fair-value gaps in detection order
    pub fair_value_gaps: Vec<FairValueGap>,
}

impl SmcAnalysis {
    /// Whether any order block or fair-value gap was found.
    pub fn has_zones(&self) -> bool {
        !self.order_blocks.is_empty() || !self.fair_value_gaps.is_empty()
    }

    /// Order blocks not yet revisited by price.
    pub fn open_order_blocks(&self) -> impl Iterator<Item = &OrderBlock> {
        self.order_blocks.iter().filter(|ob| !ob.mitigated)
    }

    /// Fair-value gaps not yet filled.
    pub fn open_fair_value_gaps(&self) -> impl Iterator<Item = &FairValueGap> {
        self.fair_value_gaps.iter().filter(|g| !g.mitigated)
    }
}

/// Facade running every detector with one configuration.
#[derive(Debug, Clone, Default)]
pub struct SmcAnalyzer {
    config: AnalyzerConfig,
}

impl SmcAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Run level, order-block and gap detection over `candles`.
    pub fn analyze(&self, candles: &[Candle]) -> SmcAnalysis {
        SmcAnalysis {
            levels: self.levels(candles),
            order_blocks: self.order_blocks(candles),
            fair_value_gaps: detect_fair_value_gaps(candles),
        }
    }

    pub fn levels(&self, candles: &[Candle]) -> Vec<i64> {
        support_resistance_levels(candles, self.config.swing_window, self.config.merge_tolerance)
    }

    pub fn order_blocks(&self, candles: &[Candle]) -> Vec<OrderBlock> {
        detect_order_blocks(
            candles,
            self.config.impulse_body_multiplier,
            self.config.body_mean_period,
        )
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn day(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64)
    }

    pub fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            date: day(i),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }
}
