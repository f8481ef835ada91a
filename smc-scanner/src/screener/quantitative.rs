//! Funnel bookkeeping and universe hygiene rules.
//!
//! Every pipeline is a funnel: each stage narrows the candidate set and
//! records a [`FilterResult`] so callers can see where tickers dropped out.

use serde::{Deserialize, Serialize};

use super::config::{HygieneConfig, TRADED_VALUE_UNIT};
use crate::data::SnapshotRow;

// ============================================================================
// Filter Stage
// ============================================================================

/// Filter stage identifier for tracking where tickers are eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    /// Input universe
    Input,
    /// Change from previous close
    Change,
    /// Theme tag present
    Theme,
    /// Traded value / volume floor
    Liquidity,
    /// Price floor, code suffix and name exclusions
    Hygiene,
    /// Volume multiple over the previous day
    VolumeSpike,
    /// Technical condition count
    Conditions,
    /// Coefficient of variation of prior closes
    Volatility,
    /// Range breakout on price and volume
    Breakout,
    /// Order block / fair-value gap presence
    Patterns,
    /// Final selection
    Final,
}

impl std::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Change => write!(f, "change"),
            Self::Theme => write!(f, "theme"),
            Self::Liquidity => write!(f, "liquidity"),
            Self::Hygiene => write!(f, "hygiene"),
            Self::VolumeSpike => write!(f, "volume spike"),
            Self::Conditions => write!(f, "conditions"),
            Self::Volatility => write!(f, "volatility"),
            Self::Breakout => write!(f, "breakout"),
            Self::Patterns => write!(f, "patterns"),
            Self::Final => write!(f, "final"),
        }
    }
}

// ============================================================================
// Filter Result
// ============================================================================

/// Result of a filtering stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterResult {
    /// Stage name
    pub stage: FilterStage,
    /// Number of tickers that passed this stage
    pub passed: usize,
    /// Number of tickers eliminated at this stage
    pub eliminated: usize,
    /// Elimination rate (%)
    pub elimination_rate: f64,
}

impl FilterResult {
    pub fn new(stage: FilterStage, input_count: usize, passed_count: usize) -> Self {
        let eliminated = input_count.saturating_sub(passed_count);
        let elimination_rate = if input_count > 0 {
            (eliminated as f64 / input_count as f64) * 100.0
        } else {
            0.0
        };

        Self {
            stage,
            passed: passed_count,
            eliminated,
            elimination_rate,
        }
    }
}

// ============================================================================
// Hygiene Filter
// ============================================================================

/// Exclusion rules applied to snapshot rows and ticker names.
#[derive(Debug, Clone)]
pub struct HygieneFilter {
    config: HygieneConfig,
}

impl HygieneFilter {
    pub fn new(config: HygieneConfig) -> Self {
        Self { config }
    }

    /// Whether the close clears the price floor, if any.
    pub fn passes_price(&self, close: f64) -> bool {
        self.config.min_price.map_or(true, |floor| close >= floor)
    }

    /// Whether the code's last character is not an excluded digit.
    pub fn passes_code(&self, ticker: &str) -> bool {
        ticker
            .chars()
            .last()
            .map_or(true, |c| !self.config.excluded_suffix_digits.contains(&c))
    }

    /// Whether the name is non-empty and free of excluded fragments.
    pub fn passes_name(&self, name: &str) -> bool {
        !name.trim().is_empty()
            && !self
                .config
                .excluded_name_patterns
                .iter()
                .any(|pattern| name.contains(pattern.as_str()))
    }

    /// Row-level rules: code and price.
    pub fn passes_row(&self, ticker: &str, row: &SnapshotRow) -> bool {
        self.passes_code(ticker) && self.passes_price(row.close)
    }
}

/// Whether a row traded at least `min_traded_value` ×10^8 with real prints.
pub fn passes_liquidity(row: &SnapshotRow, min_traded_value: f64) -> bool {
    row.traded_value >= min_traded_value * TRADED_VALUE_UNIT && row.volume > 0.0 && row.open > 0.0
}

/// Percent change; `None` without a positive base.
pub fn change_pct(current: f64, base: f64) -> Option<f64> {
    (base > 0.0).then(|| (current - base) / base * 100.0)
}
