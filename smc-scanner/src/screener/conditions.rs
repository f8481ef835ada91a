//! Technical condition checks shared by the momentum scans.
//!
//! Each indicator is evaluated on its own and reports an
//! [`IndicatorOutcome`]; a missing window for one never blocks the others.

use serde::{Deserialize, Serialize};

use crate::data::Candle;

/// Fewest candles for any condition to be evaluated.
pub const MIN_CANDLES: usize = 20;

const SHORT_MA: usize = 5;
const LONG_MA: usize = 20;
/// Cross lookback: the short MA must have been at or below the long MA
/// this many candles back (today counts as one).
const CROSS_LOOKBACK: usize = 3;
const VOLUME_BASELINE: usize = 20;
const VOLUME_EXPLOSION_MULTIPLE: f64 = 3.0;
const BREAKOUT_PERIOD: usize = 60;
const SURGE_PERIOD: usize = 7;
const SURGE_MIN_PCT: f64 = 15.0;
const RSI_PERIOD: usize = 14;
const RSI_THRESHOLD: f64 = 60.0;

/// The technical conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    /// 5-day MA above the 20-day MA, flagged as a cross when recent
    MaTrend,
    /// Volume at least 3× the prior 20-day mean
    VolumeExplosion,
    /// Close above the 20-day MA
    AboveMa20,
    /// Close at or above the prior 59-day high
    High60,
    /// Close 15% or more above the 7-day low
    Surge7d,
    /// 14-period RSI at 60 or above
    Rsi,
}

impl Indicator {
    pub const ALL: [Indicator; 6] = [
        Self::MaTrend,
        Self::VolumeExplosion,
        Self::AboveMa20,
        Self::High60,
        Self::Surge7d,
        Self::Rsi,
    ];
}

/// Result of evaluating one indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "tag", rename_all = "snake_case")]
pub enum IndicatorOutcome {
    Fired(String),
    NotFired,
    InsufficientData,
}

impl IndicatorOutcome {
    fn fired_if(condition: bool, tag: impl Into<String>) -> Self {
        if condition {
            Self::Fired(tag.into())
        } else {
            Self::NotFired
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Fired(tag) => Some(tag),
            _ => None,
        }
    }
}

/// Per-indicator outcomes for one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionReport {
    pub outcomes: Vec<(Indicator, IndicatorOutcome)>,
}

impl ConditionReport {
    /// Fired tags in evaluation order.
    pub fn tags(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|(_, outcome)| outcome.tag().map(str::to_string))
            .collect()
    }

    /// Number of fired conditions.
    pub fn count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.tag().is_some())
            .count()
    }

    pub fn outcome(&self, indicator: Indicator) -> Option<&IndicatorOutcome> {
        self.outcomes
            .iter()
            .find(|(i, _)| *i == indicator)
            .map(|(_, outcome)| outcome)
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Evaluate every condition against `candles` (oldest first, today last).
pub fn evaluate_conditions(candles: &[Candle]) -> ConditionReport {
    let outcomes = Indicator::ALL
        .iter()
        .map(|&indicator| {
            let outcome = if candles.len() < MIN_CANDLES {
                IndicatorOutcome::InsufficientData
            } else {
                evaluate(indicator, candles)
            };
            (indicator, outcome)
        })
        .collect();

    ConditionReport { outcomes }
}

fn evaluate(indicator: Indicator, candles: &[Candle]) -> IndicatorOutcome {
    match indicator {
        Indicator::MaTrend => ma_trend(candles),
        Indicator::VolumeExplosion => volume_explosion(candles),
        Indicator::AboveMa20 => above_ma20(candles),
        Indicator::High60 => high_60(candles),
        Indicator::Surge7d => surge_7d(candles),
        Indicator::Rsi => rsi(candles),
    }
}

/// Mean close over the `period` candles ending at index `end` (inclusive).
fn close_ma(candles: &[Candle], period: usize, end: usize) -> Option<f64> {
    if period == 0 || end >= candles.len() || end + 1 < period {
        return None;
    }
    let window = &candles[end + 1 - period..=end];
    Some(window.iter().map(|c| c.close).sum::<f64>() / period as f64)
}

fn ma_trend(candles: &[Candle]) -> IndicatorOutcome {
    let last = candles.len() - 1;
    let (Some(short), Some(long)) = (close_ma(candles, SHORT_MA, last), close_ma(candles, LONG_MA, last))
    else {
        return IndicatorOutcome::InsufficientData;
    };
    if short <= long {
        return IndicatorOutcome::NotFired;
    }

    let crossed = candles
        .len()
        .checked_sub(CROSS_LOOKBACK)
        .and_then(|end| Some((close_ma(candles, SHORT_MA, end)?, close_ma(candles, LONG_MA, end)?)))
        .is_some_and(|(short_then, long_then)| short_then <= long_then);

    IndicatorOutcome::Fired(if crossed { "GoldenX" } else { "MA5>20" }.to_string())
}

fn volume_explosion(candles: &[Candle]) -> IndicatorOutcome {
    if candles.len() < VOLUME_BASELINE + 1 {
        return IndicatorOutcome::InsufficientData;
    }
    let today = candles.len() - 1;
    let baseline = &candles[today - VOLUME_BASELINE..today];
    let mean = baseline.iter().map(|c| c.volume).sum::<f64>() / VOLUME_BASELINE as f64;

    IndicatorOutcome::fired_if(
        mean > 0.0 && candles[today].volume >= VOLUME_EXPLOSION_MULTIPLE * mean,
        "Vol3x",
    )
}

fn above_ma20(candles: &[Candle]) -> IndicatorOutcome {
    let last = candles.len() - 1;
    match close_ma(candles, LONG_MA, last) {
        Some(ma) => IndicatorOutcome::fired_if(candles[last].close > ma, "MA20+"),
        None => IndicatorOutcome::InsufficientData,
    }
}

fn high_60(candles: &[Candle]) -> IndicatorOutcome {
    if candles.len() < BREAKOUT_PERIOD {
        return IndicatorOutcome::InsufficientData;
    }
    let today = candles.len() - 1;
    let prior_high = candles[today + 1 - BREAKOUT_PERIOD..today]
        .iter()
        .map(|c| c.high)
        .fold(f64::MIN, f64::max);

    IndicatorOutcome::fired_if(candles[today].close >= prior_high, "High60")
}

fn surge_7d(candles: &[Candle]) -> IndicatorOutcome {
    let today = candles.len() - 1;
    let low = candles[candles.len() - SURGE_PERIOD..]
        .iter()
        .map(|c| c.low)
        .fold(f64::MAX, f64::min);
    if low <= 0.0 {
        return IndicatorOutcome::InsufficientData;
    }

    let surge_pct = (candles[today].close - low) / low * 100.0;
    IndicatorOutcome::fired_if(surge_pct >= SURGE_MIN_PCT, "Surge7d")
}

/// Simple-average RSI over the last `period` close-to-close changes.
///
/// `None` when the series is too short or the closes never moved.
pub fn rsi_value(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }
    let recent = &candles[candles.len() - period - 1..];
    let (gain, loss) = recent.windows(2).fold((0.0, 0.0), |(gain, loss), pair| {
        let delta = pair[1].close - pair[0].close;
        if delta > 0.0 {
            (gain + delta, loss)
        } else {
            (gain, loss - delta)
        }
    });
    let (avg_gain, avg_loss) = (gain / period as f64, loss / period as f64);

    if avg_loss == 0.0 {
        return (avg_gain > 0.0).then_some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

fn rsi(candles: &[Candle]) -> IndicatorOutcome {
    if candles.len() < RSI_PERIOD + 1 {
        return IndicatorOutcome::InsufficientData;
    }
    // No movement at all leaves RSI undefined.
    match rsi_value(candles, RSI_PERIOD) {
        Some(value) => IndicatorOutcome::fired_if(
            value >= RSI_THRESHOLD,
            format!("RSI{}", value.round() as i64),
        ),
        None => IndicatorOutcome::NotFired,
    }
}

// ============================================================================
// Tests
// ============================================================================
