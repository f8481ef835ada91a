//! Order block detection.
//!
//! An order block is the last opposing candle before an impulsive move:
//! a down candle followed by a large up candle that closes above it
//! (bullish), or the mirror image (bearish).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{find_mitigation, Direction};
use crate::data::Candle;

/// Fewest candles that can hold an order block plus follow-through.
const MIN_CANDLES: usize = 5;

/// A price zone anchored on the candle preceding an impulse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    pub direction: Direction,
    /// Date of the opposing candle
    pub anchor_date: NaiveDate,
    /// max(open, close) of the opposing candle
    pub top: f64,
    /// min(open, close) of the opposing candle
    pub bottom: f64,
    /// Whether price re-entered the zone after the impulse
    pub mitigated: bool,
    pub mitigation_date: Option<NaiveDate>,
}

/// Trailing mean of body sizes, including the current candle.
///
/// Indices with fewer than `period` candles behind them average over what
/// is available.
pub fn rolling_body_mean(candles: &[Candle], period: usize) -> Vec<f64> {
    let period = period.max(1);
    let mut means = Vec::with_capacity(candles.len());
    let mut sum = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        sum += candle.body_size();
        if i >= period {
            sum -= candles[i - period].body_size();
        }
        let count = (i + 1).min(period);
        means.push(sum / count as f64);
    }

    means
}

/// Detect order blocks, in index order, with mitigation resolved against
/// the rest of the series.
pub fn detect_order_blocks(candles: &[Candle], impulse_multiplier: f64, body_period: usize) -> Vec<OrderBlock> {
    if candles.len() < MIN_CANDLES {
        return Vec::new();
    }

    let body_means = rolling_body_mean(candles, body_period);
    let mut blocks = Vec::new();

    for i in 2..=candles.len() - 3 {
        let (prev, curr) = (&candles[i - 1], &candles[i]);
        if curr.body_size() <= impulse_multiplier * body_means[i] {
            continue;
        }

        let direction = if curr.is_bullish() && curr.close > prev.high && prev.is_bearish() {
            Direction::Bullish
        } else if curr.is_bearish() && curr.close < prev.low && prev.is_bullish() {
            Direction::Bearish
        } else {
            continue;
        };

        let top = prev.open.max(prev.close);
        let bottom = prev.open.min(prev.close);
        let mitigation_date = find_mitigation(candles, i + 1, |c| c.low <= top && c.high >= bottom);

        blocks.push(OrderBlock {
            direction,
            anchor_date: prev.date,
            top,
            bottom,
            mitigated: mitigation_date.is_some(),
            mitigation_date,
        });
    }

    blocks
}
