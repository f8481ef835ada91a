//! Support/resistance levels from clustered swing points.

use serde::{Deserialize, Serialize};

use crate::data::Candle;

/// Indices and prices of swing highs and lows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwingPoints {
    pub highs: Vec<(usize, f64)>,
    pub lows: Vec<(usize, f64)>,
}

impl SwingPoints {
    pub fn len(&self) -> usize {
        self.highs.len() + self.lows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.highs.is_empty() && self.lows.is_empty()
    }

    /// All swing prices, highs first.
    pub fn prices(&self) -> Vec<f64> {
        self.highs
            .iter()
            .chain(self.lows.iter())
            .map(|&(_, price)| price)
            .collect()
    }
}

/// Find swing points with `window` candles on each side.
///
/// A swing high strictly exceeds every high within `window` candles before
/// and after it; ties disqualify. Lows mirror this. Only indices with a full
/// window on both sides are considered.
pub fn swing_points(candles: &[Candle], window: usize) -> SwingPoints {
    let mut points = SwingPoints::default();
    if window == 0 || candles.len() < 2 * window + 1 {
        return points;
    }

    for i in window..candles.len() - window {
        let neighbours = candles[i - window..i]
            .iter()
            .chain(candles[i + 1..=i + window].iter());

        let (mut is_high, mut is_low) = (true, true);
        for other in neighbours {
            is_high &= candles[i].high > other.high;
            is_low &= candles[i].low < other.low;
            if !is_high && !is_low {
                break;
            }
        }

        if is_high {
            points.highs.push((i, candles[i].high));
        }
        if is_low {
            points.lows.push((i, candles[i].low));
        }
    }

    points
}

fn relative_distance(value: f64, anchor: f64) -> f64 {
    if anchor == 0.0 {
        if value == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        ((value - anchor) / anchor).abs()
    }
}

fn truncated_mean(values: &[f64]) -> i64 {
    (values.iter().sum::<f64>() / values.len() as f64).trunc() as i64
}

/// Greedily cluster prices and return each cluster's truncated mean.
///
/// Values are sorted ascending; a value joins the current cluster when its
/// relative distance from the cluster's most recent member is at most
/// `tolerance`.
pub fn cluster_levels(values: &[f64], tolerance: f64) -> Vec<i64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut levels = Vec::new();
    let mut cluster: Vec<f64> = Vec::new();

    for value in sorted {
        match cluster.last() {
            Some(&last) if relative_distance(value, last) > tolerance => {
                levels.push(truncated_mean(&cluster));
                cluster.clear();
                cluster.push(value);
            }
            _ => cluster.push(value),
        }
    }
    if !cluster.is_empty() {
        levels.push(truncated_mean(&cluster));
    }

    levels
}

/// Support/resistance prices for a series, ascending.
pub fn support_resistance_levels(candles: &[Candle], window: usize, tolerance: f64) -> Vec<i64> {
    cluster_levels(&swing_points(candles, window).prices(), tolerance)
}

// ============================================================================
// Tests
// ============================================================================
