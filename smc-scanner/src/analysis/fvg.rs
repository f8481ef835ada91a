//! Fair-value gap detection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{find_mitigation, Direction};
use crate::data::Candle;

/// A three-candle gap between the first and third candle's extremes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    pub direction: Direction,
    /// Date of the middle candle
    pub anchor_date: NaiveDate,
    pub top: f64,
    pub bottom: f64,
    /// Whether a later candle reached back into the gap
    pub mitigated: bool,
    pub mitigation_date: Option<NaiveDate>,
}

impl FairValueGap {
    pub fn size(&self) -> f64 {
        self.top - self.bottom
    }
}

/// Detect fair-value gaps in index order.
///
/// Bullish: the middle candle is up and the first high sits strictly below
/// the third low. Bearish mirrors it. Mitigation is searched from the candle
/// after the third one: a bullish gap fills when a low reaches its top, a
/// bearish gap when a high reaches its bottom.
pub fn detect_fair_value_gaps(candles: &[Candle]) -> Vec<FairValueGap> {
    if candles.len() < 3 {
        return Vec::new();
    }

    let mut gaps = Vec::new();
    for i in 0..=candles.len() - 3 {
        let (c1, c2, c3) = (&candles[i], &candles[i + 1], &candles[i + 2]);

        let (direction, top, bottom) = if c2.is_bullish() && c1.high < c3.low {
            (Direction::Bullish, c3.low, c1.high)
        } else if c2.is_bearish() && c1.low > c3.high {
            (Direction::Bearish, c1.low, c3.high)
        } else {
            continue;
        };

        let mitigation_date = match direction {
            Direction::Bullish => find_mitigation(candles, i + 3, |c| c.low <= top),
            Direction::Bearish => find_mitigation(candles, i + 3, |c| c.high >= bottom),
        };

        gaps.push(FairValueGap {
            direction,
            anchor_date: c2.date,
            top,
            bottom,
            mitigated: mitigation_date.is_some(),
            mitigation_date,
        });
    }

    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::{bar, day};

    #[test]
    fn test_three_day_bullish_gap() {
        let candles = vec![
            bar(0, 98.0, 100.0, 97.0, 99.0),
            bar(1, 99.5, 108.0, 99.0, 107.5),
            bar(2, 107.0, 110.0, 105.0, 109.0),
        ];
        let gaps = detect_fair_value_gaps(&candles);
        assert_eq!(gaps.len(), 1);

        let gap = &gaps[0];
        assert_eq!(gap.direction, Direction::Bullish);
        assert_eq!(gap.bottom, 100.0);
        assert_eq!(gap.top, 105.0);
        assert_eq!(gap.anchor_date, day(1));
        assert_eq!(gap.size(), 5.0);
        assert!(!gap.mitigated);
    }

    #[test]
    fn test_touching_extremes_are_not_a_gap() {
        let candles = vec![
            bar(0, 98.0, 100.0, 97.0, 99.0),
            bar(1, 99.5, 108.0, 99.0, 107.5),
            bar(2, 107.0, 110.0, 100.0, 109.0),
        ];
        assert!(detect_fair_value_gaps(&candles).is_empty());
    }

    #[test]
    fn test_gap_needs_matching_middle_candle() {
        // Gap exists but the middle candle closed down.
        let candles = vec![
            bar(0, 98.0, 100.0, 97.0, 99.0),
            bar(1, 108.0, 108.5, 99.0, 104.0),
            bar(2, 107.0, 110.0, 105.0, 109.0),
        ];
        assert!(detect_fair_value_gaps(&candles).is_empty());
    }

    #[test]
    fn test_bearish_gap_and_mitigation() {
        let candles = vec![
            bar(0, 101.0, 102.0, 100.0, 100.5),
            bar(1, 100.0, 100.5, 93.0, 94.0),
            bar(2, 94.0, 96.0, 92.0, 93.0),
            bar(3, 93.0, 95.5, 92.5, 95.0),
            bar(4, 95.0, 97.0, 94.5, 96.5),
        ];
        let gaps = detect_fair_value_gaps(&candles);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].direction, Direction::Bearish);
        assert_eq!((gaps[0].top, gaps[0].bottom), (100.0, 96.0));
        assert_eq!(gaps[0].mitigation_date, Some(day(4)));
    }

    #[test]
    fn test_bullish_mitigation_starts_after_third_candle() {
        let candles = vec![
            bar(0, 98.0, 100.0, 97.0, 99.0),
            bar(1, 99.5, 108.0, 99.0, 107.5),
            bar(2, 107.0, 110.0, 105.0, 109.0),
            bar(3, 109.0, 111.0, 106.0, 110.0),
            bar(4, 110.0, 110.5, 104.5, 105.0),
        ];
        let gaps = detect_fair_value_gaps(&candles);
        let first = gaps.iter().find(|g| g.anchor_date == day(1)).unwrap();
        assert!(first.mitigated);
        assert_eq!(first.mitigation_date, Some(day(4)));
    }

    #[test]
    fn test_short_series() {
        let candles = vec![bar(0, 1.0, 2.0, 0.5, 1.5), bar(1, 1.5, 3.0, 1.0, 2.5)];
        assert!(detect_fair_value_gaps(&candles).is_empty());
    }
}
