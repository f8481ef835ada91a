//! Accumulation breakout scan: price and volume break out of a narrow
//! 60-day range.

use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::{Candle, Market, MarketDataProvider, SnapshotRow};

use super::candidate::{CandidateMetrics, ScanKind, ScanOutcome, ScreenerCandidate};
use super::config::{AccumulationConfig, TRADED_VALUE_UNIT};
use super::engine::ScreenerEngine;
use super::quantitative::{change_pct, FilterResult, FilterStage, HygieneFilter};

/// Measurements of a confirmed range breakout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeBreakout {
    /// (max close − min close) / min close over the range (%)
    pub range_pct: f64,
    /// Highest close within the range
    pub range_high: f64,
    /// Close of the last candle before today
    pub base_close: f64,
    /// Today's change against `base_close` (%)
    pub change_pct: f64,
}

/// Check today's candle against the `range_window` candles before it.
///
/// All three must hold: the range is narrower than `max_range_pct`, today
/// closes above the range's highest close, and today's volume exceeds the
/// range's highest volume.
pub fn detect_range_breakout(candles: &[Candle], cfg: &AccumulationConfig) -> Option<RangeBreakout> {
    if candles.len() < cfg.min_candles || candles.len() < cfg.range_window + 1 {
        return None;
    }
    let today = &candles[candles.len() - 1];
    let range = &candles[candles.len() - 1 - cfg.range_window..candles.len() - 1];

    let max_close = range.iter().map(|c| c.close).fold(f64::MIN, f64::max);
    let min_close = range.iter().map(|c| c.close).fold(f64::MAX, f64::min);
    let max_volume = range.iter().map(|c| c.volume).fold(f64::MIN, f64::max);
    if min_close <= 0.0 {
        return None;
    }

    let range_pct = (max_close - min_close) / min_close * 100.0;
    if range_pct >= cfg.max_range_pct || today.close <= max_close || today.volume <= max_volume {
        return None;
    }

    let base_close = range.last()?.close;
    Some(RangeBreakout {
        range_pct,
        range_high: max_close,
        base_close,
        change_pct: change_pct(today.close, base_close)?,
    })
}

impl<P: MarketDataProvider> ScreenerEngine<P> {
    /// Find tickers breaking out of a quiet accumulation range.
    ///
    /// Ranked by traded value descending.
    pub async fn run_accumulation(&self, date: Option<NaiveDate>) -> ScanOutcome {
        let cfg = &self.config.accumulation;
        let kind = ScanKind::Accumulation;
        let started_at = Utc::now();
        let mut funnel = Vec::new();

        let Some(target) = self.resolve_date(date).await else {
            return ScanOutcome::unavailable(kind, None, "no recent trading date", funnel, started_at);
        };

        let snapshot = match self.provider.get_market_snapshot(target, Market::All).await {
            Ok(snapshot) if !snapshot.is_empty() => snapshot,
            Ok(_) => {
                let reason = format!("no market data for {}", target);
                return ScanOutcome::unavailable(kind, Some(target), reason, funnel, started_at);
            }
            Err(e) => {
                let reason = format!("market snapshot for {} failed: {}", target, e);
                return ScanOutcome::unavailable(kind, Some(target), reason, funnel, started_at);
            }
        };

        info!(
            %target,
            tickers = snapshot.len(),
            max_range = cfg.max_range_pct,
            "Starting accumulation scan"
        );

        // Phase 1: Traded value floor and hygiene
        let total = snapshot.len();
        funnel.push(FilterResult::new(FilterStage::Input, total, total));

        let min_value = cfg.min_traded_value * TRADED_VALUE_UNIT;
        let liquid: Vec<(String, SnapshotRow)> = snapshot
            .rows
            .iter()
            .filter(|(_, row)| row.traded_value >= min_value)
            .map(|(ticker, row)| (ticker.clone(), *row))
            .collect();
        funnel.push(FilterResult::new(FilterStage::Liquidity, total, liquid.len()));

        let hygiene = HygieneFilter::new(cfg.hygiene.clone());
        let before_hygiene = liquid.len();
        let clean: Vec<(String, SnapshotRow, String)> = stream::iter(
            liquid
                .into_iter()
                .filter(|(ticker, row)| hygiene.passes_row(ticker, row)),
        )
        .map(move |(ticker, row)| async move {
            let name = self.lookup_name(&ticker).await;
            (ticker, row, name)
        })
        .buffered(self.concurrency)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .filter_map(|(ticker, row, name)| {
            let name = name?;
            hygiene.passes_name(&name).then_some((ticker, row, name))
        })
        .collect();
        funnel.push(FilterResult::new(FilterStage::Hygiene, before_hygiene, clean.len()));
        info!(passed = clean.len(), "Phase 1 (Liquidity + hygiene filter) complete");

        // Phase 2: Range breakout on history
        let before_breakout = clean.len();
        let lookback = cfg.history_lookback;
        let mut candidates: Vec<ScreenerCandidate> = stream::iter(clean)
            .map(move |(ticker, row, name)| async move {
                let history = self.provider.get_history_as_of(&ticker, lookback, target).await;
                (ticker, row, name, history)
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .filter_map(|(ticker, row, name, history)| {
                let history = match history {
                    Ok(history) => history,
                    Err(e) => {
                        debug!(ticker = %ticker, error = %e, "History unavailable, skipping");
                        return None;
                    }
                };
                let breakout = detect_range_breakout(&history, cfg)?;
                let today = history.last()?;
                Some(ScreenerCandidate {
                    themes: self.theme_tags(&ticker),
                    ticker,
                    name,
                    price: today.close,
                    prev_close: Some(breakout.base_close),
                    change_pct: breakout.change_pct,
                    volume: today.volume,
                    traded_value: row.traded_value,
                    conditions: vec![
                        format!("Range {}%", breakout.range_pct.trunc() as i64),
                        "Breakout".to_string(),
                    ],
                    metrics: CandidateMetrics {
                        volume_ratio: None,
                        cv_pct: None,
                        range_pct: Some(breakout.range_pct),
                    },
                })
            })
            .collect();
        funnel.push(FilterResult::new(FilterStage::Breakout, before_breakout, candidates.len()));

        candidates.sort_by(|a, b| b.traded_value.total_cmp(&a.traded_value));

        let outcome = ScanOutcome::completed(kind, Some(target), candidates, funnel, started_at);
        info!("{}", outcome.summary());
        outcome
    }
}
