//! Squeeze breakout scan: a volume spike out of a tight price range.

use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use statrs::statistics::Statistics;
use tracing::{debug, info};

use crate::data::{previous_trading_snapshot, Candle, Market, MarketDataProvider, SnapshotRow};

use super::candidate::{CandidateMetrics, ScanKind, ScanOutcome, ScreenerCandidate};
use super::config::SqueezeConfig;
use super::engine::ScreenerEngine;
use super::quantitative::{change_pct, FilterResult, FilterStage, HygieneFilter};

/// Sample standard deviation over mean, as a percentage.
///
/// `None` for fewer than two values or a zero mean.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().mean();
    if mean == 0.0 || !mean.is_finite() {
        return None;
    }
    let cv = values.iter().std_dev() / mean * 100.0;
    cv.is_finite().then_some(cv)
}

/// CV of the closes preceding today, or `None` when the history is too short.
pub fn prior_close_cv(candles: &[Candle], cfg: &SqueezeConfig) -> Option<f64> {
    if candles.is_empty() || candles.len() < cfg.min_candles {
        return None;
    }
    let prior = &candles[..candles.len() - 1];
    let window = &prior[prior.len().saturating_sub(cfg.cv_window)..];
    if window.len() < cfg.min_cv_window {
        return None;
    }
    let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
    coefficient_of_variation(&closes)
}

/// A ticker whose volume jumped against the previous session.
struct Spike {
    ticker: String,
    row: SnapshotRow,
    prev_close: f64,
    volume_ratio: f64,
}

impl<P: MarketDataProvider> ScreenerEngine<P> {
    /// Find tickers whose volume spiked out of a tight 60-day range.
    ///
    /// Ranked by CV ascending (tightest range first).
    pub async fn run_squeeze(&self, date: Option<NaiveDate>) -> ScanOutcome {
        let cfg = &self.config.squeeze;
        let kind = ScanKind::Squeeze;
        let started_at = Utc::now();
        let mut funnel = Vec::new();

        let Some(target) = self.resolve_date(date).await else {
            return ScanOutcome::unavailable(kind, None, "no recent trading date", funnel, started_at);
        };

        let today = match self.provider.get_market_snapshot(target, Market::All).await {
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
        let Some(previous) =
            previous_trading_snapshot(self.provider.as_ref(), target, Market::All).await
        else {
            let reason = format!("no trading date before {}", target);
            return ScanOutcome::unavailable(kind, Some(target), reason, funnel, started_at);
        };

        info!(
            %target,
            previous = %previous.date,
            volume_multiple = cfg.volume_multiple,
            max_cv = cfg.max_cv_pct,
            "Starting squeeze scan"
        );

        // Phase 1: Volume spike against the previous session
        let total = today.len();
        funnel.push(FilterResult::new(FilterStage::Input, total, total));

        let spikes: Vec<Spike> = today
            .rows
            .iter()
            .filter_map(|(ticker, row)| {
                let prev = previous.get(ticker)?;
                if prev.volume <= 0.0 {
                    return None;
                }
                let volume_ratio = row.volume / prev.volume;
                (volume_ratio >= cfg.volume_multiple).then(|| Spike {
                    ticker: ticker.clone(),
                    row: *row,
                    prev_close: prev.close,
                    volume_ratio,
                })
            })
            .collect();
        funnel.push(FilterResult::new(FilterStage::VolumeSpike, total, spikes.len()));

        let hygiene = HygieneFilter::new(cfg.hygiene.clone());
        let before_hygiene = spikes.len();
        let clean: Vec<(Spike, String)> = stream::iter(
            spikes
                .into_iter()
                .filter(|s| hygiene.passes_row(&s.ticker, &s.row)),
        )
        .map(move |spike| async move {
            let name = self.lookup_name(&spike.ticker).await;
            (spike, name)
        })
        .buffered(self.concurrency)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .filter_map(|(spike, name)| {
            let name = name?;
            hygiene.passes_name(&name).then_some((spike, name))
        })
        .collect();
        funnel.push(FilterResult::new(FilterStage::Hygiene, before_hygiene, clean.len()));
        info!(passed = clean.len(), "Phase 1 (Volume spike filter) complete");

        // Phase 2: Coefficient of variation of prior closes
        let before_volatility = clean.len();
        let lookback = cfg.history_lookback;
        let mut candidates: Vec<(ScreenerCandidate, f64)> = stream::iter(clean)
            .map(move |(spike, name)| async move {
                let history = self
                    .provider
                    .get_history_as_of(&spike.ticker, lookback, target)
                    .await;
                (spike, name, history)
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .filter_map(|(spike, name, history)| {
                let history = match history {
                    Ok(history) => history,
                    Err(e) => {
                        debug!(ticker = %spike.ticker, error = %e, "History unavailable, skipping");
                        return None;
                    }
                };
                let cv = prior_close_cv(&history, cfg)?;
                if cv > cfg.max_cv_pct {
                    return None;
                }
                let candidate = ScreenerCandidate {
                    themes: self.theme_tags(&spike.ticker),
                    ticker: spike.ticker,
                    name,
                    price: spike.row.close,
                    prev_close: Some(spike.prev_close),
                    change_pct: change_pct(spike.row.close, spike.prev_close).unwrap_or(0.0),
                    volume: spike.row.volume,
                    traded_value: spike.row.traded_value,
                    conditions: vec![
                        format!("Vol {:.1}x", cfg.volume_multiple),
                        format!("CV {:.1}%", cv),
                    ],
                    metrics: CandidateMetrics {
                        volume_ratio: Some(spike.volume_ratio),
                        cv_pct: Some(cv),
                        range_pct: None,
                    },
                };
                Some((candidate, cv))
            })
            .collect();
        funnel.push(FilterResult::new(
            FilterStage::Volatility,
            before_volatility,
            candidates.len(),
        ));

        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
        let candidates = candidates.into_iter().map(|(c, _)| c).collect();

        let outcome = ScanOutcome::completed(kind, Some(target), candidates, funnel, started_at);
        info!("{}", outcome.summary());
        outcome
    }
}
