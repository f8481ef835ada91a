//! Pattern scan: order blocks and fair-value gaps across a ticker list.

use chrono::{Local, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::SmcAnalysis;
use crate::data::{Market, MarketDataProvider};

use super::candidate::{ScanKind, ScanOutcome};
use super::engine::ScreenerEngine;
use super::quantitative::{FilterResult, FilterStage};

/// Patterns found for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmcReport {
    pub ticker: String,
    pub name: String,
    /// Last close in the analyzed history
    pub price: f64,
    /// Change from the rising list, when the ticker came from one
    pub change_pct: Option<f64>,
    /// Order blocks still unmitigated
    pub open_order_blocks: usize,
    /// Fair-value gaps still unfilled
    pub open_fair_value_gaps: usize,
    #[serde(flatten)]
    pub analysis: SmcAnalysis,
}

struct Target {
    ticker: String,
    name: String,
    change_pct: Option<f64>,
}

impl<P: MarketDataProvider> ScreenerEngine<P> {
    /// Run the pattern analyzer on one ticker, or on today's top risers.
    ///
    /// Only tickers with at least one order block or fair-value gap are
    /// reported.
    pub async fn run_smc_scan(&self, ticker: Option<&str>) -> ScanOutcome<SmcReport> {
        let cfg = &self.config.smc;
        let kind = ScanKind::Patterns;
        let started_at = Utc::now();
        let today = Local::now().date_naive();
        let mut funnel = Vec::new();

        let targets: Vec<Target> = match ticker {
            Some(ticker) => match self.lookup_name(ticker).await {
                Some(name) => vec![Target {
                    ticker: ticker.to_string(),
                    name,
                    change_pct: None,
                }],
                None => {
                    let reason = format!("unknown ticker {}", ticker);
                    return ScanOutcome::unavailable(kind, Some(today), reason, funnel, started_at);
                }
            },
            None => {
                let mut targets = Vec::new();
                let mut any_list = false;
                for market in [Market::Kospi, Market::Kosdaq] {
                    match self.provider.get_rising_stocks(market, cfg.rising_limit).await {
                        Ok(list) => {
                            any_list = true;
                            targets.extend(list.into_iter().map(|s| Target {
                                ticker: s.ticker,
                                name: s.name,
                                change_pct: Some(s.change_pct),
                            }));
                        }
                        Err(e) => warn!(%market, error = %e, "Rising list unavailable"),
                    }
                }
                if !any_list {
                    return ScanOutcome::unavailable(
                        kind,
                        Some(today),
                        "rising stock lists unavailable for every market",
                        funnel,
                        started_at,
                    );
                }
                targets
            }
        };

        let total = targets.len();
        funnel.push(FilterResult::new(FilterStage::Input, total, total));
        info!(tickers = total, lookback = cfg.history_lookback, "Starting pattern scan");

        let lookback = cfg.history_lookback;
        let reports: Vec<SmcReport> = stream::iter(targets)
            .map(move |target| async move {
                let history = self.provider.get_history(&target.ticker, lookback).await;
                (target, history)
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .filter_map(|(target, history)| {
                let history = match history {
                    Ok(history) => history,
                    Err(e) => {
                        debug!(ticker = %target.ticker, error = %e, "History unavailable, skipping");
                        return None;
                    }
                };
                if history.len() < cfg.min_candles {
                    debug!(ticker = %target.ticker, candles = history.len(), "Not enough history");
                    return None;
                }

                let analysis = self.analyzer.analyze(&history);
                if !analysis.has_zones() {
                    return None;
                }
                Some(SmcReport {
                    price: history.last()?.close,
                    open_order_blocks: analysis.open_order_blocks().count(),
                    open_fair_value_gaps: analysis.open_fair_value_gaps().count(),
                    ticker: target.ticker,
                    name: target.name,
                    change_pct: target.change_pct,
                    analysis,
                })
            })
            .collect();
        funnel.push(FilterResult::new(FilterStage::Patterns, total, reports.len()));

        let outcome = ScanOutcome::completed(kind, Some(today), reports, funnel, started_at);
        info!("{}", outcome.summary());
        outcome
    }
}
