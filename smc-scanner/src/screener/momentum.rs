//! Momentum scans: realtime (today's risers) and close-of-day (snapshot).
//!
//! Both funnels end with the technical condition count and rank by
//! (condition count, change %) descending.

use chrono::{Local, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::data::{
    previous_trading_snapshot, Market, MarketDataProvider, Quote, RisingStock, SnapshotRow,
};

use super::candidate::{CandidateMetrics, ScanKind, ScanOutcome, ScreenerCandidate};
use super::conditions::evaluate_conditions;
use super::config::TRADED_VALUE_UNIT;
use super::engine::ScreenerEngine;
use super::quantitative::{change_pct, passes_liquidity, FilterResult, FilterStage, HygieneFilter};

/// A snapshot row that moved enough against its previous close.
struct Mover {
    ticker: String,
    row: SnapshotRow,
    prev_close: f64,
    change_pct: f64,
}

/// Order by condition count, then change, both descending.
pub(super) fn rank_by_conditions(candidates: &mut [ScreenerCandidate]) {
    candidates.sort_by(|a, b| {
        b.condition_count()
            .cmp(&a.condition_count())
            .then_with(|| b.change_pct.total_cmp(&a.change_pct))
    });
}

impl<P: MarketDataProvider> ScreenerEngine<P> {
    // ========================================================================
    // Realtime Momentum
    // ========================================================================

    /// Scan today's top risers on both markets.
    ///
    /// Every liquid riser is evaluated; the ranked list is capped at `top_n`.
    pub async fn run_realtime_momentum(&self) -> ScanOutcome {
        let cfg = &self.config.realtime;
        let kind = ScanKind::RealtimeMomentum;
        let started_at = Utc::now();
        let today = Local::now().date_naive();
        let mut funnel = Vec::new();

        info!(
            min_change = cfg.min_change_pct,
            min_traded_value = cfg.min_traded_value,
            min_conditions = cfg.min_conditions,
            "Starting realtime momentum scan"
        );

        // Phase 1: Rising lists, change and theme filters
        let mut rising: Vec<RisingStock> = Vec::new();
        let mut any_list = false;
        for market in [Market::Kospi, Market::Kosdaq] {
            match self.provider.get_rising_stocks(market, cfg.rising_limit).await {
                Ok(list) => {
                    any_list = true;
                    rising.extend(list);
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

        let total = rising.len();
        funnel.push(FilterResult::new(FilterStage::Input, total, total));

        let movers: Vec<RisingStock> = rising
            .into_iter()
            .filter(|s| s.change_pct >= cfg.min_change_pct)
            .collect();
        funnel.push(FilterResult::new(FilterStage::Change, total, movers.len()));

        let before_theme = movers.len();
        let themed: Vec<RisingStock> = movers
            .into_iter()
            .filter(|s| !cfg.require_theme || self.themes.has_theme(&s.ticker))
            .collect();
        funnel.push(FilterResult::new(FilterStage::Theme, before_theme, themed.len()));
        info!(passed = themed.len(), "Phase 1 (Rising list filter) complete");

        // Phase 2: Detailed quotes, traded value floor
        let before_quotes = themed.len();
        let min_value = cfg.min_traded_value * TRADED_VALUE_UNIT;
        let quoted: Vec<(RisingStock, Quote)> = stream::iter(themed)
            .map(move |stock| async move {
                let quote = self.provider.get_latest_quote(&stock.ticker).await;
                (stock, quote)
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .filter_map(|(stock, quote)| match quote {
                Ok(quote) if quote.traded_value >= min_value => Some((stock, quote)),
                Ok(_) => None,
                Err(e) => {
                    debug!(ticker = %stock.ticker, error = %e, "Quote unavailable, skipping");
                    None
                }
            })
            .collect();
        funnel.push(FilterResult::new(FilterStage::Liquidity, before_quotes, quoted.len()));
        info!(passed = quoted.len(), "Phase 2 (Liquidity filter) complete");

        // Phase 3: History and technical conditions
        let before_conditions = quoted.len();
        let lookback = cfg.history_lookback;
        let mut candidates: Vec<ScreenerCandidate> = stream::iter(quoted)
            .map(move |(stock, quote)| async move {
                let history = self.provider.get_history(&stock.ticker, lookback).await;
                (stock, quote, history)
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .filter_map(|(stock, quote, history)| {
                let history = match history {
                    Ok(history) => history,
                    Err(e) => {
                        debug!(ticker = %stock.ticker, error = %e, "History unavailable, skipping");
                        return None;
                    }
                };
                let report = evaluate_conditions(&history);
                if report.count() < cfg.min_conditions {
                    return None;
                }
                let name = if stock.name.is_empty() { quote.name.clone() } else { stock.name };
                Some(ScreenerCandidate {
                    themes: self.theme_tags(&stock.ticker),
                    ticker: stock.ticker,
                    name,
                    price: quote.price,
                    prev_close: quote.prev_close,
                    change_pct: stock.change_pct,
                    volume: quote.volume,
                    traded_value: quote.traded_value,
                    conditions: report.tags(),
                    metrics: CandidateMetrics::default(),
                })
            })
            .collect();
        funnel.push(FilterResult::new(
            FilterStage::Conditions,
            before_conditions,
            candidates.len(),
        ));
        info!(passed = candidates.len(), "Phase 3 (Condition filter) complete");

        rank_by_conditions(&mut candidates);
        let before_cap = candidates.len();
        candidates.truncate(cfg.top_n);
        funnel.push(FilterResult::new(FilterStage::Final, before_cap, candidates.len()));

        let outcome = ScanOutcome::completed(kind, Some(today), candidates, funnel, started_at);
        info!("{}", outcome.summary());
        outcome
    }

    // ========================================================================
    // Daily Momentum
    // ========================================================================

    /// Scan a full-market snapshot for one trading date (latest by default).
    pub async fn run_daily_momentum(&self, date: Option<NaiveDate>) -> ScanOutcome {
        let cfg = &self.config.daily;
        let kind = ScanKind::DailyMomentum;
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

        let Some(previous) =
            previous_trading_snapshot(self.provider.as_ref(), target, Market::All).await
        else {
            let reason = format!("no trading date before {}", target);
            return ScanOutcome::unavailable(kind, Some(target), reason, funnel, started_at);
        };

        info!(
            %target,
            previous = %previous.date,
            tickers = snapshot.len(),
            "Starting daily momentum scan"
        );

        // Phase 1: Row filters on the snapshot
        let priced: Vec<(String, SnapshotRow, f64)> = snapshot
            .rows
            .iter()
            .filter_map(|(ticker, row)| {
                let prev = previous.get(ticker)?;
                (prev.close > 0.0).then(|| (ticker.clone(), *row, prev.close))
            })
            .collect();
        funnel.push(FilterResult::new(FilterStage::Input, snapshot.len(), priced.len()));

        let before_liquidity = priced.len();
        let liquid: Vec<(String, SnapshotRow, f64)> = priced
            .into_iter()
            .filter(|(_, row, _)| passes_liquidity(row, cfg.min_traded_value))
            .collect();
        funnel.push(FilterResult::new(FilterStage::Liquidity, before_liquidity, liquid.len()));

        let before_change = liquid.len();
        let movers: Vec<Mover> = liquid
            .into_iter()
            .filter_map(|(ticker, row, prev_close)| {
                let change = change_pct(row.close, prev_close)?;
                (change >= cfg.min_change_pct).then_some(Mover {
                    ticker,
                    row,
                    prev_close,
                    change_pct: change,
                })
            })
            .collect();
        funnel.push(FilterResult::new(FilterStage::Change, before_change, movers.len()));

        let hygiene = HygieneFilter::new(cfg.hygiene.clone());
        let before_hygiene = movers.len();
        let clean: Vec<(Mover, String)> = stream::iter(
            movers
                .into_iter()
                .filter(|m| hygiene.passes_row(&m.ticker, &m.row)),
        )
        .map(move |mover| async move {
            let name = self.name_or_code(&mover.ticker).await;
            (mover, name)
        })
        .buffered(self.concurrency)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .filter_map(|(mover, name)| {
            let name = name?;
            hygiene.passes_name(&name).then_some((mover, name))
        })
        .collect();
        funnel.push(FilterResult::new(FilterStage::Hygiene, before_hygiene, clean.len()));

        let before_theme = clean.len();
        let themed: Vec<(Mover, String)> = clean
            .into_iter()
            .filter(|(m, _)| !cfg.require_theme || self.themes.has_theme(&m.ticker))
            .collect();
        funnel.push(FilterResult::new(FilterStage::Theme, before_theme, themed.len()));
        info!(passed = themed.len(), "Phase 1 (Snapshot filter) complete");

        // Phase 2: History as of the target date, technical conditions
        let before_conditions = themed.len();
        let lookback = cfg.history_lookback;
        let mut candidates: Vec<ScreenerCandidate> = stream::iter(themed)
            .map(move |(mover, name)| async move {
                let history = self
                    .provider
                    .get_history_as_of(&mover.ticker, lookback, target)
                    .await;
                (mover, name, history)
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .filter_map(|(mover, name, history)| {
                let history = match history {
                    Ok(history) => history,
                    Err(e) => {
                        debug!(ticker = %mover.ticker, error = %e, "History unavailable, skipping");
                        return None;
                    }
                };
                let report = evaluate_conditions(&history);
                if report.count() < cfg.min_conditions {
                    return None;
                }
                Some(ScreenerCandidate {
                    themes: self.theme_tags(&mover.ticker),
                    ticker: mover.ticker,
                    name,
                    price: mover.row.close,
                    prev_close: Some(mover.prev_close),
                    change_pct: mover.change_pct,
                    volume: mover.row.volume,
                    traded_value: mover.row.traded_value,
                    conditions: report.tags(),
                    metrics: CandidateMetrics::default(),
                })
            })
            .collect();
        funnel.push(FilterResult::new(
            FilterStage::Conditions,
            before_conditions,
            candidates.len(),
        ));
        info!(passed = candidates.len(), "Phase 2 (Condition filter) complete");

        rank_by_conditions(&mut candidates);
        if let Some(top_n) = cfg.top_n {
            let before_cap = candidates.len();
            candidates.truncate(top_n);
            funnel.push(FilterResult::new(FilterStage::Final, before_cap, candidates.len()));
        }

        let outcome = ScanOutcome::completed(kind, Some(target), candidates, funnel, started_at);
        info!("{}", outcome.summary());
        outcome
    }
}
