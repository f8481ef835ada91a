//! Trading-date resolution.
//!
//! There is no holiday table: a date is a trading day when the provider
//! has a snapshot for it.

use chrono::{Duration, NaiveDate};
use tracing::debug;

use super::{Market, MarketDataProvider, MarketSnapshot};

/// Days searched backwards for the latest trading date (inclusive of today).
const LATEST_SEARCH_DAYS: i64 = 10;
/// Days searched backwards for the previous trading date.
const PREVIOUS_SEARCH_DAYS: i64 = 9;

/// Most recent date on or before `today` with a KOSPI snapshot showing volume.
pub async fn latest_trading_date<P>(provider: &P, today: NaiveDate) -> Option<NaiveDate>
where
    P: MarketDataProvider + ?Sized,
{
    for offset in 0..LATEST_SEARCH_DAYS {
        let date = today - Duration::days(offset);
        match provider.get_market_snapshot(date, Market::Kospi).await {
            Ok(snapshot) if snapshot.total_volume() > 0.0 => return Some(date),
            Ok(_) => debug!(%date, "No trading volume, stepping back"),
            Err(e) => debug!(%date, error = %e, "Snapshot unavailable, stepping back"),
        }
    }
    None
}

/// Snapshot of the nearest trading date strictly before `date`.
pub async fn previous_trading_snapshot<P>(
    provider: &P,
    date: NaiveDate,
    market: Market,
) -> Option<MarketSnapshot>
where
    P: MarketDataProvider + ?Sized,
{
    for offset in 1..=PREVIOUS_SEARCH_DAYS {
        let candidate = date - Duration::days(offset);
        match provider.get_market_snapshot(candidate, market).await {
            Ok(snapshot) if !snapshot.is_empty() => return Some(snapshot),
            Ok(_) => {}
            Err(e) => debug!(date = %candidate, error = %e, "Snapshot unavailable, stepping back"),
        }
    }
    None
}

/// Nearest trading date strictly before `date`.
pub async fn previous_trading_date<P>(provider: &P, date: NaiveDate) -> Option<NaiveDate>
where
    P: MarketDataProvider + ?Sized,
{
    previous_trading_snapshot(provider, date, Market::All)
        .await
        .map(|snapshot| snapshot.date)
}
