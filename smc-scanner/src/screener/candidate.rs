//! Scan output types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::quantitative::FilterResult;

/// Theme tags carried per candidate.
pub const MAX_THEMES: usize = 3;

// ============================================================================
// Screener Candidate
// ============================================================================

/// A ticker that passed a scan. Raw numbers only; formatting is the
/// caller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerCandidate {
    /// Ticker code (e.g., "005930")
    pub ticker: String,
    /// Display name
    pub name: String,
    /// Latest price
    pub price: f64,
    /// Previous close, when the scan had one
    pub prev_close: Option<f64>,
    /// Change (%)
    pub change_pct: f64,
    /// Day's volume (shares)
    pub volume: f64,
    /// Day's traded value (currency units)
    pub traded_value: f64,
    /// Fired condition tags
    pub conditions: Vec<String>,
    /// Theme tags (at most three)
    pub themes: Vec<String>,
    /// Scan-specific measurements
    #[serde(default)]
    pub metrics: CandidateMetrics,
}

impl ScreenerCandidate {
    /// Number of fired condition tags.
    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }
}

/// Measurements specific to one scan kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateMetrics {
    /// Today's volume over yesterday's
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_ratio: Option<f64>,
    /// Coefficient of variation of prior closes (%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_pct: Option<f64>,
    /// Prior range width (%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range_pct: Option<f64>,
}

// ============================================================================
// Scan Outcome
// ============================================================================

/// Which pipeline produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanKind {
    RealtimeMomentum,
    DailyMomentum,
    Squeeze,
    Accumulation,
    Patterns,
}

impl std::fmt::Display for ScanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RealtimeMomentum => write!(f, "realtime momentum"),
            Self::DailyMomentum => write!(f, "daily momentum"),
            Self::Squeeze => write!(f, "squeeze breakout"),
            Self::Accumulation => write!(f, "accumulation breakout"),
            Self::Patterns => write!(f, "pattern"),
        }
    }
}

/// Whether a scan ran against real data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanStatus {
    /// The scan ran; zero candidates means nothing matched
    Completed,
    /// Market-wide data could not be obtained; no evaluation happened
    MarketDataUnavailable { reason: String },
}

/// Result of one scan invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome<T = ScreenerCandidate> {
    /// Scan ID (timestamp-based)
    pub id: String,
    pub kind: ScanKind,
    pub status: ScanStatus,
    /// Trading date evaluated
    pub as_of: Option<NaiveDate>,
    /// Results in ranking order
    pub candidates: Vec<T>,
    /// Filter stage results
    pub funnel: Vec<FilterResult>,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub completed_at: DateTime<Utc>,
    /// Duration in seconds
    pub duration_secs: f64,
}

impl<T> ScanOutcome<T> {
    fn build(
        kind: ScanKind,
        status: ScanStatus,
        as_of: Option<NaiveDate>,
        candidates: Vec<T>,
        funnel: Vec<FilterResult>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            id: scan_id(kind, started_at),
            kind,
            status,
            as_of,
            candidates,
            funnel,
            started_at,
            completed_at,
            duration_secs: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
        }
    }

    /// A scan that evaluated its universe.
    pub fn completed(
        kind: ScanKind,
        as_of: Option<NaiveDate>,
        candidates: Vec<T>,
        funnel: Vec<FilterResult>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self::build(kind, ScanStatus::Completed, as_of, candidates, funnel, started_at)
    }

    /// A scan that could not obtain its market-wide inputs.
    pub fn unavailable(
        kind: ScanKind,
        as_of: Option<NaiveDate>,
        reason: impl Into<String>,
        funnel: Vec<FilterResult>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let status = ScanStatus::MarketDataUnavailable {
            reason: reason.into(),
        };
        Self::build(kind, status, as_of, Vec::new(), funnel, started_at)
    }

    pub fn is_data_unavailable(&self) -> bool {
        matches!(self.status, ScanStatus::MarketDataUnavailable { .. })
    }

    /// Get the top N results.
    pub fn top(&self, n: usize) -> &[T] {
        &self.candidates[..n.min(self.candidates.len())]
    }

    /// Summary string for logging.
    pub fn summary(&self) -> String {
        match &self.status {
            ScanStatus::Completed => {
                let scanned = self.funnel.first().map_or(0, |f| f.passed + f.eliminated);
                format!(
                    "{} scan: {} of {} tickers matched in {:.1}s",
                    self.kind,
                    self.candidates.len(),
                    scanned,
                    self.duration_secs
                )
            }
            ScanStatus::MarketDataUnavailable { reason } => {
                format!("{} scan: market data unavailable ({})", self.kind, reason)
            }
        }
    }
}

fn scan_id(kind: ScanKind, started_at: DateTime<Utc>) -> String {
    let kind = serde_json::to_value(kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    format!("scan_{}_{}", kind, started_at.format("%Y%m%d_%H%M%S"))
}
