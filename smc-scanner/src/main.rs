//! SMC Scanner - runs one scan and prints the raw outcome as JSON.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use smc_common::config::{config_path, load_section, Config};
use smc_common::logging::init_logging_with_exclusions;
use smc_scanner::screener::ScreenerConfig;
use std::path::{Path, PathBuf};

/// Smart Money Concepts pattern analyzer and universe screener.
#[derive(Parser, Debug)]
#[command(name = "smc-scanner")]
#[command(version)]
#[command(about = "Order blocks, fair-value gaps and breakout screens over daily candles", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.smc-scanner/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Concurrent per-ticker fetches
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Pretty-print the JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Realtime momentum scan over today's top risers
    Realtime {
        /// Minimum change (%)
        #[arg(long)]
        min_change: Option<f64>,

        /// Minimum traded value (×10^8)
        #[arg(long)]
        min_volume: Option<f64>,

        /// Minimum number of technical conditions
        #[arg(long)]
        min_cond: Option<usize>,

        /// Keep tickers without a theme tag
        #[arg(long)]
        no_theme: bool,

        /// Stop after this many candidates
        #[arg(long)]
        top: Option<usize>,
    },

    /// Close-of-day momentum scan over a full-market snapshot
    Daily {
        /// Trading date (YYYY-MM-DD), latest by default
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Minimum change (%)
        #[arg(long)]
        min_change: Option<f64>,

        /// Minimum traded value (×10^8)
        #[arg(long)]
        min_volume: Option<f64>,

        /// Minimum number of technical conditions
        #[arg(long)]
        min_cond: Option<usize>,

        /// Keep tickers without a theme tag
        #[arg(long)]
        no_theme: bool,
    },

    /// Volume spike out of a tight price range
    Squeeze {
        /// Trading date (YYYY-MM-DD), latest by default
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Volume multiple over the previous session
        #[arg(long)]
        vol_mult: Option<f64>,

        /// Maximum coefficient of variation (%)
        #[arg(long)]
        max_cv: Option<f64>,
    },

    /// Price and volume breakout from a 60-day range
    Accumulation {
        /// Trading date (YYYY-MM-DD), latest by default
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Minimum traded value (×10^8)
        #[arg(long)]
        min_volume: Option<f64>,

        /// Maximum range width (%)
        #[arg(long)]
        max_range: Option<f64>,
    },

    /// Order blocks and fair-value gaps for one ticker or today's risers
    Smc {
        /// Ticker code; top risers when omitted
        #[arg(long)]
        code: Option<String>,
    },
}

impl Commands {
    /// Fold command-line overrides into the loaded screener section.
    fn apply(&self, config: &mut ScreenerConfig) {
        match self {
            Self::Realtime {
                min_change,
                min_volume,
                min_cond,
                no_theme,
                top,
            } => {
                let cfg = &mut config.realtime;
                set(&mut cfg.min_change_pct, *min_change);
                set(&mut cfg.min_traded_value, *min_volume);
                set(&mut cfg.min_conditions, *min_cond);
                set(&mut cfg.top_n, *top);
                if *no_theme {
                    cfg.require_theme = false;
                }
            }
            Self::Daily {
                min_change,
                min_volume,
                min_cond,
                no_theme,
                ..
            } => {
                let cfg = &mut config.daily;
                set(&mut cfg.min_change_pct, *min_change);
                set(&mut cfg.min_traded_value, *min_volume);
                set(&mut cfg.min_conditions, *min_cond);
                if *no_theme {
                    cfg.require_theme = false;
                }
            }
            Self::Squeeze {
                vol_mult, max_cv, ..
            } => {
                set(&mut config.squeeze.volume_multiple, *vol_mult);
                set(&mut config.squeeze.max_cv_pct, *max_cv);
            }
            Self::Accumulation {
                min_volume,
                max_range,
                ..
            } => {
                set(&mut config.accumulation.min_traded_value, *min_volume);
                set(&mut config.accumulation.max_range_pct, *max_range);
            }
            Self::Smc { .. } => {}
        }
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize scan outcome")?;
    println!("{}", json);
    Ok(())
}

/// Load the root config with env overrides, plus the file it came from.
///
/// Runs before logging is installed, so the source is returned for the
/// caller to report.
fn load_config(path: Option<&Path>) -> Result<(Config, Option<PathBuf>)> {
    match path {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env_overrides();
            Ok((config, Some(path.to_path_buf())))
        }
        None => {
            let default_path = config_path();
            let source = default_path.exists().then_some(default_path);
            Ok((Config::load_with_env()?, source))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, source) = load_config(cli.config.as_deref())?;
    if let Some(concurrency) = cli.concurrency {
        config.data.concurrency = concurrency;
    }

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );
    tracing::info!("SMC Scanner v{}", env!("CARGO_PKG_VERSION"));
    match &source {
        Some(path) => tracing::info!(path = %path.display(), "Loaded configuration"),
        None => tracing::info!("Config file not found, using defaults"),
    }

    let mut screener_config: ScreenerConfig = load_section("screener.json")?;
    cli.command.apply(&mut screener_config);

    let engine = smc_scanner::build_engine(&config, screener_config)?;

    match &cli.command {
        Commands::Realtime { .. } => {
            print_json(&engine.run_realtime_momentum().await, cli.pretty)
        }
        Commands::Daily { date, .. } => {
            print_json(&engine.run_daily_momentum(*date).await, cli.pretty)
        }
        Commands::Squeeze { date, .. } => print_json(&engine.run_squeeze(*date).await, cli.pretty),
        Commands::Accumulation { date, .. } => {
            print_json(&engine.run_accumulation(*date).await, cli.pretty)
        }
        Commands::Smc { code } => {
            print_json(&engine.run_smc_scan(code.as_deref()).await, cli.pretty)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "smc-scanner",
            "daily",
            "--date",
            "2024-03-15",
            "--min-change",
            "4.5",
            "--no-theme",
        ]);
        let mut config = ScreenerConfig::default();
        cli.command.apply(&mut config);

        assert_eq!(config.daily.min_change_pct, 4.5);
        assert!(!config.daily.require_theme);
        assert_eq!(config.daily.min_conditions, 3);
        assert!(matches!(
            cli.command,
            Commands::Daily { date: Some(d), .. } if d == NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        ));
    }

    #[test]
    fn test_load_config_reports_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "data": { "concurrency": 3 } }"#).unwrap();

        let (config, source) = load_config(Some(&path)).unwrap();
        assert_eq!(config.data.concurrency, 3);
        assert_eq!(source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_load_config_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.json"))).is_err());
    }

    #[test]
    fn test_squeeze_flags() {
        let cli = Cli::parse_from(["smc-scanner", "squeeze", "--vol-mult", "3"]);
        let mut config = ScreenerConfig::default();
        cli.command.apply(&mut config);
        assert_eq!(config.squeeze.volume_multiple, 3.0);
        assert_eq!(config.squeeze.max_cv_pct, 2.5);
    }
}
