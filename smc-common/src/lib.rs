//! SMC Common - Shared configuration, errors, and logging for the SMC scanner.
//!
//! This crate provides:
//! - Configuration types and loading (`~/.smc-scanner/config.json`)
//! - Modular per-module config sections (e.g. `screener.json`)
//! - Error types and context helpers
//! - Logging setup with noise filtering

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, DataConfig, ObservabilityConfig};
pub use error::{Error, Result};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{config_dir, load_section, Config, DataConfig, ObservabilityConfig};
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::logging::init_logging;
}
