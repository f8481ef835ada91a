//! Static ticker → theme tag catalog.
//!
//! Loaded once from a JSON object mapping ticker codes to ordered tag lists:
//!
//! ```json
//! { "005930": ["반도체", "AI"], "035720": ["플랫폼"] }
//! ```

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Theme tags keyed by ticker code.
#[derive(Debug, Clone, Default)]
pub struct ThemeCatalog {
    themes: HashMap<String, Vec<String>>,
}

impl ThemeCatalog {
    /// Build a catalog from an in-memory map.
    pub fn from_map(themes: HashMap<String, Vec<String>>) -> Self {
        Self { themes }
    }

    /// Load the catalog from a JSON file.
    ///
    /// A missing file yields an empty catalog; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Theme file not found, continuing without themes");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read theme file {}", path.display()))?;
        let themes: HashMap<String, Vec<String>> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse theme file {}", path.display()))?;

        info!(tickers = themes.len(), "Loaded theme catalog");
        Ok(Self { themes })
    }

    /// Tags for a ticker, in catalog order. Empty when unknown.
    pub fn themes(&self, ticker: &str) -> &[String] {
        self.themes.get(ticker).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the ticker carries at least one tag.
    pub fn has_theme(&self, ticker: &str) -> bool {
        !self.themes(ticker).is_empty()
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }
}
