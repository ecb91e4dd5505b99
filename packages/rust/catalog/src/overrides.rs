//! Literal URL overrides for catalog entries whose site URL cannot be derived
//! from the title.
//!
//! ```toml
//! [[overrides]]
//! game_id = 3246
//! url = "https://www.pricecharting.com/game/nintendo-64/ique-player"
//!
//! [[overrides]]
//! game = "Black Reshiram & Zekrom Edition Nintendo DSi"
//! console = "nintendo-ds"
//! url = "https://www.pricecharting.com/game/nintendo-ds/black-reshiram-&-zekrom-edition-nintendo-dsi"
//! ```

use std::path::Path;

use pricescrape_shared::{PriceScrapeError, Result};
use serde::Deserialize;

/// One override entry, keyed by surrogate id or by title (+ optional console).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UrlOverride {
    #[serde(default)]
    pub game_id: Option<u32>,
    #[serde(default)]
    pub game: Option<String>,
    #[serde(default)]
    pub console: Option<String>,
    pub url: String,
}

impl UrlOverride {
    fn matches_title(&self, game: &str, console: &str) -> bool {
        match &self.game {
            Some(title) if title == game => self.console.as_deref().is_none_or(|c| c == console),
            _ => false,
        }
    }
}

/// Data-driven table of URL overrides, loaded alongside the catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverrideTable {
    #[serde(default)]
    overrides: Vec<UrlOverride>,
}

impl OverrideTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate an override file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PriceScrapeError::io(path, e))?;
        Self::from_toml_str(&content).map_err(|e| match e {
            PriceScrapeError::Validation { message } => {
                PriceScrapeError::validation(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Parse and validate override TOML.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: Self = toml::from_str(content)
            .map_err(|e| PriceScrapeError::validation(format!("invalid override table: {e}")))?;

        for (idx, entry) in table.overrides.iter().enumerate() {
            if entry.game_id.is_none() && entry.game.is_none() {
                return Err(PriceScrapeError::validation(format!(
                    "override #{} needs either game_id or game",
                    idx + 1
                )));
            }
            if entry.url.trim().is_empty() {
                return Err(PriceScrapeError::validation(format!(
                    "override #{} has an empty url",
                    idx + 1
                )));
            }
        }

        Ok(table)
    }

    /// Add an entry at runtime.
    pub fn push(&mut self, entry: UrlOverride) {
        self.overrides.push(entry);
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    pub fn entries(&self) -> &[UrlOverride] {
        &self.overrides
    }

    /// Find the override URL for an item. Id-keyed entries take precedence.
    pub fn lookup(&self, game_id: u32, game: &str, console: &str) -> Option<&str> {
        self.overrides
            .iter()
            .find(|o| o.game_id == Some(game_id))
            .or_else(|| {
                self.overrides
                    .iter()
                    .find(|o| o.game_id.is_none() && o.matches_title(game, console))
            })
            .map(|o| o.url.as_str())
    }
}
