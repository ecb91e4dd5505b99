//! Core domain types for the price catalog and scraped sales history.

use serde::{Deserialize, Serialize};

use crate::error::PriceScrapeError;

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// Sale grouping on the pricing site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// Cartridge or disc only.
    Loose,
    /// Complete in box.
    Complete,
    /// Factory sealed.
    New,
}

impl Condition {
    /// All conditions, in the order they are fetched and stored.
    pub const ALL: [Condition; 3] = [Condition::Loose, Condition::Complete, Condition::New];

    /// Page fragment / CSS class naming this condition's completed-sales tab.
    pub fn tab_class(self) -> &'static str {
        match self {
            Self::Loose => "completed-auctions-used",
            Self::Complete => "completed-auctions-cib",
            Self::New => "completed-auctions-new",
        }
    }

    /// History table holding this condition's sales.
    pub fn table(self) -> &'static str {
        match self {
            Self::Loose => "loose_game_prices",
            Self::Complete => "cib_game_prices",
            Self::New => "new_game_prices",
        }
    }

    /// Item URL with this condition's fragment appended.
    pub fn url_for(self, item_url: &str) -> String {
        format!("{item_url}#{}", self.tab_class())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loose => "loose",
            Self::Complete => "complete",
            Self::New => "new",
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Condition {
    type Err = PriceScrapeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loose" | "used" => Ok(Self::Loose),
            "complete" | "cib" => Ok(Self::Complete),
            "new" => Ok(Self::New),
            other => Err(PriceScrapeError::validation(format!(
                "unknown condition '{other}': expected loose, complete, or new"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog items
// ---------------------------------------------------------------------------

/// A complete catalog row: title, platform, and the three average prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub game: String,
    pub console: String,
    pub loose_val: f64,
    pub complete_val: f64,
    pub new_val: f64,
    /// Scrape date as written in the catalog (D/M/Y).
    pub date_scraped: String,
}

/// A catalog item with its derived slug, URL, and run-scoped surrogate ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    /// 1-based, assigned in filtered-row order. Not stable across runs.
    pub game_id: u32,
    /// Index into the console dimension.
    pub console_id: u32,
    /// URL-safe form of the title.
    pub slug: String,
    /// Item page on the pricing site (derived, or from the override table).
    pub url: String,
    #[serde(flatten)]
    pub item: CatalogItem,
}

/// One distinct platform name with its 0-based surrogate id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolePlatform {
    pub console_id: u32,
    pub console: String,
}

// ---------------------------------------------------------------------------
// SaleRecord
// ---------------------------------------------------------------------------

/// One completed sale scraped from an item page.
///
/// `price_sold` keeps the displayed token with the currency symbol removed;
/// numeric interpretation is left to [`SaleRecord::price_value`] and the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub game_id: u32,
    pub condition: Condition,
    /// Free text as shown by the site. `None` only on the placeholder.
    pub date_sold: Option<String>,
    pub price_sold: String,
}

impl SaleRecord {
    /// Sentinel row meaning "no completed sales observed".
    pub fn placeholder(game_id: u32, condition: Condition) -> Self {
        Self {
            game_id,
            condition,
            date_sold: None,
            price_sold: "0".into(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.date_sold.is_none()
    }

    /// Price as a number, ignoring thousands separators.
    pub fn price_value(&self) -> Option<f64> {
        self.price_sold.replace(',', "").trim().parse().ok()
    }
}
