//! Catalog normalization: raw price catalog → scrape-ready items.
//!
//! This crate provides:
//! - [`reader`]: CSV catalog reading
//! - [`slug`]: title → slug → item URL derivation
//! - [`overrides`]: data-driven literal URL overrides
//! - [`normalize`]: row exclusion, surrogate ids, and the console dimension

pub mod overrides;
pub mod reader;
pub mod slug;

use std::collections::HashMap;
use std::path::Path;

use pricescrape_shared::{CatalogItem, ConsolePlatform, NormalizedItem, PriceScrapeError, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

pub use overrides::{OverrideTable, UrlOverride};
pub use reader::{RawCatalog, RawRow, read_catalog, read_catalog_from};
pub use slug::{collapse_hyphens, derive_slug, item_url};

/// A catalog row dropped before ingestion, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedRow {
    /// 1-based line in the catalog file (0 if unknown).
    pub line: u64,
    pub game: Option<String>,
    pub reason: String,
}

/// Output of [`normalize`].
#[derive(Debug, Clone, Default)]
pub struct NormalizedCatalog {
    /// Items in filtered-row order; `game_id` runs 1..=N.
    pub items: Vec<NormalizedItem>,
    /// Distinct consoles in first-occurrence order; `console_id` runs 0..M.
    pub consoles: Vec<ConsolePlatform>,
    /// Every row that did not make it into `items`.
    pub excluded: Vec<ExcludedRow>,
    /// Rows seen, including excluded ones.
    pub rows_read: usize,
}

/// Read a catalog file and normalize it in one step.
pub fn load_catalog(
    path: &Path,
    base_url: &str,
    overrides: &OverrideTable,
) -> Result<NormalizedCatalog> {
    let raw = read_catalog(path)?;
    Ok(normalize(raw, base_url, overrides))
}

/// Normalize a raw catalog.
///
/// Rows missing any of the three average prices are excluded entirely.
/// Surrogate ids are assigned after filtering, in row order, so they are only
/// meaningful within one run over one catalog snapshot.
pub fn normalize(raw: RawCatalog, base_url: &str, overrides: &OverrideTable) -> NormalizedCatalog {
    let rows_read = raw.rows.len() + raw.rejected.len();
    let mut excluded = raw.rejected;
    let mut items: Vec<NormalizedItem> = Vec::with_capacity(raw.rows.len());
    let mut console_ids: HashMap<String, u32> = HashMap::new();
    let mut consoles: Vec<ConsolePlatform> = Vec::new();
    let mut overridden = 0usize;

    for row in raw.rows {
        let (item, slug) = match validate_row(&row) {
            Ok(valid) => valid,
            Err(e) => {
                debug!(line = row.line, game = %row.game, error = %e, "excluding catalog row");
                excluded.push(ExcludedRow {
                    line: row.line,
                    game: Some(row.game.clone()).filter(|g| !g.is_empty()),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let game_id = items.len() as u32 + 1;

        let console_id = match console_ids.get(&item.console) {
            Some(id) => *id,
            None => {
                let id = consoles.len() as u32;
                console_ids.insert(item.console.clone(), id);
                consoles.push(ConsolePlatform {
                    console_id: id,
                    console: item.console.clone(),
                });
                id
            }
        };

        let url = match overrides.lookup(game_id, &item.game, &item.console) {
            Some(url) => {
                overridden += 1;
                debug!(game_id, game = %item.game, url, "applying URL override");
                url.to_string()
            }
            None => item_url(base_url, &item.console, &slug),
        };

        items.push(NormalizedItem {
            game_id,
            console_id,
            slug,
            url,
            item,
        });
    }

    let max_id = items.len() as u32;
    for entry in overrides.entries() {
        if let Some(id) = entry.game_id.filter(|id| *id > max_id) {
            warn!(game_id = id, items = max_id, "URL override refers to an id beyond the catalog");
        }
    }

    info!(
        rows = rows_read,
        items = items.len(),
        consoles = consoles.len(),
        excluded = excluded.len(),
        overridden,
        "catalog normalized"
    );

    NormalizedCatalog {
        items,
        consoles,
        excluded,
        rows_read,
    }
}

/// Check one row and derive its slug.
fn validate_row(row: &RawRow) -> Result<(CatalogItem, String)> {
    let game = row.game.trim();
    if game.is_empty() {
        return Err(PriceScrapeError::data_quality("missing game title"));
    }
    let console = row.console.trim();
    if console.is_empty() {
        return Err(PriceScrapeError::data_quality("missing console"));
    }

    let loose_val = parse_price("loose_val", &row.loose_val)?;
    let complete_val = parse_price("complete_val", &row.complete_val)?;
    let new_val = parse_price("new_val", &row.new_val)?;

    let slug = derive_slug(game);
    if slug.trim_matches('-').is_empty() {
        return Err(PriceScrapeError::data_quality(format!(
            "title '{game}' produces an empty slug"
        )));
    }

    Ok((
        CatalogItem {
            game: game.to_string(),
            console: console.to_string(),
            loose_val,
            complete_val,
            new_val,
            date_scraped: row.date_scraped.trim().to_string(),
        },
        slug,
    ))
}

/// Parse an average price field. Empty and `nan` count as missing.
fn parse_price(field: &str, raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Err(PriceScrapeError::data_quality(format!("missing {field}")));
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != '$' && *c != ',').collect();
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PriceScrapeError::data_quality(format!("{field} '{trimmed}' is not a price")))
}
