//! Completed-sales extraction from item pages.
//!
//! Page layout: `div.tab-frame` → `div.completed-auctions-{used|cib|new}` →
//! first `table`. Each sale row carries a date cell and a price cell; the
//! remaining cells are layout whitespace or the "Report It" link.

use std::sync::LazyLock;

use pricescrape_shared::{Condition, PriceScrapeError, Result, SaleRecord};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Boilerplate link text that appears in every sale row.
const REPORT_IT: &str = "Report It";

static FRAME_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.tab-frame").expect("valid selector"));
static TABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("valid selector"));

static USED_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.completed-auctions-used").expect("valid selector"));
static CIB_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.completed-auctions-cib").expect("valid selector"));
static NEW_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.completed-auctions-new").expect("valid selector"));

fn condition_selector(condition: Condition) -> &'static Selector {
    match condition {
        Condition::Loose => &USED_SEL,
        Condition::Complete => &CIB_SEL,
        Condition::New => &NEW_SEL,
    }
}

/// Extract one condition's sales from a full item page.
///
/// Returns a `Parse` error when the frame or condition division is missing;
/// callers degrade that to [`SaleRecord::placeholder`].
pub fn extract_condition(doc: &Html, condition: Condition, game_id: u32) -> Result<Vec<SaleRecord>> {
    let frame = doc
        .select(&FRAME_SEL)
        .next()
        .ok_or_else(|| PriceScrapeError::parse("page has no div.tab-frame"))?;

    let tab = frame.select(condition_selector(condition)).next().ok_or_else(|| {
        PriceScrapeError::parse(format!("tab-frame has no div.{}", condition.tab_class()))
    })?;

    extract_sales(tab, game_id, condition)
}

/// Extract sales from one condition's division.
///
/// No table, or a table with no sale cells, yields exactly one placeholder.
/// An odd number of cleaned cell tokens is a `Validation` error: the
/// date/price pairing cannot be trusted.
pub fn extract_sales(
    fragment: ElementRef<'_>,
    game_id: u32,
    condition: Condition,
) -> Result<Vec<SaleRecord>> {
    let Some(table) = fragment.select(&TABLE_SEL).next() else {
        debug!(game_id, %condition, "no sales table");
        return Ok(vec![SaleRecord::placeholder(game_id, condition)]);
    };

    let tokens = sale_tokens(table);
    if tokens.is_empty() {
        debug!(game_id, %condition, "sales table is empty");
        return Ok(vec![SaleRecord::placeholder(game_id, condition)]);
    }

    if tokens.len() % 2 != 0 {
        return Err(PriceScrapeError::validation(format!(
            "game {game_id} {condition}: odd number of sale tokens ({}), cannot pair dates with prices",
            tokens.len()
        )));
    }

    Ok(tokens
        .chunks_exact(2)
        .map(|pair| SaleRecord {
            game_id,
            condition,
            date_sold: Some(pair[0].clone()),
            price_sold: strip_currency(&pair[1]).to_string(),
        })
        .collect())
}

/// Parse an HTML fragment string and extract its sales.
pub fn extract_from_fragment(html: &str, game_id: u32, condition: Condition) -> Result<Vec<SaleRecord>> {
    let fragment = Html::parse_fragment(html);
    extract_sales(fragment.root_element(), game_id, condition)
}

/// Parse a full item page body and extract one condition.
///
/// The parsed document is dropped before returning, so callers in async code
/// never hold it across an await point.
pub fn extract_page(body: &str, condition: Condition, game_id: u32) -> Result<Vec<SaleRecord>> {
    let doc = Html::parse_document(body);
    extract_condition(&doc, condition, game_id)
}

/// Every cell text node of `table`, in row order, minus layout whitespace and boilerplate.
fn sale_tokens(table: ElementRef<'_>) -> Vec<String> {
    let mut tokens = Vec::new();
    for row in table.select(&ROW_SEL) {
        for cell in row.select(&CELL_SEL) {
            for text in cell.text() {
                if text.contains('\n') || text.contains(REPORT_IT) {
                    continue;
                }
                let text = text.trim();
                if !text.is_empty() {
                    tokens.push(text.to_string());
                }
            }
        }
    }
    tokens
}

/// Drop a leading currency symbol from a displayed price.
fn strip_currency(price: &str) -> &str {
    price.trim_start_matches(['$', '£', '€']).trim()
}
