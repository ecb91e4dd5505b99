//! CSV catalog reading.
//!
//! Decoding is lenient per row: a row the CSV layer cannot decode is recorded
//! as rejected instead of failing the whole read. Missing required columns are
//! fatal.

use std::io::Read;
use std::path::Path;

use pricescrape_shared::{PriceScrapeError, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::ExcludedRow;

/// Columns every catalog must carry.
const REQUIRED_COLUMNS: [&str; 6] = [
    "game",
    "console",
    "loose_val",
    "complete_val",
    "new_val",
    "date(D/M/Y)",
];

/// One undecoded catalog row. Price fields stay text until normalization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRow {
    /// 1-based line in the source file.
    #[serde(skip)]
    pub line: u64,
    #[serde(default)]
    pub game: String,
    #[serde(default)]
    pub console: String,
    #[serde(default)]
    pub loose_val: String,
    #[serde(default)]
    pub complete_val: String,
    #[serde(default)]
    pub new_val: String,
    #[serde(rename = "date(D/M/Y)", default)]
    pub date_scraped: String,
}

/// Result of reading a catalog file.
#[derive(Debug, Clone, Default)]
pub struct RawCatalog {
    pub rows: Vec<RawRow>,
    /// Rows the CSV decoder could not read.
    pub rejected: Vec<ExcludedRow>,
}

/// Read a catalog CSV from disk.
pub fn read_catalog(path: &Path) -> Result<RawCatalog> {
    let file = std::fs::File::open(path).map_err(|e| PriceScrapeError::io(path, e))?;
    let catalog = read_catalog_from(std::io::BufReader::new(file))?;
    debug!(
        ?path,
        rows = catalog.rows.len(),
        rejected = catalog.rejected.len(),
        "catalog read"
    );
    Ok(catalog)
}

/// Read a catalog CSV from any reader.
pub fn read_catalog_from<R: Read>(reader: R) -> Result<RawCatalog> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Fields)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| PriceScrapeError::validation(format!("unreadable catalog header: {e}")))?
        .clone();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(PriceScrapeError::validation(format!(
            "catalog is missing column(s): {}",
            missing.join(", ")
        )));
    }

    let mut catalog = RawCatalog::default();
    for record in rdr.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                warn!(line, error = %e, "skipping undecodable catalog row");
                catalog.rejected.push(ExcludedRow {
                    line,
                    game: None,
                    reason: format!("undecodable row: {e}"),
                });
                continue;
            }
        };

        let line = record.position().map(|p| p.line()).unwrap_or(0);
        match record.deserialize::<RawRow>(Some(&headers)) {
            Ok(mut row) => {
                row.line = line;
                catalog.rows.push(row);
            }
            Err(e) => {
                warn!(line, error = %e, "skipping malformed catalog row");
                catalog.rejected.push(ExcludedRow {
                    line,
                    game: record.get(0).map(String::from),
                    reason: format!("malformed row: {e}"),
                });
            }
        }
    }

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rows_and_ignores_extra_columns() {
        let csv = "\
,game,console,loose_val,complete_val,new_val,date(D/M/Y)
0,Super Game,nes,5,10,20,01/01/2020
1,Other Game,snes,1.5,,9,01/01/2020
";
        let catalog = read_catalog_from(csv.as_bytes()).expect("read");
        assert_eq!(catalog.rows.len(), 2);
        assert!(catalog.rejected.is_empty());

        let first = &catalog.rows[0];
        assert_eq!(first.game, "Super Game");
        assert_eq!(first.console, "nes");
        assert_eq!(first.new_val, "20");
        assert_eq!(first.date_scraped, "01/01/2020");
        assert_eq!(first.line, 2);

        assert_eq!(catalog.rows[1].complete_val, "");
    }

    #[test]
    fn missing_column_is_fatal() {
        let csv = "game,console,loose_val,complete_val,date(D/M/Y)\nA,nes,1,2,01/01/2020\n";
        let err = read_catalog_from(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("new_val"));
    }

    #[test]
    fn reads_fixture_file() {
        let catalog =
            read_catalog(Path::new("../../../fixtures/catalog/game_prices.csv")).expect("fixture");
        assert!(catalog.rows.len() >= 5);
    }
}
