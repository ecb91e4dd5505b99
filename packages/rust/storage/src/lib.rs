//! libSQL storage layer for scraped price data.
//!
//! The [`Store`] struct owns the five-table price schema: the `consoles`
//! dimension, the `avg_game_prices` fact table, and the per-condition
//! `{loose|cib|new}_game_prices` sales history tables.
//!
//! **Access rules:**
//! - Ingestion: read-write (sole writer) via [`Store::open`]
//! - Reporting commands: read-only via [`Store::open_readonly`]

mod schema;

use libsql::{Connection, Database, Value, params};
use pricescrape_shared::{
    Condition, ConsolePlatform, NormalizedItem, PriceScrapeError, Result, SaleRecord, StoreConfig,
};
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Bound on bind parameters per statement (SQLite's historical default limit).
const MAX_BIND_PARAMS: usize = 999;

/// Primary storage handle wrapping a libSQL database.
pub struct Store {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Store {
    /// Open or create the database in read-write mode, with foreign keys enforced.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let path = config.path.as_path();
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PriceScrapeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PriceScrapeError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PriceScrapeError::Storage(e.to_string()))?;

        conn.execute("PRAGMA foreign_keys = ON", params![])
            .await
            .map_err(|e| PriceScrapeError::Storage(format!("enabling foreign keys: {e}")))?;

        Ok(Self {
            db,
            conn,
            readonly: false,
        })
    }

    /// Open an existing database in read-only mode.
    pub async fn open_readonly(config: &StoreConfig) -> Result<Self> {
        if !config.path.exists() {
            return Err(PriceScrapeError::Storage(format!(
                "database not found at {}",
                config.path.display()
            )));
        }

        let db = libsql::Builder::new_local(&config.path)
            .build()
            .await
            .map_err(|e| PriceScrapeError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PriceScrapeError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(PriceScrapeError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transaction boundary
    // -----------------------------------------------------------------------

    /// Start the run-wide transaction.
    pub async fn begin(&self) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("BEGIN", params![])
            .await
            .map_err(|e| PriceScrapeError::Storage(format!("begin failed: {e}")))?;
        Ok(())
    }

    pub async fn commit(&self) -> Result<()> {
        self.conn
            .execute("COMMIT", params![])
            .await
            .map_err(|e| PriceScrapeError::Storage(format!("commit failed: {e}")))?;
        Ok(())
    }

    pub async fn rollback(&self) -> Result<()> {
        self.conn
            .execute("ROLLBACK", params![])
            .await
            .map_err(|e| PriceScrapeError::Storage(format!("rollback failed: {e}")))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Schema
    // -----------------------------------------------------------------------

    /// Drop and recreate all price tables.
    #[instrument(skip(self))]
    pub async fn reset_schema(&self) -> Result<()> {
        self.check_writable()?;
        let tables = schema::all_tables();

        for table in tables.iter().rev() {
            self.conn
                .execute_batch(&format!("DROP TABLE IF EXISTS {};", table.name))
                .await
                .map_err(|e| {
                    PriceScrapeError::Storage(format!("dropping {} failed: {e}", table.name))
                })?;
        }

        for table in &tables {
            self.conn.execute_batch(table.create_sql).await.map_err(|e| {
                PriceScrapeError::Storage(format!("creating {} failed: {e}", table.name))
            })?;
            info!(table = table.name, "table created");
        }
        Ok(())
    }

    /// Create any missing price tables, keeping existing rows.
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<()> {
        self.check_writable()?;
        for table in &schema::all_tables() {
            self.conn.execute_batch(table.create_sql).await.map_err(|e| {
                PriceScrapeError::Storage(format!("creating {} failed: {e}", table.name))
            })?;
        }
        debug!("schema present");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Bulk inserts
    // -----------------------------------------------------------------------

    /// Load the console dimension. Existing ids are updated in place.
    pub async fn insert_consoles(&self, consoles: &[ConsolePlatform]) -> Result<usize> {
        let rows = consoles
            .iter()
            .map(|c| {
                vec![
                    Value::Integer(i64::from(c.console_id)),
                    Value::Text(c.console.clone()),
                ]
            })
            .collect();
        self.bulk_insert("consoles", &["console_id", "console"], Some("console_id"), rows)
            .await
    }

    /// Load the average price fact table. Existing ids are updated in place,
    /// so their sales history stays attached.
    pub async fn insert_avg_prices(&self, items: &[NormalizedItem]) -> Result<usize> {
        let rows = items
            .iter()
            .map(|i| {
                vec![
                    Value::Integer(i64::from(i.game_id)),
                    Value::Integer(i64::from(i.console_id)),
                    Value::Real(i.item.loose_val),
                    Value::Real(i.item.complete_val),
                    Value::Real(i.item.new_val),
                    Value::Text(i.item.date_scraped.clone()),
                    Value::Text(i.slug.clone()),
                    Value::Text(i.url.clone()),
                ]
            })
            .collect();
        self.bulk_insert(
            "avg_game_prices",
            &[
                "game_id",
                "console_id",
                "loose_val",
                "complete_val",
                "new_val",
                "date_scraped",
                "game_url",
                "url",
            ],
            Some("game_id"),
            rows,
        )
        .await
    }

    /// Append sales history for one condition.
    ///
    /// Prices that read as numbers are bound as REAL; anything else is passed
    /// through as text and left to the column's affinity.
    pub async fn insert_sales(&self, condition: Condition, records: &[SaleRecord]) -> Result<usize> {
        let rows = records
            .iter()
            .map(|r| {
                let price = match r.price_value() {
                    Some(v) => Value::Real(v),
                    None => Value::Text(r.price_sold.clone()),
                };
                vec![
                    Value::Integer(i64::from(r.game_id)),
                    r.date_sold.clone().map(Value::Text).unwrap_or(Value::Null),
                    price,
                ]
            })
            .collect();
        self.bulk_insert(
            condition.table(),
            &["game_id", "date_sold", "price_sold"],
            None,
            rows,
        )
        .await
    }

    /// Remove the sales history of the given games from all three condition tables.
    pub async fn delete_sales(&self, game_ids: &[u32]) -> Result<usize> {
        self.check_writable()?;
        let mut deleted = 0usize;

        for chunk in game_ids.chunks(MAX_BIND_PARAMS) {
            let slots: Vec<String> = (1..=chunk.len()).map(|i| format!("?{i}")).collect();
            let values: Vec<Value> = chunk.iter().map(|id| Value::Integer(i64::from(*id))).collect();

            for condition in Condition::ALL {
                let sql = format!(
                    "DELETE FROM {} WHERE game_id IN ({})",
                    condition.table(),
                    slots.join(", ")
                );
                let affected = self
                    .conn
                    .execute(&sql, libsql::params::Params::Positional(values.clone()))
                    .await
                    .map_err(|e| {
                        PriceScrapeError::Storage(format!(
                            "delete from {} failed: {e}",
                            condition.table()
                        ))
                    })?;
                deleted += affected as usize;
            }
        }

        debug!(games = game_ids.len(), rows = deleted, "sales history cleared");
        Ok(deleted)
    }

    /// Multi-row `INSERT`, split only as far as the bind parameter limit requires.
    ///
    /// With `upsert_key`, rows whose key already exists have their other
    /// columns overwritten.
    async fn bulk_insert(
        &self,
        table: &str,
        columns: &[&str],
        upsert_key: Option<&str>,
        rows: Vec<Vec<Value>>,
    ) -> Result<usize> {
        self.check_writable()?;
        if rows.is_empty() {
            return Ok(0);
        }

        let rows_per_stmt = (MAX_BIND_PARAMS / columns.len()).max(1);
        let column_list = columns.join(", ");
        let conflict = match upsert_key {
            Some(key) => {
                let updates: Vec<String> = columns
                    .iter()
                    .filter(|c| **c != key)
                    .map(|c| format!("{c} = excluded.{c}"))
                    .collect();
                format!(" ON CONFLICT({key}) DO UPDATE SET {}", updates.join(", "))
            }
            None => String::new(),
        };
        let mut inserted = 0usize;

        for chunk in rows.chunks(rows_per_stmt) {
            let mut placeholders = Vec::with_capacity(chunk.len());
            let mut values = Vec::with_capacity(chunk.len() * columns.len());
            for (row_idx, row) in chunk.iter().enumerate() {
                let base = row_idx * columns.len();
                let slots: Vec<String> = (1..=columns.len())
                    .map(|col| format!("?{}", base + col))
                    .collect();
                placeholders.push(format!("({})", slots.join(", ")));
                values.extend(row.iter().cloned());
            }

            let sql = format!(
                "INSERT INTO {table} ({column_list}) VALUES {}{conflict}",
                placeholders.join(", ")
            );
            let affected = self
                .conn
                .execute(&sql, libsql::params::Params::Positional(values))
                .await
                .map_err(|e| PriceScrapeError::Storage(format!("insert into {table} failed: {e}")))?;
            inserted += affected as usize;
        }

        debug!(table, rows = inserted, "bulk insert complete");
        Ok(inserted)
    }

    // -----------------------------------------------------------------------
    // Read queries (reporting)
    // -----------------------------------------------------------------------

    /// Row count of one managed table.
    pub async fn count_rows(&self, table: &str) -> Result<u64> {
        if !schema::is_known_table(table) {
            return Err(PriceScrapeError::Storage(format!("unknown table '{table}'")));
        }
        let mut rows = self
            .conn
            .query(&format!("SELECT COUNT(*) FROM {table}"), params![])
            .await
            .map_err(|e| PriceScrapeError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row
                .get::<i64>(0)
                .map_err(|e| PriceScrapeError::Storage(e.to_string()))? as u64),
            Ok(None) => Ok(0),
            Err(e) => Err(PriceScrapeError::Storage(e.to_string())),
        }
    }

    /// All consoles, ordered by name.
    pub async fn list_consoles(&self) -> Result<Vec<ConsolePlatform>> {
        let mut rows = self
            .conn
            .query(
                "SELECT console_id, console FROM consoles ORDER BY console",
                params![],
            )
            .await
            .map_err(|e| PriceScrapeError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            results.push(ConsolePlatform {
                console_id: row
                    .get::<u32>(0)
                    .map_err(|e| PriceScrapeError::Storage(e.to_string()))?,
                console: row
                    .get::<String>(1)
                    .map_err(|e| PriceScrapeError::Storage(e.to_string()))?,
            });
        }
        Ok(results)
    }

    /// Average of the catalog prices per console.
    pub async fn avg_prices_by_console(&self) -> Result<Vec<ConsoleAverages>> {
        let mut rows = self
            .conn
            .query(
                "SELECT c.console, COUNT(*), AVG(a.loose_val), AVG(a.complete_val), AVG(a.new_val)
                 FROM avg_game_prices a
                 JOIN consoles c ON a.console_id = c.console_id
                 GROUP BY c.console
                 ORDER BY c.console",
                params![],
            )
            .await
            .map_err(|e| PriceScrapeError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            results.push(ConsoleAverages {
                console: row
                    .get::<String>(0)
                    .map_err(|e| PriceScrapeError::Storage(e.to_string()))?,
                games: row.get::<i64>(1).unwrap_or(0) as u64,
                avg_loose: row.get::<f64>(2).unwrap_or(0.0),
                avg_complete: row.get::<f64>(3).unwrap_or(0.0),
                avg_new: row.get::<f64>(4).unwrap_or(0.0),
            });
        }
        Ok(results)
    }

    /// Games of one console, by id.
    pub async fn games_by_console(&self, console_id: u32) -> Result<Vec<GameRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT game_id, console_id, loose_val, complete_val, new_val, date_scraped, game_url, url
                 FROM avg_game_prices WHERE console_id = ?1 ORDER BY game_id",
                params![console_id],
            )
            .await
            .map_err(|e| PriceScrapeError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            results.push(row_to_game(&row)?);
        }
        Ok(results)
    }

    /// One game's average-price row.
    pub async fn get_game(&self, game_id: u32) -> Result<Option<GameRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT game_id, console_id, loose_val, complete_val, new_val, date_scraped, game_url, url
                 FROM avg_game_prices WHERE game_id = ?1",
                params![game_id],
            )
            .await
            .map_err(|e| PriceScrapeError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_game(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(PriceScrapeError::Storage(e.to_string())),
        }
    }

    /// Sales history of one game for one condition, in insertion order.
    pub async fn sales_history(&self, game_id: u32, condition: Condition) -> Result<Vec<SaleRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT date_sold, price_sold FROM {} WHERE game_id = ?1 ORDER BY rowid",
                    condition.table()
                ),
                params![game_id],
            )
            .await
            .map_err(|e| PriceScrapeError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            let price_sold = match row
                .get_value(1)
                .map_err(|e| PriceScrapeError::Storage(e.to_string()))?
            {
                Value::Real(v) => format!("{v:.2}"),
                Value::Integer(v) => format!("{v}.00"),
                Value::Text(s) => s,
                _ => String::new(),
            };
            results.push(SaleRecord {
                game_id,
                condition,
                date_sold: row.get::<String>(0).ok(),
                price_sold,
            });
        }
        Ok(results)
    }
}

/// Per-console averages of the catalog prices.
#[derive(Debug, Clone, Serialize)]
pub struct ConsoleAverages {
    pub console: String,
    pub games: u64,
    pub avg_loose: f64,
    pub avg_complete: f64,
    pub avg_new: f64,
}

/// One row of `avg_game_prices`.
#[derive(Debug, Clone, Serialize)]
pub struct GameRow {
    pub game_id: u32,
    pub console_id: u32,
    pub loose_val: f64,
    pub complete_val: f64,
    pub new_val: f64,
    pub date_scraped: Option<String>,
    /// Derived slug.
    pub game_url: Option<String>,
    pub url: Option<String>,
}

/// Advance a result set, surfacing read errors instead of ending early.
async fn next_row(rows: &mut libsql::Rows) -> Result<Option<libsql::Row>> {
    rows.next()
        .await
        .map_err(|e| PriceScrapeError::Storage(format!("reading row failed: {e}")))
}

/// Convert a database row to a [`GameRow`].
fn row_to_game(row: &libsql::Row) -> Result<GameRow> {
    Ok(GameRow {
        game_id: row
            .get::<u32>(0)
            .map_err(|e| PriceScrapeError::Storage(e.to_string()))?,
        console_id: row
            .get::<u32>(1)
            .map_err(|e| PriceScrapeError::Storage(e.to_string()))?,
        loose_val: row.get::<f64>(2).unwrap_or(0.0),
        complete_val: row.get::<f64>(3).unwrap_or(0.0),
        new_val: row.get::<f64>(4).unwrap_or(0.0),
        date_scraped: row.get::<String>(5).ok(),
        game_url: row.get::<String>(6).ok(),
        url: row.get::<String>(7).ok(),
    })
}
