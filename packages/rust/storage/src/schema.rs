//! Table definitions for the price store.
//!
//! A fresh ingestion run drops and recreates all five tables; a resumed run
//! only creates what is missing. Order matters: tables are created
//! parent-first and dropped child-first so foreign keys never dangle.

/// One table of the price schema.
pub(crate) struct TableSchema {
    pub name: &'static str,
    pub create_sql: &'static str,
}

/// All tables, parents before children.
pub(crate) fn all_tables() -> [TableSchema; 5] {
    [
        TableSchema {
            name: "consoles",
            create_sql: r#"
CREATE TABLE IF NOT EXISTS consoles (
    console_id INTEGER PRIMARY KEY,
    console    TEXT NOT NULL
);
"#,
        },
        TableSchema {
            name: "avg_game_prices",
            create_sql: r#"
CREATE TABLE IF NOT EXISTS avg_game_prices (
    game_id      INTEGER PRIMARY KEY,
    console_id   INTEGER NOT NULL REFERENCES consoles(console_id),
    loose_val    REAL,
    complete_val REAL,
    new_val      REAL,
    date_scraped TEXT,
    game_url     TEXT,
    url          TEXT
);

CREATE INDEX IF NOT EXISTS idx_avg_game_prices_console ON avg_game_prices(console_id);
"#,
        },
        TableSchema {
            name: "loose_game_prices",
            create_sql: r#"
CREATE TABLE IF NOT EXISTS loose_game_prices (
    game_id    INTEGER NOT NULL REFERENCES avg_game_prices(game_id),
    date_sold  TEXT,
    price_sold REAL
);

CREATE INDEX IF NOT EXISTS idx_loose_game_prices_game ON loose_game_prices(game_id);
"#,
        },
        TableSchema {
            name: "cib_game_prices",
            create_sql: r#"
CREATE TABLE IF NOT EXISTS cib_game_prices (
    game_id    INTEGER NOT NULL REFERENCES avg_game_prices(game_id),
    date_sold  TEXT,
    price_sold REAL
);

CREATE INDEX IF NOT EXISTS idx_cib_game_prices_game ON cib_game_prices(game_id);
"#,
        },
        TableSchema {
            name: "new_game_prices",
            create_sql: r#"
CREATE TABLE IF NOT EXISTS new_game_prices (
    game_id    INTEGER NOT NULL REFERENCES avg_game_prices(game_id),
    date_sold  TEXT,
    price_sold REAL
);

CREATE INDEX IF NOT EXISTS idx_new_game_prices_game ON new_game_prices(game_id);
"#,
        },
    ]
}

/// Whether `name` is one of the managed tables.
pub(crate) fn is_known_table(name: &str) -> bool {
    all_tables().iter().any(|t| t.name == name)
}
