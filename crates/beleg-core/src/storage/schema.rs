//! Table definitions and additive migrations.
//!
//! Migrations only ever add columns and tables, and every step checks
//! first, so running them against an up-to-date file changes nothing.

use rusqlite::{params, Connection};
use tracing::info;

/// Value stored in `PRAGMA user_version` once the schema is current.
pub const SCHEMA_VERSION: i32 = 2;

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS counterparties (
    id            TEXT PRIMARY KEY,
    name          TEXT,
    street        TEXT,
    street_number TEXT,
    postcode      TEXT,
    city          TEXT,
    country       TEXT,
    tax_number    TEXT,
    vat_id        TEXT,
    verified      INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cp_name   ON counterparties (name COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS idx_cp_vat_id ON counterparties (vat_id);

CREATE TABLE IF NOT EXISTS receipts (
    id              TEXT PRIMARY KEY,
    counterparty_id TEXT REFERENCES counterparties(id) ON DELETE SET NULL,
    receipt_type    TEXT NOT NULL DEFAULT 'purchase',
    receipt_number  TEXT,
    receipt_date    TEXT,
    total_amount    TEXT,
    vat_percentage  TEXT,
    vat_amount      TEXT,
    category        TEXT,
    created_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_receipts_date     ON receipts (receipt_date);
CREATE INDEX IF NOT EXISTS idx_receipts_category ON receipts (category);
CREATE INDEX IF NOT EXISTS idx_receipts_type     ON receipts (receipt_type);

CREATE TABLE IF NOT EXISTS receipt_items (
    id          TEXT PRIMARY KEY,
    receipt_id  TEXT NOT NULL REFERENCES receipts(id) ON DELETE CASCADE,
    position    INTEGER,
    description TEXT,
    quantity    TEXT,
    unit_price  TEXT,
    total_price TEXT,
    vat_rate    TEXT,
    vat_amount  TEXT,
    category    TEXT
);
CREATE INDEX IF NOT EXISTS idx_items_receipt ON receipt_items (receipt_id);

CREATE TABLE IF NOT EXISTS receipt_content (
    receipt_id   TEXT PRIMARY KEY REFERENCES receipts(id) ON DELETE CASCADE,
    raw_text     TEXT,
    content_hash TEXT NOT NULL
);
";

const CREATE_VAT_SPLITS: &str = "
CREATE TABLE IF NOT EXISTS receipt_vat_splits (
    id         TEXT PRIMARY KEY,
    receipt_id TEXT NOT NULL REFERENCES receipts(id) ON DELETE CASCADE,
    position   INTEGER,
    vat_rate   TEXT,
    vat_amount TEXT
);
CREATE INDEX IF NOT EXISTS idx_vat_splits_receipt ON receipt_vat_splits (receipt_id);
";

/// Columns added after the first release: (table, column, type).
const ADDED_COLUMNS: &[(&str, &str, &str)] = &[
    ("receipt_items", "position", "INTEGER"),
    ("receipt_items", "vat_amount", "TEXT"),
    ("counterparties", "verified", "INTEGER NOT NULL DEFAULT 0"),
];

/// Create missing tables, add missing columns, record the version.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    conn.execute_batch(CREATE_TABLES)?;

    for (table, column, definition) in ADDED_COLUMNS {
        if !column_exists(conn, table, column)? {
            info!("Adding column {}.{}", table, column);
            conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"))?;
        }
    }

    conn.execute_batch(CREATE_VAT_SPLITS)?;

    if version < SCHEMA_VERSION {
        if version > 0 {
            info!("Migrated schema from version {} to {}", version, SCHEMA_VERSION);
        }
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }

    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_is_current() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        assert!(column_exists(&conn, "receipt_vat_splits", "vat_rate").unwrap());
    }

    #[test]
    fn test_old_layout_gains_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE counterparties (id TEXT PRIMARY KEY, name TEXT, street TEXT,
                 street_number TEXT, postcode TEXT, city TEXT, country TEXT,
                 tax_number TEXT, vat_id TEXT, created_at TEXT NOT NULL);
             CREATE TABLE receipt_items (id TEXT PRIMARY KEY, receipt_id TEXT NOT NULL,
                 description TEXT, quantity TEXT, unit_price TEXT, total_price TEXT,
                 vat_rate TEXT, category TEXT);
             INSERT INTO counterparties (id, name, created_at) VALUES ('c1', 'Alt GmbH', 'x');
             PRAGMA user_version = 1;",
        )
        .unwrap();

        migrate(&conn).unwrap();
        migrate(&conn).unwrap();

        assert!(column_exists(&conn, "receipt_items", "position").unwrap());
        assert!(column_exists(&conn, "receipt_items", "vat_amount").unwrap());
        assert!(column_exists(&conn, "counterparties", "verified").unwrap());

        let (rows, verified): (i64, i64) = conn
            .query_row("SELECT COUNT(*), MAX(verified) FROM counterparties", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!((rows, verified), (1, 0));
    }
}
