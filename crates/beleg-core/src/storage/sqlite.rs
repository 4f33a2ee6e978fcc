//! SQLite receipt repository.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::models::receipt::{
    Address, Counterparty, ReceiptCategory, ReceiptData, ReceiptItem, ReceiptType, VatSplit,
};

use super::schema;
use super::update::ReceiptUpdate;
use super::ReceiptStore;

const COUNTERPARTY_COLUMNS: &str =
    "id, name, street, street_number, postcode, city, country, tax_number, vat_id, verified";

/// Receipt store backed by one SQLite file.
///
/// All access goes through a single connection guarded by a mutex.
pub struct Repository {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Repository {
    /// Open (or create) the database at `path` and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        info!("Opened receipt database {}", path.display());

        Self::init(conn, Some(path.to_path_buf()))
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// File backing this repository; `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // Open transactions roll back on drop; a poisoned connection is consistent.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of stored receipts.
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM receipts", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Counterparties the user has confirmed, by name.
    pub fn list_verified_counterparties(&self) -> Result<Vec<Counterparty>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COUNTERPARTY_COLUMNS} FROM counterparties
             WHERE verified = 1 ORDER BY name COLLATE NOCASE ASC"
        ))?;
        let rows = stmt
            .query_map([], counterparty_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Mark a counterparty as confirmed (or not). False if no such row.
    pub fn set_counterparty_verified(&self, counterparty_id: &str, verified: bool) -> Result<bool> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE counterparties SET verified = ?1 WHERE id = ?2",
            params![verified, counterparty_id],
        )?;
        Ok(changed > 0)
    }

    fn query_receipts(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<ReceiptData>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("SELECT r.id FROM receipts r {filter}"))?;
        let ids = stmt
            .query_map(args, |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut receipts = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(receipt) = load_receipt(&conn, &id)? {
                receipts.push(receipt);
            }
        }
        Ok(receipts)
    }
}

impl ReceiptStore for Repository {
    fn save(&self, receipt: &ReceiptData) -> Result<bool> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        if receipt_exists(&tx, &receipt.id)? {
            debug!("Receipt {} already stored", receipt.id);
            return Ok(false);
        }

        let counterparty_id = match &receipt.counterparty {
            Some(cp) => Some(resolve_counterparty(&tx, cp)?),
            None => None,
        };

        tx.execute(
            "INSERT INTO receipts
                (id, counterparty_id, receipt_type, receipt_number, receipt_date,
                 total_amount, vat_percentage, vat_amount, category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                receipt.id,
                counterparty_id,
                receipt.receipt_type.as_str(),
                receipt.receipt_number,
                receipt.receipt_date.map(|d| d.to_string()),
                dec_text(receipt.total_amount),
                dec_text(receipt.vat_percentage),
                dec_text(receipt.vat_amount),
                receipt.category.as_str(),
                now(),
            ],
        )?;

        insert_items(&tx, &receipt.id, &receipt.items)?;
        insert_vat_splits(&tx, &receipt.id, &receipt.vat_splits)?;

        tx.execute(
            "INSERT INTO receipt_content (receipt_id, raw_text, content_hash) VALUES (?1, ?2, ?3)",
            params![receipt.id, receipt.raw_text, receipt.id],
        )?;

        tx.commit()?;
        info!("Stored receipt {} with {} item(s)", receipt.id, receipt.items.len());
        Ok(true)
    }

    fn exists(&self, id: &str) -> Result<bool> {
        let conn = self.lock();
        Ok(receipt_exists(&conn, id)?)
    }

    fn get(&self, id: &str) -> Result<Option<ReceiptData>> {
        let conn = self.lock();
        load_receipt(&conn, id)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.lock();
        let deleted = conn.execute("DELETE FROM receipts WHERE id = ?1", params![id])?;
        if deleted > 0 {
            info!("Deleted receipt {}", id);
        }
        Ok(deleted > 0)
    }

    fn update(&self, id: &str, changes: &ReceiptUpdate) -> Result<bool> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        if !receipt_exists(&tx, id)? {
            return Ok(false);
        }

        update_receipt_row(&tx, id, changes)?;

        if changes.touches_counterparty() {
            let cp_id = own_counterparty(&tx, id)?;
            update_counterparty_row(&tx, &cp_id, changes)?;
        }

        if let Some(verified) = changes.counterparty_verified {
            tx.execute(
                "UPDATE counterparties SET verified = ?1
                 WHERE id = (SELECT counterparty_id FROM receipts WHERE id = ?2)",
                params![verified, id],
            )?;
        }

        if let Some(items) = &changes.items {
            tx.execute("DELETE FROM receipt_items WHERE receipt_id = ?1", params![id])?;
            insert_items(&tx, id, items)?;
        }

        if let Some(splits) = &changes.vat_splits {
            tx.execute("DELETE FROM receipt_vat_splits WHERE receipt_id = ?1", params![id])?;
            insert_vat_splits(&tx, id, splits)?;
        }

        tx.commit()?;
        info!("Updated receipt {}", id);
        Ok(true)
    }

    fn find_by_period(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ReceiptData>> {
        self.query_receipts(
            "WHERE r.receipt_date BETWEEN ?1 AND ?2 ORDER BY r.receipt_date DESC",
            &[&start.to_string(), &end.to_string()],
        )
    }

    fn find_by_category(&self, category: ReceiptCategory) -> Result<Vec<ReceiptData>> {
        self.query_receipts(
            "WHERE r.category = ?1 ORDER BY r.receipt_date DESC NULLS LAST",
            &[&category.as_str()],
        )
    }

    fn find_by_type(&self, receipt_type: ReceiptType) -> Result<Vec<ReceiptData>> {
        self.query_receipts(
            "WHERE r.receipt_type = ?1 ORDER BY r.receipt_date DESC NULLS LAST",
            &[&receipt_type.as_str()],
        )
    }

    fn list_all(&self) -> Result<Vec<ReceiptData>> {
        self.query_receipts("ORDER BY r.receipt_date DESC NULLS LAST", &[])
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn dec_text(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.to_string())
}

fn receipt_exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM receipts WHERE id = ?1", params![id], |_| Ok(()))
        .optional()
        .map(|row| row.is_some())
}

/// Row id for `cp`: an existing row with the same VAT id, else a new row.
fn resolve_counterparty(tx: &Transaction<'_>, cp: &Counterparty) -> rusqlite::Result<String> {
    if let Some(vat_id) = cp.vat_id.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM counterparties WHERE vat_id = ?1 ORDER BY created_at LIMIT 1",
                params![vat_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            debug!("Reusing counterparty {} for VAT id {}", id, vat_id);
            return Ok(id);
        }
    }

    tx.execute(
        "INSERT OR IGNORE INTO counterparties
            (id, name, street, street_number, postcode, city, country,
             tax_number, vat_id, verified, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            cp.id,
            cp.name,
            cp.address.street,
            cp.address.street_number,
            cp.address.postcode,
            cp.address.city,
            cp.address.country,
            cp.tax_number,
            cp.vat_id,
            cp.verified,
            now(),
        ],
    )?;
    Ok(cp.id.clone())
}

/// Counterparty row that only `receipt_id` refers to.
///
/// A row shared with other receipts is copied first and the receipt
/// relinked, so corrections stay local. A receipt without a counterparty
/// gets an empty one.
fn own_counterparty(tx: &Transaction<'_>, receipt_id: &str) -> rusqlite::Result<String> {
    let current: Option<String> = tx.query_row(
        "SELECT counterparty_id FROM receipts WHERE id = ?1",
        params![receipt_id],
        |row| row.get(0),
    )?;

    let new_id = Uuid::new_v4().to_string();

    match current {
        Some(cp_id) => {
            let users: i64 = tx.query_row(
                "SELECT COUNT(*) FROM receipts WHERE counterparty_id = ?1",
                params![cp_id],
                |row| row.get(0),
            )?;
            if users <= 1 {
                return Ok(cp_id);
            }

            debug!("Counterparty {} is shared, copying it for receipt {}", cp_id, receipt_id);
            tx.execute(
                "INSERT INTO counterparties
                    (id, name, street, street_number, postcode, city, country,
                     tax_number, vat_id, verified, created_at)
                 SELECT ?1, name, street, street_number, postcode, city, country,
                        tax_number, vat_id, verified, ?2
                 FROM counterparties WHERE id = ?3",
                params![new_id, now(), cp_id],
            )?;
        }
        None => {
            tx.execute(
                "INSERT INTO counterparties (id, created_at) VALUES (?1, ?2)",
                params![new_id, now()],
            )?;
        }
    }

    tx.execute(
        "UPDATE receipts SET counterparty_id = ?1 WHERE id = ?2",
        params![new_id, receipt_id],
    )?;
    Ok(new_id)
}

fn update_receipt_row(tx: &Transaction<'_>, id: &str, changes: &ReceiptUpdate) -> rusqlite::Result<()> {
    let mut columns: Vec<(&str, Option<String>)> = Vec::new();

    if let Some(t) = changes.receipt_type {
        columns.push(("receipt_type", Some(t.as_str().to_string())));
    }
    if let Some(number) = &changes.receipt_number {
        columns.push(("receipt_number", Some(number.clone())));
    }
    if let Some(date) = changes.receipt_date {
        columns.push(("receipt_date", Some(date.to_string())));
    }
    if changes.total_amount.is_some() {
        columns.push(("total_amount", dec_text(changes.total_amount)));
    }
    if changes.vat_percentage.is_some() {
        columns.push(("vat_percentage", dec_text(changes.vat_percentage)));
    }
    if changes.vat_amount.is_some() {
        columns.push(("vat_amount", dec_text(changes.vat_amount)));
    }
    if let Some(category) = changes.category {
        columns.push(("category", Some(category.as_str().to_string())));
    }

    set_columns(tx, "receipts", id, &columns)
}

fn update_counterparty_row(
    tx: &Transaction<'_>,
    cp_id: &str,
    changes: &ReceiptUpdate,
) -> rusqlite::Result<()> {
    let mut columns: Vec<(&str, Option<String>)> = Vec::new();

    if let Some(name) = &changes.counterparty_name {
        columns.push(("name", Some(name.clone())));
    }
    if let Some(vat_id) = &changes.vat_id {
        columns.push(("vat_id", Some(vat_id.clone())));
    }
    if let Some(tax_number) = &changes.tax_number {
        columns.push(("tax_number", Some(tax_number.clone())));
    }
    if let Some(address) = &changes.address {
        let parts = [
            ("street", &address.street),
            ("street_number", &address.street_number),
            ("postcode", &address.postcode),
            ("city", &address.city),
            ("country", &address.country),
        ];
        for (column, value) in parts {
            if value.is_some() {
                columns.push((column, value.clone()));
            }
        }
    }

    set_columns(tx, "counterparties", cp_id, &columns)
}

/// `UPDATE <table> SET ... WHERE id = ?`. Column names come from code, never from input.
fn set_columns(
    tx: &Transaction<'_>,
    table: &str,
    id: &str,
    columns: &[(&str, Option<String>)],
) -> rusqlite::Result<()> {
    if columns.is_empty() {
        return Ok(());
    }

    let assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        table,
        assignments.join(", "),
        columns.len() + 1
    );

    let mut args: Vec<&dyn rusqlite::ToSql> =
        columns.iter().map(|(_, v)| v as &dyn rusqlite::ToSql).collect();
    args.push(&id);
    tx.execute(&sql, args.as_slice())?;
    Ok(())
}

fn insert_items(tx: &Transaction<'_>, receipt_id: &str, items: &[ReceiptItem]) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO receipt_items
            (id, receipt_id, position, description, quantity, unit_price,
             total_price, vat_rate, vat_amount, category)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;

    for (i, item) in items.iter().enumerate() {
        stmt.execute(params![
            Uuid::new_v4().to_string(),
            receipt_id,
            item.position.unwrap_or(i as u32 + 1),
            item.description,
            dec_text(item.quantity),
            dec_text(item.unit_price),
            dec_text(item.total_price),
            dec_text(item.vat_rate),
            dec_text(item.vat_amount),
            item.category.as_str(),
        ])?;
    }
    Ok(())
}

fn insert_vat_splits(tx: &Transaction<'_>, receipt_id: &str, splits: &[VatSplit]) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO receipt_vat_splits (id, receipt_id, position, vat_rate, vat_amount)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;

    for (i, split) in splits.iter().enumerate() {
        stmt.execute(params![
            Uuid::new_v4().to_string(),
            receipt_id,
            split.position.unwrap_or(i as u32 + 1),
            dec_text(split.vat_rate),
            dec_text(split.vat_amount),
        ])?;
    }
    Ok(())
}

fn load_receipt(conn: &Connection, id: &str) -> Result<Option<ReceiptData>> {
    let row = conn
        .query_row(
            "SELECT r.id, r.counterparty_id, r.receipt_type, r.receipt_number, r.receipt_date,
                    r.total_amount, r.vat_percentage, r.vat_amount, r.category, c.raw_text
             FROM receipts r
             LEFT JOIN receipt_content c ON c.receipt_id = r.id
             WHERE r.id = ?1",
            params![id],
            |row| {
                let receipt = ReceiptData {
                    id: row.get(0)?,
                    receipt_type: ReceiptType::parse_lossy(&row.get::<_, String>(2)?),
                    counterparty: None,
                    receipt_number: row.get(3)?,
                    receipt_date: date_column(row, 4)?,
                    total_amount: dec_column(row, 5)?,
                    vat_percentage: dec_column(row, 6)?,
                    vat_amount: dec_column(row, 7)?,
                    category: ReceiptCategory::parse_lossy(
                        &row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                    ),
                    items: Vec::new(),
                    vat_splits: Vec::new(),
                    raw_text: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
                };
                let cp_id: Option<String> = row.get(1)?;
                Ok((receipt, cp_id))
            },
        )
        .optional()?;

    let Some((mut receipt, cp_id)) = row else {
        return Ok(None);
    };

    if let Some(cp_id) = cp_id {
        receipt.counterparty = conn
            .query_row(
                &format!("SELECT {COUNTERPARTY_COLUMNS} FROM counterparties WHERE id = ?1"),
                params![cp_id],
                counterparty_from_row,
            )
            .optional()?;
    }

    let mut stmt = conn.prepare(
        "SELECT position, description, quantity, unit_price, total_price,
                vat_rate, vat_amount, category
         FROM receipt_items WHERE receipt_id = ?1 ORDER BY position ASC NULLS LAST",
    )?;
    receipt.items = stmt
        .query_map(params![id], |row| {
            Ok(ReceiptItem {
                position: row.get(0)?,
                description: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                quantity: dec_column(row, 2)?,
                unit_price: dec_column(row, 3)?,
                total_price: dec_column(row, 4)?,
                vat_rate: dec_column(row, 5)?,
                vat_amount: dec_column(row, 6)?,
                category: ReceiptCategory::parse_lossy(
                    &row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                ),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT position, vat_rate, vat_amount
         FROM receipt_vat_splits WHERE receipt_id = ?1 ORDER BY position ASC",
    )?;
    receipt.vat_splits = stmt
        .query_map(params![id], |row| {
            Ok(VatSplit {
                position: row.get(0)?,
                vat_rate: dec_column(row, 1)?,
                vat_amount: dec_column(row, 2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Some(receipt))
}

fn counterparty_from_row(row: &Row<'_>) -> rusqlite::Result<Counterparty> {
    Ok(Counterparty {
        id: row.get(0)?,
        name: row.get(1)?,
        address: Address {
            street: row.get(2)?,
            street_number: row.get(3)?,
            postcode: row.get(4)?,
            city: row.get(5)?,
            country: row.get(6)?,
        },
        tax_number: row.get(7)?,
        vat_id: row.get(8)?,
        verified: row.get::<_, Option<bool>>(9)?.unwrap_or(false),
    })
}

fn dec_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let Some(text) = row.get::<_, Option<String>>(idx)? else {
        return Ok(None);
    };
    Decimal::from_str(&text)
        .map(Some)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let Some(text) = row.get::<_, Option<String>>(idx)? else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::update::AddressUpdate;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn receipt(text: &str, day: Option<NaiveDate>) -> ReceiptData {
        let mut r = ReceiptData::new(text, ReceiptType::Purchase);
        r.receipt_date = day;
        r.total_amount = Some(dec("119.00"));
        r.vat_percentage = Some(dec("19"));
        r.vat_amount = Some(dec("19.00"));
        r
    }

    fn with_vendor(mut r: ReceiptData, name: &str, vat_id: Option<&str>) -> ReceiptData {
        let mut cp = Counterparty::new(Some(name.to_string())).with_address(Address {
            city: Some("Berlin".into()),
            ..Default::default()
        });
        cp.vat_id = vat_id.map(str::to_string);
        r.counterparty = Some(cp);
        r
    }

    #[test]
    fn test_save_and_get_round_trip() {
        let repo = Repository::open_in_memory().unwrap();
        let mut r = with_vendor(receipt("Shop A\nSumme 119,00 €", Some(date(2024, 3, 1))), "Shop A", None);
        r.category = ReceiptCategory::Material;
        r.items = vec![
            ReceiptItem {
                position: Some(1),
                description: "Papier".into(),
                total_price: Some(dec("100.00")),
                category: ReceiptCategory::Material,
                ..Default::default()
            },
            ReceiptItem {
                position: Some(2),
                description: "Versand".into(),
                total_price: Some(dec("19.00")),
                ..Default::default()
            },
        ];
        r.vat_splits = vec![VatSplit {
            position: Some(1),
            vat_rate: Some(dec("19")),
            vat_amount: Some(dec("19.00")),
        }];

        assert!(repo.save(&r).unwrap());
        let loaded = repo.get(&r.id).unwrap().unwrap();

        assert_eq!(loaded, r);
    }

    #[test]
    fn test_duplicate_save_returns_false() {
        let repo = Repository::open_in_memory().unwrap();
        let r = receipt("Kassenbon 1", None);

        assert!(repo.save(&r).unwrap());
        assert!(!repo.save(&r).unwrap());
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("beleg.db");
        let r = with_vendor(receipt("Tankstelle", Some(date(2024, 1, 5))), "Aral", None);

        {
            let repo = Repository::open(&path).unwrap();
            assert!(repo.save(&r).unwrap());
        }

        let repo = Repository::open(&path).unwrap();
        assert_eq!(repo.count().unwrap(), 1);
        assert!(repo.exists(&r.id).unwrap());
        assert_eq!(repo.get(&r.id).unwrap().unwrap().counterparty, r.counterparty);
        assert_eq!(repo.path(), Some(path.as_path()));
    }

    #[test]
    fn test_delete_cascades() {
        let repo = Repository::open_in_memory().unwrap();
        let mut r = receipt("Baumarkt", None);
        r.items = vec![ReceiptItem {
            description: "Schrauben".into(),
            ..Default::default()
        }];
        repo.save(&r).unwrap();

        assert!(repo.delete(&r.id).unwrap());
        assert!(!repo.delete(&r.id).unwrap());
        assert!(repo.get(&r.id).unwrap().is_none());

        let conn = repo.lock();
        let items: i64 = conn
            .query_row("SELECT COUNT(*) FROM receipt_items", [], |row| row.get(0))
            .unwrap();
        let content: i64 = conn
            .query_row("SELECT COUNT(*) FROM receipt_content", [], |row| row.get(0))
            .unwrap();
        assert_eq!((items, content), (0, 0));
    }

    #[test]
    fn test_counterparty_reused_by_vat_id() {
        let repo = Repository::open_in_memory().unwrap();
        let a = with_vendor(receipt("Rechnung 1", None), "Telekom", Some("DE123456789"));
        let b = with_vendor(receipt("Rechnung 2", None), "Telekom Deutschland", Some("DE123456789"));
        let c = with_vendor(receipt("Rechnung 3", None), "Telekom", None);
        repo.save(&a).unwrap();
        repo.save(&b).unwrap();
        repo.save(&c).unwrap();

        let cp_a = repo.get(&a.id).unwrap().unwrap().counterparty.unwrap();
        let cp_b = repo.get(&b.id).unwrap().unwrap().counterparty.unwrap();
        let cp_c = repo.get(&c.id).unwrap().unwrap().counterparty.unwrap();

        assert_eq!(cp_a.id, cp_b.id);
        assert_eq!(cp_b.name.as_deref(), Some("Telekom"));
        assert_ne!(cp_a.id, cp_c.id);
    }

    #[test]
    fn test_update_is_copy_on_write_for_shared_counterparty() {
        let repo = Repository::open_in_memory().unwrap();
        let a = with_vendor(receipt("Strom Jan", None), "Stadtwerke", Some("DE999999999"));
        let b = with_vendor(receipt("Strom Feb", None), "Stadtwerke", Some("DE999999999"));
        repo.save(&a).unwrap();
        repo.save(&b).unwrap();

        let changes = ReceiptUpdate {
            counterparty_name: Some("Stadtwerke München".into()),
            address: Some(AddressUpdate {
                city: Some("München".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(repo.update(&a.id, &changes).unwrap());

        let cp_a = repo.get(&a.id).unwrap().unwrap().counterparty.unwrap();
        let cp_b = repo.get(&b.id).unwrap().unwrap().counterparty.unwrap();

        assert_eq!(cp_a.name.as_deref(), Some("Stadtwerke München"));
        assert_eq!(cp_a.address.city.as_deref(), Some("München"));
        assert_eq!(cp_a.vat_id.as_deref(), Some("DE999999999"));
        assert_eq!(cp_b.name.as_deref(), Some("Stadtwerke"));
        assert_eq!(cp_b.address.city.as_deref(), Some("Berlin"));
        assert_ne!(cp_a.id, cp_b.id);
    }

    #[test]
    fn test_update_fields_and_lists() {
        let repo = Repository::open_in_memory().unwrap();
        let mut r = receipt("Hotel", Some(date(2024, 5, 2)));
        r.items = vec![ReceiptItem {
            description: "Alt".into(),
            ..Default::default()
        }];
        repo.save(&r).unwrap();

        let changes = ReceiptUpdate {
            receipt_type: Some(ReceiptType::Sale),
            total_amount: Some(dec("107.00")),
            vat_percentage: Some(dec("7")),
            vat_amount: Some(dec("7.00")),
            category: Some(ReceiptCategory::Travel),
            tax_number: Some("123/456/78901".into()),
            items: Some(vec![
                ReceiptItem { description: "Zimmer".into(), ..Default::default() },
                ReceiptItem { description: "Frühstück".into(), ..Default::default() },
            ]),
            ..Default::default()
        };
        assert!(repo.update(&r.id, &changes).unwrap());

        let loaded = repo.get(&r.id).unwrap().unwrap();
        assert_eq!(loaded.id, r.id);
        assert_eq!(loaded.receipt_type, ReceiptType::Sale);
        assert_eq!(loaded.total_amount, Some(dec("107.00")));
        assert_eq!(loaded.category, ReceiptCategory::Travel);
        assert_eq!(loaded.receipt_date, Some(date(2024, 5, 2)));
        assert_eq!(
            loaded.counterparty.unwrap().tax_number.as_deref(),
            Some("123/456/78901")
        );
        let descriptions: Vec<_> = loaded.items.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(descriptions, vec!["Zimmer", "Frühstück"]);
        assert_eq!(loaded.items[1].position, Some(2));

        assert!(!repo.update("missing", &changes).unwrap());
    }

    #[test]
    fn test_period_bounds_are_inclusive() {
        let repo = Repository::open_in_memory().unwrap();
        for (text, day) in [
            ("q1 start", date(2024, 1, 1)),
            ("q1 end", date(2024, 3, 31)),
            ("q2 start", date(2024, 4, 1)),
            ("q1 mid", date(2024, 2, 15)),
        ] {
            repo.save(&receipt(text, Some(day))).unwrap();
        }

        let found = repo.find_by_period(date(2024, 1, 1), date(2024, 3, 31)).unwrap();
        let days: Vec<_> = found.iter().map(|r| r.receipt_date.unwrap()).collect();

        assert_eq!(days, vec![date(2024, 3, 31), date(2024, 2, 15), date(2024, 1, 1)]);
    }

    #[test]
    fn test_filters_put_undated_last() {
        let repo = Repository::open_in_memory().unwrap();
        let mut undated = receipt("undated", None);
        undated.category = ReceiptCategory::Software;
        let mut old = receipt("old", Some(date(2023, 6, 1)));
        old.category = ReceiptCategory::Software;
        let mut new = receipt("new", Some(date(2024, 6, 1)));
        new.category = ReceiptCategory::Software;
        new.receipt_type = ReceiptType::Sale;
        for r in [&undated, &old, &new] {
            repo.save(r).unwrap();
        }

        let ids: Vec<_> = repo
            .find_by_category(ReceiptCategory::Software)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![new.id.clone(), old.id.clone(), undated.id.clone()]);

        let sales = repo.find_by_type(ReceiptType::Sale).unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(repo.list_all().unwrap().last().unwrap().id, undated.id);
        assert!(repo.find_by_category(ReceiptCategory::Taxes).unwrap().is_empty());
    }

    #[test]
    fn test_verified_counterparties() {
        let repo = Repository::open_in_memory().unwrap();
        let r = with_vendor(receipt("Versicherung", None), "Allianz", None);
        repo.save(&r).unwrap();
        let cp_id = r.counterparty.as_ref().unwrap().id.clone();

        assert!(repo.list_verified_counterparties().unwrap().is_empty());
        assert!(repo.set_counterparty_verified(&cp_id, true).unwrap());
        assert!(!repo.set_counterparty_verified("nope", true).unwrap());

        let verified = repo.list_verified_counterparties().unwrap();
        assert_eq!(verified.len(), 1);
        assert_eq!(verified[0].name.as_deref(), Some("Allianz"));
        assert!(verified[0].verified);
    }
}
