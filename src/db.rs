use std::{
    fs,
    path::{Path, PathBuf},
};

use rusqlite::Connection;

use crate::error::AppResult;

/// Handle to the on-disk database.
///
/// Holds only the path. Each operation takes its own connection from
/// [`Store::connection`] and drops it when done, on success and on error.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Opens (creating if needed) the database file and brings the schema up to date.
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let store = Self { path };
        let conn = store.connection()?;
        init_schema(&conn)?;
        tracing::debug!(path = %store.path.display(), "database ready");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> AppResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }
}

fn init_schema(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS customers (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          contact_name TEXT,
          email TEXT,
          phone TEXT,
          address TEXT,
          zip_code TEXT,
          city TEXT,
          country TEXT,
          tax_number TEXT,
          notes TEXT
        );
        CREATE TABLE IF NOT EXISTS products (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          price REAL NOT NULL,
          tax_rate REAL DEFAULT 0.19
        );
        CREATE TABLE IF NOT EXISTS invoices (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          customer_id INTEGER NOT NULL,
          date TEXT NOT NULL,
          total REAL NOT NULL,
          FOREIGN KEY(customer_id) REFERENCES customers(id)
        );
        CREATE TABLE IF NOT EXISTS invoice_lines (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          invoice_id INTEGER NOT NULL,
          product_id INTEGER NOT NULL,
          quantity INTEGER NOT NULL,
          price REAL NOT NULL,
          FOREIGN KEY(invoice_id) REFERENCES invoices(id),
          FOREIGN KEY(product_id) REFERENCES products(id)
        );
        CREATE TABLE IF NOT EXISTS settings (
          key TEXT PRIMARY KEY,
          value BLOB
        );
        CREATE TABLE IF NOT EXISTS business_info (
          id INTEGER PRIMARY KEY CHECK (id = 1),
          company_name TEXT,
          address TEXT,
          vat_id TEXT,
          phone TEXT,
          fax TEXT,
          email TEXT,
          website TEXT,
          bank_name TEXT,
          iban TEXT,
          bic TEXT,
          account_holder TEXT
        );",
    )?;

    ensure_product_columns(conn)?;
    ensure_customer_columns(conn)?;
    Ok(())
}

// Database files written by early builds lack these columns.
fn ensure_product_columns(conn: &Connection) -> AppResult<()> {
    if !table_has_column(conn, "products", "tax_rate")? {
        conn.execute(
            "ALTER TABLE products ADD COLUMN tax_rate REAL DEFAULT 0.19",
            [],
        )?;
    }
    Ok(())
}

fn ensure_customer_columns(conn: &Connection) -> AppResult<()> {
    for column in ["contact_name", "zip_code", "city", "country", "tax_number", "notes"] {
        if !table_has_column(conn, "customers", column)? {
            conn.execute(
                &format!("ALTER TABLE customers ADD COLUMN {} TEXT", column),
                [],
            )?;
        }
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> AppResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
