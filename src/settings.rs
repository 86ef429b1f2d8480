use rusqlite::{params, Connection, OptionalExtension};

use crate::{db::Store, error::AppResult};

pub const LOGO_KEY: &str = "logo";
pub const INVOICE_COUNTER_KEY: &str = "next_invoice_number";
pub const FIRST_INVOICE_NUMBER: i64 = 1001;

fn fetch_setting(conn: &Connection, key: &str) -> AppResult<Option<Vec<u8>>> {
    let value = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [key],
            |row| row.get::<_, Option<Vec<u8>>>(0),
        )
        .optional()?;
    Ok(value.flatten())
}

fn store_setting(conn: &Connection, key: &str, value: &[u8]) -> AppResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

pub fn get_setting(store: &Store, key: &str) -> AppResult<Option<Vec<u8>>> {
    let conn = store.connection()?;
    fetch_setting(&conn, key)
}

pub fn set_setting(store: &Store, key: &str, value: &[u8]) -> AppResult<()> {
    let conn = store.connection()?;
    store_setting(&conn, key, value)?;
    tracing::debug!(key, bytes = value.len(), "setting stored");
    Ok(())
}

pub fn delete_setting(store: &Store, key: &str) -> AppResult<()> {
    let conn = store.connection()?;
    conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
    Ok(())
}

pub fn get_logo(store: &Store) -> AppResult<Option<Vec<u8>>> {
    get_setting(store, LOGO_KEY)
}

pub fn set_logo(store: &Store, image_bytes: &[u8]) -> AppResult<()> {
    set_setting(store, LOGO_KEY, image_bytes)
}

pub fn format_invoice_number(prefix: &str, number: i64) -> String {
    format!("{}{}", prefix, number)
}

fn read_counter(conn: &Connection) -> AppResult<i64> {
    Ok(fetch_setting(conn, INVOICE_COUNTER_KEY)?
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|text| text.trim().parse::<i64>().ok())
        .filter(|n| *n >= FIRST_INVOICE_NUMBER)
        .unwrap_or(FIRST_INVOICE_NUMBER))
}

/// The number the next saved invoice will get. Does not advance the counter.
///
/// The counter is kept as decimal text; an unreadable value restarts at
/// [`FIRST_INVOICE_NUMBER`].
pub fn peek_invoice_number(store: &Store) -> AppResult<i64> {
    let conn = store.connection()?;
    read_counter(&conn)
}

/// Marks `used` as taken. The counter never moves backwards.
pub fn commit_invoice_number(store: &Store, used: i64) -> AppResult<()> {
    let mut conn = store.connection()?;
    let tx = conn.transaction()?;
    let next = read_counter(&tx)?.max(used + 1);
    store_setting(&tx, INVOICE_COUNTER_KEY, next.to_string().as_bytes())?;
    tx.commit()?;
    tracing::debug!(used, next, "invoice number committed");
    Ok(())
}

/// Hands out the next invoice number and advances the stored counter.
pub fn next_invoice_number(store: &Store, prefix: &str) -> AppResult<String> {
    let mut conn = store.connection()?;
    let tx = conn.transaction()?;

    let current = read_counter(&tx)?;
    store_setting(&tx, INVOICE_COUNTER_KEY, (current + 1).to_string().as_bytes())?;
    tx.commit()?;

    Ok(format_invoice_number(prefix, current))
}
