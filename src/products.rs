use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::{
    db::Store,
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub tax_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductOrder {
    /// Most recently added first.
    #[default]
    Newest,
    Name,
}

impl ProductOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            ProductOrder::Newest => "id DESC",
            ProductOrder::Name => "name COLLATE NOCASE ASC",
        }
    }
}

/// Parses a price typed into a form field.
pub fn parse_price(text: &str) -> AppResult<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("price is required".to_string()));
    }
    let price: f64 = trimmed
        .replace(',', ".")
        .parse()
        .map_err(|_| AppError::Validation(format!("price must be a number: {}", trimmed)))?;
    validate_price(price)?;
    Ok(price)
}

fn validate_price(price: f64) -> AppResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::Validation(format!(
            "price must be a non-negative number: {}",
            price
        )));
    }
    Ok(())
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        tax_rate: row.get::<_, Option<f64>>(3)?.unwrap_or(crate::TAX_RATE),
    })
}

fn fetch_product(conn: &Connection, product_id: i64) -> AppResult<Option<Product>> {
    let product = conn
        .query_row(
            "SELECT id, name, price, tax_rate FROM products WHERE id = ?1",
            [product_id],
            product_from_row,
        )
        .optional()?;
    Ok(product)
}

fn count_by_name(conn: &Connection, name: &str) -> AppResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM products WHERE LOWER(name) = LOWER(?1)",
        [name],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn add_product(store: &Store, name: &str, price: f64) -> AppResult<Product> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("product name is required".to_string()));
    }
    validate_price(price)?;

    let conn = store.connection()?;
    if count_by_name(&conn, name)? > 0 {
        tracing::debug!(name, "duplicate product rejected");
        return Err(AppError::DuplicateEntity {
            name: name.to_string(),
        });
    }

    conn.execute(
        "INSERT INTO products (name, price) VALUES (?1, ?2)",
        params![name, price],
    )?;

    let id = conn.last_insert_rowid();
    tracing::info!(product_id = id, name, "product added");

    let product = conn.query_row(
        "SELECT id, name, price, tax_rate FROM products WHERE id = ?1",
        [id],
        product_from_row,
    )?;
    Ok(product)
}

pub fn list_products(store: &Store, order: ProductOrder) -> AppResult<Vec<Product>> {
    let conn = store.connection()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, price, tax_rate FROM products ORDER BY {}",
        order.as_sql()
    ))?;

    let rows = stmt.query_map([], product_from_row)?;

    let mut products = Vec::new();
    for row in rows {
        products.push(row?);
    }

    Ok(products)
}

pub fn get_product(store: &Store, product_id: i64) -> AppResult<Option<Product>> {
    let conn = store.connection()?;
    fetch_product(&conn, product_id)
}

pub fn find_product_by_name(store: &Store, name: &str) -> AppResult<Option<Product>> {
    let conn = store.connection()?;
    let product = conn
        .query_row(
            "SELECT id, name, price, tax_rate FROM products WHERE LOWER(name) = LOWER(?1)",
            [name.trim()],
            product_from_row,
        )
        .optional()?;
    Ok(product)
}

/// Sets the catalog price of every product matching `name` case-insensitively.
/// Returns the number of updated rows.
pub fn update_product_price(store: &Store, name: &str, price: f64) -> AppResult<usize> {
    validate_price(price)?;
    let conn = store.connection()?;
    let updated = conn.execute(
        "UPDATE products SET price = ?1 WHERE LOWER(name) = LOWER(?2)",
        params![price, name.trim()],
    )?;
    tracing::info!(name, price, updated, "product price updated");
    Ok(updated)
}

/// Deletes the product matching `name` case-insensitively. Returns the number of removed rows.
pub fn delete_product(store: &Store, name: &str) -> AppResult<usize> {
    let conn = store.connection()?;
    let removed = conn.execute(
        "DELETE FROM products WHERE LOWER(name) = LOWER(?1)",
        params![name.trim()],
    )?;
    tracing::info!(name, removed, "product deleted");
    Ok(removed)
}

pub fn count_products(store: &Store) -> AppResult<i64> {
    let conn = store.connection()?;
    let count = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
    Ok(count)
}
