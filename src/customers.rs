use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::{
    db::Store,
    error::{AppError, AppResult},
};

const CUSTOMER_COLUMNS: &str = "id, name, contact_name, email, phone, address, zip_code, city, country, tax_number, notes";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub zip_code: String,
    pub city: String,
    pub country: String,
    pub tax_number: String,
    pub notes: String,
}

/// Form input for a new customer. Only `name` is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub tax_number: String,
    #[serde(default)]
    pub notes: String,
}

impl NewCustomer {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CustomerOrder {
    #[default]
    Name,
    Id,
}

impl CustomerOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            CustomerOrder::Name => "name COLLATE NOCASE ASC",
            CustomerOrder::Id => "id ASC",
        }
    }
}

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    let text = |idx: usize| -> rusqlite::Result<String> {
        Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
    };
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        contact_name: text(2)?,
        email: text(3)?,
        phone: text(4)?,
        address: text(5)?,
        zip_code: text(6)?,
        city: text(7)?,
        country: text(8)?,
        tax_number: text(9)?,
        notes: text(10)?,
    })
}

fn fetch_customer(conn: &Connection, customer_id: i64) -> AppResult<Option<Customer>> {
    let customer = conn
        .query_row(
            &format!("SELECT {} FROM customers WHERE id = ?1", CUSTOMER_COLUMNS),
            [customer_id],
            customer_from_row,
        )
        .optional()?;
    Ok(customer)
}

pub fn add_customer(store: &Store, input: &NewCustomer) -> AppResult<Customer> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("customer name is required".to_string()));
    }

    let conn = store.connection()?;
    conn.execute(
        "INSERT INTO customers (name, contact_name, email, phone, address, zip_code, city, country, tax_number, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            name,
            input.contact_name,
            input.email,
            input.phone,
            input.address,
            input.zip_code,
            input.city,
            input.country,
            input.tax_number,
            input.notes
        ],
    )?;

    let id = conn.last_insert_rowid();
    tracing::info!(customer_id = id, "customer added");

    let customer = conn.query_row(
        &format!("SELECT {} FROM customers WHERE id = ?1", CUSTOMER_COLUMNS),
        [id],
        customer_from_row,
    )?;
    Ok(customer)
}

pub fn list_customers(store: &Store, order: CustomerOrder) -> AppResult<Vec<Customer>> {
    let conn = store.connection()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM customers ORDER BY {}",
        CUSTOMER_COLUMNS,
        order.as_sql()
    ))?;

    let rows = stmt.query_map([], customer_from_row)?;

    let mut customers = Vec::new();
    for row in rows {
        customers.push(row?);
    }

    Ok(customers)
}

pub fn get_customer(store: &Store, customer_id: i64) -> AppResult<Option<Customer>> {
    let conn = store.connection()?;
    fetch_customer(&conn, customer_id)
}

pub fn find_customer_by_name(store: &Store, name: &str) -> AppResult<Option<Customer>> {
    let conn = store.connection()?;
    let customer = conn
        .query_row(
            &format!(
                "SELECT {} FROM customers WHERE LOWER(name) = LOWER(?1)",
                CUSTOMER_COLUMNS
            ),
            [name.trim()],
            customer_from_row,
        )
        .optional()?;
    Ok(customer)
}
