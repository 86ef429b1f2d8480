//! Machine-readable copy of an invoice, carried inside the exported PDF.
//!
//! The block is appended after the PDF's own `%%EOF`:
//!
//! ```text
//! <pdf bytes>\n%%INVOICE_JSON_START%%{...json...}%%INVOICE_JSON_END%%
//! ```
//!
//! PDF readers ignore trailing bytes, so the document stays viewable.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    customers::Customer,
    discount::{Discount, DiscountMode},
    error::{AppError, AppResult},
    ledger::{Ledger, RestoredLine},
};

pub const START_MARKER: &[u8] = b"%%INVOICE_JSON_START%%";
pub const END_MARKER: &[u8] = b"%%INVOICE_JSON_END%%";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotItem {
    pub product: String,
    pub quantity: u32,
    pub price: f64,
    pub sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscountDescriptor {
    pub mode: DiscountMode,
    pub value: f64,
    pub applied: f64,
}

impl DiscountDescriptor {
    /// The discount to reinstate after a reload: always a fixed amount equal
    /// to what was applied when the file was written.
    pub fn reloaded(&self) -> Option<Discount> {
        let discount = Discount::fixed_amount(self.applied);
        discount.is_effective().then_some(discount)
    }
}

/// Frozen copy of the customer at the time the invoice was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub contact_name: String,
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
}

impl From<&Customer> for CustomerRef {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id,
            name: customer.name.clone(),
            contact_name: customer.contact_name.clone(),
            address: customer.address.clone(),
            zip_code: customer.zip_code.clone(),
            city: customer.city.clone(),
            country: customer.country.clone(),
            tax_number: customer.tax_number.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    pub items: Vec<SnapshotItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<DiscountDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerRef>,
}

impl InvoiceSnapshot {
    /// Captures the ledger lines as entered, before any discount.
    pub fn capture(
        date: NaiveDate,
        invoice_number: Option<String>,
        ledger: &Ledger,
        discount: Option<DiscountDescriptor>,
        customer: Option<&Customer>,
    ) -> Self {
        let items = ledger
            .lines()
            .iter()
            .map(|line| SnapshotItem {
                product: line.product().to_string(),
                quantity: line.quantity(),
                price: line.unit_price(),
                sum: line.sum(),
            })
            .collect();

        Self {
            date,
            invoice_number,
            items,
            discount,
            customer: customer.map(CustomerRef::from),
        }
    }

    pub fn restored_lines(&self) -> impl Iterator<Item = RestoredLine> + '_ {
        self.items.iter().map(|item| RestoredLine {
            product: item.product.clone(),
            quantity: item.quantity,
            unit_price: item.price,
        })
    }

    fn validate(&mut self) -> AppResult<()> {
        for (idx, item) in self.items.iter_mut().enumerate() {
            if item.product.trim().is_empty() {
                return Err(AppError::CorruptEmbeddedData(format!(
                    "item {} has no product name",
                    idx + 1
                )));
            }
            if !item.price.is_finite() || item.price < 0.0 {
                return Err(AppError::CorruptEmbeddedData(format!(
                    "item {} has invalid price {}",
                    idx + 1,
                    item.price
                )));
            }
            // Older files may hold quantity 0; the ledger never goes below 1.
            if item.quantity == 0 {
                tracing::warn!(item = idx + 1, product = %item.product, "quantity 0 raised to 1");
                item.quantity = 1;
                item.sum = item.price;
            }
        }

        if let Some(discount) = &self.discount {
            let valid = |v: f64| v.is_finite() && v >= 0.0;
            if !valid(discount.value) || !valid(discount.applied) {
                return Err(AppError::CorruptEmbeddedData(
                    "discount values must be non-negative numbers".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Appends the snapshot block to a finished document.
pub fn embed(document: &mut Vec<u8>, snapshot: &InvoiceSnapshot) -> AppResult<()> {
    let json = serde_json::to_vec(snapshot)?;
    document.reserve(json.len() + START_MARKER.len() + END_MARKER.len() + 1);
    document.push(b'\n');
    document.extend_from_slice(START_MARKER);
    document.extend_from_slice(&json);
    document.extend_from_slice(END_MARKER);
    Ok(())
}

/// Recovers the snapshot embedded in `document`.
///
/// Uses the first start marker and the first end marker following it. An end
/// marker that only appears before the start marker means the block is corrupt.
pub fn extract(document: &[u8]) -> AppResult<InvoiceSnapshot> {
    let start = find(document, START_MARKER).ok_or(AppError::MissingEmbeddedData)?;
    let payload_start = start + START_MARKER.len();
    let payload_len = match find(&document[payload_start..], END_MARKER) {
        Some(len) => len,
        None if find(document, END_MARKER).is_some() => {
            return Err(AppError::CorruptEmbeddedData(
                "end marker precedes start marker".to_string(),
            ))
        }
        None => return Err(AppError::MissingEmbeddedData),
    };
    let payload = &document[payload_start..payload_start + payload_len];

    let mut snapshot: InvoiceSnapshot = serde_json::from_slice(payload)?;
    snapshot.validate()?;
    Ok(snapshot)
}
