use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use crate::{
    business,
    config::AppConfig,
    customers::{self, Customer},
    db::Store,
    discount::{invoice_totals, Discount, InvoiceTotals},
    error::{AppError, AppResult},
    invoice_pdf::{self, RenderInput, RenderedInvoice},
    ledger::{Ledger, LineId},
    products, settings,
    snapshot::InvoiceSnapshot,
};

/// Outcome of reopening a saved invoice.
#[derive(Debug)]
pub struct LoadReport {
    pub snapshot: InvoiceSnapshot,
    pub customer: Option<Customer>,
    /// Problems that did not stop the load, e.g. [`AppError::CustomerNotFound`].
    pub warnings: Vec<AppError>,
}

/// Top-level context: the store handle plus the invoice currently being edited.
#[derive(Debug)]
pub struct App {
    config: AppConfig,
    store: Store,
    ledger: Ledger,
    discount: Option<Discount>,
    customer: Option<Customer>,
    last_folder: Option<PathBuf>,
}

impl App {
    pub fn open(config: AppConfig) -> AppResult<Self> {
        let store = Store::open(&config.db_path)?;
        Ok(Self {
            config,
            store,
            ledger: Ledger::new(),
            discount: None,
            customer: None,
            last_folder: None,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Line edits (quantity, unit price, removal) go straight to the ledger.
    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    pub fn discount(&self) -> Option<&Discount> {
        self.discount.as_ref()
    }

    pub fn set_discount(&mut self, discount: Option<Discount>) {
        self.discount = discount;
    }

    pub fn customer(&self) -> Option<&Customer> {
        self.customer.as_ref()
    }

    pub fn select_customer(&mut self, customer_id: i64) -> AppResult<&Customer> {
        let customer = customers::get_customer(&self.store, customer_id)?
            .ok_or(AppError::CustomerNotFound { id: customer_id })?;
        Ok(&*self.customer.insert(customer))
    }

    pub fn clear_customer(&mut self) {
        self.customer = None;
    }

    pub fn last_folder(&self) -> Option<&Path> {
        self.last_folder.as_deref()
    }

    pub fn new_invoice(&mut self) {
        self.ledger.clear();
        self.discount = None;
        self.customer = None;
        tracing::debug!("new invoice started");
    }

    pub fn add_product_to_invoice(&mut self, product_id: i64) -> AppResult<LineId> {
        let product = products::get_product(&self.store, product_id)?.ok_or_else(|| {
            AppError::Validation(format!("product {} does not exist", product_id))
        })?;
        Ok(self.ledger.add_product(&product.name, product.price))
    }

    /// Changes the catalog price and carries it over to the open invoice.
    pub fn update_product_price(&mut self, name: &str, price: f64) -> AppResult<usize> {
        let updated = products::update_product_price(&self.store, name, price)?;
        if updated > 0 {
            self.ledger.sync_catalog_price(name, price);
        }
        Ok(updated)
    }

    pub fn totals(&self) -> InvoiceTotals {
        invoice_totals(self.ledger.totals().net, self.discount.as_ref())
    }

    /// Renders the current invoice under the number it would be saved with.
    /// The invoice counter is left alone.
    pub fn render_invoice(&self, date: NaiveDate) -> AppResult<RenderedInvoice> {
        let number = settings::peek_invoice_number(&self.store)?;
        self.render_numbered(date, number)
    }

    fn render_numbered(&self, date: NaiveDate, number: i64) -> AppResult<RenderedInvoice> {
        let profile = business::get_business_profile(&self.store)?;
        let logo = settings::get_logo(&self.store)?;
        let invoice_number = settings::format_invoice_number(&self.config.invoice_prefix, number);

        invoice_pdf::render(&RenderInput {
            ledger: &self.ledger,
            customer: self.customer.as_ref(),
            profile: &profile,
            logo: logo.as_deref(),
            discount: self.discount.as_ref(),
            date,
            invoice_number: &invoice_number,
        })
    }

    pub fn save_invoice(&mut self, path: &Path) -> AppResult<InvoiceSnapshot> {
        self.save_invoice_dated(path, Local::now().date_naive())
    }

    /// Renders and writes the invoice. The invoice number is only used up
    /// once the file is on disk.
    pub fn save_invoice_dated(&mut self, path: &Path, date: NaiveDate) -> AppResult<InvoiceSnapshot> {
        let number = settings::peek_invoice_number(&self.store)?;
        let rendered = self.render_numbered(date, number)?;
        invoice_pdf::write_invoice_file(path, &rendered.bytes)?;
        settings::commit_invoice_number(&self.store, number)?;
        self.remember_folder(path);
        Ok(rendered.snapshot)
    }

    /// Reopens a saved invoice. On error the current invoice is left as it was.
    pub fn load_invoice(&mut self, path: &Path) -> AppResult<LoadReport> {
        let bytes = invoice_pdf::read_invoice_file(path)?;
        let snapshot = invoice_pdf::load(&bytes)?;
        let report = self.apply_snapshot(snapshot)?;
        self.remember_folder(path);
        tracing::info!(
            path = %path.display(),
            items = report.snapshot.items.len(),
            warnings = report.warnings.len(),
            "invoice loaded"
        );
        Ok(report)
    }

    /// Replaces the current invoice with a snapshot. The discount comes back
    /// as a fixed amount equal to what was applied when the file was saved.
    pub fn apply_snapshot(&mut self, snapshot: InvoiceSnapshot) -> AppResult<LoadReport> {
        let mut warnings = Vec::new();
        let customer = match &snapshot.customer {
            Some(reference) => {
                let found = customers::get_customer(&self.store, reference.id)?;
                if found.is_none() {
                    tracing::warn!(customer_id = reference.id, "saved customer no longer exists");
                    warnings.push(AppError::CustomerNotFound { id: reference.id });
                }
                found
            }
            None => None,
        };

        self.ledger.replace_lines(snapshot.restored_lines());
        self.discount = snapshot.discount.as_ref().and_then(|d| d.reloaded());
        self.customer = customer.clone();

        Ok(LoadReport {
            snapshot,
            customer,
            warnings,
        })
    }

    fn remember_folder(&mut self, path: &Path) {
        if let Some(parent) = path.parent() {
            self.last_folder = Some(parent.to_path_buf());
        }
    }
}
