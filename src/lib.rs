pub mod app;
pub mod business;
pub mod config;
pub mod customers;
pub mod db;
pub mod discount;
pub mod error;
pub mod invoice_pdf;
pub mod ledger;
pub mod products;
pub mod settings;
pub mod snapshot;
pub mod telemetry;

pub use app::{App, LoadReport};
pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// VAT rate applied to every invoice.
pub const TAX_RATE: f64 = 0.19;

/// Loads configuration, installs logging and opens the database.
pub fn start() -> AppResult<App> {
    let config = AppConfig::load()?;
    telemetry::init_tracing(&config.log_filter);
    tracing::info!(db = %config.db_path.display(), "starting invoicer");
    App::open(config)
}
