use std::{env, path::PathBuf};

use crate::error::{AppError, AppResult};

const DEFAULT_DB_FILE: &str = "invoices.db";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_INVOICE_PREFIX: &str = "RE-";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_filter: String,
    pub invoice_prefix: String,
}

impl AppConfig {
    /// Reads configuration from the process environment (and `.env`, if present).
    ///
    /// With `INVOICER_ENV=prod` every setting must be given explicitly.
    pub fn load() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        let is_prod = env::var("INVOICER_ENV").unwrap_or_else(|_| "dev".to_string()) == "prod";
        Self::from_lookup(|key| env::var(key).ok(), is_prod)
    }

    pub fn for_database(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            invoice_prefix: DEFAULT_INVOICE_PREFIX.to_string(),
        }
    }

    fn from_lookup<F>(lookup: F, is_prod: bool) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            db_path: PathBuf::from(get_var(
                &lookup,
                "INVOICER_DB_PATH",
                DEFAULT_DB_FILE,
                is_prod,
            )?),
            log_filter: get_var(&lookup, "INVOICER_LOG", DEFAULT_LOG_FILTER, is_prod)?,
            invoice_prefix: get_var(
                &lookup,
                "INVOICER_INVOICE_PREFIX",
                DEFAULT_INVOICE_PREFIX,
                is_prod,
            )?,
        })
    }
}

fn get_var<F>(lookup: &F, key: &str, default: &str, is_prod: bool) -> AppResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => Ok(value),
        None if is_prod => Err(AppError::Config(format!(
            "{} is required in production but not set",
            key
        ))),
        None => Ok(default.to_string()),
    }
}
