use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::{db::Store, error::AppResult};

/// The issuing company. Stored as the single row `id = 1` of `business_info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub company_name: String,
    pub address: String,
    pub vat_id: String,
    pub phone: String,
    pub fax: String,
    pub email: String,
    pub website: String,
    pub bank_name: String,
    pub iban: String,
    pub bic: String,
    pub account_holder: String,
}

/// Returns the stored profile, or an all-empty one when none was saved yet.
pub fn get_business_profile(store: &Store) -> AppResult<BusinessProfile> {
    let conn = store.connection()?;
    let profile = conn
        .query_row(
            "SELECT company_name, address, vat_id, phone, fax, email, website, bank_name, iban, bic, account_holder
             FROM business_info WHERE id = 1",
            [],
            |row| {
                let text = |idx: usize| -> rusqlite::Result<String> {
                    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
                };
                Ok(BusinessProfile {
                    company_name: text(0)?,
                    address: text(1)?,
                    vat_id: text(2)?,
                    phone: text(3)?,
                    fax: text(4)?,
                    email: text(5)?,
                    website: text(6)?,
                    bank_name: text(7)?,
                    iban: text(8)?,
                    bic: text(9)?,
                    account_holder: text(10)?,
                })
            },
        )
        .optional()?;

    Ok(profile.unwrap_or_default())
}

pub fn save_business_profile(store: &Store, profile: &BusinessProfile) -> AppResult<()> {
    let conn = store.connection()?;
    conn.execute(
        "INSERT OR REPLACE INTO business_info (
           id, company_name, address, vat_id, phone, fax, email,
           website, bank_name, iban, bic, account_holder
         )
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            profile.company_name,
            profile.address,
            profile.vat_id,
            profile.phone,
            profile.fax,
            profile.email,
            profile.website,
            profile.bank_name,
            profile.iban,
            profile.bic,
            profile.account_holder
        ],
    )?;
    tracing::info!("business profile saved");
    Ok(())
}
