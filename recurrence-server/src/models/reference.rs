//! Patient reference ids - `REF-<YYYYMMDD>-<NNN>`
//!
//! The generator only proposes a free id; the UNIQUE column on
//! `patient_reference` is what actually guarantees uniqueness.

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::error::StoreError;

/// Day format used in both references and the `created_on` column
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// What the generator needs to know about existing records
#[allow(async_fn_in_trait)]
pub trait ReferenceIndex {
    /// Records created on `day` (UTC)
    async fn count_created_on(&self, day: NaiveDate) -> Result<i64, StoreError>;

    async fn reference_exists(&self, reference: &str) -> Result<bool, StoreError>;
}

pub fn format_reference(day: NaiveDate, n: i64) -> String {
    format!("REF-{}-{:03}", day.format("%Y%m%d"), n)
}

/// First free reference for `day`, starting after the day's record count
pub async fn generate<I>(day: NaiveDate, index: &I) -> Result<String, StoreError>
where
    I: ReferenceIndex + ?Sized,
{
    let mut n = index.count_created_on(day).await? + 1;

    loop {
        let candidate = format_reference(day, n);
        if !index.reference_exists(&candidate).await? {
            return Ok(candidate);
        }
        tracing::debug!("Reference {} taken, trying next", candidate);
        n += 1;
    }
}

impl ReferenceIndex for SqlitePool {
    async fn count_created_on(&self, day: NaiveDate) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM patients WHERE created_on = ?")
            .bind(day.format(DAY_FORMAT).to_string())
            .fetch_one(self)
            .await?;
        Ok(count)
    }

    async fn reference_exists(&self, reference: &str) -> Result<bool, StoreError> {
        let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM patients WHERE patient_reference = ?")
            .bind(reference)
            .fetch_optional(self)
            .await?;
        Ok(found.is_some())
    }
}
