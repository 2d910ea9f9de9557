//! Assessment model - saved patient assessments

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use recurrence_engine::RiskLabel;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use validator::{Validate, ValidationError};

use super::reference::{self, DAY_FORMAT};
use crate::error::StoreError;

/// Lock contention retries (SQLITE_BUSY / pool timeout) before a save gives up
pub const MAX_BUSY_RETRIES: u32 = 5;

/// Reference collisions tolerated by one save. Each collision means another
/// save committed in between, so the count is bounded by concurrent writers.
pub const MAX_REFERENCE_COLLISIONS: u32 = 1_000;

/// Busy backoff step, multiplied by the retry number
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Upper bound of the random delay added to every retry
const RETRY_JITTER_MS: u64 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assessment {
    pub id: i64,
    pub patient_reference: String,
    pub prediction: String,
    pub probability: f64,
    pub features_json: Option<String>,
    pub impacts_json: Option<String>,
    pub notes: Option<String>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Row for `GET /patients`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssessmentSummary {
    pub id: i64,
    pub patient_reference: String,
    pub prediction: String,
    pub probability: f64,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Row for `GET /dashboard/patients`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DashboardEntry {
    pub id: i64,
    pub patient_reference: String,
    pub prediction: String,
    pub probability: f64,
    pub impacts_json: Option<String>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAssessment {
    #[validate(custom(function = "validate_label"))]
    pub prediction: String,
    #[validate(range(min = 0.0, max = 1.0))]
    pub probability: f64,
    pub features_json: Option<String>,
    pub impacts_json: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNotes {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedAssessment {
    pub id: i64,
    pub patient_reference: String,
}

/// Spreads retrying writers apart so they do not collide again in lockstep
fn jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..=RETRY_JITTER_MS))
}

fn validate_label(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<RiskLabel>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("unknown_risk_label"))
}

impl Assessment {
    pub async fn create(pool: &SqlitePool, data: CreateAssessment) -> Result<SavedAssessment, StoreError> {
        Self::create_at(pool, &data, Utc::now()).await
    }

    /// Insert with a fresh reference for `now`'s UTC day, retrying when
    /// another writer wins the reference or the database is locked
    pub async fn create_at(
        pool: &SqlitePool,
        data: &CreateAssessment,
        now: DateTime<Utc>,
    ) -> Result<SavedAssessment, StoreError> {
        let mut collisions = 0;
        let mut busy = 0;

        loop {
            match Self::try_insert(pool, data, now).await {
                Ok(saved) => {
                    tracing::info!("Saved assessment {} as {}", saved.id, saved.patient_reference);
                    return Ok(saved);
                }
                Err(StoreError::UniqueViolation(msg)) if collisions < MAX_REFERENCE_COLLISIONS => {
                    collisions += 1;
                    tracing::debug!("Reference collision #{}: {}; regenerating", collisions, msg);
                    tokio::time::sleep(jitter()).await;
                }
                Err(StoreError::Busy(msg)) if busy < MAX_BUSY_RETRIES => {
                    busy += 1;
                    tracing::warn!("Database busy ({}/{}): {}", busy, MAX_BUSY_RETRIES, msg);
                    tokio::time::sleep(RETRY_BACKOFF * busy + jitter()).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_insert(
        pool: &SqlitePool,
        data: &CreateAssessment,
        now: DateTime<Utc>,
    ) -> Result<SavedAssessment, StoreError> {
        let day = now.date_naive();
        let patient_reference = reference::generate(day, pool).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO patients (patient_reference, prediction, probability, features_json, impacts_json, notes, created_on, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(&patient_reference)
        .bind(&data.prediction)
        .bind(data.probability)
        .bind(&data.features_json)
        .bind(&data.impacts_json)
        .bind(&data.notes)
        .bind(day.format(DAY_FORMAT).to_string())
        .bind(now)
        .execute(pool)
        .await?;

        Ok(SavedAssessment {
            id: result.last_insert_rowid(),
            patient_reference,
        })
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Self, StoreError> {
        sqlx::query_as::<_, Assessment>(
            r#"
            SELECT id, patient_reference, prediction, probability, features_json, impacts_json, notes, created_at
            FROM patients WHERE id = ?
            "#
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound(id))
    }

    pub async fn list(pool: &SqlitePool) -> Result<Vec<AssessmentSummary>, StoreError> {
        let rows = sqlx::query_as::<_, AssessmentSummary>(
            r#"
            SELECT id, patient_reference, prediction, probability, created_at
            FROM patients
            ORDER BY created_at DESC, id DESC
            "#
        )
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    pub async fn list_dashboard(pool: &SqlitePool) -> Result<Vec<DashboardEntry>, StoreError> {
        let rows = sqlx::query_as::<_, DashboardEntry>(
            r#"
            SELECT id, patient_reference, prediction, probability, impacts_json, created_at
            FROM patients
            ORDER BY created_at DESC, id DESC
            "#
        )
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Only `notes` changes
    pub async fn update_notes(pool: &SqlitePool, id: i64, notes: Option<&str>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE patients SET notes = ? WHERE id = ?")
            .bind(notes)
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// Deleting a missing id is not an error
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM patients WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        tracing::debug!("Delete {}: {} row(s) removed", id, result.rows_affected());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::TimeZone;

    fn sample(prediction: &str, probability: f64) -> CreateAssessment {
        CreateAssessment {
            prediction: prediction.to_string(),
            probability,
            features_json: Some(r#"{"age": 45}"#.to_string()),
            impacts_json: Some(r#"{"age": "↑ 5.0%"}"#.to_string()),
            notes: None,
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 7, h, m, 0).unwrap()
    }

    #[test]
    fn test_validation() {
        assert!(sample("High Risk", 0.55).validate().is_ok());
        assert!(sample("Low Risk", 0.0).validate().is_ok());
        assert!(sample("Low Risk", 1.0).validate().is_ok());
        assert!(sample("Medium Risk", 0.5).validate().is_err());
        assert!(sample("High Risk", 1.2).validate().is_err());
        assert!(sample("High Risk", -0.1).validate().is_err());
    }

    #[tokio::test]
    async fn test_sequential_saves_same_day() {
        let pool = db::test_pool().await;

        for (i, expected) in ["REF-20250307-001", "REF-20250307-002", "REF-20250307-003"]
            .iter()
            .enumerate()
        {
            let saved = Assessment::create_at(&pool, &sample("Low Risk", 0.2), at(9, i as u32))
                .await
                .unwrap();
            assert_eq!(saved.patient_reference, *expected);
        }

        // a new UTC day restarts the sequence
        let tomorrow = Utc.with_ymd_and_hms(2025, 3, 8, 0, 0, 1).unwrap();
        let saved = Assessment::create_at(&pool, &sample("Low Risk", 0.2), tomorrow)
            .await
            .unwrap();
        assert_eq!(saved.patient_reference, "REF-20250308-001");
    }

    #[tokio::test]
    async fn test_find_round_trips_fields() {
        let pool = db::test_pool().await;
        let mut data = sample("High Risk", 0.55);
        data.notes = Some("follow up in 3 months".to_string());

        let saved = Assessment::create_at(&pool, &data, at(10, 0)).await.unwrap();
        let record = Assessment::find_by_id(&pool, saved.id).await.unwrap();

        assert_eq!(record.patient_reference, saved.patient_reference);
        assert_eq!(record.prediction, "High Risk");
        assert_eq!(record.probability, 0.55);
        assert_eq!(record.features_json, data.features_json);
        assert_eq!(record.impacts_json, data.impacts_json);
        assert_eq!(record.notes.as_deref(), Some("follow up in 3 months"));
        assert_eq!(record.created_at, at(10, 0));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let pool = db::test_pool().await;
        let early = Assessment::create_at(&pool, &sample("Low Risk", 0.1), at(8, 0)).await.unwrap();
        let late = Assessment::create_at(&pool, &sample("High Risk", 0.9), at(17, 30)).await.unwrap();
        let mid = Assessment::create_at(&pool, &sample("Low Risk", 0.3), at(12, 0)).await.unwrap();

        let ids: Vec<i64> = Assessment::list(&pool).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![late.id, mid.id, early.id]);

        let dashboard = Assessment::list_dashboard(&pool).await.unwrap();
        assert_eq!(dashboard.len(), 3);
        assert_eq!(dashboard[0].id, late.id);
        assert!(dashboard[0].impacts_json.is_some());
    }

    #[tokio::test]
    async fn test_same_timestamp_orders_by_id() {
        let pool = db::test_pool().await;
        let first = Assessment::create_at(&pool, &sample("Low Risk", 0.1), at(9, 0)).await.unwrap();
        let second = Assessment::create_at(&pool, &sample("Low Risk", 0.1), at(9, 0)).await.unwrap();

        let ids: Vec<i64> = Assessment::list(&pool).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let pool = db::test_pool().await;
        let saved = Assessment::create_at(&pool, &sample("Low Risk", 0.2), at(9, 0)).await.unwrap();

        Assessment::delete(&pool, saved.id).await.unwrap();
        Assessment::delete(&pool, saved.id).await.unwrap();
        Assessment::delete(&pool, 9_999).await.unwrap();

        let err = Assessment::find_by_id(&pool, saved.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == saved.id));
    }

    #[tokio::test]
    async fn test_update_notes() {
        let pool = db::test_pool().await;
        let saved = Assessment::create_at(&pool, &sample("High Risk", 0.7), at(9, 0)).await.unwrap();

        Assessment::update_notes(&pool, saved.id, Some("biopsy scheduled")).await.unwrap();
        let record = Assessment::find_by_id(&pool, saved.id).await.unwrap();
        assert_eq!(record.notes.as_deref(), Some("biopsy scheduled"));
        assert_eq!(record.prediction, "High Risk");
        assert_eq!(record.probability, 0.7);

        Assessment::update_notes(&pool, saved.id, None).await.unwrap();
        assert!(Assessment::find_by_id(&pool, saved.id).await.unwrap().notes.is_none());
    }

    #[tokio::test]
    async fn test_update_notes_missing_leaves_store_unchanged() {
        let pool = db::test_pool().await;
        let saved = Assessment::create_at(&pool, &sample("Low Risk", 0.2), at(9, 0)).await.unwrap();
        let before = Assessment::list(&pool).await.unwrap();

        let err = Assessment::update_notes(&pool, saved.id + 100, Some("x")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let after = Assessment::list(&pool).await.unwrap();
        assert_eq!(before.len(), after.len());
        assert!(Assessment::find_by_id(&pool, saved.id).await.unwrap().notes.is_none());
    }

    #[tokio::test]
    async fn test_reference_after_delete_takes_next_free() {
        let pool = db::test_pool().await;
        let mut saved = Vec::new();
        for m in 0..3 {
            saved.push(Assessment::create_at(&pool, &sample("Low Risk", 0.2), at(9, m)).await.unwrap());
        }

        Assessment::delete(&pool, saved[0].id).await.unwrap();
        let next = Assessment::create_at(&pool, &sample("Low Risk", 0.2), at(11, 0)).await.unwrap();
        assert_eq!(next.patient_reference, "REF-20250307-004");
    }

    #[tokio::test]
    async fn test_concurrent_saves_get_distinct_references() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("patients.db").display());
        let pool = db::create_pool(&url).await.unwrap();
        db::run_migrations(&pool).await.unwrap();

        const WRITERS: usize = 16;
        let now = at(9, 0);
        let mut handles = Vec::new();
        for _ in 0..WRITERS {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                Assessment::create_at(&pool, &sample("Low Risk", 0.2), now).await
            }));
        }

        let mut references = Vec::new();
        for handle in handles {
            let saved = handle.await.unwrap().expect("every concurrent save succeeds");
            references.push(saved.patient_reference);
        }
        references.sort();

        let expected: Vec<String> = (1..=WRITERS)
            .map(|n| format!("REF-20250307-{:03}", n))
            .collect();
        assert_eq!(references, expected);
        assert_eq!(Assessment::list(&pool).await.unwrap().len(), WRITERS);
    }
}
