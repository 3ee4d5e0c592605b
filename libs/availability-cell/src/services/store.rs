use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{BookedInterval, ConsultationAvailability, SchedulingError};

const AVAILABILITY_TABLE: &str = "/rest/v1/consultation_availability";

/// Persistence for per-doctor availability records.
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn find_by_doctor(
        &self,
        doctor_id: &str,
    ) -> Result<Option<ConsultationAvailability>, SchedulingError>;

    /// Inserts or replaces the record keyed by its doctor id.
    async fn save(
        &self,
        record: ConsultationAvailability,
    ) -> Result<ConsultationAvailability, SchedulingError>;

    /// Inserts `record` unless one already exists for the doctor, returning
    /// whichever record is stored afterwards.
    async fn create_if_absent(
        &self,
        record: ConsultationAvailability,
    ) -> Result<ConsultationAvailability, SchedulingError>;
}

/// Read side of the appointment store: appointments that block slots.
#[async_trait]
pub trait BookedSlotSource: Send + Sync {
    async fn booked_intervals(
        &self,
        doctor_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<BookedInterval>, SchedulingError>;
}

// ==============================================================================
// SUPABASE
// ==============================================================================

pub struct SupabaseAvailabilityStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAvailabilityStore {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn first_record(rows: Vec<Value>) -> Result<Option<ConsultationAvailability>, SchedulingError> {
        rows.into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(SchedulingError::from)
    }
}

#[async_trait]
impl AvailabilityStore for SupabaseAvailabilityStore {
    async fn find_by_doctor(
        &self,
        doctor_id: &str,
    ) -> Result<Option<ConsultationAvailability>, SchedulingError> {
        debug!("Fetching availability record for doctor {}", doctor_id);

        let path = format!(
            "{}?doctor_id=eq.{}&limit=1",
            AVAILABILITY_TABLE,
            urlencoding::encode(doctor_id)
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;

        Self::first_record(rows)
    }

    async fn save(
        &self,
        record: ConsultationAvailability,
    ) -> Result<ConsultationAvailability, SchedulingError> {
        debug!("Upserting availability record for doctor {}", record.doctor_id);

        let path = format!("{}?on_conflict=doctor_id", AVAILABILITY_TABLE);
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            &path,
            None,
            Some(serde_json::to_value(&record)?),
            Some(SupabaseClient::upsert_representation()),
        ).await?;

        Self::first_record(rows)?
            .ok_or_else(|| SchedulingError::Internal("Failed to save availability".to_string()))
    }

    async fn create_if_absent(
        &self,
        record: ConsultationAvailability,
    ) -> Result<ConsultationAvailability, SchedulingError> {
        let doctor_id = record.doctor_id.clone();
        let path = format!("{}?on_conflict=doctor_id", AVAILABILITY_TABLE);
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            &path,
            None,
            Some(serde_json::to_value(&record)?),
            Some(SupabaseClient::insert_if_absent_representation()),
        ).await?;

        // An ignored duplicate comes back as an empty array.
        match Self::first_record(rows)? {
            Some(created) => Ok(created),
            None => self.find_by_doctor(&doctor_id).await?.ok_or_else(|| {
                SchedulingError::Internal("Availability record vanished after insert".to_string())
            }),
        }
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

/// Process-local store, used when no database is configured and in tests.
#[derive(Default)]
pub struct InMemoryAvailabilityStore {
    records: RwLock<HashMap<String, ConsultationAvailability>>,
}

impl InMemoryAvailabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl AvailabilityStore for InMemoryAvailabilityStore {
    async fn find_by_doctor(
        &self,
        doctor_id: &str,
    ) -> Result<Option<ConsultationAvailability>, SchedulingError> {
        Ok(self.records.read().await.get(doctor_id).cloned())
    }

    async fn save(
        &self,
        record: ConsultationAvailability,
    ) -> Result<ConsultationAvailability, SchedulingError> {
        self.records
            .write()
            .await
            .insert(record.doctor_id.clone(), record.clone());
        Ok(record)
    }

    async fn create_if_absent(
        &self,
        record: ConsultationAvailability,
    ) -> Result<ConsultationAvailability, SchedulingError> {
        let mut records = self.records.write().await;
        Ok(records
            .entry(record.doctor_id.clone())
            .or_insert(record)
            .clone())
    }
}
