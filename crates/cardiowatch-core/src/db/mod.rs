//! Persistence layer for CardioWatch
//!
//! The alerting core talks to storage through [`AlertStore`] and
//! [`SubjectDirectory`]. PostgreSQL backs production; [`MemoryStore`] backs
//! local development and tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgAlertStore, PostgresPool};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AlertSettings, AlertSettingsInput, AlertType, HealthAlert, NewAlert, NewReading, Reading,
    Severity, Subject,
};

/// Alert classification to persist together with its reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertDraft {
    /// Kind of abnormality
    pub alert_type: AlertType,
    /// Severity level
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
}

impl AlertDraft {
    /// Attach the draft to a recorded reading
    pub fn into_new_alert(self, reading: &Reading) -> NewAlert {
        NewAlert {
            reading_id: Some(reading.id),
            subject_id: reading.subject_id,
            alert_type: self.alert_type,
            severity: self.severity,
            message: self.message,
        }
    }
}

/// Durable store for readings, alerts and per-subject settings.
///
/// Each method is atomic on its own; no cross-call locking is implied.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Record a reading that has no alert
    async fn record_reading(&self, reading: NewReading) -> Result<Reading>;

    /// Create an alert, optionally linked to an existing reading
    async fn create_alert(&self, alert: NewAlert) -> Result<HealthAlert>;

    /// Record a reading and, when `draft` is set, its alert, in one
    /// transaction. The reading's `alert_triggered` is `draft.is_some()`.
    async fn record_assessment(
        &self,
        reading: NewReading,
        draft: Option<AlertDraft>,
    ) -> Result<(Reading, Option<HealthAlert>)>;

    /// Mark an alert resolved by `resolver`.
    ///
    /// Fails with `NotFound` for unknown ids. Resolving again overwrites the
    /// resolver and timestamp.
    async fn resolve_alert(&self, alert_id: Uuid, resolver: &str) -> Result<HealthAlert>;

    /// Fetch one alert
    async fn get_alert(&self, alert_id: Uuid) -> Result<Option<HealthAlert>>;

    /// Latest readings for a subject, newest first
    async fn recent_readings(&self, subject_id: Uuid, limit: i64) -> Result<Vec<Reading>>;

    /// Unresolved alerts across all subjects, newest first
    async fn unresolved_alerts(&self, limit: i64) -> Result<Vec<HealthAlert>>;

    /// Alerts for one subject, newest first
    async fn alerts_for_subject(&self, subject_id: Uuid, limit: i64) -> Result<Vec<HealthAlert>>;

    /// Stored settings for a subject
    async fn get_settings(&self, subject_id: Uuid) -> Result<Option<AlertSettings>>;

    /// Create or replace the settings for a subject
    async fn upsert_settings(
        &self,
        subject_id: Uuid,
        input: &AlertSettingsInput,
    ) -> Result<AlertSettings>;

    /// Check the store is reachable
    async fn health_check(&self) -> Result<()>;
}

/// Read access to the externally managed subject records
#[async_trait]
pub trait SubjectDirectory: Send + Sync {
    /// Look up a subject by id
    async fn get_subject(&self, subject_id: Uuid) -> Result<Option<Subject>>;
}
