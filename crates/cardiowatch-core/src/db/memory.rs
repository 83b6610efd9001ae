//! In-process store for development and tests

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    AlertSettings, AlertSettingsInput, HealthAlert, NewAlert, NewReading, Reading, Subject,
};

use super::{AlertDraft, AlertStore, SubjectDirectory};

#[derive(Default)]
struct Inner {
    subjects: HashMap<Uuid, Subject>,
    readings: Vec<Reading>,
    alerts: Vec<HealthAlert>,
    alert_index: HashMap<Uuid, usize>,
    settings: HashMap<Uuid, AlertSettings>,
}

impl Inner {
    fn push_alert(&mut self, alert: HealthAlert) {
        self.alert_index.insert(alert.id, self.alerts.len());
        self.alerts.push(alert);
    }
}

/// Store that keeps everything in memory behind a single lock.
///
/// Records are appended in creation order, so listing walks the vectors in
/// reverse to return newest first.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with subjects
    pub fn with_subjects(subjects: impl IntoIterator<Item = Subject>) -> Self {
        let store = Self::new();
        for subject in subjects {
            store.insert_subject(subject);
        }
        store
    }

    /// Add or replace a subject record
    pub fn insert_subject(&self, subject: Subject) {
        self.inner.write().subjects.insert(subject.id, subject);
    }

    /// Number of stored readings
    pub fn reading_count(&self) -> usize {
        self.inner.read().readings.len()
    }

    /// Number of stored alerts
    pub fn alert_count(&self) -> usize {
        self.inner.read().alerts.len()
    }
}

fn clamp(limit: i64) -> usize {
    usize::try_from(limit.max(0)).unwrap_or(usize::MAX)
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn record_reading(&self, reading: NewReading) -> Result<Reading> {
        let reading = Reading::from_new(Uuid::new_v4(), reading, false, Utc::now());
        self.inner.write().readings.push(reading.clone());
        Ok(reading)
    }

    async fn create_alert(&self, alert: NewAlert) -> Result<HealthAlert> {
        let alert = HealthAlert::from_new(Uuid::new_v4(), alert, Utc::now());
        self.inner.write().push_alert(alert.clone());
        Ok(alert)
    }

    async fn record_assessment(
        &self,
        reading: NewReading,
        draft: Option<AlertDraft>,
    ) -> Result<(Reading, Option<HealthAlert>)> {
        let now = Utc::now();
        let reading = Reading::from_new(Uuid::new_v4(), reading, draft.is_some(), now);
        let alert = draft.map(|d| HealthAlert::from_new(Uuid::new_v4(), d.into_new_alert(&reading), now));

        let mut inner = self.inner.write();
        inner.readings.push(reading.clone());
        if let Some(alert) = &alert {
            inner.push_alert(alert.clone());
        }

        Ok((reading, alert))
    }

    async fn resolve_alert(&self, alert_id: Uuid, resolver: &str) -> Result<HealthAlert> {
        let mut inner = self.inner.write();
        let idx = *inner
            .alert_index
            .get(&alert_id)
            .ok_or_else(|| Error::not_found("Alert", alert_id))?;

        let alert = &mut inner.alerts[idx];
        alert.resolve(resolver, Utc::now());
        Ok(alert.clone())
    }

    async fn get_alert(&self, alert_id: Uuid) -> Result<Option<HealthAlert>> {
        let inner = self.inner.read();
        Ok(inner
            .alert_index
            .get(&alert_id)
            .map(|&idx| inner.alerts[idx].clone()))
    }

    async fn recent_readings(&self, subject_id: Uuid, limit: i64) -> Result<Vec<Reading>> {
        Ok(self
            .inner
            .read()
            .readings
            .iter()
            .rev()
            .filter(|r| r.subject_id == subject_id)
            .take(clamp(limit))
            .cloned()
            .collect())
    }

    async fn unresolved_alerts(&self, limit: i64) -> Result<Vec<HealthAlert>> {
        Ok(self
            .inner
            .read()
            .alerts
            .iter()
            .rev()
            .filter(|a| !a.is_resolved)
            .take(clamp(limit))
            .cloned()
            .collect())
    }

    async fn alerts_for_subject(&self, subject_id: Uuid, limit: i64) -> Result<Vec<HealthAlert>> {
        Ok(self
            .inner
            .read()
            .alerts
            .iter()
            .rev()
            .filter(|a| a.subject_id == subject_id)
            .take(clamp(limit))
            .cloned()
            .collect())
    }

    async fn get_settings(&self, subject_id: Uuid) -> Result<Option<AlertSettings>> {
        Ok(self.inner.read().settings.get(&subject_id).cloned())
    }

    async fn upsert_settings(
        &self,
        subject_id: Uuid,
        input: &AlertSettingsInput,
    ) -> Result<AlertSettings> {
        let settings = AlertSettings::from_input(subject_id, input, Utc::now());
        self.inner
            .write()
            .settings
            .insert(subject_id, settings.clone());
        Ok(settings)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl SubjectDirectory for MemoryStore {
    async fn get_subject(&self, subject_id: Uuid) -> Result<Option<Subject>> {
        Ok(self.inner.read().subjects.get(&subject_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{AlertType, Severity, NORMAL_RHYTHM};

    fn new_reading(subject_id: Uuid, heart_rate: i32) -> NewReading {
        NewReading {
            subject_id,
            heart_rate,
            rhythm: NORMAL_RHYTHM.to_string(),
            waveform: serde_json::Value::Null,
            device_id: None,
            is_normal: (50..=120).contains(&heart_rate),
        }
    }

    fn draft() -> AlertDraft {
        AlertDraft {
            alert_type: AlertType::HighHeartRate,
            severity: Severity::Critical,
            message: "HIGH HEART RATE: Heart rate 160 BPM, Rhythm: normal".to_string(),
        }
    }

    #[tokio::test]
    async fn standalone_alert_is_stored_unresolved() {
        let store = MemoryStore::new();
        let subject_id = Uuid::new_v4();

        let alert = store
            .create_alert(NewAlert {
                reading_id: None,
                subject_id,
                alert_type: AlertType::IrregularRhythm,
                severity: Severity::High,
                message: "IRREGULAR RHYTHM: Heart rate 90 BPM, Rhythm: afib".to_string(),
            })
            .await
            .unwrap();

        assert!(!alert.id.is_nil());
        assert_eq!(alert.reading_id, None);
        assert_eq!(alert.subject_id, subject_id);
        assert!(!alert.is_resolved);
        assert!(alert.resolved_by.is_none());
        assert!(alert.created_at <= Utc::now());
        assert_eq!(store.alert_count(), 1);

        assert_eq!(store.get_alert(alert.id).await.unwrap(), Some(alert.clone()));
        assert_eq!(store.unresolved_alerts(10).await.unwrap(), vec![alert.clone()]);
        assert_eq!(store.alerts_for_subject(subject_id, 10).await.unwrap(), vec![alert]);
    }

    #[tokio::test]
    async fn assessment_links_alert_to_reading() {
        let store = MemoryStore::new();
        let subject_id = Uuid::new_v4();

        let (reading, alert) = store
            .record_assessment(new_reading(subject_id, 160), Some(draft()))
            .await
            .unwrap();
        let alert = alert.unwrap();

        assert!(reading.alert_triggered);
        assert_eq!(alert.reading_id, Some(reading.id));
        assert_eq!(alert.subject_id, subject_id);
        assert!(!alert.is_resolved);
        assert_eq!(store.alert_count(), 1);
    }

    #[tokio::test]
    async fn normal_assessment_creates_no_alert() {
        let store = MemoryStore::new();
        let (reading, alert) = store
            .record_assessment(new_reading(Uuid::new_v4(), 72), None)
            .await
            .unwrap();

        assert!(!reading.alert_triggered);
        assert!(alert.is_none());
        assert_eq!(store.reading_count(), 1);
        assert_eq!(store.alert_count(), 0);
    }

    #[tokio::test]
    async fn listings_are_newest_first_and_limited() {
        let store = MemoryStore::new();
        let subject_id = Uuid::new_v4();
        for hr in [70, 80, 90] {
            store.record_reading(new_reading(subject_id, hr)).await.unwrap();
        }
        store.record_reading(new_reading(Uuid::new_v4(), 60)).await.unwrap();

        let readings = store.recent_readings(subject_id, 2).await.unwrap();
        let rates: Vec<i32> = readings.iter().map(|r| r.heart_rate).collect();
        assert_eq!(rates, vec![90, 80]);
    }

    #[tokio::test]
    async fn resolve_is_idempotent_and_overwrites_resolver() {
        let store = MemoryStore::new();
        let (_, alert) = store
            .record_assessment(new_reading(Uuid::new_v4(), 160), Some(draft()))
            .await
            .unwrap();
        let alert_id = alert.unwrap().id;

        let first = store.resolve_alert(alert_id, "observer-a").await.unwrap();
        assert!(first.is_resolved);
        assert_eq!(first.resolved_by.as_deref(), Some("observer-a"));

        let second = store.resolve_alert(alert_id, "observer-b").await.unwrap();
        assert!(second.is_resolved);
        assert_eq!(second.resolved_by.as_deref(), Some("observer-b"));

        assert!(store.unresolved_alerts(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolve_unknown_alert_is_not_found() {
        let store = MemoryStore::new();
        let err = store.resolve_alert(Uuid::new_v4(), "observer").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn settings_upsert_replaces_record() {
        let store = MemoryStore::new();
        let subject_id = Uuid::new_v4();
        assert!(store.get_settings(subject_id).await.unwrap().is_none());

        let input = AlertSettingsInput {
            high_heart_rate_threshold: Some(150),
            ..Default::default()
        };
        store.upsert_settings(subject_id, &input).await.unwrap();

        let input = AlertSettingsInput {
            low_heart_rate_threshold: Some(45),
            ..Default::default()
        };
        store.upsert_settings(subject_id, &input).await.unwrap();

        let stored = store.get_settings(subject_id).await.unwrap().unwrap();
        assert_eq!(stored.high_heart_rate_threshold, 120);
        assert_eq!(stored.low_heart_rate_threshold, 45);
    }

    #[tokio::test]
    async fn subjects_are_looked_up_by_id() {
        let subject = Subject {
            id: Uuid::new_v4(),
            display_name: "Ada L.".to_string(),
            phone_number: None,
            observer_id: None,
        };
        let store = MemoryStore::with_subjects([subject.clone()]);

        assert_eq!(store.get_subject(subject.id).await.unwrap(), Some(subject));
        assert!(store.get_subject(Uuid::new_v4()).await.unwrap().is_none());
    }
}
