#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use cardiowatch::alerting::{FanOutDispatcher, GatewayResult, NotificationGateway, OffChannel, OffChannelNotice};
use cardiowatch::api::AppState;
use cardiowatch::config::StoreConfig;
use cardiowatch::db::{AlertDraft, AlertStore, MemoryStore, SubjectDirectory};
use cardiowatch::ingest::IngestPipeline;
use cardiowatch::live::ConnectionRegistry;
use cardiowatch::models::{
    AlertSettings, AlertSettingsInput, HealthAlert, NewAlert, NewReading, Reading, Subject,
};
use cardiowatch::{Error, Result};

/// Gateway that records every send instead of calling a provider
pub struct RecordingGateway {
    tx: mpsc::UnboundedSender<(OffChannel, OffChannelNotice)>,
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send(&self, channel: OffChannel, notice: &OffChannelNotice) -> GatewayResult {
        let _ = self.tx.send((channel, notice.clone()));
        Ok(())
    }
}

/// Store whose writes always fail
pub struct BrokenStore(pub Arc<MemoryStore>);

fn unavailable() -> Error {
    Error::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl AlertStore for BrokenStore {
    async fn record_reading(&self, _reading: NewReading) -> Result<Reading> {
        Err(unavailable())
    }

    async fn create_alert(&self, _alert: NewAlert) -> Result<HealthAlert> {
        Err(unavailable())
    }

    async fn record_assessment(
        &self,
        _reading: NewReading,
        _draft: Option<AlertDraft>,
    ) -> Result<(Reading, Option<HealthAlert>)> {
        Err(unavailable())
    }

    async fn resolve_alert(&self, _alert_id: Uuid, _resolver: &str) -> Result<HealthAlert> {
        Err(unavailable())
    }

    async fn get_alert(&self, alert_id: Uuid) -> Result<Option<HealthAlert>> {
        self.0.get_alert(alert_id).await
    }

    async fn recent_readings(&self, subject_id: Uuid, limit: i64) -> Result<Vec<Reading>> {
        self.0.recent_readings(subject_id, limit).await
    }

    async fn unresolved_alerts(&self, limit: i64) -> Result<Vec<HealthAlert>> {
        self.0.unresolved_alerts(limit).await
    }

    async fn alerts_for_subject(&self, subject_id: Uuid, limit: i64) -> Result<Vec<HealthAlert>> {
        self.0.alerts_for_subject(subject_id, limit).await
    }

    async fn get_settings(&self, subject_id: Uuid) -> Result<Option<AlertSettings>> {
        self.0.get_settings(subject_id).await
    }

    async fn upsert_settings(
        &self,
        _subject_id: Uuid,
        _input: &AlertSettingsInput,
    ) -> Result<AlertSettings> {
        Err(unavailable())
    }

    async fn health_check(&self) -> Result<()> {
        Err(unavailable())
    }
}

/// Fully wired pipeline over an in-memory store
pub struct Harness {
    pub memory: Arc<MemoryStore>,
    pub store: Arc<dyn AlertStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub pipeline: IngestPipeline,
    pub offchannel: mpsc::UnboundedReceiver<(OffChannel, OffChannelNotice)>,
}

impl Harness {
    pub fn new(subjects: impl IntoIterator<Item = Subject>) -> Self {
        let memory = Arc::new(MemoryStore::with_subjects(subjects));
        Self::with_store(memory.clone(), memory)
    }

    pub fn broken(subjects: impl IntoIterator<Item = Subject>) -> Self {
        let memory = Arc::new(MemoryStore::with_subjects(subjects));
        Self::with_store(memory.clone(), Arc::new(BrokenStore(memory)))
    }

    fn with_store(memory: Arc<MemoryStore>, store: Arc<dyn AlertStore>) -> Self {
        let (tx, offchannel) = mpsc::unbounded_channel();
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher =
            FanOutDispatcher::new(Arc::clone(&registry), Arc::new(RecordingGateway { tx }));
        let directory: Arc<dyn SubjectDirectory> = memory.clone();
        let pipeline = IngestPipeline::new(Arc::clone(&store), directory, dispatcher);

        Self {
            memory,
            store,
            registry,
            pipeline,
            offchannel,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            pipeline: self.pipeline.clone(),
            store: Arc::clone(&self.store),
            directory: self.memory.clone(),
            registry: Arc::clone(&self.registry),
            limits: StoreConfig::default(),
            session_buffer: 16,
        }
    }

    /// Collect off-channel sends until none arrives within a short window
    pub async fn drain_offchannel(&mut self) -> Vec<(OffChannel, OffChannelNotice)> {
        let mut sent = Vec::new();
        while let Ok(Some(item)) =
            tokio::time::timeout(Duration::from_millis(200), self.offchannel.recv()).await
        {
            sent.push(item);
        }
        sent
    }
}

pub fn subject(phone: Option<&str>, observer_id: Option<Uuid>) -> Subject {
    Subject {
        id: Uuid::new_v4(),
        display_name: "Marie C.".to_string(),
        phone_number: phone.map(String::from),
        observer_id,
    }
}
