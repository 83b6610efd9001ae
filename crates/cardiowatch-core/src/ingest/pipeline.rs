//! Processing pipeline for readings

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::alerting::{alert_message, evaluate, is_within_normal_band, DispatchReport, FanOutDispatcher};
use crate::db::{AlertDraft, AlertStore, SubjectDirectory};
use crate::error::{Error, Result};
use crate::models::{
    AlertSettings, HealthAlert, NewReading, Reading, Submission, NORMAL_RHYTHM,
};

/// Everything a single submission produced
#[derive(Debug, Clone)]
pub struct Ingested {
    /// The recorded reading
    pub reading: Reading,
    /// The alert created for it, if any
    pub alert: Option<HealthAlert>,
    /// Fan-out outcome; `None` when no alert was created
    pub dispatch: Option<DispatchReport>,
}

/// Ingestion pipeline: validate, classify, persist, fan out
#[derive(Clone)]
pub struct IngestPipeline {
    store: Arc<dyn AlertStore>,
    directory: Arc<dyn SubjectDirectory>,
    dispatcher: FanOutDispatcher,
}

impl IngestPipeline {
    /// Create a new pipeline
    pub fn new(
        store: Arc<dyn AlertStore>,
        directory: Arc<dyn SubjectDirectory>,
        dispatcher: FanOutDispatcher,
    ) -> Self {
        Self {
            store,
            directory,
            dispatcher,
        }
    }

    /// The dispatcher alerts are fanned out through
    pub fn dispatcher(&self) -> &FanOutDispatcher {
        &self.dispatcher
    }

    /// Ingest one reading and return it as recorded
    pub async fn submit(&self, submission: Submission) -> Result<Reading> {
        self.process(submission).await.map(|ingested| ingested.reading)
    }

    /// Ingest one reading and report what happened downstream.
    ///
    /// Validation and subject lookup failures happen before any write. A
    /// persistence failure aborts before fan-out; delivery failures never
    /// surface here.
    #[instrument(skip(self, submission), fields(subject_id = %submission.subject_id))]
    pub async fn process(&self, submission: Submission) -> Result<Ingested> {
        let (heart_rate, rhythm) = validate(&submission)?;

        let subject = self
            .directory
            .get_subject(submission.subject_id)
            .await?
            .ok_or_else(|| Error::not_found("Subject", submission.subject_id))?;

        let settings = self
            .store
            .get_settings(subject.id)
            .await?
            .unwrap_or_else(|| AlertSettings::defaults_for(subject.id));

        let decision = evaluate(heart_rate, &rhythm, Some(&settings));
        let draft = decision.alert().map(|(alert_type, severity)| AlertDraft {
            alert_type,
            severity,
            message: alert_message(alert_type, heart_rate, &rhythm),
        });

        let new_reading = NewReading {
            subject_id: subject.id,
            heart_rate,
            is_normal: is_within_normal_band(heart_rate, &rhythm),
            rhythm,
            waveform: submission.waveform,
            device_id: submission.device_id,
        };

        let (reading, alert) = self
            .store
            .record_assessment(new_reading, draft)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to record reading");
                e
            })?;

        metrics::counter!("cardiowatch_readings_total").increment(1);

        let Some(alert) = alert else {
            debug!(reading_id = %reading.id, heart_rate, "Reading recorded, no alert");
            return Ok(Ingested {
                reading,
                alert: None,
                dispatch: None,
            });
        };

        metrics::counter!(
            "cardiowatch_alerts_total",
            "alert_type" => alert.alert_type.as_str(),
            "severity" => alert.severity.as_str()
        )
        .increment(1);

        info!(
            reading_id = %reading.id,
            alert_id = %alert.id,
            alert_type = %alert.alert_type,
            severity = %alert.severity,
            heart_rate,
            "Alert created"
        );

        let report = self.dispatcher.dispatch(&alert, &subject, &settings);

        Ok(Ingested {
            reading,
            alert: Some(alert),
            dispatch: Some(report),
        })
    }
}

fn validate(submission: &Submission) -> Result<(i32, String)> {
    let heart_rate = submission
        .heart_rate
        .ok_or_else(|| Error::validation("heartRate is required"))?;

    let rhythm = match submission.rhythm.as_deref() {
        None => NORMAL_RHYTHM.to_string(),
        Some(r) if r.trim().is_empty() => {
            return Err(Error::validation("rhythm must not be blank"));
        }
        Some(r) => r.trim().to_string(),
    };

    Ok((heart_rate, rhythm))
}
