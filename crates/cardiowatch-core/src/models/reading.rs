//! Reading data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rhythm tag for a normal sinus rhythm
pub const NORMAL_RHYTHM: &str = "normal";

/// One ingested heart-rate / rhythm / waveform data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Unique identifier
    pub id: Uuid,

    /// Subject the reading belongs to
    pub subject_id: Uuid,

    /// Beats per minute
    pub heart_rate: i32,

    /// Rhythm classification reported by the device
    pub rhythm: String,

    /// Raw waveform payload, stored as received
    pub waveform: serde_json::Value,

    /// Reporting device, informational only
    pub device_id: Option<String>,

    /// Inside the fixed normal band with a normal rhythm
    pub is_normal: bool,

    /// Whether an alert was created for this reading
    pub alert_triggered: bool,

    /// When the reading was recorded
    pub created_at: DateTime<Utc>,
}

impl Reading {
    /// Build a persisted reading from its input
    pub fn from_new(
        id: Uuid,
        new: NewReading,
        alert_triggered: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            subject_id: new.subject_id,
            heart_rate: new.heart_rate,
            rhythm: new.rhythm,
            waveform: new.waveform,
            device_id: new.device_id,
            is_normal: new.is_normal,
            alert_triggered,
            created_at,
        }
    }
}

/// A classified reading ready to be recorded.
///
/// `alertTriggered` is not part of the input: the store derives it from
/// whether an alert is persisted alongside the reading.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    /// Subject the reading belongs to
    pub subject_id: Uuid,
    /// Beats per minute
    pub heart_rate: i32,
    /// Rhythm classification
    pub rhythm: String,
    /// Raw waveform payload
    pub waveform: serde_json::Value,
    /// Reporting device
    pub device_id: Option<String>,
    /// Result of the fixed-band check
    pub is_normal: bool,
}

/// Inbound reading submission
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Subject the reading is for
    pub subject_id: Uuid,

    /// Beats per minute; required
    pub heart_rate: Option<i32>,

    /// Rhythm classification, `normal` when omitted
    pub rhythm: Option<String>,

    /// Raw waveform payload
    #[serde(default)]
    pub waveform: serde_json::Value,

    /// Reporting device
    pub device_id: Option<String>,
}

impl Submission {
    /// Submission with only the required fields set
    pub fn new(subject_id: Uuid, heart_rate: i32) -> Self {
        Self {
            subject_id,
            heart_rate: Some(heart_rate),
            rhythm: None,
            waveform: serde_json::Value::Null,
            device_id: None,
        }
    }

    /// Set the rhythm tag
    #[must_use]
    pub fn with_rhythm(mut self, rhythm: impl Into<String>) -> Self {
        self.rhythm = Some(rhythm.into());
        self
    }
}
