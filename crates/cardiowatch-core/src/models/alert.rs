//! Health alert data models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Kind of abnormality an alert reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Heart rate above the subject's high threshold
    HighHeartRate,
    /// Heart rate below the subject's low threshold
    LowHeartRate,
    /// Rhythm classified as anything other than normal
    IrregularRhythm,
    /// Outside the fixed normal band without matching a specific rule
    AbnormalReading,
}

impl AlertType {
    /// Stable tag used on the wire and in storage
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HighHeartRate => "high_heart_rate",
            Self::LowHeartRate => "low_heart_rate",
            Self::IrregularRhythm => "irregular_rhythm",
            Self::AbnormalReading => "abnormal_reading",
        }
    }

    /// Tag with underscores replaced by spaces, upper-cased
    pub fn headline(self) -> String {
        self.as_str().replace('_', " ").to_uppercase()
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high_heart_rate" => Ok(Self::HighHeartRate),
            "low_heart_rate" => Ok(Self::LowHeartRate),
            "irregular_rhythm" => Ok(Self::IrregularRhythm),
            "abnormal_reading" => Ok(Self::AbnormalReading),
            other => Err(Error::internal(format!("unknown alert type '{other}'"))),
        }
    }
}

/// Alert severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Low
    Low,
    /// Medium
    Medium,
    /// High
    High,
    /// Critical
    Critical,
}

impl Severity {
    /// Stable tag used on the wire and in storage
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(Error::internal(format!("unknown severity '{other}'"))),
        }
    }
}

/// An alert derived from an abnormal reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthAlert {
    /// Unique identifier
    pub id: Uuid,

    /// The reading that triggered this alert, if any
    pub reading_id: Option<Uuid>,

    /// Subject the alert concerns
    pub subject_id: Uuid,

    /// What kind of abnormality was detected
    pub alert_type: AlertType,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    // Resolution
    /// Whether an observer has resolved the alert
    pub is_resolved: bool,

    /// Identity of the last resolver
    pub resolved_by: Option<String>,

    /// When the alert was last resolved
    pub resolved_at: Option<DateTime<Utc>>,

    /// When the alert was created
    pub created_at: DateTime<Utc>,
}

impl HealthAlert {
    /// Build a persisted alert from its input
    pub fn from_new(id: Uuid, new: NewAlert, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            reading_id: new.reading_id,
            subject_id: new.subject_id,
            alert_type: new.alert_type,
            severity: new.severity,
            message: new.message,
            is_resolved: false,
            resolved_by: None,
            resolved_at: None,
            created_at,
        }
    }

    /// Mark resolved. Re-resolving overwrites the resolver and timestamp.
    pub fn resolve(&mut self, resolver: &str, at: DateTime<Utc>) {
        self.is_resolved = true;
        self.resolved_by = Some(resolver.to_string());
        self.resolved_at = Some(at);
    }
}

/// Input for creating a new alert
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    /// Triggering reading; `None` for alerts raised without one
    pub reading_id: Option<Uuid>,
    /// Subject the alert concerns
    pub subject_id: Uuid,
    /// Kind of abnormality
    pub alert_type: AlertType,
    /// Severity level
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
}
